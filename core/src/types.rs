//! Domain types for the exercise catalog.
//!
//! # Design
//! The closed sets the provider understands (reference list names, search
//! filter types) are enums, so an unknown name can only enter through
//! `FromStr`, which rejects it with a `ValidationError`. Exercise records are
//! decoded leniently: the provider's schema evolves and anything not modelled
//! here lands in `extra`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CacheError, ValidationError};

/// One of the three slowly-changing catalogs used to filter exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceListName {
    BodyPartList,
    EquipmentList,
    TargetList,
}

impl ReferenceListName {
    pub const ALL: [ReferenceListName; 3] = [
        ReferenceListName::BodyPartList,
        ReferenceListName::EquipmentList,
        ReferenceListName::TargetList,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceListName::BodyPartList => "bodyPartList",
            ReferenceListName::EquipmentList => "equipmentList",
            ReferenceListName::TargetList => "targetList",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ReferenceListName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceListName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReferenceListName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownReferenceList(s.to_string()))
    }
}

/// Field a search filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    BodyPart,
    Equipment,
    Target,
}

impl FilterType {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::BodyPart => "bodyPart",
            FilterType::Equipment => "equipment",
            FilterType::Target => "target",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bodyPart" => Ok(FilterType::BodyPart),
            "equipment" => Ok(FilterType::Equipment),
            "target" => Ok(FilterType::Target),
            other => Err(ValidationError::UnknownFilterType(other.to_string())),
        }
    }
}

/// Validated `limit`/`offset` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Result<Self, ValidationError> {
        let limit = u64::try_from(limit).map_err(|_| ValidationError::Negative {
            field: "limit",
            value: limit,
        })?;
        let offset = u64::try_from(offset).map_err(|_| ValidationError::Negative {
            field: "offset",
            value: offset,
        })?;
        Ok(Self { limit, offset })
    }
}

/// A single exercise as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_part: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gif_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<String>,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of an image lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ExerciseImage {
    /// JSON document pointing at the image(s).
    Locator(Value),
    /// The image bytes themselves.
    Raw {
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// A reference list as held by the cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub name: ReferenceListName,
    /// Epoch milliseconds of the fetch that produced `entries`.
    pub fetched_at_ms: u64,
    pub entries: Vec<String>,
}

/// Where a reference list handed to a caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Network,
}

/// Reference list returned by the coordinator.
///
/// A network fetch whose result could not be written to disk still succeeds;
/// the write failure is reported in `persist_error` and nothing is cached.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub name: ReferenceListName,
    pub entries: Vec<String>,
    pub origin: Origin,
    pub fetched_at_ms: u64,
    pub persist_error: Option<CacheError>,
}

impl ReferenceData {
    pub(crate) fn from_cache(record: CacheRecord) -> Self {
        Self {
            name: record.name,
            entries: record.entries,
            origin: Origin::Cache,
            fetched_at_ms: record.fetched_at_ms,
            persist_error: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}
