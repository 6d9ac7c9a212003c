//! Thread-blocking facade.
//!
//! Each method occupies the calling thread until its exchange completes.
//! Validation, request building, response parsing and cache decisions are
//! the same code the suspendable facade in `nonblocking` runs.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::api::ExerciseApi;
use crate::cache::CacheStore;
use crate::config::ExerciseConfig;
use crate::coordinator::{ReferenceBundle, ReferenceCoordinator};
use crate::error::Error;
use crate::http::Transport;
use crate::transport::UreqTransport;
use crate::types::{Exercise, ExerciseImage, ReferenceData, ReferenceListName};

/// Blocking client for the exercise catalog.
pub struct ExerciseDb<T = UreqTransport> {
    api: ExerciseApi,
    coordinator: Arc<ReferenceCoordinator>,
    transport: T,
}

impl ExerciseDb<UreqTransport> {
    /// Configure from the environment and talk to the network with `ureq`.
    pub fn from_env() -> Result<Self, Error> {
        let config = ExerciseConfig::from_env()?;
        Self::new(&config, UreqTransport::new())
    }
}

impl<T: Transport> ExerciseDb<T> {
    pub fn new(config: &ExerciseConfig, transport: T) -> Result<Self, Error> {
        let api = ExerciseApi::new(config)?;
        let cache = CacheStore::new(&config.cache_dir);
        let coordinator = Arc::new(ReferenceCoordinator::new(api, cache));
        Ok(Self::with_coordinator(coordinator, transport))
    }

    /// Share a cache store and pending-fetch registry with other facades.
    pub fn with_coordinator(coordinator: Arc<ReferenceCoordinator>, transport: T) -> Self {
        Self {
            api: coordinator.api().clone(),
            coordinator,
            transport,
        }
    }

    pub fn coordinator(&self) -> &Arc<ReferenceCoordinator> {
        &self.coordinator
    }

    pub fn cache(&self) -> &CacheStore {
        self.coordinator.cache()
    }

    /// Provider status payload. Raises `Api`.
    pub fn check_status(&self) -> Result<Value, Error> {
        Ok(self.api.check_status().execute(&self.transport)?)
    }

    /// One page of exercises matching `filter_type` = `value`. Raises `Validation`, `Api`.
    pub fn search_exercises(&self, filter_type: &str, value: &str, limit: i64, offset: i64) -> Result<Vec<Exercise>, Error> {
        let call = self.api.search_exercises(filter_type, value, limit, offset)?;
        Ok(call.execute(&self.transport)?)
    }

    /// Raises `Validation`, `Api` (`NotFound` for unknown ids).
    pub fn get_exercise_by_id(&self, id: &str) -> Result<Exercise, Error> {
        let call = self.api.get_exercise_by_id(id)?;
        Ok(call.execute(&self.transport)?)
    }

    /// Raises `Validation`, `Api`.
    pub fn list_all_exercises(&self, limit: i64, offset: i64) -> Result<Vec<Exercise>, Error> {
        let call = self.api.list_all_exercises(limit, offset)?;
        Ok(call.execute(&self.transport)?)
    }

    /// Raises `Validation`, `Api`.
    pub fn get_exercise_image(&self, id: &str) -> Result<ExerciseImage, Error> {
        let call = self.api.exercise_image(id)?;
        Ok(call.execute(&self.transport)?)
    }

    /// Cached list if present, otherwise fetched and cached.
    ///
    /// Raises `Validation`, `Api`. A failed cache write is reported on
    /// `ReferenceData::persist_error`.
    pub fn fetch_and_cache_reference(&self, name: &str) -> Result<ReferenceData, Error> {
        let name: ReferenceListName = name.parse()?;
        self.coordinator.fetch_one(name, true, &self.transport)
    }

    /// Like `fetch_and_cache_reference` but never served from the cache.
    pub fn refresh_reference(&self, name: &str) -> Result<ReferenceData, Error> {
        let name: ReferenceListName = name.parse()?;
        self.coordinator.fetch_one(name, false, &self.transport)
    }

    /// Every reference list, with a per-list outcome.
    pub fn fetch_all_reference_data(&self, use_cache: bool) -> ReferenceBundle {
        self.coordinator.fetch_all(use_cache, &self.transport)
    }

    /// Cache only, never the network. `Ok(None)` means nothing is cached yet.
    pub fn load_cached_reference(&self, name: &str) -> Result<Option<Vec<String>>, Error> {
        let name: ReferenceListName = name.parse()?;
        Ok(self.cache().get(name)?.map(|record| record.entries))
    }

    /// Write the cached list to `path`. Raises `Validation`, `Cache`.
    pub fn save_cached_reference(&self, name: &str, path: impl AsRef<Path>) -> Result<(), Error> {
        let name: ReferenceListName = name.parse()?;
        Ok(self.cache().export(name, path)?)
    }

    /// Raises `Cache`.
    pub fn load_reference_from_file(&self, path: impl AsRef<Path>) -> Result<Vec<String>, Error> {
        Ok(self.cache().load_from_path(path)?)
    }

    /// Raises `Validation`, `Cache`.
    pub fn invalidate_reference(&self, name: &str) -> Result<(), Error> {
        let name: ReferenceListName = name.parse()?;
        Ok(self.cache().invalidate(name)?)
    }
}
