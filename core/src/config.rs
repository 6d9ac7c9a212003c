//! Client configuration.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file. A missing API key fails here, at construction, rather than on the
//! first request.

use std::path::PathBuf;

use tracing::debug;

use crate::error::ValidationError;

pub const API_KEY_VAR: &str = "EXERCISE_DB_API_KEY";
pub const API_HOST_VAR: &str = "EXERCISE_DB_API_HOST";
pub const BASE_URL_VAR: &str = "EXERCISE_DB_BASE_URL";
pub const CACHE_DIR_VAR: &str = "CACHE_DIR";

pub const DEFAULT_HOST: &str = "exercisedb.p.rapidapi.com";
pub const DEFAULT_CACHE_DIR: &str = "data/cached_references";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseConfig {
    pub api_key: String,
    pub host: String,
    pub cache_dir: PathBuf,
    /// Overrides the `https://{host}` endpoint, e.g. for a local mock.
    pub base_url: Option<String>,
}

impl ExerciseConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: DEFAULT_HOST.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            base_url: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!("https://{}", self.host),
        }
    }

    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ValidationError> {
        if let Ok(path) = dotenv::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = get(API_KEY_VAR).ok_or(ValidationError::MissingConfig(API_KEY_VAR))?;
        let mut config = Self::new(api_key);
        if let Some(host) = get(API_HOST_VAR) {
            config.host = host;
        }
        if let Some(dir) = get(CACHE_DIR_VAR) {
            config.cache_dir = PathBuf::from(dir);
        }
        config.base_url = get(BASE_URL_VAR);
        Ok(config)
    }
}
