//! Suspendable facade.
//!
//! Same operations and error contract as `blocking::ExerciseDb`; only the
//! exchange step awaits. Must be driven by a tokio runtime.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::api::ExerciseApi;
use crate::cache::CacheStore;
use crate::config::ExerciseConfig;
use crate::coordinator::{ReferenceBundle, ReferenceCoordinator};
use crate::error::Error;
use crate::http::AsyncTransport;
use crate::transport::ReqwestTransport;
use crate::types::{Exercise, ExerciseImage, ReferenceData, ReferenceListName};

/// Async client for the exercise catalog.
pub struct ExerciseDb<T: ?Sized = ReqwestTransport> {
    api: ExerciseApi,
    coordinator: Arc<ReferenceCoordinator>,
    transport: Arc<T>,
}

impl<T: ?Sized> Clone for ExerciseDb<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            coordinator: Arc::clone(&self.coordinator),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl ExerciseDb<ReqwestTransport> {
    /// Configure from the environment and talk to the network with `reqwest`.
    pub fn from_env() -> Result<Self, Error> {
        let config = ExerciseConfig::from_env()?;
        let transport = ReqwestTransport::new().map_err(crate::error::ApiError::from)?;
        Self::new(&config, transport)
    }
}

impl<T: AsyncTransport + 'static> ExerciseDb<T> {
    pub fn new(config: &ExerciseConfig, transport: T) -> Result<Self, Error> {
        let api = ExerciseApi::new(config)?;
        let cache = CacheStore::new(&config.cache_dir);
        let coordinator = Arc::new(ReferenceCoordinator::new(api, cache));
        Ok(Self::with_coordinator(coordinator, Arc::new(transport)))
    }
}

impl<T: AsyncTransport + ?Sized + 'static> ExerciseDb<T> {
    /// Share a cache store and pending-fetch registry with other facades,
    /// including blocking ones.
    pub fn with_coordinator(coordinator: Arc<ReferenceCoordinator>, transport: Arc<T>) -> Self {
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
    pub async fn check_status(&self) -> Result<Value, Error> {
        Ok(self.api.check_status().execute_async(&*self.transport).await?)
    }

    /// One page of exercises matching `filter_type` = `value`. Raises `Validation`, `Api`.
    pub async fn search_exercises(
        &self,
        filter_type: &str,
        value: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Exercise>, Error> {
        let call = self.api.search_exercises(filter_type, value, limit, offset)?;
        Ok(call.execute_async(&*self.transport).await?)
    }

    /// Raises `Validation`, `Api` (`NotFound` for unknown ids).
    pub async fn get_exercise_by_id(&self, id: &str) -> Result<Exercise, Error> {
        let call = self.api.get_exercise_by_id(id)?;
        Ok(call.execute_async(&*self.transport).await?)
    }

    /// Raises `Validation`, `Api`.
    pub async fn list_all_exercises(&self, limit: i64, offset: i64) -> Result<Vec<Exercise>, Error> {
        let call = self.api.list_all_exercises(limit, offset)?;
        Ok(call.execute_async(&*self.transport).await?)
    }

    /// Raises `Validation`, `Api`.
    pub async fn get_exercise_image(&self, id: &str) -> Result<ExerciseImage, Error> {
        let call = self.api.exercise_image(id)?;
        Ok(call.execute_async(&*self.transport).await?)
    }

    /// Cached list if present, otherwise fetched and cached.
    ///
    /// Raises `Validation`, `Api`. A failed cache write is reported on
    /// `ReferenceData::persist_error`. Dropping the returned future does not
    /// cancel a fetch other callers are waiting on.
    pub async fn fetch_and_cache_reference(&self, name: &str) -> Result<ReferenceData, Error> {
        let name: ReferenceListName = name.parse()?;
        self.coordinator
            .fetch_one_async(name, true, Arc::clone(&self.transport))
            .await
    }

    /// Like `fetch_and_cache_reference` but never served from the cache.
    pub async fn refresh_reference(&self, name: &str) -> Result<ReferenceData, Error> {
        let name: ReferenceListName = name.parse()?;
        self.coordinator
            .fetch_one_async(name, false, Arc::clone(&self.transport))
            .await
    }

    /// Every reference list, fetched concurrently, with a per-list outcome.
    /// Failures are reported per list, never raised.
    pub async fn fetch_all_reference_data(&self, use_cache: bool) -> ReferenceBundle {
        self.coordinator
            .fetch_all_async(use_cache, Arc::clone(&self.transport))
            .await
    }

    // Cache operations are local file I/O on small files and run inline.

    /// Cache only, never the network. `Ok(None)` means nothing is cached yet.
    /// Raises `Validation`, `Cache`.
    pub async fn load_cached_reference(&self, name: &str) -> Result<Option<Vec<String>>, Error> {
        let name: ReferenceListName = name.parse()?;
        Ok(self.cache().get(name)?.map(|record| record.entries))
    }

    /// Write the cached list to `path`. Raises `Validation`, `Cache`.
    pub async fn save_cached_reference(&self, name: &str, path: impl AsRef<Path>) -> Result<(), Error> {
        let name: ReferenceListName = name.parse()?;
        Ok(self.cache().export(name, path)?)
    }

    /// Raises `Cache`.
    pub async fn load_reference_from_file(&self, path: impl AsRef<Path>) -> Result<Vec<String>, Error> {
        Ok(self.cache().load_from_path(path)?)
    }

    /// Raises `Validation`, `Cache`.
    pub async fn invalidate_reference(&self, name: &str) -> Result<(), Error> {
        let name: ReferenceListName = name.parse()?;
        Ok(self.cache().invalidate(name)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::blocking;
    use crate::cache::temp_path;
    use crate::error::{ApiError, CacheError, TransportError, ValidationError};
    use crate::http::{HttpRequest, HttpResponse, Transport};
    use crate::types::Origin;

    /// Answers every path from a fixed table, counting hits per path.
    #[derive(Default)]
    struct Routes {
        table: HashMap<&'static str, (u16, &'static str)>,
        hits: Mutex<HashMap<String, usize>>,
        delay: Duration,
    }

    impl Routes {
        fn new(table: &[(&'static str, u16, &'static str)]) -> Self {
            Self {
                table: table.iter().map(|&(path, status, body)| (path, (status, body))).collect(),
                ..Self::default()
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn hits(&self, path: &str) -> usize {
            self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
        }

        fn total_hits(&self) -> usize {
            self.hits.lock().unwrap().values().sum()
        }

        fn respond(&self, request: &HttpRequest) -> HttpResponse {
            let path = request.url.trim_start_matches("http://catalog.test").to_string();
            *self.hits.lock().unwrap().entry(path.clone()).or_default() += 1;
            match self.table.get(path.as_str()) {
                Some(&(status, body)) => {
                    HttpResponse::new(status, body).with_header("content-type", "application/json")
                }
                None => HttpResponse::new(404, r#"{"message":"not found"}"#),
            }
        }
    }

    #[async_trait]
    impl AsyncTransport for Routes {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.respond(&request))
        }
    }

    impl Transport for Routes {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            std::thread::sleep(self.delay);
            Ok(self.respond(&request))
        }
    }

    fn catalog() -> Routes {
        Routes::new(&[
            ("/status", 200, r#"{"status":"ok"}"#),
            ("/exercises/equipmentList", 200, r#"["barbell","dumbbell"]"#),
            ("/exercises/bodyPartList", 200, r#"["back","chest"]"#),
            ("/exercises/targetList", 503, "upstream unavailable"),
            (
                "/exercises/exercise/0001",
                200,
                r#"{"id":"0001","name":"3/4 sit-up","bodyPart":"waist","target":"abs","equipment":"body weight"}"#,
            ),
            ("/exercises/bodyPart/upper%20legs", 200, r#"[{"id":"0010","name":"squat","bodyPart":"upper legs"}]"#),
        ])
    }

    fn config(dir: &TempDir) -> ExerciseConfig {
        ExerciseConfig::new("test_api_key")
            .with_base_url("http://catalog.test")
            .with_cache_dir(dir.path().join("cached_references"))
    }

    fn db(routes: Routes) -> (TempDir, ExerciseDb<Routes>) {
        let dir = tempfile::tempdir().unwrap();
        let db = ExerciseDb::new(&config(&dir), routes).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn fetch_and_cache_then_load_without_network() {
        let (_dir, db) = db(catalog());

        let data = db.fetch_and_cache_reference("equipmentList").await.unwrap();
        assert_eq!(data.entries, vec!["barbell".to_string(), "dumbbell".to_string()]);
        assert_eq!(data.origin, Origin::Network);

        let cached = db.load_cached_reference("equipmentList").await.unwrap();
        assert_eq!(cached, Some(vec!["barbell".to_string(), "dumbbell".to_string()]));
        assert_eq!(
            db.fetch_and_cache_reference("equipmentList").await.unwrap().origin,
            Origin::Cache
        );
        assert_eq!(db.transport.hits("/exercises/equipmentList"), 1);
    }

    #[tokio::test]
    async fn empty_search_value_never_reaches_network() {
        let (_dir, db) = db(catalog());
        let err = db.search_exercises("bodyPart", "", 10, 0).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Empty(_))));
        let err = db.search_exercises("muscle", "abs", 10, 0).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::UnknownFilterType(_))));
        assert_eq!(db.transport.total_hits(), 0);
    }

    #[tokio::test]
    async fn failed_cache_write_still_returns_fetched_value() {
        let (_dir, db) = db(catalog());
        let path = db.cache().path_for(ReferenceListName::EquipmentList);
        fs::create_dir_all(temp_path(&path)).unwrap();

        let data = db.fetch_and_cache_reference("equipmentList").await.unwrap();
        assert_eq!(data.entries.len(), 2);
        assert!(matches!(data.persist_error, Some(CacheError::Io { .. })));
        assert_eq!(db.load_cached_reference("equipmentList").await.unwrap(), None);
    }

    #[tokio::test]
    async fn search_lookup_and_status() {
        let (_dir, db) = db(catalog());

        let status = db.check_status().await.unwrap();
        assert_eq!(status["status"], "ok");

        let found = db.search_exercises("bodyPart", "upper legs", 10, 0).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "squat");

        let exercise = db.get_exercise_by_id("0001").await.unwrap();
        assert_eq!(exercise.target.as_deref(), Some("abs"));
        assert!(matches!(
            db.get_exercise_by_id("9999").await,
            Err(Error::Api(ApiError::NotFound))
        ));
    }

    #[tokio::test]
    async fn fetch_all_reports_each_list() {
        let (_dir, db) = db(catalog());
        let bundle = db.fetch_all_reference_data(true).await;

        assert!(!bundle.is_complete());
        assert_eq!(
            bundle.entries(ReferenceListName::BodyPartList),
            Some(&["back".to_string(), "chest".to_string()][..])
        );
        assert!(bundle.entries(ReferenceListName::EquipmentList).is_some());
        let failures: Vec<_> = bundle.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, ReferenceListName::TargetList);
        assert!(matches!(failures[0].1, Error::Api(ApiError::Http { status: 503, .. })));
        assert!(matches!(bundle.into_result(), Err(Error::Api(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_exchange() {
        let (_dir, db) = db(catalog().slow(Duration::from_millis(50)));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.fetch_and_cache_reference("bodyPartList").await })
            })
            .collect();
        for task in tasks {
            let data = task.await.unwrap().unwrap();
            assert_eq!(data.entries, vec!["back".to_string(), "chest".to_string()]);
        }
        assert_eq!(db.transport.hits("/exercises/bodyPartList"), 1);
        assert!(!db.coordinator().is_pending(ReferenceListName::BodyPartList));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn facades_in_both_modes_share_one_cache_and_registry() {
        let dir = tempfile::tempdir().unwrap();
        let routes = Arc::new(catalog().slow(Duration::from_millis(100)));
        let async_db = ExerciseDb::new(&config(&dir), Arc::clone(&routes)).unwrap();
        let sync_db = blocking::ExerciseDb::with_coordinator(Arc::clone(async_db.coordinator()), Arc::clone(&routes));

        let leader = {
            let async_db = async_db.clone();
            tokio::spawn(async move { async_db.fetch_and_cache_reference("equipmentList").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let follower = tokio::task::spawn_blocking(move || sync_db.fetch_and_cache_reference("equipmentList"));

        let led = leader.await.unwrap().unwrap();
        let followed = follower.await.unwrap().unwrap();
        assert_eq!(led.entries, followed.entries);
        assert_eq!(routes.hits("/exercises/equipmentList"), 1);
    }

    #[tokio::test]
    async fn unknown_reference_names_fail_before_io() {
        let (_dir, db) = db(catalog());
        assert!(matches!(
            db.fetch_and_cache_reference("muscleList").await,
            Err(Error::Validation(ValidationError::UnknownReferenceList(_)))
        ));
        assert!(matches!(
            db.invalidate_reference("").await,
            Err(Error::Validation(ValidationError::UnknownReferenceList(_)))
        ));
        assert_eq!(db.transport.total_hits(), 0);
    }

    #[tokio::test]
    async fn cache_file_operations() {
        let (dir, db) = db(catalog());
        db.fetch_and_cache_reference("bodyPartList").await.unwrap();

        let out = dir.path().join("body_parts.json");
        db.save_cached_reference("bodyPartList", &out).await.unwrap();
        assert_eq!(db.load_reference_from_file(&out).await.unwrap().len(), 2);

        db.invalidate_reference("bodyPartList").await.unwrap();
        assert_eq!(db.load_cached_reference("bodyPartList").await.unwrap(), None);
        assert!(out.exists());
        assert!(matches!(
            db.refresh_reference("targetList").await,
            Err(Error::Api(ApiError::Http { status: 503, .. }))
        ));
    }
}
