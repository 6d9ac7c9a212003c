//! Cache-or-fetch decisions for reference lists, with per-name deduplication.
//!
//! # Design
//! Deciding what a call to `fetch_one` does is mode independent: the caller
//! either gets a cached record, joins the `PendingFetch` already registered
//! for the name, or registers a new one and becomes its leader. Markers live
//! in one slot per name, like the cache store, so no name ever waits on
//! another. The cache lookup runs before the marker slot is locked; under the
//! lock only the memory tier is checked again.
//!
//! Only the leader talks to the network. Its outcome is written to the cache
//! store first and then published to every waiter, so anyone who finds no
//! pending marker either sees the fresh record or starts a new fetch.
//!
//! A `PendingFetch` can be waited on from both modes (condvar for threads,
//! `Notify` for tasks), which lets a blocking facade and a suspendable facade
//! built on the same coordinator share one exchange.
//!
//! The suspendable leader runs its exchange on a spawned task. Dropping the
//! caller's future therefore never cancels an exchange other callers are
//! waiting on.

use std::collections::BTreeMap;
use std::pin::pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::api::ExerciseApi;
use crate::cache::{now_ms, CacheStore};
use crate::error::{ApiError, Error};
use crate::http::{AsyncTransport, Transport};
use crate::types::{Origin, ReferenceData, ReferenceListName};

pub type FetchOutcome = Result<ReferenceData, Error>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-flight marker for one reference list.
#[derive(Debug, Default)]
pub struct PendingFetch {
    outcome: Mutex<Option<FetchOutcome>>,
    ready: Condvar,
    notify: Notify,
}

impl PendingFetch {
    fn resolve(&self, outcome: FetchOutcome) {
        {
            let mut slot = lock(&self.outcome);
            if slot.is_some() {
                return;
            }
            *slot = Some(outcome);
        }
        self.ready.notify_all();
        self.notify.notify_waiters();
    }

    pub fn outcome(&self) -> Option<FetchOutcome> {
        lock(&self.outcome).clone()
    }

    /// Block the calling thread until the fetch resolves.
    pub fn wait(&self) -> FetchOutcome {
        let mut slot = lock(&self.outcome);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self.ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Suspend the calling task until the fetch resolves.
    pub async fn wait_async(&self) -> FetchOutcome {
        loop {
            let mut notified = pin!(self.notify.notified());
            // Register before checking so a resolve in between is not missed.
            notified.as_mut().enable();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            notified.await;
        }
    }
}

/// Leadership of a registered fetch. Dropping it unresolved releases
/// waiters with `ApiError::Abandoned`.
struct FetchLease {
    coordinator: Arc<ReferenceCoordinator>,
    name: ReferenceListName,
    pending: Arc<PendingFetch>,
    finished: bool,
}

impl FetchLease {
    fn complete(mut self, fetched: Result<Vec<String>, ApiError>) -> FetchOutcome {
        let outcome = match fetched {
            Ok(entries) => Ok(self.coordinator.store(self.name, entries)),
            Err(e) => {
                warn!(name = %self.name, error = %e, "reference fetch failed");
                Err(Error::Api(e))
            }
        };
        self.finish(outcome.clone());
        outcome
    }

    fn finish(&mut self, outcome: FetchOutcome) {
        self.finished = true;
        {
            let mut marker = self.coordinator.marker(self.name);
            if marker
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &self.pending))
            {
                *marker = None;
            }
        }
        self.pending.resolve(outcome);
    }
}

impl Drop for FetchLease {
    fn drop(&mut self) {
        if !self.finished {
            warn!(name = %self.name, "reference fetch abandoned by its leader");
            self.finish(Err(Error::Api(ApiError::Abandoned)));
        }
    }
}

enum Claim {
    Cached(ReferenceData),
    Join(Arc<PendingFetch>),
    Lead(FetchLease),
}

/// Owns the cache store and the in-flight marker of every reference list.
#[derive(Debug)]
pub struct ReferenceCoordinator {
    api: ExerciseApi,
    cache: CacheStore,
    pending: [Mutex<Option<Arc<PendingFetch>>>; 3],
}

impl ReferenceCoordinator {
    pub fn new(api: ExerciseApi, cache: CacheStore) -> Self {
        Self {
            api,
            cache,
            pending: Default::default(),
        }
    }

    pub fn api(&self) -> &ExerciseApi {
        &self.api
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn is_pending(&self, name: ReferenceListName) -> bool {
        self.marker(name).is_some()
    }

    fn marker(&self, name: ReferenceListName) -> MutexGuard<'_, Option<Arc<PendingFetch>>> {
        lock(&self.pending[name.index()])
    }

    /// Fetch one list, running any network exchange on the calling thread.
    pub fn fetch_one<T: Transport + ?Sized>(
        self: &Arc<Self>,
        name: ReferenceListName,
        use_cache: bool,
        transport: &T,
    ) -> FetchOutcome {
        match self.claim(name, use_cache) {
            Claim::Cached(data) => Ok(data),
            Claim::Join(pending) => {
                debug!(%name, "joining in-flight reference fetch");
                pending.wait()
            }
            Claim::Lead(lease) => {
                let fetched = self.api.reference_list(name).execute(transport);
                lease.complete(fetched)
            }
        }
    }

    /// Fetch one list, suspending the calling task while waiting.
    ///
    /// Must be called within a tokio runtime: a leading call spawns its
    /// exchange so that it completes even if this future is dropped.
    pub async fn fetch_one_async<T: AsyncTransport + ?Sized + 'static>(
        self: &Arc<Self>,
        name: ReferenceListName,
        use_cache: bool,
        transport: Arc<T>,
    ) -> FetchOutcome {
        let pending = match self.claim(name, use_cache) {
            Claim::Cached(data) => return Ok(data),
            Claim::Join(pending) => {
                debug!(%name, "joining in-flight reference fetch");
                pending
            }
            Claim::Lead(lease) => {
                let pending = Arc::clone(&lease.pending);
                let call = self.api.reference_list(name);
                tokio::spawn(async move {
                    let fetched = call.execute_async(&*transport).await;
                    // Every waiter, the caller included, reads it from `pending`.
                    let _ = lease.complete(fetched);
                });
                pending
            }
        };
        pending.wait_async().await
    }

    /// Fetch every list on the calling thread, one after another.
    pub fn fetch_all<T: Transport + ?Sized>(self: &Arc<Self>, use_cache: bool, transport: &T) -> ReferenceBundle {
        ReferenceListName::ALL
            .into_iter()
            .map(|name| (name, self.fetch_one(name, use_cache, transport)))
            .collect()
    }

    /// Fetch every list concurrently within the calling task.
    pub async fn fetch_all_async<T: AsyncTransport + ?Sized + 'static>(
        self: &Arc<Self>,
        use_cache: bool,
        transport: Arc<T>,
    ) -> ReferenceBundle {
        let [body_parts, equipment, targets] = ReferenceListName::ALL;
        let (a, b, c) = tokio::join!(
            self.fetch_one_async(body_parts, use_cache, Arc::clone(&transport)),
            self.fetch_one_async(equipment, use_cache, Arc::clone(&transport)),
            self.fetch_one_async(targets, use_cache, transport),
        );
        [(body_parts, a), (equipment, b), (targets, c)].into_iter().collect()
    }

    fn claim(self: &Arc<Self>, name: ReferenceListName, use_cache: bool) -> Claim {
        if use_cache {
            match self.cache.get(name) {
                Ok(Some(record)) => return Claim::Cached(ReferenceData::from_cache(record)),
                Ok(None) => {}
                // An unreadable entry is refetched; a successful fetch overwrites it.
                Err(e) => warn!(%name, error = %e, "ignoring unreadable cache entry"),
            }
        }

        let mut marker = self.marker(name);
        if let Some(pending) = marker.as_ref() {
            return Claim::Join(Arc::clone(pending));
        }
        // A leader that finished after the lookup above has already stored
        // its record and cleared the marker.
        if use_cache {
            if let Some(record) = self.cache.memory(name) {
                return Claim::Cached(ReferenceData::from_cache(record));
            }
        }
        let pending = Arc::new(PendingFetch::default());
        *marker = Some(Arc::clone(&pending));
        debug!(%name, "leading reference fetch");
        Claim::Lead(FetchLease {
            coordinator: Arc::clone(self),
            name,
            pending,
            finished: false,
        })
    }

    /// Populate the cache. A failed write is reported on the result, not raised.
    fn store(&self, name: ReferenceListName, entries: Vec<String>) -> ReferenceData {
        match self.cache.put(name, entries.clone()) {
            Ok(record) => {
                info!(%name, entries = record.entries.len(), "reference list fetched");
                ReferenceData {
                    name,
                    entries: record.entries,
                    origin: Origin::Network,
                    fetched_at_ms: record.fetched_at_ms,
                    persist_error: None,
                }
            }
            Err(e) => {
                warn!(%name, error = %e, "reference list fetched but not cached");
                ReferenceData {
                    name,
                    entries,
                    origin: Origin::Network,
                    fetched_at_ms: now_ms(),
                    persist_error: Some(e),
                }
            }
        }
    }
}

/// Per-name outcome of fetching every reference list.
///
/// One failing list does not hide the others.
#[derive(Debug, Clone, Default)]
pub struct ReferenceBundle {
    results: BTreeMap<ReferenceListName, FetchOutcome>,
}

impl FromIterator<(ReferenceListName, FetchOutcome)> for ReferenceBundle {
    fn from_iter<I: IntoIterator<Item = (ReferenceListName, FetchOutcome)>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl ReferenceBundle {
    pub fn get(&self, name: ReferenceListName) -> Option<&FetchOutcome> {
        self.results.get(&name)
    }

    pub fn entries(&self, name: ReferenceListName) -> Option<&[String]> {
        match self.results.get(&name) {
            Some(Ok(data)) => Some(&data.entries),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        ReferenceListName::ALL
            .iter()
            .all(|name| matches!(self.results.get(name), Some(Ok(_))))
    }

    pub fn successes(&self) -> impl Iterator<Item = &ReferenceData> {
        self.results.values().filter_map(|outcome| outcome.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (ReferenceListName, &Error)> {
        self.results
            .iter()
            .filter_map(|(name, outcome)| outcome.as_ref().err().map(|e| (*name, e)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReferenceListName, &FetchOutcome)> {
        self.results.iter().map(|(name, outcome)| (*name, outcome))
    }

    /// All entries, or the first failure in name order.
    pub fn into_result(self) -> Result<BTreeMap<ReferenceListName, Vec<String>>, Error> {
        self.results
            .into_iter()
            .map(|(name, outcome)| outcome.map(|data| (name, data.entries)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::mpsc;
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::config::ExerciseConfig;
    use crate::error::{CacheError, TransportError, ValidationError};
    use crate::http::{HttpRequest, HttpResponse};

    /// Serves reference lists, counting exchanges per list.
    #[derive(Default)]
    struct FakeCatalog {
        calls: Mutex<HashMap<String, usize>>,
        delay: Duration,
        failing: Option<&'static str>,
    }

    impl FakeCatalog {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn calls(&self, list: &str) -> usize {
            lock(&self.calls).get(list).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> usize {
            lock(&self.calls).values().sum()
        }

        fn respond(&self, request: &HttpRequest) -> HttpResponse {
            let list = request.url.rsplit('/').next().unwrap_or_default().to_string();
            *lock(&self.calls).entry(list.clone()).or_default() += 1;
            if self.failing == Some(list.as_str()) {
                return HttpResponse::new(503, "unavailable");
            }
            HttpResponse::new(200, serde_json::to_vec(&[format!("{list}-a"), format!("{list}-b")]).unwrap())
        }
    }

    impl Transport for FakeCatalog {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            thread::sleep(self.delay);
            Ok(self.respond(&request))
        }
    }

    #[async_trait]
    impl AsyncTransport for FakeCatalog {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.respond(&request))
        }
    }

    fn coordinator() -> (TempDir, Arc<ReferenceCoordinator>) {
        let dir = tempfile::tempdir().unwrap();
        let config = ExerciseConfig::new("k").with_base_url("http://catalog.test");
        let api = ExerciseApi::new(&config).unwrap();
        let coordinator = ReferenceCoordinator::new(api, CacheStore::new(dir.path()));
        (dir, Arc::new(coordinator))
    }

    #[test]
    fn cached_record_is_served_without_exchange() {
        let (_dir, coordinator) = coordinator();
        coordinator
            .cache()
            .put(ReferenceListName::EquipmentList, vec!["barbell".to_string()])
            .unwrap();
        let transport = FakeCatalog::default();

        let data = coordinator
            .fetch_one(ReferenceListName::EquipmentList, true, &transport)
            .unwrap();
        assert_eq!(data.origin, Origin::Cache);
        assert_eq!(data.entries, vec!["barbell".to_string()]);
        assert_eq!(transport.total_calls(), 0);
    }

    #[test]
    fn bypassing_cache_refetches_and_overwrites() {
        let (_dir, coordinator) = coordinator();
        coordinator
            .cache()
            .put(ReferenceListName::TargetList, vec!["stale".to_string()])
            .unwrap();
        let transport = FakeCatalog::default();

        let data = coordinator
            .fetch_one(ReferenceListName::TargetList, false, &transport)
            .unwrap();
        assert_eq!(data.origin, Origin::Network);
        assert_eq!(data.entries, vec!["targetList-a".to_string(), "targetList-b".to_string()]);
        let cached = coordinator.cache().get(ReferenceListName::TargetList).unwrap().unwrap();
        assert_eq!(cached.entries, data.entries);
        assert!(!coordinator.is_pending(ReferenceListName::TargetList));
    }

    #[test]
    fn concurrent_blocking_callers_share_one_exchange() {
        let (_dir, coordinator) = coordinator();
        let transport = Arc::new(FakeCatalog::slow(Duration::from_millis(150)));
        let callers = 8;
        let barrier = Arc::new(Barrier::new(callers));

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let transport = Arc::clone(&transport);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    coordinator.fetch_one(ReferenceListName::BodyPartList, false, &*transport)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();

        assert_eq!(transport.calls("bodyPartList"), 1);
        for data in &results {
            assert_eq!(data.entries, results[0].entries);
        }
    }

    #[test]
    fn concurrent_blocking_callers_share_one_failure() {
        let (_dir, coordinator) = coordinator();
        let transport = Arc::new(FakeCatalog {
            delay: Duration::from_millis(150),
            failing: Some("targetList"),
            ..FakeCatalog::default()
        });
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let transport = Arc::clone(&transport);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    coordinator.fetch_one(ReferenceListName::TargetList, false, &*transport)
                })
            })
            .collect();
        for handle in handles {
            let err = handle.join().unwrap().unwrap_err();
            assert!(matches!(err, Error::Api(ApiError::Http { status: 503, .. })));
        }
        assert_eq!(transport.calls("targetList"), 1);
        assert!(coordinator.cache().get(ReferenceListName::TargetList).unwrap().is_none());
        assert!(!coordinator.is_pending(ReferenceListName::TargetList));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_async_callers_share_one_exchange() {
        let (_dir, coordinator) = coordinator();
        let transport = Arc::new(FakeCatalog::slow(Duration::from_millis(100)));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let transport = Arc::clone(&transport);
                tokio::spawn(async move {
                    coordinator
                        .fetch_one_async(ReferenceListName::EquipmentList, false, transport)
                        .await
                })
            })
            .collect();
        for task in tasks {
            let data = task.await.unwrap().unwrap();
            assert_eq!(data.entries[0], "equipmentList-a");
        }
        assert_eq!(transport.calls("equipmentList"), 1);
    }

    #[tokio::test]
    async fn dropped_leader_future_does_not_cancel_exchange() {
        let (_dir, coordinator) = coordinator();
        let transport = Arc::new(FakeCatalog::slow(Duration::from_millis(100)));

        let leader = coordinator.fetch_one_async(ReferenceListName::TargetList, false, Arc::clone(&transport));
        // Poll the leader just long enough to start the exchange, then drop it.
        let _ = tokio::time::timeout(Duration::from_millis(10), leader).await;
        assert!(coordinator.is_pending(ReferenceListName::TargetList));

        let data = coordinator
            .fetch_one_async(ReferenceListName::TargetList, false, Arc::clone(&transport))
            .await
            .unwrap();
        assert_eq!(data.origin, Origin::Network);
        assert_eq!(transport.calls("targetList"), 1);
        assert!(coordinator.cache().is_in_memory(ReferenceListName::TargetList));
    }

    #[test]
    fn blocking_waiter_joins_async_leader() {
        let (_dir, coordinator) = coordinator();
        let transport = Arc::new(FakeCatalog::slow(Duration::from_millis(150)));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();

        let leader = {
            let coordinator = Arc::clone(&coordinator);
            let transport = Arc::clone(&transport);
            runtime.spawn(async move {
                coordinator
                    .fetch_one_async(ReferenceListName::BodyPartList, false, transport)
                    .await
            })
        };
        while !coordinator.is_pending(ReferenceListName::BodyPartList) {
            thread::yield_now();
        }
        let joined = coordinator
            .fetch_one(ReferenceListName::BodyPartList, false, &*transport)
            .unwrap();
        let led = runtime.block_on(leader).unwrap().unwrap();

        assert_eq!(joined.entries, led.entries);
        assert_eq!(transport.calls("bodyPartList"), 1);
    }

    #[test]
    fn busy_slot_does_not_stall_other_names() {
        let (_dir, coordinator) = coordinator();
        let catalog = FakeCatalog::default();
        coordinator
            .cache()
            .put(ReferenceListName::EquipmentList, vec!["band".to_string()])
            .unwrap();

        // Stands in for a slow disk write of bodyPartList.
        let slot = coordinator.cache().lock(ReferenceListName::BodyPartList);
        thread::scope(|s| {
            let stalled = s.spawn(|| coordinator.fetch_one(ReferenceListName::BodyPartList, true, &catalog));
            thread::sleep(Duration::from_millis(50));

            let (tx, rx) = mpsc::channel();
            let (coordinator, catalog) = (&coordinator, &catalog);
            s.spawn(move || {
                let started = Instant::now();
                let outcome = coordinator.fetch_one(ReferenceListName::EquipmentList, true, &catalog);
                let _ = tx.send((outcome, started.elapsed()));
            });
            let received = rx.recv_timeout(Duration::from_millis(500));
            drop(slot);

            let (outcome, elapsed) = received.expect("cached list waited on another list's slot");
            let data = outcome.unwrap();
            assert_eq!(data.origin, Origin::Cache);
            assert_eq!(data.entries, vec!["band".to_string()]);
            assert!(elapsed < Duration::from_millis(250), "took {elapsed:?}");

            let fetched = stalled.join().unwrap().unwrap();
            assert_eq!(fetched.origin, Origin::Network);
        });
        assert_eq!(catalog.calls("bodyPartList"), 1);
        assert_eq!(catalog.calls("equipmentList"), 0);
    }

    #[test]
    fn abandoned_lease_releases_waiters() {
        let (_dir, coordinator) = coordinator();
        let Claim::Lead(lease) = coordinator.claim(ReferenceListName::EquipmentList, false) else {
            panic!("expected to lead");
        };
        let Claim::Join(pending) = coordinator.claim(ReferenceListName::EquipmentList, false) else {
            panic!("expected to join");
        };
        drop(lease);

        assert!(matches!(pending.wait(), Err(Error::Api(ApiError::Abandoned))));
        assert!(!coordinator.is_pending(ReferenceListName::EquipmentList));
    }

    #[test]
    fn fetch_all_isolates_failures() {
        let (_dir, coordinator) = coordinator();
        let transport = FakeCatalog {
            failing: Some("targetList"),
            ..FakeCatalog::default()
        };

        let bundle = coordinator.fetch_all(true, &transport);
        assert!(!bundle.is_complete());
        assert_eq!(
            bundle.entries(ReferenceListName::BodyPartList).unwrap(),
            ["bodyPartList-a", "bodyPartList-b"]
        );
        assert!(bundle.entries(ReferenceListName::EquipmentList).is_some());
        let failures: Vec<_> = bundle.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec![ReferenceListName::TargetList]);
        assert_eq!(bundle.successes().count(), 2);
        assert_eq!(transport.total_calls(), 3);
        assert!(matches!(bundle.into_result(), Err(Error::Api(ApiError::Http { status: 503, .. }))));
    }

    #[tokio::test]
    async fn fetch_all_async_isolates_failures() {
        let (_dir, coordinator) = coordinator();
        let transport = Arc::new(FakeCatalog {
            failing: Some("targetList"),
            ..FakeCatalog::default()
        });

        let bundle = coordinator.fetch_all_async(true, Arc::clone(&transport)).await;
        assert!(matches!(bundle.get(ReferenceListName::TargetList), Some(Err(Error::Api(_)))));
        assert!(bundle.entries(ReferenceListName::BodyPartList).is_some());
        assert!(bundle.entries(ReferenceListName::EquipmentList).is_some());
        assert_eq!(transport.total_calls(), 3);
    }

    #[test]
    fn fetch_all_from_cache_makes_no_exchange() {
        let (_dir, coordinator) = coordinator();
        for name in ReferenceListName::ALL {
            coordinator.cache().put(name, vec![name.to_string()]).unwrap();
        }
        let transport = FakeCatalog::default();
        let entries = coordinator.fetch_all(true, &transport).into_result().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[&ReferenceListName::TargetList], vec!["targetList".to_string()]);
        assert_eq!(transport.total_calls(), 0);
    }

    #[test]
    fn persist_failure_is_reported_not_raised() {
        let (_dir, coordinator) = coordinator();
        let path = coordinator.cache().path_for(ReferenceListName::EquipmentList);
        std::fs::create_dir_all(crate::cache::temp_path(&path)).unwrap();
        let transport = FakeCatalog::default();

        let data = coordinator
            .fetch_one(ReferenceListName::EquipmentList, true, &transport)
            .unwrap();
        assert!(!data.is_persisted());
        assert!(matches!(data.persist_error, Some(CacheError::Io { .. })));
        assert_eq!(data.entries[0], "equipmentList-a");
        assert!(coordinator.cache().get(ReferenceListName::EquipmentList).unwrap().is_none());
    }

    #[test]
    fn unreadable_cache_entry_is_refetched() {
        let (_dir, coordinator) = coordinator();
        let path = coordinator.cache().path_for(ReferenceListName::BodyPartList);
        std::fs::write(&path, "{ truncated").unwrap();
        let transport = FakeCatalog::default();

        let data = coordinator
            .fetch_one(ReferenceListName::BodyPartList, true, &transport)
            .unwrap();
        assert_eq!(data.origin, Origin::Network);
        assert!(data.is_persisted());
        assert_eq!(transport.calls("bodyPartList"), 1);
        assert!(coordinator.cache().get(ReferenceListName::BodyPartList).is_ok());
    }

    #[test]
    fn unknown_names_never_reach_the_coordinator() {
        assert!(matches!(
            "shoeList".parse::<ReferenceListName>(),
            Err(ValidationError::UnknownReferenceList(_))
        ));
    }
}
