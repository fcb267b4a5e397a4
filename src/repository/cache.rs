use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::debug;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::repository::StateRepository;
use crate::state::FeatureState;

/// A read-through cache in front of another [StateRepository].
///
/// Entries expire after the configured TTL, or never when the TTL is zero. A write always goes
/// to the delegate and then evicts the entry for that feature, so the next read is a fresh
/// fetch. Lookups that find nothing are cached too. There is no capacity bound: the cache holds
/// at most one entry per feature.
///
/// A miss takes a lock scoped to that one feature and re-checks the cache before calling the
/// delegate, so concurrent misses on the same feature result in a single backend call while
/// unrelated features never wait on each other. Writes take the same per-feature lock, which
/// keeps a read that started before a write from caching the value the write replaced.
pub struct CachingStateRepository<R> {
    delegate: R,
    ttl: Duration,
    cache: DashMap<String, CacheEntry>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

struct CacheEntry {
    state: Option<FeatureState>,
    timestamp: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(state: Option<FeatureState>, ttl: Duration) -> Self {
        Self {
            state,
            timestamp: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        !self.ttl.is_zero() && self.timestamp.elapsed() > self.ttl
    }
}

impl<R: StateRepository> CachingStateRepository<R> {
    /// Cache states until they are overwritten through this repository. Only use this when
    /// nothing else modifies the backing store.
    pub fn new(delegate: R) -> Self {
        Self::with_duration(delegate, Duration::ZERO)
    }

    /// Cache states for `ttl_millis` milliseconds; zero means forever.
    ///
    /// A negative TTL is a configuration error.
    pub fn with_ttl(delegate: R, ttl_millis: i64) -> Result<Self> {
        let ttl = u64::try_from(ttl_millis)
            .map_err(|_| Error::configuration(format!("negative cache TTL: {}", ttl_millis)))?;
        Ok(Self::with_duration(delegate, Duration::from_millis(ttl)))
    }

    pub fn with_duration(delegate: R, ttl: Duration) -> Self {
        Self {
            delegate,
            ttl,
            cache: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.cache.clear();
    }

    fn cached(&self, feature: &str) -> Option<Option<FeatureState>> {
        self.cache
            .get(feature)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.state.clone())
    }

    fn lock_for(&self, feature: &str) -> Arc<Mutex<()>> {
        self.locks.entry(feature.to_string()).or_default().clone()
    }
}

impl<R: StateRepository> StateRepository for CachingStateRepository<R> {
    fn feature_state(&self, feature: &str) -> Result<Option<FeatureState>> {
        if let Some(state) = self.cached(feature) {
            return Ok(state);
        }

        let lock = self.lock_for(feature);
        let _guard = lock.lock();

        // another caller may have filled the entry while we waited
        if let Some(state) = self.cached(feature) {
            return Ok(state);
        }

        debug!("cache miss for feature {}", feature);
        let state = self.delegate.feature_state(feature)?;
        self.cache.insert(
            feature.to_string(),
            CacheEntry::new(state.clone(), self.ttl),
        );
        Ok(state)
    }

    fn set_feature_state(&self, state: &FeatureState) -> Result<()> {
        let lock = self.lock_for(state.feature());
        let _guard = lock.lock();

        let result = self.delegate.set_feature_state(state);
        self.cache.remove(state.feature());
        debug!("evicted cached state of feature {}", state.feature());
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;
    use crate::test_common::{CountingStateRepository, FailingStateRepository};
    use spectral::prelude::*;

    fn counting() -> Arc<CountingStateRepository> {
        let delegate = Arc::new(CountingStateRepository::new());
        delegate
            .set_feature_state(&FeatureState::new("F1", true))
            .unwrap();
        delegate
    }

    #[test]
    fn rejects_negative_ttl() {
        let result = CachingStateRepository::with_ttl(counting(), -1);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn repeated_reads_hit_delegate_once() {
        let delegate = counting();
        let repository = CachingStateRepository::with_ttl(delegate.clone(), 10_000).unwrap();

        for _ in 0..10 {
            let state = repository.feature_state("F1").unwrap();
            assert_that!(state.map(|s| s.is_enabled())).is_equal_to(Some(true));
            thread::sleep(Duration::from_millis(10));
        }

        assert_that!(delegate.get_count()).is_equal_to(1);
    }

    #[test]
    fn write_evicts_entry() {
        let delegate = counting();
        let repository = CachingStateRepository::with_ttl(delegate.clone(), 10_000).unwrap();

        repository.feature_state("F1").unwrap();
        repository.feature_state("F1").unwrap();
        assert_that!(delegate.get_count()).is_equal_to(1);

        repository
            .set_feature_state(&FeatureState::disabled("F1"))
            .unwrap();

        let state = repository.feature_state("F1").unwrap().unwrap();
        assert_that!(state.is_enabled()).is_false();
        assert_that!(delegate.get_count()).is_equal_to(2);
        assert_that!(delegate.set_count()).is_equal_to(2);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let delegate = counting();
        let repository = CachingStateRepository::with_ttl(delegate.clone(), 5).unwrap();

        for _ in 0..5 {
            repository.feature_state("F1").unwrap();
            thread::sleep(Duration::from_millis(30));
        }

        assert_that!(delegate.get_count()).is_equal_to(5);
    }

    #[test]
    fn zero_ttl_never_expires() {
        let delegate = counting();
        let repository = CachingStateRepository::new(delegate.clone());

        repository.feature_state("F1").unwrap();
        thread::sleep(Duration::from_millis(20));
        repository.feature_state("F1").unwrap();

        assert_that!(delegate.get_count()).is_equal_to(1);
        assert_that!(repository.ttl()).is_equal_to(Duration::ZERO);
    }

    #[test]
    fn absent_state_is_cached() {
        let delegate = counting();
        let repository = CachingStateRepository::new(delegate.clone());

        assert_that!(repository.feature_state("MISSING").unwrap()).is_none();
        assert_that!(repository.feature_state("MISSING").unwrap()).is_none();
        assert_that!(delegate.get_count()).is_equal_to(1);
    }

    #[test]
    fn mutating_returned_state_does_not_corrupt_cache() {
        let repository = CachingStateRepository::new(counting());

        let mut state = repository.feature_state("F1").unwrap().unwrap();
        state.disable().set_parameter("users", Some("mallory"));

        let again = repository.feature_state("F1").unwrap().unwrap();
        assert_that!(again.is_enabled()).is_true();
        assert_that!(again.parameter("users")).is_none();
    }

    #[test]
    fn clear_forces_refetch() {
        let delegate = counting();
        let repository = CachingStateRepository::new(delegate.clone());

        repository.feature_state("F1").unwrap();
        repository.clear();
        repository.feature_state("F1").unwrap();

        assert_that!(delegate.get_count()).is_equal_to(2);
    }

    #[test]
    fn errors_are_not_cached() {
        let delegate = Arc::new(FailingStateRepository::new());
        let repository = CachingStateRepository::new(delegate.clone());

        assert!(matches!(
            repository.feature_state("F1"),
            Err(Error::Repository(_))
        ));
        assert!(repository.feature_state("F1").is_err());
        assert_that!(delegate.get_count()).is_equal_to(2);
    }

    #[test]
    fn failed_write_still_evicts() {
        let delegate = Arc::new(FailingStateRepository::failing_writes());
        let repository = CachingStateRepository::new(delegate.clone());

        repository.feature_state("F1").unwrap();
        assert!(repository
            .set_feature_state(&FeatureState::new("F1", true))
            .is_err());
        repository.feature_state("F1").unwrap();

        assert_that!(delegate.get_count()).is_equal_to(2);
    }

    #[test]
    fn concurrent_misses_call_delegate_once() {
        let delegate = Arc::new(CountingStateRepository::with_delay(Duration::from_millis(50)));
        delegate
            .set_feature_state(&FeatureState::new("F1", true))
            .unwrap();
        let repository = Arc::new(CachingStateRepository::new(delegate.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repository = repository.clone();
                thread::spawn(move || repository.feature_state("F1").unwrap())
            })
            .collect();

        for handle in handles {
            assert_that!(handle.join().unwrap().map(|s| s.is_enabled())).is_equal_to(Some(true));
        }
        assert_that!(delegate.get_count()).is_equal_to(1);
    }

    #[test]
    fn reads_after_a_write_are_never_stale_under_concurrent_readers() {
        let delegate = Arc::new(CountingStateRepository::new());
        delegate
            .set_feature_state(&FeatureState::new("F1", true))
            .unwrap();
        let repository = Arc::new(CachingStateRepository::new(delegate.clone()));
        let stop = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..6)
            .map(|_| {
                let repository = repository.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        assert!(repository.feature_state("F1").unwrap().is_some());
                    }
                })
            })
            .collect();

        for round in 0..300 {
            let enabled = round % 2 == 0;
            repository
                .set_feature_state(&FeatureState::new("F1", enabled))
                .unwrap();
            let read = repository.feature_state("F1").unwrap();
            assert_that!(read.map(|s| s.is_enabled())).is_equal_to(Some(enabled));
        }

        stop.store(true, Ordering::SeqCst);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_that!(delegate.set_count()).is_equal_to(301);
    }
}
