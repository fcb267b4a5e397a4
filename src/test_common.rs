#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::repository::listener::{FeatureStateChangedListener, ListenerError};
use crate::repository::memory::InMemoryStateRepository;
use crate::repository::StateRepository;
use crate::state::FeatureState;

/// An in-memory repository that counts the calls it receives and can simulate a slow backend.
#[derive(Default)]
pub struct CountingStateRepository {
    inner: InMemoryStateRepository,
    delay: Duration,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl CountingStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

impl StateRepository for CountingStateRepository {
    fn feature_state(&self, feature: &str) -> Result<Option<FeatureState>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.inner.feature_state(feature)
    }

    fn set_feature_state(&self, state: &FeatureState) -> Result<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set_feature_state(state)
    }
}

/// A repository whose backend is unreachable. Reads fail unless only writes are set to fail.
#[derive(Default)]
pub struct FailingStateRepository {
    reads_fail: bool,
    gets: AtomicUsize,
}

impl FailingStateRepository {
    pub fn new() -> Self {
        Self {
            reads_fail: true,
            gets: AtomicUsize::new(0),
        }
    }

    /// Reads report nothing stored; writes fail.
    pub fn failing_writes() -> Self {
        Self::default()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

impl StateRepository for FailingStateRepository {
    fn feature_state(&self, _feature: &str) -> Result<Option<FeatureState>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.reads_fail {
            Err(Error::repository("backend unreachable"))
        } else {
            Ok(None)
        }
    }

    fn set_feature_state(&self, _state: &FeatureState) -> Result<()> {
        Err(Error::repository("backend is read-only"))
    }
}

/// Records every notification. Listeners sharing an order log append their priority to it when
/// called, which exposes the invocation order across listeners.
pub struct RecordingListener {
    priority: i32,
    events: Mutex<Vec<(Option<FeatureState>, FeatureState)>>,
    order: Option<Arc<Mutex<Vec<i32>>>>,
}

impl RecordingListener {
    pub fn new(priority: i32) -> Self {
        Self {
            priority,
            events: Mutex::new(Vec::new()),
            order: None,
        }
    }

    pub fn with_log(priority: i32, order: Arc<Mutex<Vec<i32>>>) -> Self {
        Self {
            order: Some(order),
            ..Self::new(priority)
        }
    }

    pub fn events(&self) -> Vec<(Option<FeatureState>, FeatureState)> {
        self.events.lock().clone()
    }
}

impl FeatureStateChangedListener for RecordingListener {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn on_feature_state_changed(
        &self,
        previous: Option<&FeatureState>,
        current: &FeatureState,
    ) -> std::result::Result<(), ListenerError> {
        if let Some(order) = &self.order {
            order.lock().push(self.priority);
        }
        self.events
            .lock()
            .push((previous.cloned(), current.clone()));
        Ok(())
    }
}
