use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::error;
use parking_lot::RwLock;

use crate::error::Result;
use crate::repository::StateRepository;
use crate::state::FeatureState;

/// Error type listeners may report. It is logged and otherwise ignored.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Callback notified after a [ListenableStateRepository] persisted a new state.
pub trait FeatureStateChangedListener: Send + Sync {
    /// Listeners with a lower priority run first. Ties run in registration order.
    fn priority(&self) -> i32 {
        0
    }

    /// Called with the state stored before the write, if any, and the state just written.
    fn on_feature_state_changed(
        &self,
        previous: Option<&FeatureState>,
        current: &FeatureState,
    ) -> std::result::Result<(), ListenerError>;
}

/// Adapts a closure into a [FeatureStateChangedListener].
pub struct FnListener<F> {
    priority: i32,
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(Option<&FeatureState>, &FeatureState) + Send + Sync,
{
    pub fn new(priority: i32, f: F) -> Self {
        Self { priority, f }
    }
}

impl<F> FeatureStateChangedListener for FnListener<F>
where
    F: Fn(Option<&FeatureState>, &FeatureState) + Send + Sync,
{
    fn priority(&self) -> i32 {
        self.priority
    }

    fn on_feature_state_changed(
        &self,
        previous: Option<&FeatureState>,
        current: &FeatureState,
    ) -> std::result::Result<(), ListenerError> {
        (self.f)(previous, current);
        Ok(())
    }
}

#[derive(Clone)]
struct Registration {
    priority: i32,
    listener: Arc<dyn FeatureStateChangedListener>,
}

/// Notifies listeners whenever a feature state is written through it.
///
/// Reads pass straight through. A write first reads the previous state from the delegate,
/// then writes, then calls each listener synchronously on the caller's thread. Listener
/// failures, whether returned errors or panics, are logged and do not stop the remaining
/// listeners or undo the write.
///
/// The listener list is copy-on-write: registration swaps in a re-sorted copy while
/// in-flight notifications keep iterating the snapshot they started with.
pub struct ListenableStateRepository<R> {
    delegate: R,
    listeners: RwLock<Arc<Vec<Registration>>>,
}

impl<R: StateRepository> ListenableStateRepository<R> {
    pub fn new(delegate: R) -> Self {
        Self {
            delegate,
            listeners: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn with_listeners<I>(delegate: R, listeners: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn FeatureStateChangedListener>>,
    {
        let repository = Self::new(delegate);
        for listener in listeners {
            repository.add_listener(listener);
        }
        repository
    }

    /// Register a listener. The list is re-sorted by priority.
    pub fn add_listener(&self, listener: Arc<dyn FeatureStateChangedListener>) {
        let mut guard = self.listeners.write();
        let mut next = Vec::clone(&guard);
        next.push(Registration {
            priority: listener.priority(),
            listener,
        });
        // stable: equal priorities keep registration order
        next.sort_by_key(|r| r.priority);
        *guard = Arc::new(next);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn notify(&self, previous: Option<&FeatureState>, current: &FeatureState) {
        let snapshot = Arc::clone(&self.listeners.read());
        for registration in snapshot.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                registration
                    .listener
                    .on_feature_state_changed(previous, current)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(
                    "listener (priority {}) failed for feature {}: {}",
                    registration.priority,
                    current.feature(),
                    e
                ),
                Err(_) => error!(
                    "listener (priority {}) panicked for feature {}",
                    registration.priority,
                    current.feature()
                ),
            }
        }
    }
}

impl<R: StateRepository> StateRepository for ListenableStateRepository<R> {
    fn feature_state(&self, feature: &str) -> Result<Option<FeatureState>> {
        self.delegate.feature_state(feature)
    }

    fn set_feature_state(&self, state: &FeatureState) -> Result<()> {
        let previous = self.delegate.feature_state(state.feature())?;
        self.delegate.set_feature_state(state)?;
        self.notify(previous.as_ref(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use parking_lot::Mutex;

    use super::*;
    use crate::repository::memory::InMemoryStateRepository;
    use crate::test_common::{FailingStateRepository, RecordingListener};
    use spectral::prelude::*;

    struct BrokenListener;

    impl FeatureStateChangedListener for BrokenListener {
        fn on_feature_state_changed(
            &self,
            _previous: Option<&FeatureState>,
            _current: &FeatureState,
        ) -> std::result::Result<(), ListenerError> {
            Err("listener exploded".into())
        }
    }

    struct PanickingListener;

    impl FeatureStateChangedListener for PanickingListener {
        fn priority(&self) -> i32 {
            1
        }

        fn on_feature_state_changed(
            &self,
            _previous: Option<&FeatureState>,
            _current: &FeatureState,
        ) -> std::result::Result<(), ListenerError> {
            panic!("listener panicked");
        }
    }

    #[test]
    fn reads_pass_through() {
        let delegate = InMemoryStateRepository::with_states(vec![FeatureState::new("F1", true)]);
        let repository = ListenableStateRepository::new(delegate);
        assert_that!(repository.feature_state("F1").unwrap())
            .is_equal_to(Some(FeatureState::new("F1", true)));
    }

    #[test]
    fn listeners_run_in_priority_order_with_previous_and_new_state() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let late = Arc::new(RecordingListener::with_log(42, order.clone()));
        let early = Arc::new(RecordingListener::with_log(7, order.clone()));

        let delegate = InMemoryStateRepository::with_states(vec![FeatureState::disabled("F1")]);
        let repository = ListenableStateRepository::new(delegate);
        repository.add_listener(late.clone());
        repository.add_listener(early.clone());

        let new_state = FeatureState::new("F1", true);
        repository.set_feature_state(&new_state).unwrap();

        assert_that!(*order.lock()).is_equal_to(vec![7, 42]);
        for listener in [&early, &late] {
            let events = listener.events();
            assert_that!(events).has_length(1);
            assert_that!(events[0].0).is_equal_to(Some(FeatureState::disabled("F1")));
            assert_that!(events[0].1).is_equal_to(&new_state);
        }
    }

    #[test]
    fn equal_priorities_keep_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let repository = ListenableStateRepository::new(InMemoryStateRepository::new());
        for id in [3, 1, 2] {
            let order = order.clone();
            repository.add_listener(Arc::new(FnListener::new(0, move |_, _| {
                order.lock().push(id)
            })));
        }

        repository
            .set_feature_state(&FeatureState::new("F1", true))
            .unwrap();
        assert_that!(*order.lock()).is_equal_to(vec![3, 1, 2]);
    }

    #[test]
    fn first_write_reports_no_previous_state() {
        let listener = Arc::new(RecordingListener::new(0));
        let repository = ListenableStateRepository::with_listeners(
            InMemoryStateRepository::new(),
            vec![listener.clone() as Arc<dyn FeatureStateChangedListener>],
        );

        repository
            .set_feature_state(&FeatureState::new("F1", true))
            .unwrap();
        assert_that!(listener.events()[0].0).is_none();
    }

    #[test]
    fn failing_listeners_are_isolated() {
        let listener = Arc::new(RecordingListener::new(5));
        let delegate = Arc::new(InMemoryStateRepository::new());
        let repository = ListenableStateRepository::with_listeners(
            delegate.clone(),
            vec![
                Arc::new(BrokenListener) as Arc<dyn FeatureStateChangedListener>,
                Arc::new(PanickingListener),
                listener.clone(),
            ],
        );

        let result = repository.set_feature_state(&FeatureState::new("F1", true));

        assert!(result.is_ok());
        assert_that!(listener.events()).has_length(1);
        assert_that!(delegate.feature_state("F1").unwrap()).is_some();
    }

    #[test]
    fn failed_write_notifies_nobody() {
        let listener = Arc::new(RecordingListener::new(0));
        let repository = ListenableStateRepository::with_listeners(
            FailingStateRepository::failing_writes(),
            vec![listener.clone() as Arc<dyn FeatureStateChangedListener>],
        );

        assert!(repository
            .set_feature_state(&FeatureState::new("F1", true))
            .is_err());
        assert_that!(listener.events()).is_empty();
    }

    #[test]
    fn concurrent_registration_loses_nothing() {
        let repository = Arc::new(ListenableStateRepository::new(InMemoryStateRepository::new()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repository = repository.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        repository.add_listener(Arc::new(FnListener::new(i, |_, _| {})));
                        repository
                            .set_feature_state(&FeatureState::new("F1", true))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_that!(repository.listener_count()).is_equal_to(200);
    }
}
