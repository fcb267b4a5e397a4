use std::sync::Arc;

use log::warn;

use crate::error::{Error, Result};
use crate::repository::StateRepository;
use crate::state::FeatureState;

/// The order in which a [CompositeStateRepository] consults its delegates on reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IterationOrder {
    /// Construction order.
    #[default]
    Fifo,
    /// Reverse construction order.
    Lifo,
}

/// Which delegates of a [CompositeStateRepository] receive writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SetterSelection {
    First,
    #[default]
    Last,
    All,
}

impl IterationOrder {
    fn select(self, len: usize) -> Box<dyn Iterator<Item = usize>> {
        match self {
            IterationOrder::Fifo => Box::new(0..len),
            IterationOrder::Lifo => Box::new((0..len).rev()),
        }
    }
}

impl SetterSelection {
    fn select(self, len: usize) -> Box<dyn Iterator<Item = usize>> {
        match self {
            SetterSelection::First => Box::new(0..len.min(1)),
            SetterSelection::Last => Box::new(len.saturating_sub(1)..len),
            SetterSelection::All => Box::new(0..len),
        }
    }
}

/// Combines several repositories into one.
///
/// Reads consult the delegates in the configured [IterationOrder] and return the first state
/// found. Presence decides, not the enabled flag: a disabled state found early wins over an
/// enabled one further down. Writes go, in list order, to the delegates chosen by the
/// [SetterSelection].
///
/// Writes are not transactional. Every selected delegate is attempted even after one fails;
/// if any failed, [Error::PartialWrite] lists them and the successful writes stay in place.
pub struct CompositeStateRepository {
    delegates: Vec<Arc<dyn StateRepository>>,
    iteration_order: IterationOrder,
    setter_selection: SetterSelection,
}

impl CompositeStateRepository {
    /// Create a composite over `delegates`, read FIFO and written LAST.
    ///
    /// An empty delegate list is a configuration error.
    pub fn new<I>(delegates: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: StateRepository + 'static,
    {
        let delegates: Vec<Arc<dyn StateRepository>> = delegates
            .into_iter()
            .map(|d| Arc::new(d) as Arc<dyn StateRepository>)
            .collect();

        if delegates.is_empty() {
            return Err(Error::configuration(
                "composite state repository requires at least one delegate",
            ));
        }

        Ok(Self {
            delegates,
            iteration_order: IterationOrder::default(),
            setter_selection: SetterSelection::default(),
        })
    }

    pub fn set_iteration_order(&mut self, iteration_order: IterationOrder) {
        self.iteration_order = iteration_order;
    }

    pub fn set_setter_selection(&mut self, setter_selection: SetterSelection) {
        self.setter_selection = setter_selection;
    }

    pub fn with_iteration_order(mut self, iteration_order: IterationOrder) -> Self {
        self.iteration_order = iteration_order;
        self
    }

    pub fn with_setter_selection(mut self, setter_selection: SetterSelection) -> Self {
        self.setter_selection = setter_selection;
        self
    }

    pub fn iteration_order(&self) -> IterationOrder {
        self.iteration_order
    }

    pub fn setter_selection(&self) -> SetterSelection {
        self.setter_selection
    }
}

impl StateRepository for CompositeStateRepository {
    fn feature_state(&self, feature: &str) -> Result<Option<FeatureState>> {
        for i in self.iteration_order.select(self.delegates.len()) {
            if let Some(state) = self.delegates[i].feature_state(feature)? {
                return Ok(Some(state));
            }
        }
        Ok(None)
    }

    fn set_feature_state(&self, state: &FeatureState) -> Result<()> {
        let mut attempted = 0;
        let mut failures = Vec::new();

        for i in self.setter_selection.select(self.delegates.len()) {
            attempted += 1;
            if let Err(e) = self.delegates[i].set_feature_state(state) {
                warn!(
                    "writing feature {} to composite delegate {} failed: {}",
                    state.feature(),
                    i,
                    e
                );
                failures.push((i, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::PartialWrite {
                attempted,
                failures,
            })
        }
    }
}
