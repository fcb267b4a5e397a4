use log::{log, Level};

use crate::error::Result;
use crate::repository::StateRepository;
use crate::state::FeatureState;

const DEFAULT_MESSAGE: &str = "Setting feature \"{1}\" to \"{2}\"";

/// Logs every state change before passing it on to the delegate.
///
/// The message template may reference `{1}` for the feature name and `{2}` for `enabled` or
/// `disabled`. Reads are passed through without logging.
pub struct LoggingStateRepository<R> {
    delegate: R,
    message: String,
    level: Level,
}

impl<R: StateRepository> LoggingStateRepository<R> {
    pub fn new(delegate: R) -> Self {
        Self {
            delegate,
            message: DEFAULT_MESSAGE.to_string(),
            level: Level::Info,
        }
    }

    pub fn with_message(mut self, template: impl Into<String>) -> Self {
        self.message = template.into();
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    fn render(&self, state: &FeatureState) -> String {
        let label = if state.is_enabled() {
            "enabled"
        } else {
            "disabled"
        };
        self.message
            .replace("{1}", state.feature())
            .replace("{2}", label)
    }
}

impl<R: StateRepository> StateRepository for LoggingStateRepository<R> {
    fn feature_state(&self, feature: &str) -> Result<Option<FeatureState>> {
        self.delegate.feature_state(feature)
    }

    fn set_feature_state(&self, state: &FeatureState) -> Result<()> {
        log!(self.level, "{}", self.render(state));
        self.delegate.set_feature_state(state)
    }
}
