use std::fmt;

use chrono::{Local, NaiveDateTime};
use lazy_static::lazy_static;
use log::error;
use regex::Regex;

use crate::activation::{ActivationStrategy, Parameter, ParameterBuilder};
use crate::state::FeatureState;
use crate::user::FeatureUser;

pub const ID: &str = "release-date";
pub const PARAM_DATE: &str = "date";
pub const PARAM_TIME: &str = "time";

const DEFAULT_TIME: &str = "00:00:00";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

lazy_static! {
    static ref DATE_PATTERN: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref TIME_PATTERN: Regex = Regex::new(r"^\d{2}:\d{2}:\d{2}$").unwrap();
}

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Activates a feature once a release instant has passed.
///
/// The instant is the `date` parameter (`YYYY-MM-DD`) at the optional `time` parameter
/// (`HH:MM:SS`, midnight when absent), interpreted in local time. A missing or unparsable date
/// is logged and keeps the feature inactive.
pub struct ReleaseDateActivationStrategy {
    now: Clock,
}

impl ReleaseDateActivationStrategy {
    pub fn new() -> Self {
        Self::with_clock(|| Local::now().naive_local())
    }

    /// Use `now` instead of the system clock.
    pub fn with_clock<F>(now: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        Self { now: Box::new(now) }
    }

    /// The release instant configured on `state`, if it parses.
    pub fn release_date(state: &FeatureState) -> Option<NaiveDateTime> {
        let date = state.parameter(PARAM_DATE).map(str::trim).unwrap_or_default();
        let time = match state.parameter(PARAM_TIME).map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => DEFAULT_TIME,
        };

        let full = format!("{}T{}", date, time);
        match NaiveDateTime::parse_from_str(&full, DATE_TIME_FORMAT) {
            Ok(release) => Some(release),
            Err(e) => {
                error!(
                    "Invalid date and/or time for feature {}: {} ({})",
                    state.feature(),
                    full,
                    e
                );
                None
            }
        }
    }
}

impl Default for ReleaseDateActivationStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReleaseDateActivationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseDateActivationStrategy").finish_non_exhaustive()
    }
}

impl ActivationStrategy for ReleaseDateActivationStrategy {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Release date"
    }

    fn is_active(&self, state: &FeatureState, _user: Option<&FeatureUser>) -> bool {
        Self::release_date(state).map_or(false, |release| (self.now)() > release)
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            ParameterBuilder::create(PARAM_DATE)
                .label("Date")
                .matching_regex(&DATE_PATTERN)
                .description("Release date of the feature. Format: YYYY-MM-DD")
                .build(),
            ParameterBuilder::create(PARAM_TIME)
                .label("Time")
                .matching_regex(&TIME_PATTERN)
                .optional()
                .description(
                    "Optional time for the release day. The default value is midnight. \
                     Format: HH:MM:SS",
                )
                .build(),
        ]
    }
}
