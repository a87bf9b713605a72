//! Scroller configuration
//!
//! [`ConfigOverrides`] carries whatever the host chose to set, every field
//! optional. [`ScrollerConfig::merge`] lays the overrides over the defaults
//! once and returns an immutable record; nothing changes it afterwards.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{markup, scheduler};
use crate::error::{Result, ScrollerError};
use crate::events::{NoopObserver, SegmentObserver};
use crate::generator::GeneratorSpec;

/// Resolved scroller configuration
#[derive(Clone)]
pub struct ScrollerConfig {
    /// Period between eligibility checks
    pub check_interval: Duration,
    /// Remaining scrollable distance (pixels) below which a fetch starts
    pub trigger_height: u32,
    /// Markup appended to the container when a fetch fails
    pub failure_message: String,
    /// Markup shown while a fetch is in flight
    pub loading_placeholder: String,
    /// Prefix for the placeholder id and failure notice class
    pub uid: String,
    /// Clear the in-flight flag after a failed fetch so later ticks retry
    pub release_on_failure: bool,
    /// Per-request timeout; `None` lets a request hang indefinitely
    pub request_timeout: Option<Duration>,
    pub observer: Arc<dyn SegmentObserver>,
}

impl Default for ScrollerConfig {
    fn default() -> Self {
        Self {
            check_interval: scheduler::CHECK_INTERVAL,
            trigger_height: scheduler::TRIGGER_HEIGHT,
            failure_message: markup::FAILURE_MESSAGE.to_string(),
            loading_placeholder: markup::LOADING_PLACEHOLDER.to_string(),
            uid: markup::UID.to_string(),
            release_on_failure: false,
            request_timeout: None,
            observer: Arc::new(NoopObserver),
        }
    }
}

impl ScrollerConfig {
    /// Lay `overrides` over the defaults
    pub fn merge(overrides: ConfigOverrides) -> Result<Self> {
        let defaults = Self::default();

        let check_interval = match overrides.check_interval {
            Some(secs) => seconds_to_duration("check_interval", secs)?,
            None => defaults.check_interval,
        };
        let request_timeout = overrides
            .request_timeout
            .map(|secs| seconds_to_duration("request_timeout", secs))
            .transpose()?;

        Ok(Self {
            check_interval,
            trigger_height: overrides.trigger_height.unwrap_or(defaults.trigger_height),
            failure_message: overrides
                .failure_message
                .unwrap_or(defaults.failure_message),
            loading_placeholder: overrides
                .loading_placeholder
                .unwrap_or(defaults.loading_placeholder),
            uid: overrides.uid.unwrap_or(defaults.uid),
            release_on_failure: overrides
                .release_on_failure
                .unwrap_or(defaults.release_on_failure),
            request_timeout,
            observer: overrides.observer.unwrap_or(defaults.observer),
        })
    }
}

impl std::fmt::Debug for ScrollerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollerConfig")
            .field("check_interval", &self.check_interval)
            .field("trigger_height", &self.trigger_height)
            .field("failure_message", &self.failure_message)
            .field("loading_placeholder", &self.loading_placeholder)
            .field("uid", &self.uid)
            .field("release_on_failure", &self.release_on_failure)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

fn seconds_to_duration(field: &str, secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if secs > 0.0 && !duration.is_zero() => Ok(duration),
        _ => Err(ScrollerError::InvalidConfig(format!(
            "{} must be a positive number of seconds, got {}",
            field, secs
        ))),
    }
}

/// Host-supplied configuration; unset fields fall back to defaults
///
/// Deserializes from TOML using the widget's historical option names, so
/// `failiure_message` is accepted next to `failure_message`.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    /// Seconds between eligibility checks
    pub check_interval: Option<f64>,
    pub trigger_height: Option<u32>,
    #[serde(alias = "failiure_message")]
    pub failure_message: Option<String>,
    pub loading_placeholder: Option<String>,
    pub uid: Option<String>,
    pub release_on_failure: Option<bool>,
    /// Seconds before an in-flight request is abandoned
    pub request_timeout: Option<f64>,
    /// Optional `[generator]` table for hosts that configure URLs from a file
    pub generator: Option<GeneratorSpec>,
    #[serde(skip)]
    pub observer: Option<Arc<dyn SegmentObserver>>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load overrides from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn check_interval(mut self, secs: f64) -> Self {
        self.check_interval = Some(secs);
        self
    }

    pub fn trigger_height(mut self, px: u32) -> Self {
        self.trigger_height = Some(px);
        self
    }

    pub fn failure_message(mut self, markup: impl Into<String>) -> Self {
        self.failure_message = Some(markup.into());
        self
    }

    pub fn loading_placeholder(mut self, markup: impl Into<String>) -> Self {
        self.loading_placeholder = Some(markup.into());
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn release_on_failure(mut self, release: bool) -> Self {
        self.release_on_failure = Some(release);
        self
    }

    pub fn request_timeout(mut self, secs: f64) -> Self {
        self.request_timeout = Some(secs);
        self
    }

    pub fn observer(mut self, observer: impl SegmentObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Fill every unset field from `other`; fields already set win
    pub fn or(self, other: ConfigOverrides) -> Self {
        Self {
            check_interval: self.check_interval.or(other.check_interval),
            trigger_height: self.trigger_height.or(other.trigger_height),
            failure_message: self.failure_message.or(other.failure_message),
            loading_placeholder: self.loading_placeholder.or(other.loading_placeholder),
            uid: self.uid.or(other.uid),
            release_on_failure: self.release_on_failure.or(other.release_on_failure),
            request_timeout: self.request_timeout.or(other.request_timeout),
            generator: self.generator.or(other.generator),
            observer: self.observer.or(other.observer),
        }
    }
}

impl std::fmt::Debug for ConfigOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOverrides")
            .field("check_interval", &self.check_interval)
            .field("trigger_height", &self.trigger_height)
            .field("failure_message", &self.failure_message)
            .field("loading_placeholder", &self.loading_placeholder)
            .field("uid", &self.uid)
            .field("release_on_failure", &self.release_on_failure)
            .field("request_timeout", &self.request_timeout)
            .field("generator", &self.generator)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
