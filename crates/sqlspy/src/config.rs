//! Logging policy: an immutable [`SpyConfig`] snapshot behind a swappable
//! [`ConfigHandle`].
//!
//! Every execution loads the current snapshot once and uses it for both
//! rendering and filtering, so a concurrent [`ConfigHandle::reload`] is seen
//! either entirely or not at all.
//!
//! ```toml
//! enabled = true
//! exclude_categories = ["result", "resultset"]
//! execution_threshold_ms = 5
//! exclude_patterns = ["^SELECT 1$"]
//! log_format = "single_line"
//!
//! [render]
//! date_format = "%d-%b-%y"
//! boolean_format = "numeric"
//! ```

use crate::error::ConfigError;
use crate::event::Category;
use crate::render::RenderOptions;
use chrono::format::{Item, StrftimeItems};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Output format used by text sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// `started_at|elapsed_ms|category|connection N|kind|template|rendered`
    #[default]
    SingleLine,
    /// One JSON object per event.
    Json,
}

fn de_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
}

fn de_patterns<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Regex>, D::Error> {
    Vec::<String>::deserialize(d)?
        .iter()
        .map(|p| Regex::new(p).map_err(serde::de::Error::custom))
        .collect()
}

/// A complete logging policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpyConfig {
    /// Master switch. When off nothing is rendered or published.
    pub enabled: bool,
    /// Categories to log. Empty means all.
    pub include_categories: Vec<Category>,
    /// Categories never logged. Wins over `include_categories`.
    pub exclude_categories: Vec<Category>,
    /// Events faster than this are dropped.
    #[serde(rename = "execution_threshold_ms", deserialize_with = "de_millis")]
    pub execution_threshold: Option<Duration>,
    /// If non-empty, only templates matching one of these are logged.
    #[serde(deserialize_with = "de_patterns")]
    pub include_patterns: Vec<Regex>,
    /// Templates matching any of these are not logged.
    #[serde(deserialize_with = "de_patterns")]
    pub exclude_patterns: Vec<Regex>,
    /// Truncate SQL in text output.
    pub max_sql_length: Option<usize>,
    pub log_format: LogFormat,
    pub render: RenderOptions,
}

impl Default for SpyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_categories: Vec::new(),
            exclude_categories: vec![Category::Result, Category::ResultSet],
            execution_threshold: None,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_sql_length: None,
            log_format: LogFormat::SingleLine,
            render: RenderOptions::default(),
        }
    }
}

impl SpyConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SpyConfig = toml::from_str(s)?;
        config.validate()
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check the date/time formats. Patterns are validated on construction.
    pub fn validate(self) -> Result<Self, ConfigError> {
        for format in self.render.formats() {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(ConfigError::InvalidFormat(format.to_string()));
            }
        }
        Ok(self)
    }

    pub fn enable(mut self) -> Self {
        self.enabled = true;
        self
    }

    pub fn disable(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Log only these categories.
    pub fn include_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.include_categories = categories.into_iter().collect();
        self
    }

    /// Never log these categories.
    pub fn exclude_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.exclude_categories = categories.into_iter().collect();
        self
    }

    /// Log every category, including result-set traffic.
    pub fn all_categories(mut self) -> Self {
        self.include_categories.clear();
        self.exclude_categories.clear();
        self
    }

    /// Drop events faster than `threshold`.
    pub fn with_execution_threshold(mut self, threshold: Duration) -> Self {
        self.execution_threshold = Some(threshold);
        self
    }

    /// Only log templates matching `pattern` (may be called repeatedly).
    pub fn with_include_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.include_patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Do not log templates matching `pattern` (may be called repeatedly).
    pub fn with_exclude_pattern(mut self, pattern: &str) -> Result<Self, ConfigError> {
        self.exclude_patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn with_max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    /// Whether events of `category` can pass this policy at all.
    pub fn is_category_enabled(&self, category: Category) -> bool {
        self.enabled
            && !self.exclude_categories.contains(&category)
            && (self.include_categories.is_empty() || self.include_categories.contains(&category))
    }
}

/// Shared, atomically swappable handle to the current [`SpyConfig`].
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<RwLock<Arc<SpyConfig>>>,
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(SpyConfig::default())
    }
}

impl ConfigHandle {
    pub fn new(config: SpyConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<SpyConfig> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Publish a new snapshot. In-flight executions keep the one they loaded.
    pub fn reload(&self, config: SpyConfig) {
        let next = Arc::new(config);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = next;
    }

    /// Derive a new snapshot from the current one and publish it.
    ///
    /// `f` runs without holding the lock and may use the handle. Two racing
    /// updates both publish; the later one wins.
    pub fn update(&self, f: impl FnOnce(SpyConfig) -> SpyConfig) {
        let current = (*self.load()).clone();
        self.reload(f(current));
    }
}
