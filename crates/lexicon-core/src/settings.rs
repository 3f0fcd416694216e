//! Lexicon settings loaded from TOML.
//!
//! - `Settings::default()` parses the embedded `default_settings.toml`
//! - `parse_settings_toml(toml)` parses and validates caller-provided TOML
//!
//! Settings are handed to the orchestrator and builder explicitly; there is
//! no process-wide instance.

use std::time::Duration;

use serde::Deserialize;

use crate::query::{LengthFilter, SUPPORTED_MAX_WILDCARDS};

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub query: QuerySettings,
    pub tiers: TierSettings,
    pub builder: BuilderSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuerySettings {
    pub max_wildcards: u8,
    pub default_max_length: usize,
    pub max_word_length: usize,
    pub min_sub_anagram_length: usize,
}

impl QuerySettings {
    pub fn length_filter(&self, show_longer: bool, explicit_length: Option<usize>) -> LengthFilter {
        LengthFilter {
            show_longer,
            default_max_length: self.default_max_length,
            explicit_length,
            max_word_length: self.max_word_length,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierSettings {
    pub probe_timeout_ms: u64,
    pub query_timeout_ms: u64,
    pub remote_probe_timeout_ms: u64,
    pub probe_letters: String,
}

impl TierSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn remote_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuilderSettings {
    pub batch_size: usize,
    pub progress_interval: usize,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        parse_settings_toml(DEFAULT_SETTINGS_TOML).expect("settings TOML must be valid")
    }
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_positive {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }

    if s.query.max_wildcards > SUPPORTED_MAX_WILDCARDS {
        return Err(SettingsError::InvalidValue {
            field: "query.max_wildcards".to_string(),
            reason: format!("must be at most {SUPPORTED_MAX_WILDCARDS}"),
        });
    }
    check_positive!(query.default_max_length);
    check_positive!(query.max_word_length);
    check_positive!(query.min_sub_anagram_length);
    if s.query.max_word_length < s.query.default_max_length {
        return Err(SettingsError::InvalidValue {
            field: "query.max_word_length".to_string(),
            reason: "must be at least query.default_max_length".to_string(),
        });
    }

    check_positive!(tiers.probe_timeout_ms);
    check_positive!(tiers.query_timeout_ms);
    check_positive!(tiers.remote_probe_timeout_ms);
    if s.tiers.probe_letters.trim().is_empty() {
        return Err(SettingsError::InvalidValue {
            field: "tiers.probe_letters".to_string(),
            reason: "must not be empty".to_string(),
        });
    }

    check_positive!(builder.batch_size);
    check_positive!(builder.progress_interval);
    check_positive!(builder.channel_capacity);

    // cache.capacity = 0 disables the cache.
    Ok(())
}
