use std::fs;

use lexicon_core::settings::{self, Settings};

/// Settings from `file`, or the embedded defaults.
pub fn load_settings(file: Option<&str>) -> Settings {
    match file {
        Some(file) => {
            let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
            die!(settings::parse_settings_toml(&content), "Error: {}")
        }
        None => Settings::default(),
    }
}

pub fn settings_export() {
    print!("{}", settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let s = load_settings(Some(file));
    println!(
        "OK: query.max_wildcards={}, query.default_max_length={}, tiers.probe_timeout_ms={}, cache.capacity={}",
        s.query.max_wildcards, s.query.default_max_length, s.tiers.probe_timeout_ms, s.cache.capacity
    );
}
