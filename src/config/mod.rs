use std::{
    collections::HashMap,
    env, fs,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // Read .tgptrc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // ENV first
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn charts_path(&self) -> PathBuf {
        self.get("SAVE_CHARTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("tablegpt").join("charts"))
    }
}

/// Engine-facing slice of the configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Retry budget: total attempts never exceed `max_retries + 1`.
    pub max_retries: usize,
    pub use_error_correction_framework: bool,
    pub direct_sql: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_retries: 3, use_error_correction_framework: true, direct_sql: false }
    }
}

impl EngineConfig {
    pub fn from_config(cfg: &Config) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: cfg.get_usize("MAX_RETRIES").unwrap_or(defaults.max_retries),
            use_error_correction_framework: cfg.get_bool("USE_ERROR_CORRECTION_FRAMEWORK"),
            direct_sql: cfg.get_bool("DIRECT_SQL"),
        }
    }
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "REQUEST_TIMEOUT",
        "DEFAULT_MODEL",
        "MAX_RETRIES",
        "USE_ERROR_CORRECTION_FRAMEWORK",
        "DIRECT_SQL",
        "SAVE_CHARTS_PATH",
    ];

    KEYS.contains(&k) || k.starts_with("TGPT_") || k.starts_with("OPENAI_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("tablegpt").join(".tgptrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    let temp = env::temp_dir().join("tablegpt");

    m.insert(
        "SAVE_CHARTS_PATH".into(),
        temp.join("charts").to_string_lossy().into_owned(),
    );

    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("DEFAULT_MODEL".into(), "gpt-4o".into());
    m.insert("API_BASE_URL".into(), "default".into());

    m.insert("MAX_RETRIES".into(), "3".into());
    m.insert("USE_ERROR_CORRECTION_FRAMEWORK".into(), "true".into());
    m.insert("DIRECT_SQL".into(), "false".into());

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_retries, 3);
        assert!(cfg.use_error_correction_framework);
        assert!(!cfg.direct_sql);
    }
}
