use std::{env, fs, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::api::DEFAULT_BASE_URL;

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_DATA_DIR: &str = ".rmx_data";
pub const STATE_DB_FILE: &str = "rmx_state.db";

pub const FAVORITES_KEY: &str = "rick-morty-favorites";
pub const FILTERS_KEY: &str = "rick-morty-filters";

pub const ENV_API_BASE_URL: &str = "RMX_API_BASE_URL";
pub const ENV_DATA_DIR: &str = "RMX_DATA_DIR";

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub avatar_workers: usize,
    pub avatar_max_w: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            request_timeout: Duration::from_secs(20),
            avatar_workers: 4,
            avatar_max_w: 200,
        }
    }
}

impl AppConfig {
    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir.join(STATE_DB_FILE)
    }

    pub fn avatar_dir(&self) -> PathBuf {
        self.data_dir.join("avatars")
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(alias = "base_url")]
    api_base_url: Option<String>,
    data_dir: Option<String>,
    request_timeout_secs: Option<u64>,
    avatar_workers: Option<usize>,
    avatar_max_w: Option<u32>,
}

/// Merge a parsed `config.json` over defaults. Out-of-range values are
/// logged and skipped.
fn apply_raw(cfg: &mut AppConfig, parsed: RawConfig) {
    if let Some(url) = parsed.api_base_url {
        let url = url.trim().trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            cfg.api_base_url = url.to_string();
        } else {
            warn!("Ignoring api_base_url `{url}` in {CONFIG_FILE}: not an http(s) URL.");
        }
    }
    if let Some(dir) = parsed.data_dir.filter(|d| !d.trim().is_empty()) {
        cfg.data_dir = PathBuf::from(dir);
    }
    match parsed.request_timeout_secs {
        Some(0) => warn!("request_timeout_secs must be > 0; keeping default."),
        Some(secs) => cfg.request_timeout = Duration::from_secs(secs),
        None => {}
    }
    if let Some(n) = parsed.avatar_workers {
        cfg.avatar_workers = n.clamp(1, 16);
    }
    if let Some(w) = parsed.avatar_max_w {
        cfg.avatar_max_w = w.clamp(64, 512);
    }
}

fn apply_env(cfg: &mut AppConfig) {
    if let Ok(url) = env::var(ENV_API_BASE_URL) {
        if !url.trim().is_empty() {
            cfg.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
    }
    if let Some(dir) = env::var_os(ENV_DATA_DIR) {
        if !dir.is_empty() {
            cfg.data_dir = PathBuf::from(dir);
        }
    }
}

pub fn parse_config(raw: &str) -> Result<AppConfig, serde_json::Error> {
    let parsed = serde_json::from_str::<RawConfig>(raw)?;
    let mut cfg = AppConfig::default();
    apply_raw(&mut cfg, parsed);
    Ok(cfg)
}

pub fn load_config() -> AppConfig {
    let cfg_path = PathBuf::from(CONFIG_FILE);

    let mut cfg = match fs::read_to_string(&cfg_path) {
        Ok(raw) => match parse_config(&raw) {
            Ok(cfg) => {
                info!("Loaded config from {}", cfg_path.display());
                cfg
            }
            Err(err) => {
                warn!("Failed to parse {CONFIG_FILE} ({err}). Using defaults.");
                AppConfig::default()
            }
        },
        Err(_) => {
            info!("No {CONFIG_FILE} found; using defaults");
            AppConfig::default()
        }
    };

    apply_env(&mut cfg);
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg = parse_config(r#"{"data_dir": "/tmp/rmx"}"#).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/rmx"));
        assert_eq!(cfg.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.state_db_path(), PathBuf::from("/tmp/rmx").join(STATE_DB_FILE));
    }

    #[test]
    fn invalid_values_are_ignored_or_clamped() {
        let cfg = parse_config(
            r#"{"base_url": "ftp://nope", "request_timeout_secs": 0, "avatar_workers": 99}"#,
        )
        .unwrap();
        assert_eq!(cfg.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.request_timeout, Duration::from_secs(20));
        assert_eq!(cfg.avatar_workers, 16);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let cfg = parse_config(r#"{"api_base_url": "http://localhost:8080/api/"}"#).unwrap();
        assert_eq!(cfg.api_base_url, "http://localhost:8080/api");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_config("{not json").is_err());
    }
}
