//! signcast-player specific configuration

use crate::Result;
use signcast_common::config as common_config;
use std::path::PathBuf;

/// Player configuration after resolution
#[derive(Debug, Clone)]
pub struct Config {
    pub data_folder: PathBuf,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub port: u16,
    pub upstream_ws_url: String,
    pub upstream_api_url: String,
    pub verify_interval_secs: u64,
}

/// Default verification sweep interval (6 hours)
const DEFAULT_VERIFY_INTERVAL_SECS: u64 = 6 * 3600;

impl Config {
    /// Resolve configuration from CLI/env values, the TOML config file and
    /// compiled defaults, in that priority order.
    pub fn resolve(
        data_folder_arg: Option<&str>,
        port: u16,
        ws_url_arg: Option<String>,
        api_url_arg: Option<String>,
        verify_interval_arg: Option<u64>,
    ) -> Result<Config> {
        let data_folder =
            common_config::resolve_data_folder(data_folder_arg, "SIGNCAST_DATA_DIR")?;

        let file = load_config_values();

        let upstream_ws_url = ws_url_arg
            .or_else(|| file_string(&file, "upstream_ws_url"))
            .unwrap_or_else(|| "ws://127.0.0.1:9443/".to_string());

        let upstream_api_url = api_url_arg
            .or_else(|| file_string(&file, "upstream_api_url"))
            .unwrap_or_else(|| "http://127.0.0.1:9443".to_string());

        let verify_interval_secs = verify_interval_arg
            .or_else(|| file_u64(&file, "verify_interval_secs"))
            .unwrap_or(DEFAULT_VERIFY_INTERVAL_SECS);

        Ok(Config {
            db_path: common_config::database_path(&data_folder),
            media_dir: common_config::media_dir(&data_folder),
            data_folder,
            port,
            upstream_ws_url,
            upstream_api_url,
            verify_interval_secs,
        })
    }
}

fn load_config_values() -> Option<toml::Value> {
    let path = common_config::find_config_file().ok()?;
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str::<toml::Value>(&content).ok()
}

fn file_string(file: &Option<toml::Value>, key: &str) -> Option<String> {
    file.as_ref()?
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn file_u64(file: &Option<toml::Value>, key: &str) -> Option<u64> {
    file.as_ref()?
        .get(key)
        .and_then(|v| v.as_integer())
        .and_then(|v| u64::try_from(v).ok())
}
