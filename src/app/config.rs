use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::adb::paths::{REMOTE_RECORDING_PATH, REMOTE_SCREENSHOT_PATH};
use crate::app::error::AppError;

pub const CONFIG_PATH_ENV: &str = "ADBCONNECT_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AdbSettings {
    /// Explicit bridge executable. Empty means auto-detect.
    pub command_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandSettings {
    pub command_timeout_sec: u64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            command_timeout_sec: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputSettings {
    /// Where screenshots, recordings and logcat dumps land. Empty means the
    /// user's desktop directory.
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TcpSettings {
    pub port: u16,
}

impl Default for TcpSettings {
    fn default() -> Self {
        Self { port: 5555 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScreenshotSettings {
    pub remote_path: String,
}

impl Default for ScreenshotSettings {
    fn default() -> Self {
        Self {
            remote_path: REMOTE_SCREENSHOT_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScreenRecordSettings {
    pub remote_path: String,
    /// Pause between interrupting screenrecord and pulling the file. The
    /// recorder needs this long to finalize the mp4.
    pub stop_delay_ms: u64,
    pub max_duration_sec: u64,
}

impl Default for ScreenRecordSettings {
    fn default() -> Self {
        Self {
            remote_path: REMOTE_RECORDING_PATH.to_string(),
            stop_delay_ms: 2000,
            max_duration_sec: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub command: CommandSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub tcp: TcpSettings,
    #[serde(default)]
    pub screenshot: ScreenshotSettings,
    #[serde(default)]
    pub screen_record: ScreenRecordSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Resolved output directory: the configured one, else the desktop, else home.
    pub fn output_dir(&self) -> PathBuf {
        let configured = self.output.output_dir.trim();
        if !configured.is_empty() {
            return expand_home(configured);
        }
        dirs::desktop_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn expand_home(value: &str) -> PathBuf {
    if value == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(value));
    }
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".adbconnect_config.json")
}

pub fn backup_config_path(path: &Path) -> PathBuf {
    path.with_extension("backup.json")
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("Failed to read config: {err}"), trace_id))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::validation(format!("Failed to parse config: {err}"), trace_id))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &AppConfig,
    path: &Path,
    trace_id: &str,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::io(format!("Failed to create config dir: {err}"), trace_id)
            })?;
        }
    }
    if path.exists() {
        fs::copy(path, backup_config_path(path))
            .map_err(|err| AppError::io(format!("Failed to back up config: {err}"), trace_id))?;
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), trace_id))?;
    fs::write(path, payload)
        .map_err(|err| AppError::io(format!("Failed to write config: {err}"), trace_id))?;
    Ok(())
}

fn validate_config(mut config: AppConfig) -> AppConfig {
    let defaults = AppConfig::default();
    if config.command.command_timeout_sec == 0 {
        config.command.command_timeout_sec = defaults.command.command_timeout_sec;
    }
    if config.tcp.port == 0 {
        config.tcp.port = defaults.tcp.port;
    }
    if !config.screenshot.remote_path.starts_with('/') {
        config.screenshot.remote_path = defaults.screenshot.remote_path;
    }
    if !config.screen_record.remote_path.starts_with('/') {
        config.screen_record.remote_path = defaults.screen_record.remote_path;
    }
    if config.screen_record.stop_delay_ms > 60_000 {
        config.screen_record.stop_delay_ms = defaults.screen_record.stop_delay_ms;
    }
    if config.screen_record.max_duration_sec == 0 {
        config.screen_record.max_duration_sec = defaults.screen_record.max_duration_sec;
    }
    if config.logging.log_level.trim().is_empty() {
        config.logging.log_level = defaults.logging.log_level;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from_path(&dir.path().join("nope.json"), "t").expect("load");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.tcp.port, 5555);
        assert_eq!(config.screen_record.stop_delay_ms, 2000);
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "adb": { "command_path": "/opt/adb" } }"#).expect("write");
        let config = load_config_from_path(&path, "t").expect("load");
        assert_eq!(config.adb.command_path, "/opt/adb");
        assert_eq!(config.command.command_timeout_sec, 30);
    }

    #[test]
    fn save_then_load_keeps_values_and_backs_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config.output.output_dir = "/tmp/out".to_string();
        save_config_to_path(&config, &path, "t").expect("save");

        config.tcp.port = 5556;
        save_config_to_path(&config, &path, "t").expect("save again");

        let loaded = load_config_from_path(&path, "t").expect("load");
        assert_eq!(loaded.tcp.port, 5556);
        assert_eq!(loaded.output.output_dir, "/tmp/out");

        let backup = load_config_from_path(&backup_config_path(&path), "t").expect("backup");
        assert_eq!(backup.tcp.port, 5555);
    }

    #[test]
    fn malformed_file_is_a_validation_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");
        let err = load_config_from_path(&path, "trace-x").expect_err("should fail");
        assert_eq!(err.code, "ERR_VALIDATION");
        assert_eq!(err.trace_id, "trace-x");
    }

    #[test]
    fn clamps_invalid_values() {
        let mut config = AppConfig::default();
        config.command.command_timeout_sec = 0;
        config.tcp.port = 0;
        config.screenshot.remote_path = "relative.png".to_string();
        config.screen_record.stop_delay_ms = 600_000;
        config.logging.log_level = " ".to_string();
        let validated = validate_config(config);
        assert_eq!(validated, AppConfig::default());
    }

    #[test]
    fn explicit_output_dir_wins() {
        let mut config = AppConfig::default();
        config.output.output_dir = "/var/tmp/shots".to_string();
        assert_eq!(config.output_dir(), PathBuf::from("/var/tmp/shots"));
    }
}
