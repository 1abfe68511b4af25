use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Local, TimeZone};
use regex::Regex;

pub const REMOTE_SCREENSHOT_PATH: &str = "/sdcard/screencap_adbtool.png";
pub const REMOTE_RECORDING_PATH: &str = "/sdcard/screenrecord_adbtool.mp4";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// `yyyy-MM-dd-HH-mm` for the given instant.
pub fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn current_timestamp() -> String {
    format_timestamp(&Local::now())
}

pub fn screenshot_file(output_dir: &Path, timestamp: &str) -> PathBuf {
    output_dir.join(format!("screen{timestamp}.png"))
}

pub fn recording_file(output_dir: &Path, timestamp: &str) -> PathBuf {
    output_dir.join(format!("record{timestamp}.mp4"))
}

pub fn logcat_file(output_dir: &Path, timestamp: &str) -> PathBuf {
    output_dir.join(format!("logcat{timestamp}.txt"))
}

fn device_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._:-]+$").expect("valid device id regex"))
}

/// Serials, `host:port` pairs and mDNS names only.
pub fn validate_device_id(id: &str) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err("device id is required".to_string());
    }
    if !device_id_regex().is_match(id) {
        return Err(format!(
            "invalid device id {id:?}: only letters, digits, '.', '_', ':' and '-' are allowed"
        ));
    }
    Ok(())
}

fn package_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)+$").expect("valid package regex")
    })
}

fn component_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)+/[A-Za-z0-9_.$]+$")
            .expect("valid component regex")
    })
}

pub fn validate_package_name(value: &str) -> Result<(), String> {
    if package_regex().is_match(value) {
        Ok(())
    } else {
        Err(format!("invalid package name: {value:?}"))
    }
}

/// `com.example/.MainActivity` or `com.example/com.example.MainActivity`.
pub fn validate_component(value: &str) -> Result<(), String> {
    if component_regex().is_match(value) {
        Ok(())
    } else {
        Err(format!("invalid activity component: {value:?}"))
    }
}

pub fn validate_deeplink(value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("deeplink is required".to_string());
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err("deeplink contains control characters".to_string());
    }
    // The uri is single-quoted on the command line.
    if trimmed.contains('\'') {
        return Err("deeplink must not contain single quotes".to_string());
    }
    Ok(())
}
