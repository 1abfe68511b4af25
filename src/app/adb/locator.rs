use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app::error::AppError;

#[cfg(windows)]
const ADB_BINARY: &str = "adb.exe";
#[cfg(not(windows))]
const ADB_BINARY: &str = "adb";

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

pub fn validate_adb_program(program: &Path) -> Result<(), String> {
    if program.as_os_str().is_empty() {
        return Err("ADB command is empty".to_string());
    }
    if program.is_dir() {
        return Err("ADB path must point to an executable file".to_string());
    }
    if !program.exists() {
        return Err("ADB executable not found at the configured path".to_string());
    }
    Ok(())
}

/// Where to look for the bridge, in priority order.
#[derive(Debug, Clone, Default)]
pub struct LocatorInputs {
    pub configured: String,
    pub env_adb: Option<String>,
    pub exe_dir: Option<PathBuf>,
    pub sdk_roots: Vec<PathBuf>,
    pub search_path: Option<std::ffi::OsString>,
}

impl LocatorInputs {
    pub fn from_environment(configured: &str) -> Self {
        let sdk_roots = ["ANDROID_HOME", "ANDROID_SDK_ROOT"]
            .iter()
            .filter_map(|key| std::env::var_os(key))
            .map(PathBuf::from)
            .collect();
        Self {
            configured: configured.to_string(),
            env_adb: std::env::var("ADB").ok(),
            exe_dir: std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
            sdk_roots,
            search_path: std::env::var_os("PATH"),
        }
    }
}

pub fn locate_adb(configured: &str, trace_id: &str) -> Result<PathBuf, AppError> {
    resolve_adb_program(&LocatorInputs::from_environment(configured), trace_id)
}

/// Explicit settings are trusted only if they point at a file; implicit
/// candidates are skipped silently when absent.
pub fn resolve_adb_program(inputs: &LocatorInputs, trace_id: &str) -> Result<PathBuf, AppError> {
    for explicit in [Some(inputs.configured.as_str()), inputs.env_adb.as_deref()]
        .into_iter()
        .flatten()
    {
        let normalized = normalize_command_path(explicit);
        if normalized.is_empty() {
            continue;
        }
        let path = PathBuf::from(&normalized);
        if !path.is_absolute() && path.components().count() == 1 {
            // Bare command name: look it up on PATH.
            if let Some(found) = search_path(inputs.search_path.as_deref(), &normalized) {
                return Ok(found);
            }
            return Err(AppError::not_found(
                format!("{normalized} was not found on PATH"),
                trace_id,
            ));
        }
        validate_adb_program(&path).map_err(|message| AppError::not_found(message, trace_id))?;
        debug!(trace_id = %trace_id, path = %path.display(), "using explicit adb");
        return Ok(path);
    }

    let bundled = inputs.exe_dir.as_ref().map(|dir| dir.join(ADB_BINARY));
    let sdk = inputs
        .sdk_roots
        .iter()
        .map(|root| root.join("platform-tools").join(ADB_BINARY));
    for candidate in bundled.into_iter().chain(sdk) {
        if candidate.is_file() {
            debug!(trace_id = %trace_id, path = %candidate.display(), "found adb");
            return Ok(candidate);
        }
    }

    search_path(inputs.search_path.as_deref(), ADB_BINARY).ok_or_else(|| {
        AppError::not_found(
            "adb not found; set adb.command_path in the config or install platform-tools",
            trace_id,
        )
    })
}

fn search_path(path_var: Option<&std::ffi::OsStr>, binary: &str) -> Option<PathBuf> {
    let path_var = path_var?;
    std::env::split_paths(path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn empty_inputs() -> LocatorInputs {
        LocatorInputs {
            search_path: Some(std::ffi::OsString::new()),
            ..LocatorInputs::default()
        }
    }

    #[test]
    fn strips_wrapping_double_quotes() {
        assert_eq!(
            normalize_command_path("  \"/opt/android/platform-tools/adb\"  "),
            "/opt/android/platform-tools/adb"
        );
    }

    #[test]
    fn strips_wrapping_single_quotes() {
        assert_eq!(
            normalize_command_path("  '/opt/android/platform-tools/adb'  "),
            "/opt/android/platform-tools/adb"
        );
    }

    #[test]
    fn configured_path_that_does_not_exist_is_not_found() {
        let mut inputs = empty_inputs();
        inputs.configured = "/this/path/should/not/exist/adb".to_string();
        let err = resolve_adb_program(&inputs, "t").unwrap_err();
        assert_eq!(err.code, "ERR_NOT_FOUND");
        assert!(err.error.to_lowercase().contains("not found"));
    }

    #[test]
    fn configured_directory_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut inputs = empty_inputs();
        inputs.configured = dir.path().to_string_lossy().to_string();
        let err = resolve_adb_program(&inputs, "t").unwrap_err();
        assert_eq!(err.code, "ERR_NOT_FOUND");
    }

    #[test]
    fn nothing_anywhere_is_not_found() {
        let err = resolve_adb_program(&empty_inputs(), "t").unwrap_err();
        assert_eq!(err.code, "ERR_NOT_FOUND");
    }

    #[test]
    fn configured_wins_over_bundled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let configured = dir.path().join("my-adb");
        fs::write(&configured, "").expect("write");
        fs::write(dir.path().join(ADB_BINARY), "").expect("write");

        let mut inputs = empty_inputs();
        inputs.configured = format!("\"{}\"", configured.display());
        inputs.exe_dir = Some(dir.path().to_path_buf());
        assert_eq!(resolve_adb_program(&inputs, "t").unwrap(), configured);
    }

    #[test]
    fn falls_back_to_bundled_then_sdk_then_path() {
        let bundle = tempfile::tempdir().expect("tempdir");
        let sdk = tempfile::tempdir().expect("tempdir");
        let bin = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(sdk.path().join("platform-tools")).expect("mkdir");
        let sdk_adb = sdk.path().join("platform-tools").join(ADB_BINARY);
        fs::write(&sdk_adb, "").expect("write");
        let path_adb = bin.path().join(ADB_BINARY);
        fs::write(&path_adb, "").expect("write");

        let mut inputs = empty_inputs();
        inputs.exe_dir = Some(bundle.path().to_path_buf());
        inputs.sdk_roots = vec![sdk.path().to_path_buf()];
        inputs.search_path = Some(bin.path().as_os_str().to_os_string());
        assert_eq!(resolve_adb_program(&inputs, "t").unwrap(), sdk_adb);

        inputs.sdk_roots.clear();
        assert_eq!(resolve_adb_program(&inputs, "t").unwrap(), path_adb);

        let bundled = bundle.path().join(ADB_BINARY);
        fs::write(&bundled, "").expect("write");
        assert_eq!(resolve_adb_program(&inputs, "t").unwrap(), bundled);
    }

    #[test]
    fn bare_command_name_is_searched_on_path() {
        let bin = tempfile::tempdir().expect("tempdir");
        let custom = bin.path().join("adb-custom");
        fs::write(&custom, "").expect("write");

        let mut inputs = empty_inputs();
        inputs.env_adb = Some("adb-custom".to_string());
        inputs.search_path = Some(bin.path().as_os_str().to_os_string());
        assert_eq!(resolve_adb_program(&inputs, "t").unwrap(), custom);
    }
}
