use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::adb::locator::locate_adb;
use crate::app::adb::parse::{
    parse_activities, parse_device_ids, parse_ip_route, parse_package_list,
};
use crate::app::adb::paths::{
    current_timestamp, logcat_file, recording_file, screenshot_file, validate_component,
    validate_deeplink, validate_device_id, validate_package_name,
};
use crate::app::adb::runner::{run_command_with_timeout, AdbRunner};
use crate::app::background::{spawn_background, BackgroundTask};
use crate::app::clipboard::{Clipboard, SystemClipboard};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::models::{AdbInfo, Device, TcpConnection};


/// Every device operation, built once around a resolved bridge binary.
/// Cloning is cheap; background tasks carry their own clone.
#[derive(Clone)]
pub struct DeviceBridge {
    runner: AdbRunner,
    config: Arc<AppConfig>,
    clipboard: Arc<dyn Clipboard>,
}

fn ensure_device_id(id: &str, trace_id: &str) -> Result<(), AppError> {
    validate_device_id(id).map_err(|message| AppError::validation(message, trace_id))
}

fn ensure_output_dir(dir: &Path, trace_id: &str) -> Result<(), AppError> {
    fs::create_dir_all(dir).map_err(|err| {
        AppError::io(
            format!("Failed to create output dir {}: {err}", dir.display()),
            trace_id,
        )
    })
}

impl DeviceBridge {
    /// Resolves the bridge from `config` and the environment.
    pub fn from_config(config: AppConfig, trace_id: &str) -> Result<Self, AppError> {
        let program = locate_adb(&config.adb.command_path, trace_id)?;
        info!(trace_id = %trace_id, adb = %program.display(), "resolved adb");
        Ok(Self::new(program, config))
    }

    pub fn new(program: impl Into<PathBuf>, config: AppConfig) -> Self {
        let runner = AdbRunner::new(
            program,
            Duration::from_secs(config.command.command_timeout_sec),
        );
        Self {
            runner,
            config: Arc::new(config),
            clipboard: Arc::new(SystemClipboard),
        }
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    fn device_args(id: &str, rest: &str) -> String {
        format!("-s {} {rest}", shell_words::quote(id))
    }

    /// Ids from `devices -l`, each resolved to a display name with one more
    /// bridge call. A device whose name cannot be read (unauthorized, offline)
    /// is still listed, with an empty name.
    pub fn list_devices(&self, trace_id: &str) -> Result<Vec<Device>, AppError> {
        info!(trace_id = %trace_id, "list_devices");
        let output = self.runner.run_checked("devices -l", trace_id)?;
        Ok(parse_device_ids(&output)
            .into_iter()
            .map(|id| {
                let name = self.listed_device_name(&id, trace_id);
                Device { id, name }
            })
            .collect())
    }

    fn listed_device_name(&self, id: &str, trace_id: &str) -> String {
        match self.device_name(id, trace_id) {
            Ok(name) => name,
            Err(err) => {
                warn!(trace_id = %trace_id, device_id = %id, error = %err, "could not resolve device name");
                String::new()
            }
        }
    }

    /// Not cached: every call queries the device.
    pub fn device_name(&self, id: &str, trace_id: &str) -> Result<String, AppError> {
        ensure_device_id(id, trace_id)?;
        self.runner.run_checked(
            &Self::device_args(id, "shell getprop ro.product.model"),
            trace_id,
        )
    }

    fn capture_screenshot_to(
        &self,
        id: &str,
        local_path: &Path,
        trace_id: &str,
    ) -> Result<(), AppError> {
        let remote = shell_words::quote(&self.config.screenshot.remote_path).into_owned();
        self.runner.run_checked(
            &Self::device_args(id, &format!("shell screencap -p {remote}")),
            trace_id,
        )?;
        let local = shell_words::quote(&local_path.to_string_lossy()).into_owned();
        self.runner.run_checked(
            &Self::device_args(id, &format!("pull {remote} {local}")),
            trace_id,
        )?;
        Ok(())
    }

    pub fn take_screenshot(&self, id: &str, trace_id: &str) -> Result<PathBuf, AppError> {
        ensure_device_id(id, trace_id)?;
        info!(trace_id = %trace_id, device_id = %id, "take_screenshot");
        let timestamp = current_timestamp();
        let output_dir = self.config.output_dir();
        ensure_output_dir(&output_dir, trace_id)?;
        let local_path = screenshot_file(&output_dir, &timestamp);
        self.capture_screenshot_to(id, &local_path, trace_id)?;
        Ok(local_path)
    }

    /// Screenshot straight to the clipboard; the intermediate file is removed.
    pub fn take_screenshot_to_clipboard(&self, id: &str, trace_id: &str) -> Result<(), AppError> {
        let local_path = self.take_screenshot(id, trace_id)?;
        let copied = self.clipboard.copy_png(&local_path, trace_id);
        let removed = fs::remove_file(&local_path).map_err(|err| {
            AppError::io(
                format!("Failed to remove {}: {err}", local_path.display()),
                trace_id,
            )
        });
        copied?;
        removed
    }

    pub fn list_packages(&self, id: &str, trace_id: &str) -> Result<Vec<String>, AppError> {
        ensure_device_id(id, trace_id)?;
        let output = self
            .runner
            .run_checked(&Self::device_args(id, "shell pm list packages -3"), trace_id)?;
        Ok(parse_package_list(&output))
    }

    pub fn list_activities(
        &self,
        id: &str,
        package: &str,
        trace_id: &str,
    ) -> Result<Vec<String>, AppError> {
        ensure_device_id(id, trace_id)?;
        validate_package_name(package).map_err(|message| AppError::validation(message, trace_id))?;
        let output = self.runner.run_checked(
            &Self::device_args(id, &format!("shell dumpsys package {package}")),
            trace_id,
        )?;
        Ok(parse_activities(&output, package))
    }

    pub fn launch_activity(
        &self,
        id: &str,
        component: &str,
        trace_id: &str,
    ) -> Result<String, AppError> {
        ensure_device_id(id, trace_id)?;
        validate_component(component)
            .map_err(|message| AppError::validation(message, trace_id))?;
        info!(trace_id = %trace_id, device_id = %id, component = %component, "launch_activity");
        let quoted = shell_words::quote(component).into_owned();
        let output = self.runner.run_checked(
            &Self::device_args(id, &format!("shell am start -n {quoted}")),
            trace_id,
        )?;
        // `am start` reports some failures with a zero exit status.
        if output.contains("Error:") {
            return Err(AppError::dependency(
                format!("am start failed: {output}"),
                trace_id,
            ));
        }
        Ok(output)
    }

    /// Starts `screenrecord` on the device. The task resolves when the
    /// recorder exits, normally after [`DeviceBridge::stop_screen_recording`].
    pub fn start_screen_recording(
        &self,
        id: &str,
        trace_id: &str,
    ) -> Result<BackgroundTask<String>, AppError> {
        ensure_device_id(id, trace_id)?;
        info!(trace_id = %trace_id, device_id = %id, "start_screen_recording");
        let remote = shell_words::quote(&self.config.screen_record.remote_path).into_owned();
        let args = Self::device_args(id, &format!("shell screenrecord {remote}"));
        let timeout = Duration::from_secs(self.config.screen_record.max_duration_sec);
        let runner = self.runner.clone();
        let task_trace = trace_id.to_string();
        spawn_background("screenrecord", trace_id, move || {
            let result = runner.run_with_timeout(&args, timeout, &task_trace)?;
            Ok(result.output)
        })
    }

    /// Interrupts the recorder, waits the configured delay so the device can
    /// finalize the file, then pulls it. The delay is taken whatever the
    /// interrupt reported.
    pub fn stop_screen_recording(&self, id: &str, trace_id: &str) -> Result<PathBuf, AppError> {
        ensure_device_id(id, trace_id)?;
        info!(trace_id = %trace_id, device_id = %id, "stop_screen_recording");
        let timestamp = current_timestamp();

        match self
            .runner
            .run(&Self::device_args(id, "shell pkill -INT screenrecord"), trace_id)
        {
            Ok(result) if !result.success() => {
                warn!(trace_id = %trace_id, exit_code = ?result.exit_code, output = %result.output, "pkill screenrecord reported failure");
            }
            Ok(_) => {}
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "pkill screenrecord failed");
            }
        }

        std::thread::sleep(Duration::from_millis(self.config.screen_record.stop_delay_ms));

        let output_dir = self.config.output_dir();
        ensure_output_dir(&output_dir, trace_id)?;
        let local_path = recording_file(&output_dir, &timestamp);
        let remote = shell_words::quote(&self.config.screen_record.remote_path).into_owned();
        let local = shell_words::quote(&local_path.to_string_lossy()).into_owned();
        self.runner.run_checked(
            &Self::device_args(id, &format!("pull {remote} {local}")),
            trace_id,
        )?;
        Ok(local_path)
    }

    pub fn device_ip(&self, id: &str, trace_id: &str) -> Result<String, AppError> {
        ensure_device_id(id, trace_id)?;
        let output = self
            .runner
            .run_checked(&Self::device_args(id, "shell ip route"), trace_id)?;
        parse_ip_route(&output).ok_or_else(|| {
            AppError::dependency(
                format!("Could not determine an IP address for {id}; is it on Wi-Fi?"),
                trace_id,
            )
        })
    }

    /// Switches the device to TCP mode and connects to it over the network.
    pub fn make_tcp_connection(
        &self,
        id: &str,
        trace_id: &str,
    ) -> Result<BackgroundTask<TcpConnection>, AppError> {
        ensure_device_id(id, trace_id)?;
        info!(trace_id = %trace_id, device_id = %id, "make_tcp_connection");
        let bridge = self.clone();
        let id = id.to_string();
        let task_trace = trace_id.to_string();
        spawn_background("tcp-connect", trace_id, move || {
            let port = bridge.config.tcp.port;
            let ip = bridge.device_ip(&id, &task_trace)?;
            bridge
                .runner
                .run_checked(&Self::device_args(&id, &format!("tcpip {port}")), &task_trace)?;
            let address = format!("{ip}:{port}");
            let output = bridge.runner.run_checked(
                &Self::device_args(&id, &format!("connect {address}")),
                &task_trace,
            )?;
            let lowered = output.to_lowercase();
            if lowered.contains("failed") || lowered.contains("unable") {
                return Err(AppError::dependency(
                    format!("adb connect failed: {output}"),
                    &task_trace,
                ));
            }
            Ok(TcpConnection {
                device_id: id,
                address,
                output,
            })
        })
    }

    pub fn disconnect_tcp_connection(
        &self,
        id: &str,
        trace_id: &str,
    ) -> Result<BackgroundTask<String>, AppError> {
        ensure_device_id(id, trace_id)?;
        info!(trace_id = %trace_id, device_id = %id, "disconnect_tcp_connection");
        let runner = self.runner.clone();
        let args = Self::device_args(id, "disconnect");
        let task_trace = trace_id.to_string();
        spawn_background("tcp-disconnect", trace_id, move || {
            runner.run_checked(&args, &task_trace)
        })
    }

    pub fn open_deeplink(&self, id: &str, uri: &str, trace_id: &str) -> Result<String, AppError> {
        ensure_device_id(id, trace_id)?;
        validate_deeplink(uri).map_err(|message| AppError::validation(message, trace_id))?;
        info!(trace_id = %trace_id, device_id = %id, uri = %uri, "open_deeplink");
        // Quoted twice: once for the host shell, once for the device shell
        // that `adb shell` hands the command line to.
        let device_quoted = format!("'{}'", uri.trim());
        let host_quoted = shell_words::quote(&device_quoted).into_owned();
        self.runner.run_checked(
            &Self::device_args(
                id,
                &format!("shell am start -a android.intent.action.VIEW -d {host_quoted}"),
            ),
            trace_id,
        )
    }

    /// Dumps the device log buffer to `logcat<timestamp>.txt`.
    pub fn capture_bug_report(
        &self,
        id: &str,
        trace_id: &str,
    ) -> Result<BackgroundTask<PathBuf>, AppError> {
        ensure_device_id(id, trace_id)?;
        info!(trace_id = %trace_id, device_id = %id, "capture_bug_report");
        let timestamp = current_timestamp();
        let output_dir = self.config.output_dir();
        let runner = self.runner.clone();
        let args = Self::device_args(id, "logcat -d");
        let task_trace = trace_id.to_string();
        spawn_background("logcat", trace_id, move || {
            let log = runner.run_checked(&args, &task_trace)?;
            ensure_output_dir(&output_dir, &task_trace)?;
            let path = logcat_file(&output_dir, &timestamp);
            fs::write(&path, log).map_err(|err| {
                AppError::io(
                    format!("Failed to write {}: {err}", path.display()),
                    &task_trace,
                )
            })?;
            Ok(path)
        })
    }

    /// Probes the resolved bridge with `adb version`.
    pub fn check(&self, trace_id: &str) -> AdbInfo {
        let program = self.runner.program().to_string_lossy().to_string();
        let args = vec!["version".to_string()];
        match run_command_with_timeout(&program, &args, Duration::from_secs(5), trace_id) {
            Ok(output) => {
                let available = output.exit_code == Some(0);
                let mut version_output = output.stdout.trim().to_string();
                let stderr = output.stderr.trim();
                if !stderr.is_empty() {
                    if !version_output.is_empty() {
                        version_output.push('\n');
                    }
                    version_output.push_str(stderr);
                }
                AdbInfo {
                    available,
                    version_output,
                    command_path: program,
                    error: if available {
                        None
                    } else {
                        Some("ADB command returned a non-zero exit code".to_string())
                    },
                }
            }
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err.error, "adb check failed");
                AdbInfo {
                    available: false,
                    version_output: String::new(),
                    command_path: program,
                    error: Some(err.error),
                }
            }
        }
    }
}
