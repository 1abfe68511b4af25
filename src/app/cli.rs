use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::app::commands::DeviceBridge;
use crate::app::config::{
    config_path, load_config_from_path, save_config_to_path, AppConfig,
};
use crate::app::error::AppError;
use crate::app::logging::init_logging;
use crate::app::models::CommandResponse;

#[derive(Debug, Parser)]
#[command(name = "adbconnect", version, about = "Manage connected Android devices through adb")]
pub struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (defaults to $ADBCONNECT_CONFIG_PATH or ~/.adbconnect_config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// List connected devices with their model names
    Devices,
    /// Show the model name of one device
    Name { id: String },
    /// Capture the screen to the output directory
    Screenshot {
        id: String,
        /// Copy to the clipboard instead of keeping the file
        #[arg(long)]
        clipboard: bool,
    },
    /// Screen recording
    #[command(subcommand)]
    Record(RecordCommand),
    /// List third-party packages
    Packages { id: String },
    /// List activities of a package
    Activities { id: String, package: String },
    /// Launch an activity (`package/.Activity`)
    Launch { id: String, component: String },
    /// Show the device's Wi-Fi IP address
    Ip { id: String },
    /// adb over TCP
    #[command(subcommand)]
    Tcp(TcpCommand),
    /// Open a deep link on the device
    Deeplink { id: String, uri: String },
    /// Dump logcat to the output directory
    Bugreport { id: String },
    /// Check that adb can be found and runs
    Check,
    /// Inspect or reset the config file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum RecordCommand {
    Start {
        id: String,
        /// Block until the recording ends
        #[arg(long)]
        wait: bool,
    },
    Stop { id: String },
}

#[derive(Debug, Subcommand)]
pub enum TcpCommand {
    Connect {
        id: String,
        #[arg(long)]
        port: Option<u16>,
    },
    Disconnect { id: String },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Show,
    Reset,
}

fn emit<T: Serialize>(json: bool, trace_id: &str, data: T, text: impl FnOnce(&T) -> String) {
    if json {
        let response = CommandResponse {
            trace_id: trace_id.to_string(),
            data,
        };
        match serde_json::to_string_pretty(&response) {
            Ok(payload) => println!("{payload}"),
            Err(err) => eprintln!("failed to serialize response: {err}"),
        }
    } else {
        let rendered = text(&data);
        if !rendered.is_empty() {
            println!("{rendered}");
        }
    }
}

fn execute(cli: Cli, config_file: PathBuf, trace_id: &str) -> Result<(), AppError> {
    let json = cli.json;
    let mut config = load_config_from_path(&config_file, trace_id)?;

    let command = match cli.command {
        CliCommand::Config(ConfigCommand::Show) => {
            emit(json, trace_id, config, |config| {
                serde_json::to_string_pretty(config).unwrap_or_default()
            });
            return Ok(());
        }
        CliCommand::Config(ConfigCommand::Reset) => {
            let config = AppConfig::default();
            save_config_to_path(&config, &config_file, trace_id)?;
            emit(json, trace_id, config_file.display().to_string(), |path| {
                format!("Config reset: {path}")
            });
            return Ok(());
        }
        CliCommand::Tcp(TcpCommand::Connect { port: Some(port), id }) => {
            config.tcp.port = port;
            CliCommand::Tcp(TcpCommand::Connect { port: None, id })
        }
        other => other,
    };

    let bridge = DeviceBridge::from_config(config, trace_id)?;
    match command {
        CliCommand::Devices => {
            let devices = bridge.list_devices(trace_id)?;
            emit(json, trace_id, devices, |devices| {
                devices
                    .iter()
                    .map(|device| format!("{}\t{}", device.id, device.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        CliCommand::Name { id } => {
            let name = bridge.device_name(&id, trace_id)?;
            emit(json, trace_id, name, |name| name.clone());
        }
        CliCommand::Screenshot { id, clipboard } => {
            if clipboard {
                bridge.take_screenshot_to_clipboard(&id, trace_id)?;
                emit(json, trace_id, true, |_| "Screenshot copied to clipboard".to_string());
            } else {
                let path = bridge.take_screenshot(&id, trace_id)?;
                emit(json, trace_id, path, |path| path.display().to_string());
            }
        }
        CliCommand::Record(RecordCommand::Start { id, wait }) => {
            let task = bridge.start_screen_recording(&id, trace_id)?;
            if wait {
                let output = task.join()?;
                emit(json, trace_id, output, |output| output.clone());
            } else {
                // Give the recorder a moment so launch failures still surface.
                std::thread::sleep(std::time::Duration::from_millis(500));
                if task.is_finished() {
                    let output = task.join()?;
                    emit(json, trace_id, output, |output| output.clone());
                } else {
                    emit(json, trace_id, true, |_| {
                        format!("Recording on {id}; run `adbconnect record stop {id}` to finish")
                    });
                }
            }
        }
        CliCommand::Record(RecordCommand::Stop { id }) => {
            let path = bridge.stop_screen_recording(&id, trace_id)?;
            emit(json, trace_id, path, |path| path.display().to_string());
        }
        CliCommand::Packages { id } => {
            let packages = bridge.list_packages(&id, trace_id)?;
            emit(json, trace_id, packages, |packages| packages.join("\n"));
        }
        CliCommand::Activities { id, package } => {
            let activities = bridge.list_activities(&id, &package, trace_id)?;
            emit(json, trace_id, activities, |activities| activities.join("\n"));
        }
        CliCommand::Launch { id, component } => {
            let output = bridge.launch_activity(&id, &component, trace_id)?;
            emit(json, trace_id, output, |output| output.clone());
        }
        CliCommand::Ip { id } => {
            let ip = bridge.device_ip(&id, trace_id)?;
            emit(json, trace_id, ip, |ip| ip.clone());
        }
        CliCommand::Tcp(TcpCommand::Connect { id, .. }) => {
            let connection = bridge.make_tcp_connection(&id, trace_id)?.join()?;
            emit(json, trace_id, connection, |connection| connection.output.clone());
        }
        CliCommand::Tcp(TcpCommand::Disconnect { id }) => {
            let output = bridge.disconnect_tcp_connection(&id, trace_id)?.join()?;
            emit(json, trace_id, output, |output| output.clone());
        }
        CliCommand::Deeplink { id, uri } => {
            let output = bridge.open_deeplink(&id, &uri, trace_id)?;
            emit(json, trace_id, output, |output| output.clone());
        }
        CliCommand::Bugreport { id } => {
            let path = bridge.capture_bug_report(&id, trace_id)?.join()?;
            emit(json, trace_id, path, |path| path.display().to_string());
        }
        CliCommand::Check => {
            let info = bridge.check(trace_id);
            let available = info.available;
            emit(json, trace_id, info, |info| {
                if info.available {
                    format!("{}\n{}", info.command_path, info.version_output)
                } else {
                    format!(
                        "{}: {}",
                        info.command_path,
                        info.error.clone().unwrap_or_default()
                    )
                }
            });
            if !available {
                return Err(AppError::dependency("adb is not usable", trace_id));
            }
        }
        CliCommand::Config(_) => {}
    }
    Ok(())
}

/// Parses arguments, runs one command and returns the process exit code.
pub fn run_cli() -> i32 {
    let cli = Cli::parse();
    let trace_id = Uuid::new_v4().to_string();
    let config_file = cli.config.clone().unwrap_or_else(config_path);

    // Logging needs the configured level; a broken config still gets default logging.
    let log_level = load_config_from_path(&config_file, &trace_id)
        .map(|config| config.logging.log_level)
        .unwrap_or_else(|_| AppConfig::default().logging.log_level);
    init_logging(&log_level);
    info!(trace_id = %trace_id, command = ?cli.command, "adbconnect");

    let json = cli.json;
    match execute(cli, config_file, &trace_id) {
        Ok(()) => 0,
        Err(err) => {
            if json {
                match serde_json::to_string_pretty(&err) {
                    Ok(payload) => eprintln!("{payload}"),
                    Err(_) => eprintln!("{err}"),
                }
            } else {
                eprintln!("error: {err}");
            }
            1
        }
    }
}
