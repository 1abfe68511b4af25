use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::app::adb::runner::{run_command_with_timeout, run_quiet_with_timeout};
use crate::app::error::AppError;

pub trait Clipboard: Send + Sync {
    /// Places the PNG at `path` on the system clipboard.
    fn copy_png(&self, path: &Path, trace_id: &str) -> Result<(), AppError>;
}

/// Delegates to the platform's clipboard tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

#[derive(Debug)]
struct ClipboardCommand {
    program: String,
    args: Vec<String>,
    /// xclip forks to serve the selection and keeps any captured pipe open.
    forks_helper: bool,
}

impl SystemClipboard {
    fn command(path: &Path) -> Option<ClipboardCommand> {
        let path = path.to_string_lossy();
        if cfg!(target_os = "macos") {
            let escaped = path.replace('\\', "\\\\").replace('"', "\\\"");
            let script =
                format!("set the clipboard to (read (POSIX file \"{escaped}\") as «class PNGf»)");
            return Some(ClipboardCommand {
                program: "osascript".to_string(),
                args: vec!["-e".to_string(), script],
                forks_helper: false,
            });
        }
        if cfg!(unix) {
            return Some(ClipboardCommand {
                program: "xclip".to_string(),
                args: vec![
                    "-selection".to_string(),
                    "clipboard".to_string(),
                    "-t".to_string(),
                    "image/png".to_string(),
                    "-i".to_string(),
                    path.to_string(),
                ],
                forks_helper: true,
            });
        }
        None
    }
}

impl Clipboard for SystemClipboard {
    fn copy_png(&self, path: &Path, trace_id: &str) -> Result<(), AppError> {
        let Some(ClipboardCommand {
            program,
            args,
            forks_helper,
        }) = Self::command(path)
        else {
            return Err(AppError::dependency(
                "Copying images to the clipboard is not supported on this platform",
                trace_id,
            ));
        };
        info!(trace_id = %trace_id, program = %program, "copy screenshot to clipboard");
        let timeout = Duration::from_secs(10);
        if forks_helper {
            let exit_code = run_quiet_with_timeout(&program, &args, timeout, trace_id)?;
            if exit_code != Some(0) {
                return Err(AppError::dependency(
                    format!("{program} exited with {exit_code:?}"),
                    trace_id,
                ));
            }
            return Ok(());
        }
        let output = run_command_with_timeout(&program, &args, timeout, trace_id)?;
        if output.exit_code != Some(0) {
            return Err(AppError::dependency(
                format!("{program} failed: {}", output.stderr.trim()),
                trace_id,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "macos")]
    #[test]
    fn macos_uses_osascript_with_png_class() {
        let command = SystemClipboard::command(Path::new("/tmp/a \"b\".png")).unwrap();
        assert_eq!(command.program, "osascript");
        assert!(!command.forks_helper);
        assert!(command.args[1].contains("«class PNGf»"));
        assert!(command.args[1].contains("/tmp/a \\\"b\\\".png"));
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn unix_uses_xclip_png_target_without_captured_output() {
        let command = SystemClipboard::command(Path::new("/tmp/shot.png")).unwrap();
        assert_eq!(command.program, "xclip");
        assert!(command.forks_helper);
        assert_eq!(command.args.last().map(String::as_str), Some("/tmp/shot.png"));
        assert!(command.args.contains(&"image/png".to_string()));
    }
}
