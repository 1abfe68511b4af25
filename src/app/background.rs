use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::app::error::AppError;

/// Handle to work dispatched off the caller's thread. Dropping it detaches
/// the work; joining surfaces its result.
pub struct BackgroundTask<T> {
    label: &'static str,
    trace_id: String,
    handle: JoinHandle<Result<T, AppError>>,
}

impl<T> BackgroundTask<T> {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<T, AppError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => {
                warn!(trace_id = %self.trace_id, task = self.label, "background task panicked");
                Err(AppError::system(
                    format!("{} task panicked", self.label),
                    &self.trace_id,
                ))
            }
        }
    }
}

pub fn spawn_background<T, F>(
    label: &'static str,
    trace_id: &str,
    work: F,
) -> Result<BackgroundTask<T>, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    let task_trace = trace_id.to_string();
    let handle = std::thread::Builder::new()
        .name(format!("adbconnect-{label}"))
        .spawn(move || {
            debug!(trace_id = %task_trace, task = label, "background task started");
            let result = work();
            if let Err(err) = &result {
                warn!(trace_id = %task_trace, task = label, error = %err, "background task failed");
            }
            result
        })
        .map_err(|err| {
            AppError::system(format!("Failed to start {label} task: {err}"), trace_id)
        })?;

    Ok(BackgroundTask {
        label,
        trace_id: trace_id.to_string(),
        handle,
    })
}
