use serde::Serialize;
use std::fmt;

pub const ERR_VALIDATION: &str = "ERR_VALIDATION";
pub const ERR_NOT_FOUND: &str = "ERR_NOT_FOUND";
pub const ERR_SPAWN: &str = "ERR_SPAWN";
pub const ERR_ENCODING: &str = "ERR_ENCODING";
pub const ERR_IO: &str = "ERR_IO";
pub const ERR_TIMEOUT: &str = "ERR_TIMEOUT";
pub const ERR_DEPENDENCY: &str = "ERR_DEPENDENCY";
pub const ERR_SYSTEM: &str = "ERR_SYSTEM";

#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
        }
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_VALIDATION, message, trace_id)
    }

    /// The bridge executable could not be located.
    pub fn not_found(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_NOT_FOUND, message, trace_id)
    }

    pub fn spawn(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_SPAWN, message, trace_id)
    }

    pub fn encoding(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_ENCODING, message, trace_id)
    }

    pub fn io(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_IO, message, trace_id)
    }

    pub fn timeout(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_TIMEOUT, message, trace_id)
    }

    /// The bridge (or a helper tool) ran but reported failure.
    pub fn dependency(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_DEPENDENCY, message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_SYSTEM, message, trace_id)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}
