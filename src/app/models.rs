use serde::{Deserialize, Serialize};

/// A connected target, as seen by one listing call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdbInfo {
    pub available: bool,
    pub version_output: String,
    pub command_path: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcpConnection {
    pub device_id: String,
    pub address: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse<T> {
    pub trace_id: String,
    pub data: T,
}
