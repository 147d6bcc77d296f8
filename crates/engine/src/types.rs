use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Final result JSON – the stable output contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub run_id: String,
    pub command: String,
    pub target: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub timing_ms: TimingInfo,
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Arbitrary command-specific payload returned on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Fail,
    Skip,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Fail => "fail",
            Status::Skip => "skip",
            Status::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    DeviceNotConnected,
    DependencyMissing,
    DumpFailed,
    ParseError,
    ActionFailed,
    IoError,
    Unsupported,
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        f.write_str(&s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimingInfo {
    pub total: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub steps: HashMap<String, u64>,
}

// ---------------------------------------------------------------------------
// Device types
// ---------------------------------------------------------------------------

/// One line of `adb devices` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub serial: String,
    /// `device`, `offline`, `unauthorized`, ...
    pub state: String,
}

impl DeviceInfo {
    pub fn is_ready(&self) -> bool {
        self.state == "device"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorReport {
    pub adb_path: String,
    pub adb_available: bool,
    pub adb_version: Option<String>,
    pub devices: Vec<DeviceInfo>,
    pub selected_serial: Option<String>,
    pub connected: bool,
    pub host_os: String,
    pub host_arch: String,
}

// ---------------------------------------------------------------------------
// Scenario (action script) types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<ScenarioStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioStep {
    Act {
        act: serde_json::Value,
        #[serde(default = "default_expect_status")]
        expect_status: String,
    },
    Perceive {
        perceive: bool,
    },
}

fn default_expect_status() -> String {
    "pass".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: Option<String>,
    pub overall_status: Status,
    pub step_results: Vec<CommandResult>,
    /// Steps left unexecuted because the script stopped early.
    #[serde(default)]
    pub skipped_steps: usize,
}

// ---------------------------------------------------------------------------
// Serve / daemon protocol
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generate a new run ID (UUIDv4).
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Build a successful CommandResult shell (caller fills in data).
pub fn result_ok(command: &str, target: &str, run_id: &str, total_ms: u64) -> CommandResult {
    CommandResult {
        run_id: run_id.to_string(),
        command: command.to_string(),
        target: target.to_string(),
        status: Status::Pass,
        error: None,
        timing_ms: TimingInfo {
            total: total_ms,
            steps: HashMap::new(),
        },
        artifacts: vec![],
        data: None,
    }
}

/// Build an error CommandResult.
pub fn result_err(
    command: &str,
    target: &str,
    run_id: &str,
    total_ms: u64,
    code: ErrorCode,
    message: impl Into<String>,
) -> CommandResult {
    result_with_status(command, target, run_id, total_ms, Status::Error, code, message)
}

/// Build a failed CommandResult (the check ran but the outcome is negative).
pub fn result_fail(
    command: &str,
    target: &str,
    run_id: &str,
    total_ms: u64,
    code: ErrorCode,
    message: impl Into<String>,
) -> CommandResult {
    result_with_status(command, target, run_id, total_ms, Status::Fail, code, message)
}

fn result_with_status(
    command: &str,
    target: &str,
    run_id: &str,
    total_ms: u64,
    status: Status,
    code: ErrorCode,
    message: impl Into<String>,
) -> CommandResult {
    CommandResult {
        run_id: run_id.to_string(),
        command: command.to_string(),
        target: target.to_string(),
        status,
        error: Some(ErrorInfo {
            code,
            message: message.into(),
            details: serde_json::Value::Null,
        }),
        timing_ms: TimingInfo {
            total: total_ms,
            steps: HashMap::new(),
        },
        artifacts: vec![],
        data: None,
    }
}
