//! Command registry.
//!
//! Commands are registered by name and invoked with JSON input/output, so the
//! CLI `call` subcommand, scripts, and the daemon all share one entry point.

use crate::context::AppContext;
use crate::executor::{self, FailureKind, OutcomeStatus};
use crate::perception::{self, PerceptionError};
use crate::traits::CapError;
use crate::types::*;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// Signature for all engine commands.
pub type CommandHandler = fn(Value, &AppContext) -> Result<Value, CommandError>;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Perception(#[from] PerceptionError),
    #[error("{0}")]
    NotConnected(String),
    #[error("{0}")]
    ActionFailed(String),
    #[error(transparent)]
    Bridge(#[from] CapError),
    #[error("{0}")]
    Other(String),
}

impl CommandError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            CommandError::InvalidInput(_) => ErrorCode::InvalidInput,
            CommandError::Perception(e) => e.error_code(),
            CommandError::NotConnected(_) => ErrorCode::DeviceNotConnected,
            CommandError::ActionFailed(_) => ErrorCode::ActionFailed,
            CommandError::Bridge(CapError::DependencyMissing(_)) => ErrorCode::DependencyMissing,
            CommandError::Bridge(CapError::Unsupported(_)) => ErrorCode::Unsupported,
            CommandError::Bridge(CapError::Io(_)) => ErrorCode::IoError,
            CommandError::Bridge(_) => ErrorCode::InternalError,
            CommandError::Other(_) => ErrorCode::InternalError,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct CommandRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            handlers: HashMap::new(),
        };
        reg.register("perceive", cmd_perceive);
        reg.register("act", cmd_act);
        reg.register("devices", cmd_devices);
        reg
    }

    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Execute a command by name and return a full CommandResult.
    pub fn execute(&self, name: &str, args: Value, ctx: &AppContext) -> CommandResult {
        let run_id = new_run_id();
        let start = Instant::now();

        let handler = match self.handlers.get(name) {
            Some(h) => h,
            None => {
                return result_err(
                    "call",
                    name,
                    &run_id,
                    start.elapsed().as_millis() as u64,
                    ErrorCode::InvalidInput,
                    format!(
                        "unknown command: {} (available: {})",
                        name,
                        self.list().join(", ")
                    ),
                );
            }
        };

        match handler(args, ctx) {
            Ok(data) => {
                let mut r = result_ok("call", name, &run_id, start.elapsed().as_millis() as u64);
                r.data = Some(data);
                r
            }
            Err(e) => {
                tracing::debug!(command = name, error = %e, "command failed");
                result_err(
                    "call",
                    name,
                    &run_id,
                    start.elapsed().as_millis() as u64,
                    e.error_code(),
                    e.to_string(),
                )
            }
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Built-in commands
// ===========================================================================

/// `perceive` – dump and flatten the current screen.
///
/// Args: `{}`
/// Returns: a `ScreenState` object.
fn cmd_perceive(_args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let state = perception::capture_screen(ctx)?;
    serde_json::to_value(&state).map_err(|e| CommandError::Other(e.to_string()))
}

/// `act` – execute one action.
///
/// Args: an action object, e.g. `{ "action": "tap", "coordinates": [540, 1200] }`
/// Returns: `{ "status": "success", "action": "tap", "message": "..." }`
fn cmd_act(args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let req = executor::parse_action(&args).map_err(|e| CommandError::InvalidInput(e.to_string()))?;
    let outcome = executor::execute(ctx, &req);
    match (outcome.status, outcome.failure) {
        (OutcomeStatus::Success, _) => {
            serde_json::to_value(&outcome).map_err(|e| CommandError::Other(e.to_string()))
        }
        (OutcomeStatus::Error, Some(FailureKind::NotConnected)) => {
            Err(CommandError::NotConnected(outcome.message))
        }
        (OutcomeStatus::Error, Some(FailureKind::Invalid)) => {
            Err(CommandError::InvalidInput(outcome.message))
        }
        (OutcomeStatus::Error, _) => Err(CommandError::ActionFailed(outcome.message)),
    }
}

/// `devices` – list devices known to adb.
///
/// Returns: `{ "devices": [{ "serial": "...", "state": "device" }], "selected": null }`
fn cmd_devices(_args: Value, ctx: &AppContext) -> Result<Value, CommandError> {
    let devices = ctx.bridge().devices()?;
    Ok(serde_json::json!({
        "devices": devices,
        "selected": ctx.bridge().selected_serial(),
    }))
}

// ===========================================================================
// Tests
// ===========================================================================
