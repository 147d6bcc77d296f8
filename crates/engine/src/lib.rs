//! Engine crate – headless Android device control over adb.
//!
//! Reads the on-screen UI hierarchy with `uiautomator dump`, flattens it into
//! an indexed element list, and executes tap/type/key actions. All device
//! access goes through the [`traits::DeviceBridge`] trait so commands can be
//! exercised without a real device.

pub mod action_log;
pub mod commands;
pub mod config;
pub mod context;
pub mod doctor;
pub mod executor;
pub mod logging;
pub mod perception;
pub mod platform;
pub mod scenario;
pub mod traits;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use commands::CommandRegistry;
pub use config::AppConfig;
pub use context::AppContext;
pub use types::{CommandResult, ErrorCode, ErrorInfo, Status};
