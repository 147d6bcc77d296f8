//! Application context – holds the device bridge, action log, and config.

use crate::action_log::ActionLog;
use crate::config::AppConfig;
use crate::platform::{AdbBridge, OfflineBridge};
use crate::traits::DeviceBridge;

/// Central context passed to all engine operations.
///
/// Holds the bridge as a trait object so callers (CLI / tests) can swap the
/// real adb binary for a scripted one.
pub struct AppContext {
    bridge: Box<dyn DeviceBridge>,
    action_log: ActionLog,
    config: AppConfig,
}

impl AppContext {
    pub fn new(bridge: Box<dyn DeviceBridge>, action_log: ActionLog, config: AppConfig) -> Self {
        Self {
            bridge,
            action_log,
            config,
        }
    }

    /// Context backed by the real adb binary named in the config.
    pub fn from_config(config: AppConfig) -> Self {
        let bridge = AdbBridge::new(&config.adb.path, config.adb.serial().map(String::from));
        let action_log = ActionLog::from_config(&config.logging.action_log);
        Self {
            bridge: Box::new(bridge),
            action_log,
            config,
        }
    }

    /// Context with no device and no action log.
    pub fn offline() -> Self {
        Self {
            bridge: Box::new(OfflineBridge),
            action_log: ActionLog::disabled(),
            config: AppConfig::default(),
        }
    }

    pub fn bridge(&self) -> &dyn DeviceBridge {
        self.bridge.as_ref()
    }

    pub fn action_log(&self) -> &ActionLog {
        &self.action_log
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
