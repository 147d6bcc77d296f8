//! Concrete implementations of the device bridge.
//!
//! - [`AdbBridge`]: spawns the real `adb` binary
//! - [`OfflineBridge`]: always returns UNSUPPORTED, for contexts without a device

use crate::traits::*;
use crate::types::DeviceInfo;
use std::path::PathBuf;
use std::process::Command;

// ===========================================================================
// adb – wraps std::process::Command
// ===========================================================================

pub struct AdbBridge {
    adb_path: PathBuf,
    serial: Option<String>,
}

impl AdbBridge {
    pub fn new(adb_path: impl Into<PathBuf>, serial: Option<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial: serial.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn adb_path(&self) -> &std::path::Path {
        &self.adb_path
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(ref serial) = self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        cmd
    }
}

impl DeviceBridge for AdbBridge {
    fn run(&self, args: &[&str]) -> CapResult<AdbOutput> {
        tracing::debug!(adb = %self.adb_path.display(), ?args, "adb");
        let output = self.command(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CapError::DependencyMissing(format!("{} not found", self.adb_path.display()))
            } else {
                CapError::Io(e)
            }
        })?;

        Ok(AdbOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            // Killed by a signal: no exit code.
            code: output.status.code().unwrap_or(-1),
        })
    }

    fn selected_serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }
}

// ===========================================================================
// Offline bridge – returns UNSUPPORTED cleanly
// ===========================================================================

/// Bridge stub for contexts without a device. Never panics.
pub struct OfflineBridge;

impl DeviceBridge for OfflineBridge {
    fn run(&self, _args: &[&str]) -> CapResult<AdbOutput> {
        Err(CapError::Unsupported("no device bridge in offline mode".into()))
    }

    fn selected_serial(&self) -> Option<&str> {
        None
    }
}

// ===========================================================================
// Parsing helpers
// ===========================================================================

/// Parse `adb devices` output into serial/state pairs.
pub fn parse_device_list(stdout: &str) -> Vec<DeviceInfo> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of devices") && !l.starts_with('*'))
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some(DeviceInfo {
                serial: serial.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_listing() {
        let out = "* daemon not running; starting now at tcp:5037\n\
                   * daemon started successfully\n\
                   List of devices attached\n\
                   emulator-5554\tdevice product:sdk_gphone64 model:Pixel transport_id:1\n\
                   R58M12345\tunauthorized\n\n";
        let devices = parse_device_list(out);
        assert_eq!(
            devices,
            vec![
                DeviceInfo {
                    serial: "emulator-5554".into(),
                    state: "device".into()
                },
                DeviceInfo {
                    serial: "R58M12345".into(),
                    state: "unauthorized".into()
                },
            ]
        );
        assert!(devices[0].is_ready());
        assert!(!devices[1].is_ready());
    }

    #[test]
    fn missing_adb_is_dependency_missing() {
        let bridge = AdbBridge::new("/nonexistent/bin/adb-for-tests", None);
        match bridge.run(&["devices"]) {
            Err(CapError::DependencyMissing(msg)) => assert!(msg.contains("adb-for-tests")),
            other => panic!("expected DependencyMissing, got {:?}", other),
        }
        assert!(!bridge.is_connected());
    }

    #[test]
    fn blank_serial_is_ignored() {
        let bridge = AdbBridge::new("adb", Some("  ".into()));
        assert_eq!(bridge.selected_serial(), None);
    }

    #[test]
    fn offline_bridge_is_unsupported() {
        assert!(matches!(OfflineBridge.run(&["devices"]), Err(CapError::Unsupported(_))));
        assert!(!OfflineBridge.is_connected());
    }
}
