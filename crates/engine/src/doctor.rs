//! Doctor – check that adb works and a device is reachable.

use crate::context::AppContext;
use crate::traits::CapError;
use crate::types::*;
use std::time::Instant;

/// Run the doctor check and return a full report as a CommandResult.
///
/// `pass` with a ready device, `fail` when adb works but no usable device is
/// attached, `error` when adb itself cannot be run.
pub fn run_doctor(ctx: &AppContext) -> CommandResult {
    let run_id = new_run_id();
    let start = Instant::now();
    let mut steps = std::collections::HashMap::new();

    let t0 = Instant::now();
    let version = ctx.bridge().run(&["version"]);
    steps.insert("adb_version".to_string(), t0.elapsed().as_millis() as u64);

    let (adb_available, adb_version, version_err) = match version {
        Ok(out) if out.success() => (true, out.stdout.lines().next().map(|l| l.trim().to_string()), None),
        Ok(out) => (true, None, Some(CapError::Other(out.failure_message()))),
        Err(e) => (false, None, Some(e)),
    };

    let t1 = Instant::now();
    let devices = if adb_available {
        ctx.bridge().devices().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "device listing failed");
            Vec::new()
        })
    } else {
        Vec::new()
    };
    steps.insert("devices".to_string(), t1.elapsed().as_millis() as u64);

    let selected = ctx.bridge().selected_serial().map(String::from);
    let connected = match selected.as_deref() {
        Some(serial) => devices.iter().any(|d| d.serial == serial && d.is_ready()),
        None => devices.iter().any(DeviceInfo::is_ready),
    };

    let report = DoctorReport {
        adb_path: ctx.config().adb.path.clone(),
        adb_available,
        adb_version,
        devices,
        selected_serial: selected.clone(),
        connected,
        host_os: std::env::consts::OS.to_string(),
        host_arch: std::env::consts::ARCH.to_string(),
    };

    let total = start.elapsed().as_millis() as u64;
    let mut r = if !adb_available {
        let (code, msg) = match version_err {
            Some(CapError::DependencyMissing(m)) => (ErrorCode::DependencyMissing, m),
            Some(CapError::Unsupported(m)) => (ErrorCode::Unsupported, m),
            Some(other) => (ErrorCode::InternalError, other.to_string()),
            None => (ErrorCode::InternalError, "adb unavailable".to_string()),
        };
        result_err("doctor", "device", &run_id, total, code, msg)
    } else if !connected {
        let msg = match selected {
            Some(serial) => format!("device {} is not attached or not ready", serial),
            None => "no ready device attached".to_string(),
        };
        result_fail("doctor", "device", &run_id, total, ErrorCode::DeviceNotConnected, msg)
    } else {
        result_ok("doctor", "device", &run_id, total)
    };
    r.timing_ms.steps = steps;
    r.data = Some(serde_json::to_value(&report).unwrap_or_default());
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_log::ActionLog;
    use crate::config::AppConfig;
    use crate::testing::ScriptedBridge;

    fn ctx(bridge: ScriptedBridge) -> AppContext {
        AppContext::new(Box::new(bridge), ActionLog::disabled(), AppConfig::default())
    }

    #[test]
    fn passes_with_ready_device() {
        let bridge = ScriptedBridge::connected()
            .respond("version", "Android Debug Bridge version 1.0.41\nVersion 35.0.1\n");
        let r = run_doctor(&ctx(bridge));
        assert_eq!(r.status, Status::Pass);
        let data = r.data.unwrap();
        assert_eq!(data["adb_version"], "Android Debug Bridge version 1.0.41");
        assert_eq!(data["connected"], true);
        assert_eq!(data["devices"][0]["serial"], "emulator-5554");
    }

    #[test]
    fn fails_without_device() {
        let bridge = ScriptedBridge::new()
            .respond("version", "Android Debug Bridge version 1.0.41\n")
            .respond("devices", "List of devices attached\nR58M\tunauthorized\n");
        let r = run_doctor(&ctx(bridge));
        assert_eq!(r.status, Status::Fail);
        assert_eq!(r.error.unwrap().code, ErrorCode::DeviceNotConnected);
        assert_eq!(r.data.unwrap()["devices"][0]["state"], "unauthorized");
    }

    #[test]
    fn selected_serial_missing_fails() {
        let bridge = ScriptedBridge::connected().with_serial("R58M");
        let r = run_doctor(&ctx(bridge));
        assert_eq!(r.status, Status::Fail);
        assert!(r.error.unwrap().message.contains("R58M"));
    }

    #[test]
    fn errors_without_adb() {
        let r = run_doctor(&AppContext::offline());
        assert_eq!(r.status, Status::Error);
        assert_eq!(r.error.unwrap().code, ErrorCode::Unsupported);
        assert_eq!(r.data.unwrap()["adb_available"], false);
    }
}
