use crate::types::DeviceInfo;

/// Result type for bridge operations that may be unsupported.
pub type CapResult<T> = Result<T, CapError>;

#[derive(Debug, thiserror::Error)]
pub enum CapError {
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("dependency missing: {0}")]
    DependencyMissing(String),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Captured output of one adb invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdbOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl AdbOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// stderr if present, otherwise stdout. adb reports some failures on stdout.
    pub fn failure_message(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_string()
        } else {
            err.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Device bridge
// ---------------------------------------------------------------------------

pub trait DeviceBridge: Send + Sync {
    /// Run one adb invocation. Implementations scope it to the selected
    /// serial themselves; `args` never carry `-s`.
    fn run(&self, args: &[&str]) -> CapResult<AdbOutput>;

    fn selected_serial(&self) -> Option<&str>;

    fn devices(&self) -> CapResult<Vec<DeviceInfo>> {
        let out = self.run(&["devices"])?;
        if !out.success() {
            return Err(CapError::Other(format!(
                "adb devices exited with {}: {}",
                out.code,
                out.failure_message()
            )));
        }
        Ok(crate::platform::parse_device_list(&out.stdout))
    }

    fn is_connected(&self) -> bool {
        let devices = match self.devices() {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(error = %e, "device listing failed");
                return false;
            }
        };
        match self.selected_serial() {
            Some(serial) => devices.iter().any(|d| d.serial == serial && d.is_ready()),
            None => devices.iter().any(DeviceInfo::is_ready),
        }
    }
}
