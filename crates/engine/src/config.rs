//! Layered configuration.
//!
//! Sources, later wins: embedded defaults, `droidctl.yaml`, `.droidctl.yaml`,
//! an explicit `--config` file, then `DROID__SECTION__KEY` environment
//! variables.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULTS: &str = include_str!("../default_config.yaml");

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub adb: AdbConfig,
    pub perception: PerceptionConfig,
    pub executor: ExecutorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AdbConfig {
    pub path: String,
    /// Empty means "whichever single device adb picks".
    #[serde(default)]
    pub serial: String,
}

impl AdbConfig {
    pub fn serial(&self) -> Option<&str> {
        let s = self.serial.trim();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PerceptionConfig {
    /// On-device path uiautomator writes the dump to.
    pub dump_path: String,
    pub compressed: bool,
    pub dump_attempts: u32,
    /// Keep labelled but non-interactive nodes (plain text) as `read` targets.
    pub include_text: bool,
    pub include_disabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExecutorConfig {
    pub wait_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub format: LoggingFormatConfig,
    pub levels: LoggingLevelsConfig,
    #[serde(default)]
    pub redaction: RedactionConfig,
    pub action_log: ActionLogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingFormatConfig {
    pub show_time: bool,
    pub location: LoggingLocationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingLocationConfig {
    pub show_file: bool,
    pub show_line: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingLevelsConfig {
    pub debug: bool,
    pub info: bool,
    pub warning: bool,
    pub error: bool,
    pub critical: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedactionConfig {
    #[serde(default = "true_default")]
    pub enabled: bool,
    #[serde(default)]
    pub patterns: Vec<RedactionPattern>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: true_default(),
            patterns: Vec::new(),
        }
    }
}

fn true_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedactionPattern {
    pub name: String,
    pub regex: String,
    pub placeholder: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ActionLogConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub redact_typed_text: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        // The embedded defaults are a compile-time constant covered by tests.
        Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Yaml))
            .build()
            .and_then(Config::try_deserialize)
            .unwrap_or_else(|e| panic!("embedded default config is invalid: {}", e))
    }
}

/// Load configuration, optionally layering an explicit file on top.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::from_str(DEFAULTS, FileFormat::Yaml))
        .add_source(File::with_name("droidctl.yaml").required(false))
        .add_source(File::with_name(".droidctl.yaml").required(false));

    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path.to_path_buf()).required(true));
    }

    // Map nested env vars like DROID__ADB__SERIAL=emulator-5554
    builder = builder.add_source(Environment::with_prefix("DROID").separator("__"));

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    if cfg.perception.dump_attempts == 0 {
        return Err(ConfigError::Message(
            "perception.dump_attempts must be at least 1".into(),
        ));
    }
    Ok(cfg)
}
