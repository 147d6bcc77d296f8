//! Flat, append-only record of executed actions.
//!
//! One line per action:
//! `[2026-10-19 14:03:07] ACTION: tap(540,1200) -> SUCCESS`

use crate::config::ActionLogConfig;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ActionLog {
    path: Option<PathBuf>,
    redact_typed_text: bool,
}

impl ActionLog {
    pub fn from_config(cfg: &ActionLogConfig) -> Self {
        Self {
            path: cfg.enabled.then(|| cfg.path.clone()),
            redact_typed_text: cfg.redact_typed_text,
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            redact_typed_text: false,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn redacts_typed_text(&self) -> bool {
        self.redact_typed_text
    }

    /// Append one entry. Failures are reported but never propagated.
    pub fn record(&self, verb: &str, details: &str, status: &str) {
        let Some(ref path) = self.path else {
            return;
        };
        let line = format_entry(&chrono::Local::now(), verb, details, status);
        if let Err(e) = append_line(path, &line) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write action log");
        }
    }
}

pub fn format_entry<Tz: chrono::TimeZone>(
    at: &chrono::DateTime<Tz>,
    verb: &str,
    details: &str,
    status: &str,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "[{}] ACTION: {}({}) -> {}\n",
        at.format("%Y-%m-%d %H:%M:%S"),
        verb,
        single_line(details),
        single_line(status)
    )
}

/// Control characters are written as escapes so an entry never spans lines.
fn single_line(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_control() {
            out.extend(c.escape_debug());
        } else {
            out.push(c);
        }
    }
    out
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}
