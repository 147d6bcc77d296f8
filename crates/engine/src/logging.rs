//! Diagnostic logging via `tracing`.
//!
//! Everything goes to stderr: stdout is reserved for the JSON the external
//! agent reads.

use crate::config::LoggingConfig;
use regex::Regex;
use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

struct RedactingWriter<W> {
    inner: W,
    patterns: Vec<(Regex, String)>,
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = redact(&s, &self.patterns);
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter {
    patterns: Vec<(Regex, String)>,
}

impl<'a> fmt::MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter<io::Stderr>;

    fn make_writer(&self) -> Self::Writer {
        RedactingWriter {
            inner: io::stderr(),
            patterns: self.patterns.clone(),
        }
    }
}

fn redact(line: &str, patterns: &[(Regex, String)]) -> String {
    let mut redacted = line.to_string();
    for (re, replacement) in patterns {
        redacted = re.replace_all(&redacted, replacement.as_str()).to_string();
    }
    redacted
}

/// Most verbose level enabled in the config wins.
pub fn level_from_config(config: &LoggingConfig) -> &'static str {
    let levels = &config.levels;
    if levels.debug {
        "debug"
    } else if levels.info {
        "info"
    } else if levels.warning {
        "warn"
    } else if levels.error || levels.critical {
        "error"
    } else {
        "off"
    }
}

fn compile_patterns(config: &LoggingConfig) -> Vec<(Regex, String)> {
    if !config.redaction.enabled {
        return Vec::new();
    }
    config
        .redaction
        .patterns
        .iter()
        .filter_map(|p| match Regex::new(&p.regex) {
            Ok(re) => Some((re, p.placeholder.clone())),
            Err(e) => {
                eprintln!("warning: skipping redaction pattern '{}': {}", p.name, e);
                None
            }
        })
        .collect()
}

/// Install the global subscriber. `force_debug` comes from `--verbose`.
pub fn init_logging(config: &LoggingConfig, force_debug: bool) {
    let level = if force_debug {
        "debug"
    } else {
        level_from_config(config)
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let show_file = config.format.location.show_file;
    let show_line = config.format.location.show_line;

    let make_writer = RedactingMakeWriter {
        patterns: compile_patterns(config),
    };

    // Use Layer::boxed() to unify the types of the if/else branches
    let fmt_layer = if !config.format.show_time {
        fmt::layer()
            .with_writer(make_writer)
            .with_target(show_file)
            .with_file(show_file)
            .with_line_number(show_line)
            .without_time()
            .boxed()
    } else {
        fmt::layer()
            .with_writer(make_writer)
            .with_target(show_file)
            .with_file(show_file)
            .with_line_number(show_line)
            .boxed()
    };

    // A second init (e.g. in tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
