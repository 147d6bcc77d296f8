//! Executor – validate one action JSON object and carry it out over adb.
//!
//! The action vocabulary is fixed: `tap`, `type`, `home`, `back`, `wait`,
//! `done`. Every executed action is appended to the action log.

use crate::context::AppContext;
use crate::traits::AdbOutput;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const VALID_ACTIONS: [&str; 6] = ["tap", "type", "home", "back", "wait", "done"];

const NOT_CONNECTED_MESSAGE: &str = "No Android device connected";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("{0}")]
    Invalid(String),
}

fn invalid(msg: impl Into<String>) -> ActionError {
    ActionError::Invalid(msg.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tap,
    Type,
    Home,
    Back,
    Wait,
    Done,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Tap => "tap",
            ActionKind::Type => "type",
            ActionKind::Home => "home",
            ActionKind::Back => "back",
            ActionKind::Wait => "wait",
            ActionKind::Done => "done",
        }
    }

    fn failure_label(&self) -> &'static str {
        match self {
            ActionKind::Tap => "Tap",
            ActionKind::Type => "Type",
            ActionKind::Home => "Home",
            ActionKind::Back => "Back",
            ActionKind::Wait => "Wait",
            ActionKind::Done => "Done",
        }
    }

    fn needs_device(&self) -> bool {
        !matches!(self, ActionKind::Wait | ActionKind::Done)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Tap { x: i64, y: i64 },
    Type { text: String },
    Home,
    Back,
    Wait,
    Done,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Tap { .. } => ActionKind::Tap,
            Action::Type { .. } => ActionKind::Type,
            Action::Home => ActionKind::Home,
            Action::Back => ActionKind::Back,
            Action::Wait => ActionKind::Wait,
            Action::Done => ActionKind::Done,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: Action,
    /// Free-form justification from the agent; logged, never interpreted.
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Why an action did not succeed. Kept out of the JSON outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Invalid,
    NotConnected,
    /// adb ran and reported failure.
    Rejected,
    /// adb could not be run at all.
    Bridge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    pub message: String,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl ActionOutcome {
    fn success(kind: ActionKind, message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            action: Some(kind),
            message: message.into(),
            failure: None,
        }
    }

    fn error(failure: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            action: None,
            message: message.into(),
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn is_done(&self) -> bool {
        self.is_success() && self.action == Some(ActionKind::Done)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an action object and turn it into a typed request.
pub fn parse_action(value: &Value) -> Result<ActionRequest, ActionError> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid("Action must be a JSON object"))?;

    let raw = obj
        .get("action")
        .ok_or_else(|| invalid("Missing 'action' field"))?;
    let verb = match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let action = match verb.as_str() {
        "tap" => {
            let coords = obj
                .get("coordinates")
                .ok_or_else(|| invalid("tap action requires 'coordinates' field"))?;
            let (x, y) = parse_coordinates(coords)?;
            Action::Tap { x, y }
        }
        "type" => {
            let text = obj
                .get("text")
                .ok_or_else(|| invalid("type action requires 'text' field"))?
                .as_str()
                .ok_or_else(|| invalid("text must be a string"))?;
            if text.is_empty() {
                return Err(invalid("text must not be empty"));
            }
            if text.chars().any(|c| c.is_control() && c != '\t') {
                return Err(invalid("text must not contain control characters"));
            }
            Action::Type {
                text: text.to_string(),
            }
        }
        "home" => Action::Home,
        "back" => Action::Back,
        "wait" => Action::Wait,
        "done" => Action::Done,
        _ => {
            let valid: Vec<String> = VALID_ACTIONS.iter().map(|a| format!("'{}'", a)).collect();
            return Err(invalid(format!(
                "Invalid action type '{}'. Must be one of: [{}]",
                verb,
                valid.join(", ")
            )));
        }
    };

    let reason = obj.get("reason").and_then(Value::as_str).map(String::from);
    Ok(ActionRequest { action, reason })
}

fn parse_coordinates(value: &Value) -> Result<(i64, i64), ActionError> {
    let pair = match value.as_array() {
        Some(a) if a.len() == 2 => a,
        _ => return Err(invalid("coordinates must be [x, y] array")),
    };
    let mut out = [0i64; 2];
    for (slot, v) in out.iter_mut().zip(pair) {
        // Integers stay exact; floats truncate toward zero.
        let n = match (v.as_i64(), v.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) => f.trunc() as i64,
            (None, None) => return Err(invalid("coordinates must be numeric")),
        };
        if n < 0 {
            return Err(invalid("coordinates must be non-negative"));
        }
        *slot = n;
    }
    Ok((out[0], out[1]))
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Encode text for `adb shell input text`.
///
/// Spaces and tabs become `%s`; shell metacharacters are backslash-escaped
/// because adb hands the argument to the device shell unquoted. Other control
/// characters are dropped: a backslash cannot neutralise a newline.
pub fn encode_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' ' | '\t' => out.push_str("%s"),
            c if c.is_control() => {}
            '\\' | '\'' | '"' | '`' | '$' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '*'
            | '?' | '~' | '#' | '!' | '[' | ']' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Seconds rounded to one decimal, without a trailing `.0`.
fn format_seconds(d: Duration) -> String {
    let tenths = (d.as_millis() + 50) / 100;
    if tenths % 10 == 0 {
        (tenths / 10).to_string()
    } else {
        format!("{}.{}", tenths / 10, tenths % 10)
    }
}

/// Validate and execute a raw action object.
pub fn execute_value(ctx: &AppContext, value: &Value) -> ActionOutcome {
    match parse_action(value) {
        Ok(req) => execute(ctx, &req),
        Err(e) => {
            tracing::warn!(error = %e, "rejected action");
            ActionOutcome::error(FailureKind::Invalid, e.to_string())
        }
    }
}

/// Execute a validated action on the device.
pub fn execute(ctx: &AppContext, req: &ActionRequest) -> ActionOutcome {
    let kind = req.action.kind();
    tracing::info!(action = %kind, reason = req.reason.as_deref().unwrap_or(""), "executing action");

    if kind.needs_device() && !ctx.bridge().is_connected() {
        return ActionOutcome::error(FailureKind::NotConnected, NOT_CONNECTED_MESSAGE);
    }

    let log = ctx.action_log();
    match &req.action {
        Action::Tap { x, y } => {
            let (xs, ys) = (x.to_string(), y.to_string());
            let details = format!("{},{}", x, y);
            run_input(
                ctx,
                kind,
                &["shell", "input", "tap", xs.as_str(), ys.as_str()],
                &details,
                format!("Tapped at ({}, {})", x, y),
            )
        }
        Action::Type { text } => {
            let encoded = encode_input_text(text);
            let details = if log.redacts_typed_text() {
                "<redacted>"
            } else {
                text.as_str()
            };
            run_input(
                ctx,
                kind,
                &["shell", "input", "text", encoded.as_str()],
                details,
                format!("Typed: {}", text),
            )
        }
        Action::Home => run_input(
            ctx,
            kind,
            &["shell", "input", "keyevent", "KEYCODE_HOME"],
            "",
            "Pressed Home button".to_string(),
        ),
        Action::Back => run_input(
            ctx,
            kind,
            &["shell", "input", "keyevent", "KEYCODE_BACK"],
            "",
            "Pressed Back button".to_string(),
        ),
        Action::Wait => {
            let wait = Duration::from_millis(ctx.config().executor.wait_ms);
            std::thread::sleep(wait);
            let secs = format_seconds(wait);
            log.record(kind.as_str(), &format!("{}s", secs), "SUCCESS");
            ActionOutcome::success(kind, format!("Waited {} seconds", secs))
        }
        Action::Done => {
            log.record(kind.as_str(), "", "SUCCESS");
            ActionOutcome::success(kind, "Goal achieved - task complete")
        }
    }
}

fn run_input(
    ctx: &AppContext,
    kind: ActionKind,
    args: &[&str],
    details: &str,
    success_message: String,
) -> ActionOutcome {
    let log = ctx.action_log();
    match ctx.bridge().run(args) {
        Ok(out) if out.success() => {
            log.record(kind.as_str(), details, "SUCCESS");
            ActionOutcome::success(kind, success_message)
        }
        Ok(out) => {
            let msg = failure_text(&out);
            log.record(kind.as_str(), details, &format!("ERROR: {}", msg));
            ActionOutcome::error(
                FailureKind::Rejected,
                format!("{} failed: {}", kind.failure_label(), msg),
            )
        }
        Err(e) => {
            log.record(kind.as_str(), "", &format!("ERROR: {}", e));
            ActionOutcome::error(FailureKind::Bridge, format!("Execution error: {}", e))
        }
    }
}

fn failure_text(out: &AdbOutput) -> String {
    let msg = out.failure_message();
    if msg.is_empty() {
        format!("adb exited with {}", out.code)
    } else {
        msg
    }
}
