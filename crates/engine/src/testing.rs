//! Scripted bridge for unit tests: records every adb invocation and replays
//! canned replies keyed by argument prefix.

use crate::traits::{AdbOutput, CapError, CapResult, DeviceBridge};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Clone)]
enum Reply {
    Output(AdbOutput),
    Error(String),
}

pub(crate) struct ScriptedBridge {
    serial: Option<String>,
    replies: Mutex<Vec<(String, VecDeque<Reply>)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBridge {
    pub(crate) fn new() -> Self {
        Self {
            serial: None,
            replies: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A bridge that reports one ready device.
    pub(crate) fn connected() -> Self {
        Self::new().respond("devices", "List of devices attached\nemulator-5554\tdevice\n")
    }

    pub(crate) fn with_serial(mut self, serial: &str) -> Self {
        self.serial = Some(serial.to_string());
        self
    }

    pub(crate) fn respond(self, prefix: &str, stdout: &str) -> Self {
        self.reply(
            prefix,
            AdbOutput {
                stdout: stdout.to_string(),
                ..Default::default()
            },
        )
    }

    pub(crate) fn fail(self, prefix: &str, code: i32, stderr: &str) -> Self {
        self.reply(
            prefix,
            AdbOutput {
                stderr: stderr.to_string(),
                code,
                ..Default::default()
            },
        )
    }

    pub(crate) fn error(self, prefix: &str, message: &str) -> Self {
        self.push(prefix, Reply::Error(message.to_string()))
    }

    /// Queue a reply. Repeated prefixes are consumed in order; the last one sticks.
    pub(crate) fn reply(self, prefix: &str, out: AdbOutput) -> Self {
        self.push(prefix, Reply::Output(out))
    }

    fn push(self, prefix: &str, reply: Reply) -> Self {
        {
            let mut replies = self.replies.lock().unwrap();
            match replies.iter_mut().find(|(p, _)| p == prefix) {
                Some((_, queue)) => queue.push_back(reply),
                None => replies.push((prefix.to_string(), VecDeque::from([reply]))),
            }
        }
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than the `devices` connectivity checks.
    pub(crate) fn device_calls(&self) -> Vec<String> {
        self.calls().into_iter().filter(|c| c != "devices").collect()
    }
}

impl DeviceBridge for ScriptedBridge {
    fn run(&self, args: &[&str]) -> CapResult<AdbOutput> {
        let line = args.join(" ");
        self.calls.lock().unwrap().push(line.clone());

        let mut replies = self.replies.lock().unwrap();
        let reply = replies
            .iter_mut()
            .find(|(p, _)| line.starts_with(p.as_str()))
            .and_then(|(_, queue)| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            });

        match reply {
            Some(Reply::Output(out)) => Ok(out),
            Some(Reply::Error(msg)) => Err(CapError::Other(msg)),
            None => Ok(AdbOutput::default()),
        }
    }

    fn selected_serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }
}
