//! Scripted collaborators for driving a run without touching the host.

use crate::engine::{CommandError, CommandRunner};
use crate::notify::{Notifier, NotifyError};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Clone)]
enum Scripted {
    Ok(String),
    Fail { stdout: String, stderr: String },
}

/// Answers commands from a script; anything unscripted exits with status 1.
///
/// A command scripted more than once answers in order, repeating the last answer.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    script: RefCell<HashMap<String, Vec<Scripted>>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, command: &str, answer: Scripted) -> Self {
        self.script
            .borrow_mut()
            .entry(command.to_string())
            .or_default()
            .push(answer);
        self
    }

    pub fn ok(self, command: &str, stdout: &str) -> Self {
        self.push(command, Scripted::Ok(stdout.to_string()))
    }

    pub fn fail(self, command: &str) -> Self {
        self.fail_with(command, "", "not found")
    }

    pub fn fail_with(self, command: &str, stdout: &str, stderr: &str) -> Self {
        self.push(
            command,
            Scripted::Fail {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        )
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls.borrow().iter().filter(|c| *c == command).count()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str) -> Result<String, CommandError> {
        self.calls.borrow_mut().push(command.to_string());

        let mut script = self.script.borrow_mut();
        let answer = match script.get_mut(command) {
            Some(answers) if answers.len() > 1 => Some(answers.remove(0)),
            Some(answers) => answers.first().cloned(),
            None => None,
        };

        match answer {
            Some(Scripted::Ok(out)) => Ok(out),
            Some(Scripted::Fail { stdout, stderr }) => Err(CommandError::Failed {
                command: command.to_string(),
                code: Some(1),
                stdout,
                stderr,
            }),
            None => Err(CommandError::Failed {
                command: command.to_string(),
                code: Some(1),
                stdout: String::new(),
                stderr: format!("unscripted command: {command}"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Keeps every message it is asked to send; optionally reports failure for each.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: RefCell<Vec<SentMail>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        self.sent.borrow_mut().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        if self.fail {
            return Err(NotifyError::MissingConfig);
        }
        Ok(())
    }
}
