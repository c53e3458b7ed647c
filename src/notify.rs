use std::process::{Command, Stdio};

use serde::Deserialize;

use crate::error::TodoError;

/// Something that can put a message in front of the user.
pub trait Notifier: Send {
    fn notify(&self, title: &str, message: &str) -> Result<(), TodoError>;
}

/// Desktop notification programs the daemon knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotifierKind {
    #[default]
    NotifySend,
    Zenity,
}

impl NotifierKind {
    pub fn program(self) -> &'static str {
        match self {
            Self::NotifySend => "notify-send",
            Self::Zenity => "zenity",
        }
    }

    pub fn args(self, title: &str, message: &str) -> Vec<String> {
        match self {
            Self::NotifySend => vec![title.to_string(), message.to_string()],
            Self::Zenity => vec![
                "--info".to_string(),
                format!("--title={title}"),
                format!("--text={message}"),
            ],
        }
    }
}

/// Runs an external notification program and waits for it to exit.
pub struct CommandNotifier {
    kind: NotifierKind,
}

impl CommandNotifier {
    pub fn new(kind: NotifierKind) -> Self {
        Self { kind }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), TodoError> {
        let program = self.kind.program();
        let status = Command::new(program)
            .args(self.kind.args(title, message))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| TodoError::Notification(format!("failed to run {program}: {e}")))?;
        if !status.success() {
            return Err(TodoError::Notification(format!("{program} exited with {status}")));
        }
        Ok(())
    }
}
