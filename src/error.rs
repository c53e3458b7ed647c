use thiserror::Error;

/// Failures the binary reports specially. Store errors travel as
/// `rusqlite::Error` inside an `anyhow::Error`.
#[derive(Debug, Error)]
pub enum TodoError {
    /// Missing or malformed command-line arguments.
    #[error("{0}")]
    Usage(String),

    /// One message per invalid field, all collected before reporting.
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("notification failed: {0}")]
    Notification(String),
}

impl TodoError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }
}
