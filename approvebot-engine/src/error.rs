use std::fmt;

use thiserror::Error;

/// Errors that end the handling of one event.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("no review-trigger configuration for {org}/{repo}")]
    ConfigNotFound { org: String, repo: String },

    /// Reads abort before any write is attempted.
    #[error("failed to read {what}")]
    ReadFailure {
        what: String,
        #[source]
        source: anyhow::Error,
    },

    /// Every write was attempted; these are the ones that failed.
    #[error("{0}")]
    WriteFailure(WriteErrors),
}

impl TriggerError {
    pub fn read(what: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ReadFailure {
            what: what.into(),
            source,
        }
    }
}

/// Failed writes of one invocation, in the order they were attempted.
#[derive(Debug, Default)]
pub struct WriteErrors(Vec<String>);

impl WriteErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), TriggerError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(TriggerError::WriteFailure(self))
        }
    }
}

impl fmt::Display for WriteErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}
