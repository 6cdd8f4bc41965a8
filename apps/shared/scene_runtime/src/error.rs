use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A condition did not hold before its deadline
    #[error("Timeout waiting for {what} after {elapsed:?} ({frames} frames, limit {timeout:?})")]
    Timeout {
        what: &'static str,
        elapsed: Duration,
        timeout: Duration,
        frames: u64,
    },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// The scheduler was closed while a procedure was still waiting on it
    #[error("Scheduler closed while a wait was pending")]
    SchedulerClosed,
}

impl RuntimeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RuntimeError::Timeout { .. })
    }
}

/// Fail the current procedure with an `Assertion` error unless `condition` holds
///
/// # Arguments
/// * `condition` - Content-level invariant
/// * `message` - Description used in the error
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(RuntimeError::Assertion(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure() {
        assert!(ensure(true, "never shown").is_ok());
        assert_eq!(
            ensure(false, "expected one animation"),
            Err(RuntimeError::Assertion("expected one animation".to_string()))
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = RuntimeError::Timeout {
            what: "condition",
            elapsed: Duration::from_millis(112),
            timeout: Duration::from_millis(100),
            frames: 7,
        };
        assert!(err.is_timeout());
        let message = err.to_string();
        assert!(message.starts_with("Timeout waiting for condition"));
        assert!(message.contains("7 frames"));
        assert!(!RuntimeError::SchedulerClosed.is_timeout());
    }
}
