use thiserror::Error;

use crate::classification::ExtractError;
use crate::clients::LlmError;
use crate::util::retry::AttemptError;

/// Why one item could not be classified.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Network failure, timeout or rate limit on the model call.
    #[error("llm call failed: {0}")]
    Transport(String),
    #[error("malformed model response: {0}")]
    MalformedResponse(#[from] ExtractError),
    /// The normalized result violates the result schema.
    #[error("result failed schema validation: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("failed to persist classification: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl ClassifyError {
    /// Whether another attempt at the model call could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::MalformedResponse(_))
    }
}

impl From<LlmError> for ClassifyError {
    fn from(error: LlmError) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<AttemptError<ClassifyError>> for ClassifyError {
    fn from(error: AttemptError<ClassifyError>) -> Self {
        match error {
            AttemptError::TimedOut(limit) => {
                Self::Transport(format!("llm call timed out after {}ms", limit.as_millis()))
            }
            AttemptError::Failed(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn retryability_follows_taxonomy() {
        assert!(ClassifyError::from(LlmError::RateLimited).is_retryable());
        assert!(ClassifyError::from(ExtractError::NoObjectFound).is_retryable());
        assert!(!ClassifyError::Validation(vec!["bad".into()]).is_retryable());
        assert!(!ClassifyError::Persistence(anyhow::anyhow!("db down")).is_retryable());
    }

    #[test]
    fn attempt_timeout_becomes_transport() {
        let error = ClassifyError::from(AttemptError::<ClassifyError>::TimedOut(
            Duration::from_millis(30_000),
        ));
        assert_eq!(error.to_string(), "llm call failed: llm call timed out after 30000ms");
    }

    #[test]
    fn validation_message_lists_every_violation() {
        let error = ClassifyError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(error.to_string(), "result failed schema validation: a; b");
    }
}
