//! Turn settings and results

use std::time::Duration;

use thiserror::Error;

use crate::providers::TransportError;
use crate::types::ToolCallResult;

/// Settings for one [`super::ToolCallLoop`]
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOptions {
    /// How many rounds of tool resolution a turn may perform. With 1, the
    /// reply to the first round of tool results is final.
    pub max_rounds: usize,
    /// Upper bound on each provider send
    pub send_timeout: Option<Duration>,
    /// Check arguments against the declared schema before invoking handlers
    pub validate_arguments: bool,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            max_rounds: 1,
            send_timeout: None,
            validate_arguments: true,
        }
    }
}

impl TurnOptions {
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_arguments = validate;
        self
    }
}

/// Result of a completed turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Final assistant text
    pub text: String,
    /// Every tool call resolved during the turn, in resolution order
    pub tool_results: Vec<ToolCallResult>,
    /// Rounds of tool resolution performed (0 when the model answered directly)
    pub rounds: usize,
}

/// Failure that aborts a turn
///
/// Tool-level failures never show up here; they are folded into the tool
/// results sent back to the model.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type TurnResult<T> = Result<T, TurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TurnOptions::default();
        assert_eq!(options.max_rounds, 1);
        assert_eq!(options.send_timeout, None);
        assert!(options.validate_arguments);
    }

    #[test]
    fn test_max_rounds_floor() {
        assert_eq!(TurnOptions::default().with_max_rounds(0).max_rounds, 1);
        assert_eq!(TurnOptions::default().with_max_rounds(4).max_rounds, 4);
    }

    #[test]
    fn test_turn_error_is_transparent() {
        let err = TurnError::from(TransportError::Other("connection refused".to_string()));
        assert_eq!(err.to_string(), "connection refused");
    }
}
