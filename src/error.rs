// Error taxonomy for the signal pipeline
// Indicator and API failures abort a single cycle, never the event loop

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// Indicator window shorter than the calculator requires.
    #[error("insufficient data: need {needed} candles, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Contract violation in caller-supplied arguments. Fail fast, no retry.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transport or exchange failure (REST, websocket, sentiment provider).
    #[error("api error: {0}")]
    Api(String),

    /// Notification delivery failure. Logged, never retried in the scoring path.
    #[error("dispatch error: {0}")]
    Dispatch(String),
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Api(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
