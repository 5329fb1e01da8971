// Error types for the econops client.
// Covers input, transport and serialization failures. Cache failures never surface here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EconopsError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Error parsing JSON data: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Payload is not serializable: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EconopsError {
    /// Whether this error came from bad user input rather than the network.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EconopsError::InvalidJson(_)
                | EconopsError::InvalidInput(_)
                | EconopsError::UnsupportedMethod(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EconopsError>;
