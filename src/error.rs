use thiserror::Error;

/// Shown when a failure carries no usable text of its own.
pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while generating the image";

/// Form problems caught before anything reaches the network.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("seed must be a non-negative integer, got {0:?}")]
    InvalidSeed(String),
    #[error("inference steps must be between {min} and {max}, got {value}")]
    StepsOutOfRange { value: u32, min: u32, max: u32 },
    #[error("guidance scale must be between {min} and {max} in steps of 0.5, got {value}")]
    GuidanceOutOfRange { value: f32, min: f32, max: f32 },
    #[error("unsupported image dimension {0}px")]
    UnsupportedDimension(u32),
    #[error("no example prompt at index {0}")]
    UnknownExample(usize),
}

#[derive(Debug, Error)]
pub enum SdError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    /// Network failure, timeout, or a non-2xx reply without a usable detail.
    #[error("{0}")]
    Transport(String),
    /// Non-2xx reply whose body carried a `detail` field.
    #[error("{detail}")]
    Server { status: u16, detail: String },
    #[error("Response error: {0}")]
    Response(String),
    #[error("A generation request is already in flight")]
    Busy,
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdError {
    /// Text to put in front of the user for a failed attempt. Never empty.
    pub fn user_message(&self) -> String {
        let message = match self {
            SdError::Server { detail, .. } => detail.clone(),
            SdError::Transport(msg) => msg.clone(),
            other => other.to_string(),
        };

        if message.trim().is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, SdError::Transport(_) | SdError::Response(_))
    }
}

impl From<reqwest::Error> for SdError {
    fn from(e: reqwest::Error) -> Self {
        SdError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for SdError {
    fn from(e: serde_json::Error) -> Self {
        SdError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SdError>;
