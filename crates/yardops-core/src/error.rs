use thiserror::Error;

#[derive(Debug, Error)]
pub enum YardopsError {
    /// Unreadable or out-of-range configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl YardopsError {
    /// Short error code string surfaced to the host alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            YardopsError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, YardopsError>;
