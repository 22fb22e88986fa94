use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The event source supplied something that is not a 64-bit player id.
    #[error("Invalid player identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Unknown console command: {0}")]
    UnknownCommand(String),
}

impl CoreError {
    /// Short error code used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            CoreError::UnknownCommand(_) => "UNKNOWN_COMMAND",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
