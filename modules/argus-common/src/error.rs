use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArgusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ArgusError {
    /// The bare reason, without the variant prefix. Surfaced to HTTP
    /// callers as the machine-readable message.
    pub fn reason(&self) -> &str {
        match self {
            ArgusError::Config(reason) | ArgusError::Validation(reason) => reason,
        }
    }
}
