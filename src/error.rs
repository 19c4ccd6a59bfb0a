use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoftLayerError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("API request failed with status {status}: {message}")]
    ApiError {
        status: u16,
        message: String,
    },

    #[error("Client for service {0} has been dropped")]
    ClientDropped(String),

    #[error("Unexpected response: {0}")]
    ResponseError(String),
}
