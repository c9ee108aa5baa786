use thiserror::Error;

/// Failures while shaping a metric for the wire or setting up logging.
#[derive(Debug, Error)]
pub enum Error {
    /// Logging or other shared setup could not be applied.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON payload error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CBOR payload error: {0}")]
    Cbor(String),

    /// The value cannot be carried by the requested payload format.
    #[error("Cannot encode payload: {0}")]
    Encode(String),

    /// A topic string that MQTT would refuse to publish to.
    #[error("Invalid topic: {0}")]
    Topic(String),
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Cbor(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
