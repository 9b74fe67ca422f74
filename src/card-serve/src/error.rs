use thiserror::Error;

/// Coarse origin of a pipeline failure. The HTTP contract collapses all of
/// them to a 500, but the logs keep them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Input,
    Backend,
    Storage,
}

#[derive(Error, Debug)]
pub enum Error {
    /// A required environment value is missing or unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The image payload is not valid base64
    #[error("Could not decode image payload: {0}")]
    Decode(String),

    /// The decoded bytes are not an image we can read
    #[error("Could not create image from raw data: {0}")]
    ImageFormat(#[from] image::ImageError),

    /// The inference endpoint could not be reached or failed
    #[error("Inference endpoint invocation failed: {0}")]
    InferenceInvocation(String),

    /// The inference endpoint answered with something we cannot interpret
    #[error("Unexpected inference response: {0}")]
    ResponseShape(String),

    /// Persisting an artifact failed
    #[error("Could not store artifact: {0}")]
    Storage(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Decode(_) | Error::ImageFormat(_) => ErrorKind::Input,
            Error::InferenceInvocation(_) | Error::ResponseShape(_) => ErrorKind::Backend,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
