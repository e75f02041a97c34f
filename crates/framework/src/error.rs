use krmkit_yaml as yaml;

/// Everything that makes an invocation fatal.
///
/// A Result Set holding Error items is not an `Error`: it is reported as
/// [`crate::Status::ValidationFailed`] and the output is still written.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed envelope.
    #[error("malformed ResourceList: {0}")]
    Format(String),
    /// Structural access on the wrong node shape.
    #[error(transparent)]
    Type(yaml::Error),
    /// functionConfig could not be bound.
    #[error("functionConfig: {0}")]
    Config(String),
    /// The transform returned a hard error.
    #[error("function failed: {0:#}")]
    Invocation(anyhow::Error),
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl From<yaml::Error> for Error {
    fn from(e: yaml::Error) -> Self {
        match e {
            yaml::Error::Type { .. } => Error::Type(e),
            other => Error::Format(other.to_string()),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
