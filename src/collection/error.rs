use anyhow::anyhow;
use thiserror::Error;

use super::Pid;

/// An error to do with data collection.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// A general error to propagate back up. A wrapper around [`anyhow::Error`].
    #[error(transparent)]
    General(anyhow::Error),

    /// The underlying API explicitly reported that nothing was found. For
    /// accelerator process lists this just means "no processes".
    #[error("the requested data was not found")]
    NotFound,

    /// No accelerator device is present, or it could not be initialized.
    #[error("no accelerator device is available")]
    NoDevice,

    /// The process exited between being listed and being queried.
    #[error("process {0} no longer exists")]
    ProcessGone(Pid),

    /// A fan-out worker went away without reporting a result.
    #[error("the {0} worker exited without a result")]
    Worker(&'static str),
}

impl CollectionError {
    /// Returns whether this error is the "nothing was found" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CollectionError::NotFound)
    }
}

/// A [`Result`] with the error type being a [`CollectionError`].
pub type CollectionResult<T> = Result<T, CollectionError>;

impl From<std::io::Error> for CollectionError {
    fn from(err: std::io::Error) -> Self {
        CollectionError::General(err.into())
    }
}

impl From<&'static str> for CollectionError {
    fn from(msg: &'static str) -> Self {
        CollectionError::General(anyhow!(msg))
    }
}

impl From<anyhow::Error> for CollectionError {
    fn from(err: anyhow::Error) -> Self {
        CollectionError::General(err)
    }
}
