//! Our error types for the X10A decoder.

use thiserror::Error;

use crate::{binding::BindingError, config::ConfigError, conversion::DecodeError, frame::FrameError};

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for Daikin X10A communications and configuration.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Communication timeout")]
    Timeout,
    #[error("Device rejected the registry query (NAK)")]
    Nak,
    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] FrameError),
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl<I: embedded_io::Error> Error<I> {
    /// Transient errors only cost the current sweep a value; the rest point at a bad configuration.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::SerialError(_)
                | Error::Timeout
                | Error::Nak
                | Error::MalformedResponse(_)
                | Error::Decode(_)
        )
    }
}
