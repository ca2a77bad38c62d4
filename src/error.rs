use crate::transport::TransportError;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Coarse classification of [`Error`], matching the failure classes a host
/// binding surfaces to its caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Argument,
    HardwareAcquisition,
    Transmit,
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum Error {
    /// Missing or malformed initialize argument.
    #[display("invalid configuration: {_0}")]
    Config(#[error(not(source))] String),

    /// Host options could not be parsed.
    #[display("invalid options: {_0}")]
    #[from]
    Options(#[error(source)] serde_json::Error),

    /// The driver has not been initialized, or has been reset.
    #[display("driver not initialized")]
    NotInitialized,

    /// Wrong value passed to a running driver.
    #[display("invalid argument: {_0}")]
    Argument(#[error(not(source))] String),

    /// DMA/PWM resource unavailable or already held.
    #[display("hardware acquisition failed: {_0}")]
    HardwareAcquisition(#[error(source)] TransportError),

    /// The transport reported a failed or timed-out transfer.
    #[display("transmit failed: {_0}")]
    Transmit(#[error(source)] TransportError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::Options(_) | Error::NotInitialized => ErrorKind::Config,
            Error::Argument(_) => ErrorKind::Argument,
            Error::HardwareAcquisition(_) => ErrorKind::HardwareAcquisition,
            Error::Transmit(_) => ErrorKind::Transmit,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        Error::Argument(msg.into())
    }
}
