use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Everything an adapter or transport can fail with.
///
/// Each variant carries a stable numeric code (see [`Error::code`]) so that
/// hosts bridging to C or to a remote API can report failures without string
/// matching. An error never leaves an adapter unusable: the next call retries
/// the connection where the protocol has one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("device not found")]
    DeviceNotFound,
    #[error("device initialisation failed")]
    DeviceInitFailed,
    #[error("failed to configure pins")]
    PinConfigFailed,
    #[error("read error")]
    ReadError,
    #[error("write error")]
    WriteError,
    #[error("no acknowledge from the unit")]
    AckFailure,
    #[error("device too slow")]
    DeviceTooSlow,
    #[error("wrong mode")]
    WrongMode,
    #[error("timed out")]
    Timeout,
    #[error("checksum mismatch")]
    InvalidCrc,
    #[error("invalid data")]
    InvalidData,
    #[error("not supported")]
    NotSupported,
    #[error("invalid parameters")]
    InvalidParameters,
    #[error("invalid state")]
    InvalidState,
    #[error("not connected")]
    NotConnected,
    #[error("invalid reply")]
    InvalidReply,
    #[error("unit reported error code {0}")]
    UnitFault(u8),
}

impl Error {
    /// Numeric code of this error. Success is `0`, errors count down from `-1`.
    pub fn code(&self) -> i32 {
        match self {
            Error::DeviceNotFound => -1,
            Error::DeviceInitFailed => -2,
            Error::PinConfigFailed => -3,
            Error::ReadError | Error::UnitFault(_) => -4,
            Error::WriteError => -5,
            Error::AckFailure => -6,
            Error::DeviceTooSlow => -7,
            Error::WrongMode => -8,
            Error::Timeout => -9,
            Error::InvalidCrc => -10,
            Error::InvalidData => -11,
            Error::NotSupported => -12,
            Error::InvalidParameters => -13,
            Error::InvalidState => -14,
            Error::NotConnected => -15,
            Error::InvalidReply => -16,
        }
    }
}
