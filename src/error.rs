use derive_more::{Display, Error, From};
use embassy_executor::SpawnError;

/// Result type for this crate, using [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors returned by the station supervisor, the PWM resolver, and their collaborators.
#[derive(Debug, Display, Error, From, Clone, Copy)]
#[cfg_attr(not(feature = "host"), derive(defmt::Format))]
pub enum Error {
    /// Radio, network stack, or credentials could not be brought up. Treat as fatal.
    #[display("initialization failed: {_0}")]
    InitializationFailure(#[error(not(source))] &'static str),

    /// The executor had no room for a background task.
    #[display("task spawn failed: {_0:?}")]
    #[from]
    TaskSpawn(#[error(not(source))] SpawnError),

    /// `start` was called on a supervisor that already left `Idle`.
    #[display("station supervisor already started")]
    AlreadyStarted,

    /// No connection outcome arrived within the configured wait.
    #[display("timed out waiting for a connection outcome")]
    ConnectTimeout,

    /// A resolver input that cannot be evaluated (zero frequency or zero timer clock).
    #[display("invalid parameter: {_0}")]
    InvalidParameter(#[error(not(source))] &'static str),

    /// Duty percentage above 100.
    #[display("duty percent {_0} is outside 0..=100")]
    DutyOutOfRange(#[error(not(source))] u8),

    /// The PWM slice cannot produce this frequency from its clock (in hertz).
    #[display("{_0} Hz cannot be produced by this PWM slice")]
    FrequencyUnreachable(#[error(not(source))] u32),

    /// A form submission field was missing or malformed.
    #[display("form field `{_0}` is missing or malformed")]
    FormField(#[error(not(source))] &'static str),

    /// An HTTP request filled the receive buffer (of this many bytes) before it was complete.
    #[display("request exceeds {_0} bytes")]
    RequestTooLarge(#[error(not(source))] usize),

    /// The status page did not fit in its fixed-capacity buffer.
    #[display("status page exceeds its buffer capacity")]
    PageOverflow,

    /// A TCP accept, read, or write failed.
    #[display("network I/O failed")]
    Network,
}

// `SpawnError` does not implement `PartialEq`, so equality is spelled out to match
// what `#[derive(PartialEq, Eq)]` would produce.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InitializationFailure(a), Self::InitializationFailure(b))
            | (Self::InvalidParameter(a), Self::InvalidParameter(b))
            | (Self::FormField(a), Self::FormField(b)) => a == b,
            (Self::TaskSpawn(a), Self::TaskSpawn(b)) => match (a, b) {
                (SpawnError::Busy, SpawnError::Busy) => true,
            },
            (Self::DutyOutOfRange(a), Self::DutyOutOfRange(b)) => a == b,
            (Self::FrequencyUnreachable(a), Self::FrequencyUnreachable(b)) => a == b,
            (Self::RequestTooLarge(a), Self::RequestTooLarge(b)) => a == b,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl Eq for Error {}

impl From<core::fmt::Error> for Error {
    fn from(_: core::fmt::Error) -> Self {
        Self::PageOverflow
    }
}
