use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the scan pipeline can hit. All of them are fatal.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid parameters, {0}")]
    Configuration(String),

    #[error("unable to start telemetry session: {0}")]
    SessionInit(String),

    #[error("unable to load SDK config: {0}")]
    ClientInit(String),

    #[error("Scan API call failed: {0}")]
    Request(#[from] SdkError<ScanError>),

    #[error("unable to decode records: {0}")]
    Decode(#[from] DecodeError),
}

impl Error {
    /// Name of the pipeline stage that produced the error, used as a log field.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::SessionInit(_) => "session",
            Error::ClientInit(_) => "client",
            Error::Request(_) => "scan",
            Error::Decode(_) => "decode",
        }
    }
}

/// Raised when a scanned item does not map onto a [`crate::record::Record`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("item {index}: missing attribute `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("item {index}: attribute `{field}` is not of type {expected}")]
    WrongType {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },

    #[error("item {index}: attribute `{field}` element {position} is not a string")]
    NonStringElement {
        index: usize,
        field: &'static str,
        position: usize,
    },
}
