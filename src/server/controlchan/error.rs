use crate::BoxError;
use crate::server::controlchan::line_parser::{ParseError, ParseErrorKind};
use derive_more::Display;
use thiserror::Error;

/// The error type produced by the control channel loop.
#[derive(Debug, Error)]
#[error("control channel error: {kind}")]
pub struct ControlChanError {
    kind: ControlChanErrorKind,
    #[source]
    source: Option<BoxError>,
}

impl ControlChanError {
    pub fn new(kind: ControlChanErrorKind) -> Self {
        ControlChanError { kind, source: None }
    }

    pub fn kind(&self) -> &ControlChanErrorKind {
        &self.kind
    }
}

/// A list specifying categories of control channel errors.
#[derive(Debug, Display, PartialEq, Eq)]
pub enum ControlChanErrorKind {
    /// The client issued a command we do not know.
    #[display("Unknown command: {}", command)]
    UnknownCommand {
        /// The unknown verb.
        command: String,
    },
    /// The command line contained non-UTF-8 bytes.
    #[display("Invalid UTF8 in command")]
    Utf8Error,
    /// The command verb was malformed.
    #[display("Invalid command")]
    InvalidCommand,
    /// The command line was not properly terminated.
    #[display("Invalid end-of-line")]
    InvalidEol,
    /// The command argument was malformed or missing.
    #[display("Invalid argument")]
    InvalidArgument,
    /// An IO error on the control connection.
    #[display("IO error")]
    IoError,
    /// Something went wrong that should not have.
    #[display("Internal server error")]
    InternalServerError,
}

impl From<ParseError> for ControlChanError {
    fn from(err: ParseError) -> Self {
        let kind = match err.kind() {
            ParseErrorKind::UnknownCommand { command } => ControlChanErrorKind::UnknownCommand { command: command.clone() },
            ParseErrorKind::InvalidUtf8 => ControlChanErrorKind::Utf8Error,
            ParseErrorKind::InvalidCommand => ControlChanErrorKind::InvalidCommand,
            ParseErrorKind::InvalidEol => ControlChanErrorKind::InvalidEol,
            ParseErrorKind::InvalidArgument => ControlChanErrorKind::InvalidArgument,
        };
        ControlChanError {
            kind,
            source: Some(Box::new(err)),
        }
    }
}

impl From<std::io::Error> for ControlChanError {
    fn from(err: std::io::Error) -> Self {
        ControlChanError {
            kind: ControlChanErrorKind::IoError,
            source: Some(Box::new(err)),
        }
    }
}
