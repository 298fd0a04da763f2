use derive_more::Display;
use thiserror::Error;

/// The error type returned by the command line parser.
#[derive(Debug, Error)]
#[error("parse error: {kind}")]
pub struct ParseError {
    kind: ParseErrorKind,
}

impl ParseError {
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }
}

impl From<ParseErrorKind> for ParseError {
    fn from(kind: ParseErrorKind) -> Self {
        ParseError { kind }
    }
}

/// The kinds of errors the command line parser can produce.
#[derive(Debug, PartialEq, Eq, Display)]
pub enum ParseErrorKind {
    /// The client issued a verb we do not know.
    #[display("Unknown command: {}", command)]
    UnknownCommand {
        /// The verb as sent, uppercased.
        command: String,
    },
    /// The command line was not valid UTF-8.
    #[display("Invalid UTF8 in command")]
    InvalidUtf8,
    /// The command verb contained non-ASCII bytes.
    #[display("Invalid (non-ASCII) command")]
    InvalidCommand,
    /// The line did not end in (CR)LF.
    #[display("Invalid end-of-line")]
    InvalidEol,
    /// The verb is known but its argument is malformed or missing.
    #[display("Invalid argument to command")]
    InvalidArgument,
}
