//! Turns raw command lines into typed [`Command`](super::command::Command)s.

mod error;
mod parser;

pub use error::{ParseError, ParseErrorKind};
pub use parser::parse;
