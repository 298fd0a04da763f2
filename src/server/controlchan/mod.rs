//! The control channel: framing, parsing, dispatch and the session loop.

pub(crate) mod codecs;
pub(crate) mod command;
pub(crate) mod commands;
pub(crate) mod control_loop;
pub(crate) mod error;
pub(crate) mod handler;
pub(crate) mod line_parser;
pub(crate) mod reply;

pub(crate) use control_loop::LoopConfig;
pub(crate) use reply::{Reply, ReplyCode};

use crate::storage;

// Translates a storage back-end failure into the reply the client gets.
pub(crate) fn reply_for_storage_error(err: &storage::Error) -> Reply {
    use storage::ErrorKind::*;
    match err.kind() {
        TransientFileNotAvailable => Reply::new(ReplyCode::TransientFileError, "Temporarily unavailable"),
        PermanentFileNotAvailable => Reply::new(ReplyCode::FileError, "File or directory not available"),
        PermissionDenied => Reply::new(ReplyCode::FileError, "Permission denied"),
        LocalError => Reply::new(ReplyCode::LocalError, "Local processing error"),
        InsufficientStorageSpaceError => Reply::new(ReplyCode::OutOfSpace, "Insufficient storage space"),
        ExceededStorageAllocationError => Reply::new(ReplyCode::ExceededStorageAllocation, "Exceeded storage allocation"),
        FileNameNotAllowedError => Reply::new(ReplyCode::BadFileName, "File name not allowed"),
        CommandNotImplemented => Reply::new(ReplyCode::CommandNotImplemented, "Command not implemented"),
    }
}
