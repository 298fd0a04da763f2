//! Contains code pertaining to the communication between the data and control channels.

use super::controlchan::Reply;
use crate::server::controlchan::command::DataType;
use std::net::SocketAddr;
use std::path::PathBuf;

// Messages sent to the control loop over its internal message channel, mostly
// by the data channel loop to report transfer progress and outcome.
#[derive(Debug)]
pub enum ControlChanMsg {
    /// The data connection is up and the transfer is starting.
    SendingData,
    /// A retrieve finished, `bytes` were sent to the client.
    SentData {
        /// The number of bytes transferred to the client.
        bytes: u64,
    },
    /// A store finished, `bytes` were written to the storage back-end.
    WrittenData {
        /// The number of bytes stored.
        bytes: u64,
    },
    /// A directory listing was streamed completely.
    DirectorySuccessfullyListed,
    /// The data connection broke down mid-transfer.
    ConnectionReset,
    /// The data connection could not be established in time.
    DataConnectionFailed,
    /// An inbound passive connection came from an address other than the
    /// control peer and was refused.
    DataPeerRejected {
        /// The rejected peer address.
        peer: SocketAddr,
    },
    /// The storage back-end failed; the error dictates the reply code.
    StorageError(crate::storage::Error),
    /// An asynchronously produced reply that should go out as-is.
    CommandChannelReply(Reply),
    /// The client did `AUTH TLS` and the control channel must be upgraded
    /// after the 234 reply is flushed.
    SecureControlChannel,
    /// The control loop should end, e.g. after `QUIT`.
    ExitControlLoop,
}

// The transfer the control loop asks the data channel loop to perform. All
// transfer parameters are captured at command time so that later commands on
// the control channel cannot change a transfer already underway.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DataChanCmd {
    Retr {
        path: PathBuf,
        /// Restart offset into the untranslated byte stream.
        offset: u64,
        data_type: DataType,
    },
    Stor {
        path: PathBuf,
        /// Restart or append offset; 0 truncates.
        offset: u64,
        data_type: DataType,
    },
    List {
        path: PathBuf,
    },
    Nlst {
        path: PathBuf,
    },
    Mlsd {
        path: PathBuf,
    },
}
