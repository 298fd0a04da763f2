//! The RFC 959 Abort (`ABOR`) command

use crate::{
    auth::UserDetail,
    server::controlchan::{
        Reply, ReplyCode,
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
    },
    storage::{Metadata, StorageBackend},
};
use async_trait::async_trait;
use std::sync::atomic::Ordering;

#[derive(Debug)]
pub struct Abor;

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Abor
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        let negotiated = session.data_abort_tx.is_some() || session.data_cmd_tx.is_some();
        let busy = session.data_busy.load(Ordering::SeqCst);
        session.reset_data_channel();
        if !negotiated {
            Ok(Reply::new(ReplyCode::DataConnectionOpen, "No transfer to abort"))
        } else if busy {
            // RFC 959 wants two replies when a transfer was actually torn
            // down: one for the transfer, one for the ABOR.
            Ok(Reply::Sequence(vec![
                Reply::new(ReplyCode::ConnectionClosed, "Transfer aborted"),
                Reply::new(ReplyCode::ClosingDataConnection, "ABOR command successful"),
            ]))
        } else {
            Ok(Reply::new(ReplyCode::DataConnectionOpen, "ABOR command successful; data channel closed"))
        }
    }
}
