//! The RFC 959 Retrieve (`RETR`) command

use crate::{
    auth::{Perms, UserDetail},
    server::{
        chancomms::DataChanCmd,
        controlchan::{
            Reply, ReplyCode,
            error::ControlChanError,
            handler::{CommandContext, CommandHandler},
        },
    },
    storage::{Metadata, StorageBackend},
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Retr {
    path: String,
}

impl Retr {
    pub fn new(path: String) -> Self {
        Retr { path }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Retr
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        if !session.user_perms().contains(Perms::READ) {
            return Ok(Reply::new(ReplyCode::FileError, "Permission denied"));
        }
        let path = session.resolve_path(&self.path);
        // A REST offset applies to exactly one transfer.
        let offset = session.start_pos;
        session.start_pos = 0;
        let data_type = session.data_type;
        match session.data_cmd_tx.take() {
            Some(tx) => {
                if tx.send(DataChanCmd::Retr { path, offset, data_type }).await.is_err() {
                    session.reset_data_channel();
                    return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Can't open data connection"));
                }
                // The data channel loop reports 150 and the final reply.
                Ok(Reply::none())
            }
            None => Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Use PORT or PASV first.")),
        }
    }
}
