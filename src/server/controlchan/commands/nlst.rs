//! The RFC 959 Name List (`NLST`) command

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
pub struct Nlst {
    path: Option<String>,
}

impl Nlst {
    pub fn new(path: Option<String>) -> Self {
        Nlst { path }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Nlst
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        if !session.user_perms().contains(Perms::LIST) {
            return Ok(Reply::new(ReplyCode::FileError, "Permission denied"));
        }
        let path = match &self.path {
            Some(path) => session.resolve_path(path),
            None => session.cwd.clone(),
        };
        match session.data_cmd_tx.take() {
            Some(tx) => {
                if tx.send(DataChanCmd::Nlst { path }).await.is_err() {
                    session.reset_data_channel();
                    return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Can't open data connection"));
                }
                Ok(Reply::none())
            }
            None => Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Use PORT or PASV first.")),
        }
    }
}
