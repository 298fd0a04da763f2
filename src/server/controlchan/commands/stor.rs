//! The RFC 959 Store (`STOR`) and Append (`APPE`) commands

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
pub struct Stor {
    path: String,
}

impl Stor {
    pub fn new(path: String) -> Self {
        Stor { path }
    }
}

#[derive(Debug)]
pub struct Appe {
    path: String,
}

impl Appe {
    pub fn new(path: String) -> Self {
        Appe { path }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Stor
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        if !session.user_perms().contains(Perms::WRITE) {
            return Ok(Reply::new(ReplyCode::FileError, "Permission denied"));
        }
        let path = session.resolve_path(&self.path);
        let offset = session.start_pos;
        session.start_pos = 0;
        let data_type = session.data_type;
        match session.data_cmd_tx.take() {
            Some(tx) => {
                if tx.send(DataChanCmd::Stor { path, offset, data_type }).await.is_err() {
                    session.reset_data_channel();
                    return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Can't open data connection"));
                }
                Ok(Reply::none())
            }
            None => Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Use PORT or PASV first.")),
        }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Appe
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        if !session.user_perms().contains(Perms::WRITE) {
            return Ok(Reply::new(ReplyCode::FileError, "Permission denied"));
        }
        // An append always writes at the current end of the file, so a
        // pending restart offset cannot be honored. Refuse the combination
        // and consume the offset like any other transfer command would.
        if session.start_pos > 0 {
            session.start_pos = 0;
            return Ok(Reply::new(ReplyCode::TransientFileError, "Can't APPE while REST is pending"));
        }
        let path = session.resolve_path(&self.path);
        // Appending is storing at the current end of the file.
        let storage = session.storage.clone();
        let user_arc = session.user.clone();
        let user = match &*user_arc {
            Some(user) => user,
            None => return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate")),
        };
        let offset = match storage.metadata(user, &path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        session.start_pos = 0;
        let data_type = session.data_type;
        match session.data_cmd_tx.take() {
            Some(tx) => {
                if tx.send(DataChanCmd::Stor { path, offset, data_type }).await.is_err() {
                    session.reset_data_channel();
                    return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Can't open data connection"));
                }
                Ok(Reply::none())
            }
            None => Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Use PORT or PASV first.")),
        }
    }
}
