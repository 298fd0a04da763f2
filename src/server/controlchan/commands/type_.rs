//! The RFC 959 Representation Type (`TYPE`) command

use crate::{
    auth::UserDetail,
    server::controlchan::{
        Reply, ReplyCode,
        command::DataType,
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
    },
    storage::{Metadata, StorageBackend},
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Type {
    data_type: DataType,
}

impl Type {
    pub fn new(data_type: DataType) -> Self {
        Type { data_type }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Type
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        session.data_type = self.data_type;
        let reply = match self.data_type {
            DataType::Ascii => Reply::new(ReplyCode::CommandOkay, "Type set to ASCII"),
            DataType::Binary => Reply::new(ReplyCode::CommandOkay, "Type set to Binary"),
        };
        Ok(reply)
    }
}
