//! The RFC 2228 Data Channel Protection Level (`PROT`) command

use crate::{
    auth::UserDetail,
    server::controlchan::{
        Reply, ReplyCode,
        commands::ProtParam,
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
    },
    storage::{Metadata, StorageBackend},
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Prot {
    param: ProtParam,
}

impl Prot {
    pub fn new(param: ProtParam) -> Self {
        Prot { param }
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Prot
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        if !args.tls_configured {
            return Ok(Reply::new(ReplyCode::CommandNotImplemented, "TLS is not configured"));
        }
        let mut session = args.session.lock().await;
        match self.param {
            ProtParam::Clear => {
                session.data_tls = false;
                Ok(Reply::new(ReplyCode::CommandOkay, "PROT OK. Data channel will be plain text"))
            }
            ProtParam::Private if session.cmd_tls => {
                session.data_tls = true;
                Ok(Reply::new(ReplyCode::CommandOkay, "PROT OK. Data channel will be encrypted"))
            }
            ProtParam::Private => Ok(Reply::new(ReplyCode::BadCommandSequence, "Send AUTH TLS first")),
            ProtParam::Safe | ProtParam::Confidential => Ok(Reply::new(
                ReplyCode::CommandNotImplementedForParameter,
                "PROT S/E not implemented",
            )),
        }
    }
}
