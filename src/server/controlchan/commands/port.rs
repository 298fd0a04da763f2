//! The RFC 959 Data Port (`PORT`) command and its RFC 2428 extended form
//! (`EPRT`).

use crate::{
    auth::UserDetail,
    server::{
        controlchan::{
            Reply, ReplyCode,
            error::ControlChanError,
            handler::{CommandContext, CommandHandler},
        },
        datachan,
    },
    storage::{Metadata, StorageBackend},
};
use async_trait::async_trait;
use slog::warn;
use std::net::SocketAddr;

#[derive(Debug)]
pub struct Port {
    addr: SocketAddr,
}

impl Port {
    pub fn new(addr: SocketAddr) -> Self {
        Port { addr }
    }
}

#[derive(Debug)]
pub struct Eprt {
    addr: SocketAddr,
}

impl Eprt {
    pub fn new(addr: SocketAddr) -> Self {
        Eprt { addr }
    }
}

async fn prepare_active<Storage, User>(args: &CommandContext<Storage, User>, target: SocketAddr) -> Reply
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
{
    // Anti-bounce: refuse targets other than the control peer up front.
    let control_peer = {
        let session = args.session.lock().await;
        session.source
    };
    if target.ip() != control_peer.ip() && !args.permit_foreign_data_peers {
        warn!(args.logger, "Rejected active data target {} for peer {}", target, control_peer);
        return Reply::new(ReplyCode::CantOpenDataConnection, "Data connection to foreign address refused");
    }
    args.session.lock().await.setup_data_channels();
    datachan::spawn_active(
        args.logger.clone(),
        args.session.clone(),
        target,
        args.establish_timeout,
        args.tx_control_chan.clone(),
    )
    .await;
    Reply::new(ReplyCode::CommandOkay, "Entering Active Mode")
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Port
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        Ok(prepare_active(&args, self.addr).await)
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Eprt
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        Ok(prepare_active(&args, self.addr).await)
    }
}
