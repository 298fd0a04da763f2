//! The RFC 959 Passive (`PASV`) command and its RFC 2428 extended form
//! (`EPSV`).

use crate::{
    auth::UserDetail,
    options::PassiveHost,
    server::{
        chancomms::ControlChanMsg,
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
use std::net::{IpAddr, Ipv4Addr};
use tokio::time::timeout;

#[derive(Debug)]
pub struct Pasv;

#[derive(Debug)]
pub struct Epsv;

// Binds a listener from the port pool, arms the session's data channels and
// spawns the task that waits for the inbound connection. Returns the leased
// port number for the reply.
async fn listen_for_data_peer<Storage, User>(args: &CommandContext<Storage, User>) -> std::io::Result<u16>
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
{
    let (listener, lease) = args.port_pool.bind(args.local_addr.ip()).await?;
    let port = listener.local_addr()?.port();

    let control_peer = {
        let mut session = args.session.lock().await;
        session.setup_data_channels();
        session.source
    };
    let session = args.session.clone();
    let tx = args.tx_control_chan.clone();
    let logger = args.logger.clone();
    let permit_foreign = args.permit_foreign_data_peers;
    let establish_timeout = args.establish_timeout;

    tokio::spawn(async move {
        match timeout(establish_timeout, listener.accept()).await {
            Ok(Ok((socket, peer))) => {
                // Anti-bounce: the data peer must be the control peer unless
                // foreign peers were explicitly allowed.
                if peer.ip() != control_peer.ip() && !permit_foreign {
                    warn!(logger, "Rejected data connection from foreign peer {}", peer);
                    session.lock().await.reset_data_channel();
                    let _ = tx.send(ControlChanMsg::DataPeerRejected { peer }).await;
                    return;
                }
                datachan::spawn_processing(logger, session, socket, Some(lease), tx).await;
            }
            _ => {
                warn!(logger, "No data connection within {:?}", establish_timeout);
                session.lock().await.reset_data_channel();
                let _ = tx.send(ControlChanMsg::DataConnectionFailed).await;
            }
        }
    });

    Ok(port)
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Pasv
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        // PASV cannot express an IPv6 address.
        let local_ip = match args.local_addr.ip() {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(_) => {
                return Ok(Reply::new(ReplyCode::CommandNotImplemented, "Use EPSV"));
            }
        };
        let port = match listen_for_data_peer(&args).await {
            Ok(port) => port,
            Err(err) => {
                warn!(args.logger, "Could not bind a passive listener: {}", err);
                return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Can't open data connection"));
            }
        };
        let advertised: Ipv4Addr = match args.passive_host {
            PassiveHost::FromConnection => local_ip,
            PassiveHost::Ip(ip) => ip,
        };
        let octets = advertised.octets();
        Ok(Reply::new_with_string(
            ReplyCode::EnteringPassiveMode,
            format!(
                "Entering Passive Mode ({},{},{},{},{},{})",
                octets[0],
                octets[1],
                octets[2],
                octets[3],
                port >> 8,
                port & 0xff
            ),
        ))
    }
}

#[async_trait]
impl<Storage, User> CommandHandler<Storage, User> for Epsv
where
    User: UserDetail + 'static,
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
{
    #[tracing_attributes::instrument]
    async fn handle(&self, args: CommandContext<Storage, User>) -> Result<Reply, ControlChanError> {
        let port = match listen_for_data_peer(&args).await {
            Ok(port) => port,
            Err(err) => {
                warn!(args.logger, "Could not bind a passive listener: {}", err);
                return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Can't open data connection"));
            }
        };
        Ok(Reply::new_with_string(
            ReplyCode::EnteringExtendedPassiveMode,
            format!("Entering Extended Passive Mode (|||{}|)", port),
        ))
    }
}
