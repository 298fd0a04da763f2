//! The per-session control channel loop.

use crate::auth::{Authenticator, UserDetail};
use crate::options::{PassiveHost, ThrottlePolicy};
use crate::server::chancomms::ControlChanMsg;
use crate::server::controlchan::codecs::FtpCodec;
use crate::server::controlchan::command::Command;
use crate::server::controlchan::commands;
use crate::server::controlchan::error::{ControlChanError, ControlChanErrorKind};
use crate::server::controlchan::handler::{CommandContext, CommandHandler};
use crate::server::controlchan::reply::{Reply, ReplyCode};
use crate::server::controlchan::reply_for_storage_error;
use crate::server::datachan::AsyncStream;
use crate::server::portpool::PortPool;
use crate::server::session::{Session, SessionState, SharedSession};
use crate::server::shutdown;
use crate::server::tls::FtpsConfig;
use crate::storage::{Metadata, StorageBackend};
use futures_util::{SinkExt, StreamExt};
use slog::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

// Everything a control loop needs that outlives a single session. One of
// these is derived from the server options per accepted connection.
pub(crate) struct LoopConfig<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    pub storage: Arc<Storage>,
    pub greeting: String,
    pub authenticator: Arc<dyn Authenticator<User>>,
    pub passive_host: PassiveHost,
    pub ftps_config: FtpsConfig,
    pub idle_session_timeout: Duration,
    pub establish_timeout: Duration,
    pub stall_timeout: Duration,
    pub throttle: Option<Arc<dyn ThrottlePolicy>>,
    pub permit_foreign_data_peers: bool,
    pub max_login_attempts: u32,
    pub logger: slog::Logger,
}

impl<Storage, User> Clone for LoopConfig<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    fn clone(&self) -> Self {
        LoopConfig {
            storage: self.storage.clone(),
            greeting: self.greeting.clone(),
            authenticator: self.authenticator.clone(),
            passive_host: self.passive_host,
            ftps_config: self.ftps_config.clone(),
            idle_session_timeout: self.idle_session_timeout,
            establish_timeout: self.establish_timeout,
            stall_timeout: self.stall_timeout,
            throttle: self.throttle.clone(),
            permit_foreign_data_peers: self.permit_foreign_data_peers,
            max_login_attempts: self.max_login_attempts,
            logger: self.logger.clone(),
        }
    }
}

// Commands a client may issue before it has logged in.
fn allowed_before_login(cmd: &Command) -> bool {
    matches!(
        cmd,
        Command::Help
            | Command::User { .. }
            | Command::Pass { .. }
            | Command::Auth { .. }
            | Command::Feat
            | Command::Quit
            | Command::Pbsz
            | Command::Prot { .. }
    )
}

// REST survives until the transfer that consumes it; RNFR survives until
// RNTO. Any other intervening command drops the pending state. APPE is in
// the keep list so its handler still sees a pending offset and can refuse
// the combination with 450 rather than quietly appending.
fn clear_stale_state<Storage, User>(session: &mut Session<Storage, User>, cmd: &Command)
where
    Storage: StorageBackend<User> + 'static,
    User: UserDetail + 'static,
{
    match cmd {
        Command::Rest { .. } | Command::Retr { .. } | Command::Stor { .. } | Command::Appe { .. } => {}
        _ => session.start_pos = 0,
    }
    if !matches!(cmd, Command::Rnto { .. }) {
        session.rename_from = None;
    }
}

/// Drives one control connection from greeting to close. Does not spawn; the
/// chosen backend decides where this future runs.
pub(crate) async fn run<Storage, User>(
    config: LoopConfig<Storage, User>,
    port_pool: Arc<PortPool>,
    tcp: TcpStream,
    mut shutdown: shutdown::Listener,
) -> Result<(), ControlChanError>
where
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
    User: UserDetail + 'static,
{
    let local_addr = tcp.local_addr()?;
    let peer_addr = tcp.peer_addr()?;
    let storage_features = config.storage.supported_features();

    let session = Session::new(config.storage.clone(), peer_addr)
        .ftps(config.ftps_config.clone())
        .stall_timeout(config.stall_timeout)
        .throttle(config.throttle.clone());
    let logger = config.logger.new(slog::o!(
        "trace-id" => session.trace_id.to_string(),
        "peer" => peer_addr.to_string(),
    ));
    let session: SharedSession<Storage, User> = Arc::new(tokio::sync::Mutex::new(session));

    // The loop keeps one sender alive so that recv() pends instead of
    // closing while no data channel task holds a clone.
    let (control_msg_tx, mut control_msg_rx) = mpsc::channel::<ControlChanMsg>(32);

    let stream: Box<dyn AsyncStream> = Box::new(tcp);
    let mut framed = Framed::new(stream, FtpCodec::new());
    framed.send(Reply::new_with_string(ReplyCode::ServiceReady, config.greeting.clone())).await?;
    let (mut reply_sink, mut command_source) = framed.split();

    info!(logger, "Control connection established");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.listen() => {
                let _ = reply_sink.send(Reply::new(ReplyCode::ServiceNotAvailable, "Service shutting down, closing control connection")).await;
                break;
            }
            Some(msg) = control_msg_rx.recv() => {
                match msg {
                    ControlChanMsg::ExitControlLoop => break,
                    ControlChanMsg::SecureControlChannel => {
                        let framed = match reply_sink.reunite(command_source) {
                            Ok(framed) => framed,
                            Err(_) => return Err(ControlChanError::new(ControlChanErrorKind::InternalServerError)),
                        };
                        let io = framed.into_inner();
                        let acceptor = match config.ftps_config.acceptor() {
                            Some(acceptor) => acceptor,
                            None => return Err(ControlChanError::new(ControlChanErrorKind::InternalServerError)),
                        };
                        match acceptor.accept(io).await {
                            Ok(tls_stream) => {
                                session.lock().await.cmd_tls = true;
                                let stream: Box<dyn AsyncStream> = Box::new(tls_stream);
                                let framed = Framed::new(stream, FtpCodec::new());
                                let (sink, source) = framed.split();
                                reply_sink = sink;
                                command_source = source;
                                info!(logger, "Control channel upgraded to TLS");
                            }
                            Err(err) => {
                                warn!(logger, "TLS handshake on control channel failed: {}", err);
                                break;
                            }
                        }
                    }
                    msg => {
                        let reply = reply_for_internal_msg(msg);
                        if !matches!(reply, Reply::None) {
                            let closing = reply.last_code() == ReplyCode::ServiceNotAvailable;
                            reply_sink.send(reply).await?;
                            if closing {
                                break;
                            }
                        }
                    }
                }
            }
            cmd = command_source.next() => {
                let cmd = match cmd {
                    None => break,
                    Some(Ok(cmd)) => cmd,
                    Some(Err(err)) => {
                        match reply_for_control_error(&err) {
                            Some(reply) => {
                                reply_sink.send(reply).await?;
                                continue;
                            }
                            None => return Err(err),
                        }
                    }
                };
                let reply = handle_command(
                    cmd,
                    &config,
                    &session,
                    &port_pool,
                    &control_msg_tx,
                    local_addr,
                    storage_features,
                    &logger,
                )
                .await;
                let reply = match reply {
                    Ok(reply) => reply,
                    Err(err) => match reply_for_control_error(&err) {
                        Some(reply) => reply,
                        None => return Err(err),
                    },
                };
                if !matches!(reply, Reply::None) {
                    let closing = reply.last_code() == ReplyCode::ServiceNotAvailable;
                    reply_sink.send(reply).await?;
                    if closing {
                        break;
                    }
                }
            }
            _ = tokio::time::sleep(config.idle_session_timeout) => {
                // A transfer in flight is bounded by the data channel's
                // stall timer, not by control channel idleness.
                if session.lock().await.data_busy.load(Ordering::SeqCst) {
                    continue;
                }
                let _ = reply_sink.send(Reply::new(ReplyCode::ServiceNotAvailable, "Session timed out, closing control connection")).await;
                break;
            }
        }
    }

    // Stop any transfer still in flight.
    session.lock().await.reset_data_channel();
    info!(logger, "Control connection closed");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_command<Storage, User>(
    cmd: Command,
    config: &LoopConfig<Storage, User>,
    session: &SharedSession<Storage, User>,
    port_pool: &Arc<PortPool>,
    control_msg_tx: &mpsc::Sender<ControlChanMsg>,
    local_addr: SocketAddr,
    storage_features: u32,
    logger: &slog::Logger,
) -> Result<Reply, ControlChanError>
where
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
    User: UserDetail + 'static,
{
    {
        let mut session = session.lock().await;
        clear_stale_state(&mut session, &cmd);
        if session.state != SessionState::WaitCmd && !allowed_before_login(&cmd) {
            return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate"));
        }
    }

    let handler: Box<dyn CommandHandler<Storage, User>> = match cmd.clone() {
        Command::User { username } => Box::new(commands::User::new(username)),
        Command::Pass { password } => Box::new(commands::Pass::new(password)),
        Command::Acct => Box::new(commands::Acct),
        Command::Syst => Box::new(commands::Syst),
        Command::Stat { path } => Box::new(commands::Stat::new(path)),
        Command::Type { data_type } => Box::new(commands::Type::new(data_type)),
        Command::Stru { structure } => Box::new(commands::Stru::new(structure)),
        Command::Mode { mode } => Box::new(commands::Mode::new(mode)),
        Command::Help => Box::new(commands::Help),
        Command::Noop => Box::new(commands::Noop),
        Command::Pasv => Box::new(commands::Pasv),
        Command::Epsv => Box::new(commands::Epsv),
        Command::Port { addr } => Box::new(commands::Port::new(addr)),
        Command::Eprt { addr } => Box::new(commands::Eprt::new(addr)),
        Command::Retr { path } => Box::new(commands::Retr::new(path)),
        Command::Stor { path } => Box::new(commands::Stor::new(path)),
        Command::Appe { path } => Box::new(commands::Appe::new(path)),
        Command::List { options: _, path } => Box::new(commands::List::new(path)),
        Command::Nlst { path } => Box::new(commands::Nlst::new(path)),
        Command::Mlsd { path } => Box::new(commands::Mlsd::new(path)),
        Command::Mlst { path } => Box::new(commands::Mlst::new(path)),
        Command::Feat => Box::new(commands::Feat),
        Command::Pwd => Box::new(commands::Pwd),
        Command::Cwd { path } => Box::new(commands::Cwd::new(path)),
        Command::Cdup => Box::new(commands::Cdup),
        Command::Opts { option } => Box::new(commands::Opts::new(option)),
        Command::Dele { path } => Box::new(commands::Dele::new(path)),
        Command::Rmd { path } => Box::new(commands::Rmd::new(path)),
        Command::Mkd { path } => Box::new(commands::Mkd::new(path)),
        Command::Quit => Box::new(commands::Quit),
        Command::Abor => Box::new(commands::Abor),
        Command::Rnfr { file } => Box::new(commands::Rnfr::new(file)),
        Command::Rnto { file } => Box::new(commands::Rnto::new(file)),
        Command::Auth { protocol } => Box::new(commands::Auth::new(protocol)),
        Command::Pbsz => Box::new(commands::Pbsz),
        Command::Prot { param } => Box::new(commands::Prot::new(param)),
        Command::Size { file } => Box::new(commands::Size::new(file)),
        Command::Rest { offset } => Box::new(commands::Rest::new(offset)),
        Command::Mdtm { file } => Box::new(commands::Mdtm::new(file)),
    };

    let context = CommandContext {
        cmd,
        session: session.clone(),
        authenticator: config.authenticator.clone(),
        tls_configured: config.ftps_config.is_on(),
        passive_host: config.passive_host,
        port_pool: port_pool.clone(),
        tx_control_chan: control_msg_tx.clone(),
        local_addr,
        storage_features,
        permit_foreign_data_peers: config.permit_foreign_data_peers,
        establish_timeout: config.establish_timeout,
        max_login_attempts: config.max_login_attempts,
        logger: logger.clone(),
    };
    handler.handle(context).await
}

// Data channel progress reports become replies on the control channel.
fn reply_for_internal_msg(msg: ControlChanMsg) -> Reply {
    match msg {
        ControlChanMsg::SendingData => Reply::new(ReplyCode::FileStatusOkay, "Opening data connection"),
        ControlChanMsg::SentData { bytes } => Reply::new_with_string(ReplyCode::ClosingDataConnection, format!("Successfully sent {} bytes", bytes)),
        ControlChanMsg::WrittenData { bytes } => Reply::new_with_string(ReplyCode::ClosingDataConnection, format!("File successfully written, {} bytes", bytes)),
        ControlChanMsg::DirectorySuccessfullyListed => Reply::new(ReplyCode::ClosingDataConnection, "Listed the directory"),
        ControlChanMsg::ConnectionReset => Reply::new(ReplyCode::ConnectionClosed, "Data channel unexpectedly closed"),
        ControlChanMsg::DataConnectionFailed => Reply::new(ReplyCode::CantOpenDataConnection, "Can't open data connection"),
        ControlChanMsg::DataPeerRejected { peer } => {
            Reply::new_with_string(ReplyCode::CantOpenDataConnection, format!("Data connection from foreign address {} rejected", peer.ip()))
        }
        ControlChanMsg::StorageError(err) => reply_for_storage_error(&err),
        ControlChanMsg::CommandChannelReply(reply) => reply,
        // Handled by the loop itself.
        ControlChanMsg::SecureControlChannel | ControlChanMsg::ExitControlLoop => Reply::none(),
    }
}

// Maps a control channel error to the reply to send, or None when the
// connection should be dropped without a word.
fn reply_for_control_error(err: &ControlChanError) -> Option<Reply> {
    match err.kind() {
        ControlChanErrorKind::UnknownCommand { command } => {
            Some(Reply::new_with_string(ReplyCode::CommandSyntaxError, format!("Command {} not implemented", command)))
        }
        ControlChanErrorKind::Utf8Error => Some(Reply::new(ReplyCode::CommandSyntaxError, "Invalid UTF8 in command")),
        ControlChanErrorKind::InvalidCommand | ControlChanErrorKind::InvalidArgument => {
            Some(Reply::new(ReplyCode::ParameterSyntaxError, "Invalid parameter"))
        }
        ControlChanErrorKind::InvalidEol => Some(Reply::new(ReplyCode::ParameterSyntaxError, "Invalid end of line")),
        ControlChanErrorKind::IoError => None,
        ControlChanErrorKind::InternalServerError => Some(Reply::new(ReplyCode::LocalError, "Internal server error")),
    }
}
