//! The three session concurrency backends.
//!
//! A backend only decides *where* the control loop future runs; the loop
//! itself is the same in all three, so their wire behavior is identical.

#[cfg(unix)]
mod process;

use crate::auth::UserDetail;
use crate::options::Backend;
use crate::server::controlchan::{LoopConfig, control_loop};
use crate::server::ftpserver::error::ServerError;
use crate::server::portpool::PortPool;
use crate::server::shutdown;
use crate::storage::{Metadata, StorageBackend};
use slog::warn;
use std::sync::Arc;
use tokio::net::TcpStream;

// Sent on the raw socket when no session could be started for it.
pub(crate) const REFUSAL: &[u8] = b"421 Service not available, closing control connection\r\n";

// Tells the client its session will not start, then closes the socket. The
// rest of the server is unaffected.
async fn refuse(mut tcp: TcpStream) {
    use tokio::io::AsyncWriteExt;
    let _ = tcp.write_all(REFUSAL).await;
    let _ = tcp.shutdown().await;
}

// Hands one accepted control connection to the chosen backend. Returns once
// the session is underway, not once it is done.
pub(crate) async fn dispatch<Storage, User>(
    backend: &Backend,
    config: LoopConfig<Storage, User>,
    port_pool: Arc<PortPool>,
    shutdown: shutdown::Listener,
    tcp: TcpStream,
    logger: &slog::Logger,
) -> Result<(), ServerError>
where
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
    User: UserDetail + 'static,
{
    match backend {
        Backend::Multiplexed => {
            let logger = logger.clone();
            tokio::spawn(async move {
                if let Err(err) = control_loop::run(config, port_pool, tcp, shutdown).await {
                    warn!(logger, "Control loop ended with an error: {}", err);
                }
            });
            Ok(())
        }
        Backend::ThreadPerSession => {
            let logger = logger.clone();
            let std_tcp = tcp.into_std()?;
            // A second handle on the socket, in case the thread never starts
            // and the client must be refused.
            let refusal_handle = std_tcp.try_clone();
            let spawned = std::thread::Builder::new()
                .name("ftpforge-session".to_string())
                .spawn(move || {
                    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                        Ok(runtime) => runtime,
                        Err(err) => {
                            warn!(logger, "Could not build a session runtime: {}", err);
                            return;
                        }
                    };
                    runtime.block_on(async move {
                        let tcp = match TcpStream::from_std(std_tcp) {
                            Ok(tcp) => tcp,
                            Err(err) => {
                                warn!(logger, "Could not register the session socket: {}", err);
                                return;
                            }
                        };
                        if let Err(err) = control_loop::run(config, port_pool, tcp, shutdown).await {
                            warn!(logger, "Control loop ended with an error: {}", err);
                        }
                    });
                });
            match spawned {
                Ok(_) => Ok(()),
                Err(err) => {
                    if let Ok(mut sock) = refusal_handle {
                        use std::io::Write;
                        let _ = sock.set_nonblocking(false);
                        let _ = sock.write_all(REFUSAL);
                    }
                    Err(ServerError::ThreadSpawn(err))
                }
            }
        }
        #[cfg(unix)]
        Backend::ProcessPerSession {
            helper,
            args,
            ports_per_worker,
        } => process::spawn_worker(helper, args, *ports_per_worker, &port_pool, tcp, logger).await,
        #[cfg(not(unix))]
        Backend::ProcessPerSession { .. } => {
            refuse(tcp).await;
            Err(ServerError::ProcessBackendUnsupported)
        }
    }
}
