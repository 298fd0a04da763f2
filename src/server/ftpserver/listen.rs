//! The accept loop: takes control connections and hands each one to the
//! configured session backend.

use super::{Server, error::ServerError};
use crate::auth::UserDetail;
use crate::server::backend;
use crate::server::controlchan::LoopConfig;
use crate::storage::{Metadata, StorageBackend};
use slog::{info, warn};
use tokio::net::{TcpListener, ToSocketAddrs};

impl<Storage, User> Server<Storage, User>
where
    Storage: StorageBackend<User> + 'static,
    Storage::Metadata: Metadata,
    User: UserDetail + 'static,
{
    /// Binds the given address and serves control connections until
    /// [`stop`](super::ShutdownHandle::stop) is called.
    pub async fn listen<A: ToSocketAddrs>(&self, addr: A) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr).await?;
        self.accept_on(listener).await
    }

    /// Serves control connections on a listener the embedder bound itself,
    /// e.g. one inherited from a service manager.
    pub async fn listen_prebound(&self, listener: std::net::TcpListener) -> Result<(), ServerError> {
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;
        self.accept_on(listener).await
    }

    async fn accept_on(&self, listener: TcpListener) -> Result<(), ServerError> {
        let logger = &self.options.logger;
        info!(logger, "Listening on {}", listener.local_addr()?);
        let mut shutdown = self.shutdown.subscribe().await;
        loop {
            tokio::select! {
                _ = shutdown.listen() => {
                    info!(logger, "Accept loop stopping");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    // Accept failures (ECONNABORTED, fd exhaustion) are per
                    // connection, the listener itself is still fine.
                    let (tcp, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(logger, "Failed to accept a control connection: {}", err);
                            continue;
                        }
                    };
                    let config = LoopConfig::from(&self.options);
                    let session_shutdown = self.shutdown.subscribe().await;
                    if let Err(err) = backend::dispatch(&self.backend, config, self.port_pool.clone(), session_shutdown, tcp, logger).await {
                        warn!(logger, "Could not start a session for {}: {}", peer, err);
                    }
                }
            }
        }
    }
}
