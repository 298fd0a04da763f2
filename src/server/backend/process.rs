//! The process-per-session backend: each control connection is served by a
//! freshly spawned helper process that inherits the connected socket.

use crate::options::PASSIVE_PORTS_ENV;
use crate::server::ftpserver::error::ServerError;
use crate::server::portpool::PortPool;
use slog::{info, warn};
use std::ffi::OsString;
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpStream;

pub(crate) async fn spawn_worker(
    helper: &Path,
    args: &[OsString],
    ports_per_worker: u16,
    port_pool: &Arc<PortPool>,
    tcp: TcpStream,
    logger: &slog::Logger,
) -> Result<(), ServerError> {
    // Each worker gets a disjoint slice of the passive range so that two
    // workers never advertise the same data port.
    let block = match port_pool.lease_block(ports_per_worker) {
        Some(block) => block,
        None => {
            super::refuse(tcp).await;
            return Err(ServerError::PassivePortsExhausted);
        }
    };

    let std_tcp = tcp.into_std()?;
    // The worker registers the socket with its own runtime.
    std_tcp.set_nonblocking(false)?;
    let fd: OwnedFd = std_tcp.into();
    // The descriptor must survive exec.
    nix::fcntl::fcntl(&fd, nix::fcntl::FcntlArg::F_SETFD(nix::fcntl::FdFlag::empty()))?;

    let mut command = tokio::process::Command::new(helper);
    command
        .args(args)
        .arg(fd.as_raw_fd().to_string())
        .env(PASSIVE_PORTS_ENV, format!("{}-{}", block.start(), block.end()));
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            // The socket is already in blocking mode, refuse it directly.
            use std::io::Write;
            let mut sock = std::net::TcpStream::from(fd);
            let _ = sock.write_all(super::REFUSAL);
            return Err(err.into());
        }
    };
    // The child holds its own copy of the socket now.
    drop(fd);

    let logger = logger.clone();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => info!(logger, "Session worker exited with {}", status),
            Err(err) => warn!(logger, "Could not wait for session worker: {}", err),
        }
        // Returns the worker's passive port block to the pool.
        drop(block);
    });
    Ok(())
}
