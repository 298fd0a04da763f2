//! A shared allocator for passive data ports.
//!
//! Every passive listener leases its port from here so that concurrent
//! sessions never race for the same port, and per-session worker processes
//! can be handed disjoint blocks of the range.

use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpSocket};

// How many times to try another random port when binding fails.
const BIND_RETRIES: usize = 10;

#[derive(Debug)]
pub struct PortPool {
    range: RangeInclusive<u16>,
    taken: Mutex<HashSet<u16>>,
}

impl PortPool {
    pub fn new(range: RangeInclusive<u16>) -> PortPool {
        PortPool {
            range,
            taken: Mutex::new(HashSet::new()),
        }
    }

    fn try_reserve(&self, port: u16) -> bool {
        let mut taken = self.taken.lock().unwrap_or_else(|e| e.into_inner());
        taken.insert(port)
    }

    fn release(&self, port: u16) {
        let mut taken = self.taken.lock().unwrap_or_else(|e| e.into_inner());
        taken.remove(&port);
    }

    fn random_port(&self) -> io::Result<u16> {
        let mut data = [0_u8; 2];
        getrandom::fill(&mut data).map_err(|e| io::Error::other(format!("rng failure: {}", e)))?;
        let (start, end) = (*self.range.start(), *self.range.end());
        let len = u32::from(end - start) + 1;
        let pick = u32::from(u16::from_ne_bytes(data)) % len;
        Ok(start + pick as u16)
    }

    /// Leases a free port from the range and binds a listener to it on the
    /// given IP. The lease is released when the returned [`PortLease`] drops.
    ///
    /// Starts at a random port and walks the range from there, so concurrent
    /// sessions spread out without contending for the low end.
    pub async fn bind(self: &Arc<Self>, ip: IpAddr) -> io::Result<(TcpListener, PortLease)> {
        let (start, end) = (*self.range.start(), *self.range.end());
        let len = u32::from(end - start) + 1;
        let first = self.random_port()?;
        let mut bind_failures = 0;
        let mut last_err = None;
        for i in 0..len {
            let port = start + ((u32::from(first - start) + i) % len) as u16;
            if !self.try_reserve(port) {
                continue;
            }
            match Self::bind_port(ip, port).await {
                Ok(listener) => {
                    return Ok((
                        listener,
                        PortLease {
                            pool: Arc::clone(self),
                            port,
                        },
                    ));
                }
                Err(e) => {
                    self.release(port);
                    last_err = Some(e);
                    bind_failures += 1;
                    if bind_failures >= BIND_RETRIES {
                        break;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrInUse, "passive port range exhausted")))
    }

    async fn bind_port(ip: IpAddr, port: u16) -> io::Result<TcpListener> {
        let socket = match ip {
            IpAddr::V4(..) => TcpSocket::new_v4()?,
            IpAddr::V6(..) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(SocketAddr::new(ip, port))?;
        socket.listen(1024)
    }

    /// Reserves a contiguous block of `len` free ports, for handing to a
    /// per-session worker process. Released when the [`PortBlock`] drops.
    pub fn lease_block(self: &Arc<Self>, len: u16) -> Option<PortBlock> {
        if len == 0 {
            return None;
        }
        let mut taken = self.taken.lock().unwrap_or_else(|e| e.into_inner());
        let (start, end) = (*self.range.start(), *self.range.end());
        let mut run_start = start;
        let mut run_len: u16 = 0;
        for port in start..=end {
            if taken.contains(&port) {
                run_len = 0;
                run_start = port.checked_add(1)?;
                continue;
            }
            run_len += 1;
            if run_len == len {
                for p in run_start..=port {
                    taken.insert(p);
                }
                return Some(PortBlock {
                    pool: Arc::clone(self),
                    range: run_start..=port,
                });
            }
        }
        None
    }
}

// Keeps a single passive port reserved for the lifetime of its listener.
#[derive(Debug)]
pub struct PortLease {
    pool: Arc<PortPool>,
    port: u16,
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.pool.release(self.port);
    }
}

// A contiguous reserved slice of the passive range, leased to one worker.
#[derive(Debug)]
pub struct PortBlock {
    pool: Arc<PortPool>,
    range: RangeInclusive<u16>,
}

impl PortBlock {
    pub fn start(&self) -> u16 {
        *self.range.start()
    }

    pub fn end(&self) -> u16 {
        *self.range.end()
    }
}

impl Drop for PortBlock {
    fn drop(&mut self) {
        for port in self.range.clone() {
            self.pool.release(port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn never_hands_out_the_same_port_twice() {
        let pool = Arc::new(PortPool::new(41000..=41003));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let mut leases = Vec::new();
        let mut ports = HashSet::new();
        for _ in 0..4 {
            let (listener, lease) = pool.bind(ip).await.unwrap();
            ports.insert(listener.local_addr().unwrap().port());
            leases.push((listener, lease));
        }
        assert_eq!(ports.len(), 4);
    }

    #[tokio::test]
    async fn released_ports_are_reused() {
        let pool = Arc::new(PortPool::new(41010..=41010));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let (listener, lease) = pool.bind(ip).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert_eq!(port, 41010);
        assert!(pool.bind(ip).await.is_err());
        drop(listener);
        drop(lease);
        let (listener, _lease) = pool.bind(ip).await.unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), 41010);
    }

    #[test]
    fn blocks_are_disjoint_and_released_on_drop() {
        let pool = Arc::new(PortPool::new(42000..=42009));
        let a = pool.lease_block(4).unwrap();
        let b = pool.lease_block(4).unwrap();
        assert!(a.end() < b.start() || b.end() < a.start());
        assert!(pool.lease_block(4).is_none());
        drop(a);
        assert!(pool.lease_block(4).is_some());
    }
}
