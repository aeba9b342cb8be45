//! Connectivity detection.
//!
//! Online means two things: the network is up (a raw TCP connect to a
//! well-known host succeeds) and the remote store answers a minimal listing.
//! The store is never contacted while the network is down.

use crate::store::BlobStore;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Connectivity as observed by a single orchestration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// The network or the remote store is unreachable.
    Offline,
    /// Both the network and the remote store are reachable.
    Online,
}

impl ConnectivityState {
    /// Returns true for [`ConnectivityState::Online`].
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }
}

/// Attempts a TCP connection to `host:port` within `timeout`.
///
/// `timeout` bounds the whole probe: name resolution and every connect
/// attempt share it. Never fails: resolution errors, refused connections and
/// timeouts all yield `false`.
pub fn check_internet(host: &str, port: u16, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let Some(addrs) = resolve(host, port, timeout) else {
        return false;
    };

    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!(host, port, "probe timed out");
            break;
        }
        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(_) => return true,
            Err(e) => debug!(%addr, error = %e, "probe connect failed"),
        }
    }
    false
}

/// Resolves `host`, giving up after `timeout`.
///
/// IP literals skip the resolver. Names are resolved on a helper thread,
/// which is left to finish on its own if the lookup outlives the timeout.
fn resolve(host: &str, port: u16, timeout: Duration) -> Option<Vec<SocketAddr>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(vec![SocketAddr::new(ip, port)]);
    }

    let (tx, rx) = mpsc::channel();
    let target = (host.to_string(), port);
    let spawned = thread::Builder::new()
        .name("barkeep-probe-dns".into())
        .spawn(move || {
            let _ = tx.send(target.to_socket_addrs().map(|addrs| addrs.collect::<Vec<_>>()));
        });
    if let Err(e) = spawned {
        debug!(error = %e, "cannot spawn resolver thread");
        return None;
    }

    match rx.recv_timeout(timeout) {
        Ok(Ok(addrs)) => Some(addrs),
        Ok(Err(e)) => {
            debug!(host, port, error = %e, "probe host did not resolve");
            None
        }
        Err(_) => {
            debug!(host, port, "probe host resolution timed out");
            None
        }
    }
}

/// Raw network reachability check.
pub trait NetworkProbe: Send + Sync {
    /// Returns true if the network is reachable.
    fn check_internet(&self) -> bool;
}

/// Probe that opens a TCP connection to a well-known host.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    /// Creates a probe for the given target.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new("8.8.8.8", 53, Duration::from_secs(3))
    }
}

impl NetworkProbe for TcpProbe {
    fn check_internet(&self) -> bool {
        check_internet(&self.host, self.port, self.timeout)
    }
}

/// A probe with a settable answer, for testing.
#[derive(Debug)]
pub struct StaticProbe {
    online: AtomicBool,
    calls: AtomicUsize,
}

impl StaticProbe {
    /// Creates a probe that reports the given reachability.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            calls: AtomicUsize::new(0),
        }
    }

    /// Changes the reported reachability.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of probes performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NetworkProbe for StaticProbe {
    fn check_internet(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.online.load(Ordering::SeqCst)
    }
}

impl<P: NetworkProbe + ?Sized> NetworkProbe for std::sync::Arc<P> {
    fn check_internet(&self) -> bool {
        (**self).check_internet()
    }
}

/// Returns true if the store answers a listing bounded to one result.
pub fn check_remote_store<S: BlobStore + ?Sized>(store: &S, prefix: &str) -> bool {
    match store.list(prefix, Some(1)) {
        Ok(_) => true,
        Err(e) => {
            debug!(prefix, error = %e, "remote store probe failed");
            false
        }
    }
}

/// Derives the connectivity state, short-circuiting on a dead network.
pub fn connectivity<N, S>(network: &N, store: &S, prefix: &str) -> ConnectivityState
where
    N: NetworkProbe + ?Sized,
    S: BlobStore + ?Sized,
{
    if network.check_internet() && check_remote_store(store, prefix) {
        ConnectivityState::Online
    } else {
        ConnectivityState::Offline
    }
}
