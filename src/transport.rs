//! Datagram transport: one UDP socket shared by every drive worker, with a
//! single listener thread demultiplexing inbound datagrams by source
//! address into per-peer bounded queues.

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Local port the host binds for all drive traffic.
pub const HOST_PORT: u16 = 41136;
/// Port every drive listens on.
pub const DRIVE_PORT: u16 = 49360;

/// Bound on a per-peer receive queue. Chosen generously above the deepest
/// legitimate backlog (one in-flight request per drive worker at a time,
/// plus retries) so a misbehaving or silent peer can't grow memory
/// unboundedly; once full, the oldest datagram is dropped to make room for
/// the newest.
const PEER_QUEUE_CAPACITY: usize = 64;

struct PeerQueue {
    inner: Mutex<VecDeque<Vec<u8>>>,
    arrived: Condvar,
}

impl PeerQueue {
    fn new() -> Self {
        PeerQueue {
            inner: Mutex::new(VecDeque::new()),
            arrived: Condvar::new(),
        }
    }

    fn push(&self, datagram: Vec<u8>) {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= PEER_QUEUE_CAPACITY {
            queue.pop_front();
        }
        queue.push_back(datagram);
        self.arrived.notify_one();
    }

    fn pop_timeout(&self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.lock().unwrap();
        loop {
            if let Some(datagram) = queue.pop_front() {
                return Some(datagram);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, result) = self.arrived.wait_timeout(queue, deadline - now).unwrap();
            queue = guard;
            if result.timed_out() && queue.is_empty() {
                return None;
            }
        }
    }
}

/// Shared UDP endpoint for all drives on the control LAN.
pub struct Transport {
    socket: UdpSocket,
    peers: Mutex<HashMap<Ipv4Addr, Arc<PeerQueue>>>,
}

impl Transport {
    /// Bind the shared socket to `0.0.0.0:HOST_PORT`.
    pub fn bind() -> std::io::Result<Arc<Self>> {
        Self::bind_addr(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, HOST_PORT))
    }

    fn bind_addr(addr: SocketAddrV4) -> std::io::Result<Arc<Self>> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Arc::new(Transport {
            socket,
            peers: Mutex::new(HashMap::new()),
        }))
    }

    /// Bind to an OS-assigned ephemeral port, for use in tests that would
    /// otherwise collide on the fixed [`HOST_PORT`] when run concurrently.
    #[cfg(test)]
    pub(crate) fn bind_ephemeral() -> std::io::Result<Arc<Self>> {
        Self::bind_addr(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))
    }

    fn queue_for(&self, peer: Ipv4Addr) -> Arc<PeerQueue> {
        self.peers
            .lock()
            .unwrap()
            .entry(peer)
            .or_insert_with(|| Arc::new(PeerQueue::new()))
            .clone()
    }

    /// Synchronous, non-blocking send. Lazily registers `peer`'s receive
    /// queue if this is the first traffic exchanged with it.
    pub fn send(&self, bytes: &[u8], peer: Ipv4Addr) -> std::io::Result<()> {
        self.queue_for(peer);
        self.socket.send_to(bytes, SocketAddrV4::new(peer, DRIVE_PORT))?;
        Ok(())
    }

    /// Block up to `timeout` for the next datagram from `peer`.
    pub fn receive(&self, peer: Ipv4Addr, timeout: Duration) -> Option<Vec<u8>> {
        self.queue_for(peer).pop_timeout(timeout)
    }

    /// Spawn the listener thread. It runs until a `recvfrom` call errors
    /// (socket closed), which in practice means process shutdown.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        thread::Builder::new()
            .name("manipulator-listener".into())
            .spawn(move || transport.listen_loop())
            .expect("failed to spawn listener thread")
    }

    fn listen_loop(&self) {
        let mut buf = [0u8; 1024];
        loop {
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(pair) => pair,
                Err(e) => {
                    log::error!("listener socket error, shutting down: {e}");
                    return;
                }
            };

            let peer_ip = match from {
                SocketAddr::V4(addr) => *addr.ip(),
                SocketAddr::V6(addr) => {
                    log::warn!("dropping datagram from unexpected IPv6 peer {addr}");
                    continue;
                }
            };

            let known = self.peers.lock().unwrap().get(&peer_ip).cloned();
            match known {
                Some(queue) => queue.push(buf[..len].to_vec()),
                None => log::warn!("dropping datagram from unregistered peer {peer_ip}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddrV4;

    fn local_socket() -> UdpSocket {
        UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap()
    }

    #[test]
    fn queue_delivers_fifo() {
        let q = PeerQueue::new();
        q.push(vec![1]);
        q.push(vec![2]);
        assert_eq!(q.pop_timeout(Duration::from_millis(10)), Some(vec![1]));
        assert_eq!(q.pop_timeout(Duration::from_millis(10)), Some(vec![2]));
    }

    #[test]
    fn queue_times_out_when_empty() {
        let q = PeerQueue::new();
        assert_eq!(q.pop_timeout(Duration::from_millis(20)), None);
    }

    #[test]
    fn queue_drops_oldest_on_overflow() {
        let q = PeerQueue::new();
        for i in 0..PEER_QUEUE_CAPACITY + 5 {
            q.push(vec![i as u8]);
        }
        let first = q.pop_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(first, vec![5u8]);
    }

    #[test]
    fn send_then_receive_round_trip() {
        let peer_socket = local_socket();
        let peer_addr = match peer_socket.local_addr().unwrap() {
            SocketAddr::V4(a) => a,
            _ => unreachable!(),
        };

        let host = Transport {
            socket: local_socket(),
            peers: Mutex::new(HashMap::new()),
        };
        let host = Arc::new(host);
        let _listener = host.spawn_listener();

        // Register the peer queue the way `send` would, then have the test
        // peer reply directly so the listener can route it.
        host.queue_for(*peer_addr.ip());
        let host_addr = match host.socket.local_addr().unwrap() {
            SocketAddr::V4(a) => a,
            _ => unreachable!(),
        };
        peer_socket.send_to(&[7, 8, 9], host_addr).unwrap();

        let got = host.receive(*peer_addr.ip(), Duration::from_millis(500));
        assert_eq!(got, Some(vec![7, 8, 9]));
    }
}
