// server.rs - UDP RADIUS server: bind, dispatch, reply.
//
// Grounded in the teacher's original `server.rs` (socket2-tuned sockets,
// worker-per-socket `tokio::spawn`, tracing instrumentation) and
// original_source/pyrad2/server.py (`Server.HandleAuthPacket`,
// `CreateReplyPacket`, the per-(source, id) duplicate-request cache).
// Authentication, accounting and CoA each bind their own socket per
// configured address, matching RFC 2865/2866/5176's separate default
// ports.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::dictionary::Dictionary;
use crate::error::{PacketError, RadiusError, Result};
use crate::host::HostRegistry;
use crate::packet::{codec, Packet, PacketCode};

const MAX_PACKET_SIZE: usize = 4096;

/// Handles one decoded request and produces the reply to send back.
/// Shared in spirit with `radsec::RadSecHandler` so the same
/// authentication/accounting/CoA logic can answer requests regardless of
/// which transport they arrived on.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: Packet, peer: SocketAddr) -> Result<Packet>;
}

/// Suppresses re-processing a retransmitted request. RFC 2865 §3: a NAS
/// that doesn't hear back within its own timeout retransmits the
/// identical packet (same source, id and Authenticator); the server
/// replies with its cached answer rather than running the request twice.
#[derive(Default)]
struct DedupCache {
    seen: Mutex<HashMap<(SocketAddr, u8, [u8; 16]), (Instant, Vec<u8>)>>,
}

impl DedupCache {
    fn lookup(&self, key: (SocketAddr, u8, [u8; 16]), window: Duration) -> Option<Vec<u8>> {
        let mut guard = self.seen.lock().expect("dedup cache lock poisoned");
        guard.retain(|_, (seen_at, _)| seen_at.elapsed() < window);
        guard.get(&key).map(|(_, reply)| reply.clone())
    }

    fn record(&self, key: (SocketAddr, u8, [u8; 16]), reply: Vec<u8>) {
        self.seen
            .lock()
            .expect("dedup cache lock poisoned")
            .insert(key, (Instant::now(), reply));
    }
}

pub struct Server {
    config: ServerConfig,
    dict: Arc<Dictionary>,
    hosts: Arc<HostRegistry>,
    handler: Arc<dyn RequestHandler>,
    dedup: Arc<DedupCache>,
}

impl Server {
    pub fn new(config: ServerConfig, dict: Arc<Dictionary>, handler: Arc<dyn RequestHandler>) -> Self {
        let hosts = Arc::new(HostRegistry::from_hosts(
            config.hosts.iter().cloned().map(|h| h.into_remote_host()),
        ));
        Server {
            config,
            dict,
            hosts,
            handler,
            dedup: Arc::new(DedupCache::default()),
        }
    }

    /// Bind every enabled transport on every configured address and serve
    /// until a listener task fails. Each (address, port-role) pair binds one
    /// socket and fans out `worker_threads` tasks racing `recv_from` on it,
    /// matching the teacher's worker-per-socket layout.
    pub async fn run(self) -> Result<()> {
        self.config.validate()?;
        let server = Arc::new(self);
        let mut tasks = tokio::task::JoinSet::new();

        for &addr in &server.config.bind_addresses {
            if server.config.auth_enabled {
                server.clone().spawn_listener(&mut tasks, addr, server.config.auth_port, PacketCode::AccessRequest);
            }
            if server.config.acct_enabled {
                server.clone().spawn_listener(&mut tasks, addr, server.config.acct_port, PacketCode::AccountingRequest);
            }
            if server.config.coa_enabled {
                server.clone().spawn_listener(&mut tasks, addr, server.config.coa_port, PacketCode::CoaRequest);
            }
        }

        // The whole server is considered down the moment any one listener
        // task exits, since that almost always means its socket died.
        match tasks.join_next().await {
            Some(Ok(result)) => result,
            Some(Err(e)) => Err(RadiusError::parse("<server>", 0, format!("listener task panicked: {}", e))),
            None => Ok(()),
        }
    }

    /// Binds one socket for this (address, port, role) triple and spawns
    /// `worker_threads` tasks racing `recv_from` on a shared `Arc<UdpSocket>`.
    /// A UDP socket is safe to read from concurrently: the kernel delivers
    /// each datagram to exactly one waiting reader.
    fn spawn_listener(
        self: Arc<Self>,
        tasks: &mut tokio::task::JoinSet<Result<()>>,
        addr: IpAddr,
        port: u16,
        expected_code: PacketCode,
    ) {
        let bind_addr = SocketAddr::new(addr, port);
        let worker_count = self.config.worker_threads.max(1);

        let socket = match bind_udp_socket(bind_addr) {
            Ok(socket) => Arc::new(socket),
            Err(e) => {
                tasks.spawn(async move { Err(e) });
                return;
            }
        };
        info!(%bind_addr, ?expected_code, workers = worker_count, "listening for RADIUS requests");

        for worker_id in 0..worker_count {
            let server = self.clone();
            let socket = socket.clone();
            tasks.spawn(async move {
                let mut buf = vec![0u8; MAX_PACKET_SIZE];
                loop {
                    let (len, peer) = socket.recv_from(&mut buf).await.map_err(RadiusError::Io)?;
                    debug!(worker = worker_id, %peer, "worker received datagram");
                    server.clone().handle_datagram(&socket, &buf[..len], peer, expected_code).await;
                }
            });
        }
    }

    async fn handle_datagram(self: Arc<Self>, socket: &UdpSocket, raw: &[u8], peer: SocketAddr, expected_code: PacketCode) {
        let host = match self.hosts.require(&peer.ip()) {
            Ok(host) => host,
            Err(e) => {
                warn!(%peer, error = %e, "rejecting datagram from unknown host");
                return;
            }
        };

        let request = match codec::decode(raw, self.dict.clone(), host.secret.clone()) {
            Ok(p) => p,
            Err(e) => {
                warn!(%peer, error = %e, "dropping malformed RADIUS packet");
                return;
            }
        };

        if request.packet_code().as_u8() != expected_code.as_u8() {
            debug!(%peer, code = request.code, expected = ?expected_code, "packet code does not match this port's role, dropping");
            return;
        }

        if self.config.enable_pkt_verify {
            if let Err(e) = verify_message_authenticator_of(&request) {
                warn!(%peer, error = %e, "rejecting request that failed Message-Authenticator verification");
                return;
            }
        }

        let dedup_key = (peer, request.id, request.authenticator);
        let window = Duration::from_secs(self.config.dedup_window_secs);
        if let Some(cached_reply) = self.dedup.lookup(dedup_key, window) {
            debug!(%peer, id = request.id, "replaying cached reply for a retransmitted request");
            let _ = socket.send_to(&cached_reply, peer).await;
            return;
        }

        let request_id = request.id;
        let request_authenticator = request.authenticator;
        let secret = host.secret.clone();

        let mut reply = match self.handler.handle(request, peer).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%peer, error = %e, "request handler returned an error; dropping");
                return;
            }
        };
        reply.id = request_id;
        reply.authenticator = request_authenticator;
        reply.secret = secret;

        match codec::encode(&mut reply) {
            Ok(wire) => {
                self.dedup.record(dedup_key, wire.clone());
                let _ = socket.send_to(&wire, peer).await;
            }
            Err(e) => warn!(%peer, error = %e, "failed to encode reply"),
        }
    }
}

fn verify_message_authenticator_of(request: &Packet) -> Result<()> {
    let raw = request
        .raw_packet
        .as_ref()
        .ok_or(PacketError::MissingMessageAuthenticator)?;
    let offset = request
        .message_authenticator_position
        .ok_or(PacketError::MissingMessageAuthenticator)?;
    let received = raw[offset..offset + 16].to_vec();
    let mut zeroed = raw.clone();
    zeroed[offset..offset + 16].fill(0);
    crate::packet::auth::verify_message_authenticator(&zeroed, &request.secret, &received)
        .map_err(RadiusError::Packet)
}

/// Binds a UDP socket through `socket2` so the receive buffer can be
/// tuned before handing the socket to tokio, matching the teacher's
/// practice of reaching for `socket2` for OS-level socket options.
fn bind_udp_socket(addr: SocketAddr) -> Result<UdpSocket> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::DGRAM, None).map_err(RadiusError::Io)?;
    socket.set_reuse_address(true).map_err(RadiusError::Io)?;
    socket.set_recv_buffer_size(1 << 20).map_err(RadiusError::Io)?;
    socket.set_nonblocking(true).map_err(RadiusError::Io)?;
    socket.bind(&addr.into()).map_err(RadiusError::Io)?;
    UdpSocket::from_std(socket.into()).map_err(RadiusError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_cache_forgets_entries_older_than_the_window() {
        let cache = DedupCache::default();
        let key = ("127.0.0.1:1812".parse().unwrap(), 1u8, [0u8; 16]);
        cache.record(key, vec![1, 2, 3]);

        assert_eq!(cache.lookup(key, Duration::from_secs(30)), Some(vec![1, 2, 3]));
        assert_eq!(cache.lookup(key, Duration::from_secs(0)), None);
    }
}
