// client.rs - RADIUS client: send a request, wait for the matching reply.
//
// Grounded in original_source/pyrad2/client.py (`Client.SendPacket`,
// `Client._SocketFD`, retry/timeout loop) and radsec/client.py for the
// "one socket, strict per-destination id ordering" client shape. Both a
// blocking (`Client`) and async (`AsyncClient`) variant are provided,
// mirroring the teacher's own mix of blocking utility code and a tokio
// async server.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::dictionary::value::DecodedValue;
use crate::dictionary::Dictionary;
use crate::error::{RadiusError, Result};
use crate::packet::{codec, Packet, PacketCode};

/// Tracks which RADIUS identifiers are currently in flight to each
/// destination, so a new request never reuses an id whose reply hasn't
/// arrived yet (RFC 2865 §3: the Identifier "aids in matching ... replies").
#[derive(Default)]
struct IdAllocator {
    in_flight: Mutex<HashMap<SocketAddr, HashSet<u8>>>,
}

impl IdAllocator {
    fn new() -> Self {
        IdAllocator::default()
    }

    fn allocate(&self, dest: SocketAddr) -> Result<u8> {
        let mut guard = self.in_flight.lock().expect("id allocator lock poisoned");
        let used = guard.entry(dest).or_default();
        if used.len() >= 256 {
            return Err(RadiusError::IdsExhausted);
        }
        for candidate in 0u16..256 {
            let candidate = candidate as u8;
            if !used.contains(&candidate) {
                used.insert(candidate);
                return Ok(candidate);
            }
        }
        Err(RadiusError::IdsExhausted)
    }

    fn release(&self, dest: SocketAddr, id: u8) {
        if let Some(used) = self.in_flight.lock().expect("id allocator lock poisoned").get_mut(&dest) {
            used.remove(&id);
        }
    }
}

/// Which of a peer's three ports a request should go to.
fn port_for_code(config: &ClientConfig, code: PacketCode) -> u16 {
    match code {
        PacketCode::AccountingRequest => config.acct_port,
        PacketCode::CoaRequest | PacketCode::DisconnectRequest => config.coa_port,
        _ => config.auth_port,
    }
}

/// An async, multiplexing RADIUS client: one UDP socket shared across
/// concurrently in-flight requests, correlated by (destination, id).
pub struct AsyncClient {
    config: ClientConfig,
    dict: Arc<Dictionary>,
    socket: UdpSocket,
    ids: IdAllocator,
}

impl AsyncClient {
    pub async fn new(config: ClientConfig, dict: Arc<Dictionary>) -> Result<Self> {
        let bind_addr = config.bind_address.unwrap_or_else(|| {
            let unspecified: IpAddr = if config.server.is_ipv6() {
                "::".parse().unwrap()
            } else {
                "0.0.0.0".parse().unwrap()
            };
            SocketAddr::new(unspecified, 0)
        });
        let socket = UdpSocket::bind(bind_addr).await.map_err(RadiusError::Io)?;
        Ok(AsyncClient {
            config,
            dict,
            socket,
            ids: IdAllocator::new(),
        })
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dict
    }

    /// Build a fresh request packet of the given code, bound to this
    /// client's dictionary and secret, but without an id or authenticator
    /// assigned yet (`send` assigns both).
    pub fn new_request(&self, code: PacketCode) -> Packet {
        Packet::new(code.as_u8(), self.dict.clone(), self.config.secret.clone().into_bytes())
    }

    /// Send a request and wait for its reply, retrying up to
    /// `config.retries` times with `config.timeout_secs` per attempt.
    /// Accounting retransmits have their `Acct-Delay-Time` attribute
    /// updated to reflect elapsed time, per RFC 2866 §5.2.
    pub async fn send(&self, mut request: Packet) -> Result<Packet> {
        let dest = SocketAddr::new(self.config.server, port_for_code(&self.config, request.packet_code()));
        let id = self.ids.allocate(dest)?;
        request.id = id;

        let started = Instant::now();
        let result = self.send_with_retries(&mut request, dest, started).await;
        self.ids.release(dest, id);
        result
    }

    async fn send_with_retries(&self, request: &mut Packet, dest: SocketAddr, started: Instant) -> Result<Packet> {
        let mut last_err = None;
        for attempt in 0..self.config.retries {
            if attempt > 0 && request.packet_code() == PacketCode::AccountingRequest {
                let elapsed = started.elapsed().as_secs() as u32;
                let _ = request.set("Acct-Delay-Time", DecodedValue::Integer(elapsed));
            }

            let wire = codec::encode(request)?;
            self.socket.send_to(&wire, dest).await.map_err(RadiusError::Io)?;
            debug!(attempt, %dest, id = request.id, "sent RADIUS request");

            let mut buf = vec![0u8; 4096];
            let deadline = Duration::from_secs(self.config.timeout_secs);
            match timeout(deadline, self.recv_matching(&mut buf, dest, request.id)).await {
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(e)) => last_err = Some(e),
                Err(_) => {
                    warn!(attempt, %dest, "RADIUS request timed out");
                    last_err = Some(RadiusError::Timeout { attempts: attempt + 1 });
                }
            }
        }
        Err(last_err.unwrap_or(RadiusError::Timeout {
            attempts: self.config.retries,
        }))
    }

    async fn recv_matching(&self, buf: &mut [u8], expect_from: SocketAddr, expect_id: u8) -> Result<Packet> {
        loop {
            let (len, from) = self.socket.recv_from(buf).await.map_err(RadiusError::Io)?;
            if from != expect_from {
                continue;
            }
            let reply = codec::decode(&buf[..len], self.dict.clone(), self.config.secret.clone().into_bytes())?;
            if reply.id != expect_id {
                continue;
            }
            return Ok(reply);
        }
    }
}

/// A single-socket blocking client, for use outside an async runtime.
pub struct Client {
    config: ClientConfig,
    dict: Arc<Dictionary>,
    socket: StdUdpSocket,
    ids: IdAllocator,
}

impl Client {
    pub fn new(config: ClientConfig, dict: Arc<Dictionary>) -> Result<Self> {
        let bind_addr = config.bind_address.unwrap_or_else(|| SocketAddr::new("0.0.0.0".parse().unwrap(), 0));
        let socket = StdUdpSocket::bind(bind_addr).map_err(RadiusError::Io)?;
        Ok(Client {
            config,
            dict,
            socket,
            ids: IdAllocator::new(),
        })
    }

    pub fn new_request(&self, code: PacketCode) -> Packet {
        Packet::new(code.as_u8(), self.dict.clone(), self.config.secret.clone().into_bytes())
    }

    pub fn send(&self, mut request: Packet) -> Result<Packet> {
        let dest = SocketAddr::new(self.config.server, port_for_code(&self.config, request.packet_code()));
        let id = self.ids.allocate(dest)?;
        request.id = id;

        let started = Instant::now();
        let result = self.send_with_retries(&mut request, dest, started);
        self.ids.release(dest, id);
        result
    }

    fn send_with_retries(&self, request: &mut Packet, dest: SocketAddr, started: Instant) -> Result<Packet> {
        self.socket
            .set_read_timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .map_err(RadiusError::Io)?;

        let mut last_err = None;
        for attempt in 0..self.config.retries {
            if attempt > 0 && request.packet_code() == PacketCode::AccountingRequest {
                let elapsed = started.elapsed().as_secs() as u32;
                let _ = request.set("Acct-Delay-Time", DecodedValue::Integer(elapsed));
            }

            let wire = codec::encode(request)?;
            self.socket.send_to(&wire, dest).map_err(RadiusError::Io)?;

            let mut buf = [0u8; 4096];
            loop {
                match self.socket.recv_from(&mut buf) {
                    Ok((len, from)) if from == dest => {
                        match codec::decode(&buf[..len], self.dict.clone(), self.config.secret.clone().into_bytes()) {
                            Ok(reply) if reply.id == request.id => return Ok(reply),
                            Ok(_) => continue,
                            Err(e) => {
                                last_err = Some(e);
                                break;
                            }
                        }
                    }
                    Ok(_) => continue,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                        last_err = Some(RadiusError::Timeout { attempts: attempt + 1 });
                        break;
                    }
                    Err(e) => {
                        last_err = Some(RadiusError::Io(e));
                        break;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(RadiusError::Timeout {
            attempts: self.config.retries,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_allocator_does_not_reuse_an_in_flight_id_and_recovers_after_release() {
        let allocator = IdAllocator::new();
        let dest: SocketAddr = "127.0.0.1:1812".parse().unwrap();

        let mut seen = HashSet::new();
        for _ in 0..256 {
            let id = allocator.allocate(dest).unwrap();
            assert!(seen.insert(id), "id {} allocated twice while in flight", id);
        }
        assert!(allocator.allocate(dest).is_err());

        allocator.release(dest, 5);
        assert_eq!(allocator.allocate(dest).unwrap(), 5);
    }

    /// `retries=2` must produce exactly 2 sends total, not 3 — a request
    /// that never gets a reply has to fail after `retries * timeout_secs`
    /// seconds and report `attempts == retries`.
    #[tokio::test]
    async fn retries_equals_total_attempts_and_reports_the_configured_count_on_timeout() {
        let dict = Arc::new(Dictionary::new());
        // Nothing listens on this port, so every attempt times out.
        let mut config = ClientConfig::new("127.0.0.1".parse().unwrap(), "secret");
        config.auth_port = 18897;
        config.acct_port = 18897;
        config.retries = 2;
        config.timeout_secs = 1;

        let client = AsyncClient::new(config, dict).await.unwrap();
        let request = client.new_request(PacketCode::AccessRequest);

        let started = Instant::now();
        let err = client.send(request).await.unwrap_err();
        assert!(started.elapsed() >= Duration::from_secs(2));
        match err {
            RadiusError::Timeout { attempts } => assert_eq!(attempts, 2),
            other => panic!("expected Timeout, got {:?}", other),
        }
    }
}
