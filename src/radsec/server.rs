// radsec/server.rs - RADIUS-over-TLS server (RFC 6614).
//
// Grounded in the teacher's `server.rs` worker-per-socket `tokio::spawn`
// pattern, adapted to "worker per accepted connection": each TLS stream
// is handled independently and framed packets on it are dispatched
// through the same handler trait the plain UDP server uses, so request
// handling logic does not need to know which transport a request arrived
// on.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_rustls::{rustls, TlsAcceptor};
use tracing::{error, info, warn};

use super::client::RADSEC_SECRET;
use super::framing;
use crate::dictionary::Dictionary;
use crate::error::{RadiusError, Result};
use crate::packet::codec;

/// Handles one decoded request and produces the reply to send back.
/// Shared with the plain UDP server (`server::RequestHandler`) so the same
/// authentication/accounting/CoA logic serves both transports.
#[async_trait]
pub trait RadSecHandler: Send + Sync {
    async fn handle(&self, request: crate::packet::Packet, peer: SocketAddr) -> Result<crate::packet::Packet>;
}

pub struct RadSecServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    dict: Arc<Dictionary>,
    handler: Arc<dyn RadSecHandler>,
}

impl RadSecServer {
    pub async fn bind(
        addr: SocketAddr,
        tls_config: Arc<rustls::ServerConfig>,
        dict: Arc<Dictionary>,
        handler: Arc<dyn RadSecHandler>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(RadiusError::Io)?;
        Ok(RadSecServer {
            listener,
            acceptor: TlsAcceptor::from(tls_config),
            dict,
            handler,
        })
    }

    pub async fn run(&self) -> Result<()> {
        loop {
            let (tcp, peer) = self.listener.accept().await.map_err(RadiusError::Io)?;
            let acceptor = self.acceptor.clone();
            let dict = self.dict.clone();
            let handler = self.handler.clone();

            tokio::spawn(async move {
                match acceptor.accept(tcp).await {
                    Ok(tls) => {
                        if let Err(e) = serve_connection(tls, peer, dict, handler).await {
                            warn!(%peer, error = %e, "RadSec connection ended with an error");
                        }
                    }
                    Err(e) => error!(%peer, error = %e, "RadSec TLS handshake failed"),
                }
            });
        }
    }
}

async fn serve_connection(
    mut stream: tokio_rustls::server::TlsStream<tokio::net::TcpStream>,
    peer: SocketAddr,
    dict: Arc<Dictionary>,
    handler: Arc<dyn RadSecHandler>,
) -> Result<()> {
    info!(%peer, "RadSec connection established");
    while let Some(raw) = framing::read_packet(&mut stream).await? {
        let request = match codec::decode(&raw, dict.clone(), RADSEC_SECRET.to_vec()) {
            Ok(p) => p,
            Err(e) => {
                warn!(%peer, error = %e, "dropping malformed RadSec packet");
                continue;
            }
        };

        let request_id = request.id;
        let request_authenticator = request.authenticator;
        let mut reply = handler.handle(request, peer).await?;
        reply.id = request_id;
        reply.authenticator = request_authenticator;

        let wire = codec::encode(&mut reply)?;
        framing::write_packet(&mut stream, &wire).await?;
    }
    info!(%peer, "RadSec connection closed");
    Ok(())
}
