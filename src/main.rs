//! `rust-radius`: a CLI front end over the `rust_radius` library — send a
//! single RADIUS request as a client, or run a UDP RADIUS server from a
//! TOML configuration file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_radius::client::AsyncClient;
use rust_radius::config::{ClientConfig, ServerConfig};
use rust_radius::dictionary::value::DecodedValue;
use rust_radius::dictionary::Dictionary;
use rust_radius::error::Result;
use rust_radius::packet::{Packet, PacketCode};
use rust_radius::server::{RequestHandler, Server};

#[derive(Parser)]
#[command(author, version, about = "A RADIUS client and server", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Dictionary files to load, in order. Defaults to the bundled core
    /// dictionary if none are given.
    #[arg(short = 'D', long = "dictionary", global = true)]
    dictionary: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single Access-Request and print the reply.
    Auth {
        /// Path to a client configuration TOML file.
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Run the UDP RADIUS server.
    Serve {
        /// Path to a server configuration TOML file.
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let dict = Arc::new(load_dictionary(&args.dictionary)?);

    match args.command {
        Commands::Auth { config, username, password } => run_auth(config, dict, username, password).await,
        Commands::Serve { config } => run_serve(config, dict).await,
    }
}

fn load_dictionary(paths: &[PathBuf]) -> Result<Dictionary> {
    if paths.is_empty() {
        tracing::warn!("no --dictionary given; starting with an empty dictionary");
        return Ok(Dictionary::new());
    }
    Dictionary::from_files(paths)
}

async fn run_auth(config_path: PathBuf, dict: Arc<Dictionary>, username: String, password: String) -> Result<()> {
    let config = ClientConfig::from_file(&config_path)?;
    let client = AsyncClient::new(config, dict).await?;

    let mut request = client.new_request(PacketCode::AccessRequest);
    request.add("User-Name", DecodedValue::String(username))?;
    request.add("User-Password", DecodedValue::String(password))?;

    let reply = client.send(request).await?;
    match reply.packet_code() {
        PacketCode::AccessAccept => tracing::info!("Access-Accept"),
        PacketCode::AccessReject => tracing::info!("Access-Reject"),
        PacketCode::AccessChallenge => tracing::info!("Access-Challenge"),
        other => tracing::warn!(?other, "unexpected reply code"),
    }
    Ok(())
}

async fn run_serve(config_path: PathBuf, dict: Arc<Dictionary>) -> Result<()> {
    let config = ServerConfig::from_file(&config_path)?;
    config.validate()?;
    let handler = Arc::new(AcceptAllHandler);
    let server = Server::new(config, dict, handler);
    server.run().await
}

/// A demonstration handler: accepts every Access-Request, acknowledges
/// every Accounting-Request, and refuses every CoA/Disconnect-Request.
/// Real deployments supply their own `RequestHandler`.
struct AcceptAllHandler;

#[async_trait]
impl RequestHandler for AcceptAllHandler {
    async fn handle(&self, request: Packet, peer: SocketAddr) -> Result<Packet> {
        let reply_code = match request.packet_code() {
            PacketCode::AccessRequest => PacketCode::AccessAccept,
            PacketCode::AccountingRequest => PacketCode::AccountingResponse,
            PacketCode::CoaRequest => PacketCode::CoaNak,
            PacketCode::DisconnectRequest => PacketCode::DisconnectNak,
            other => other,
        };
        tracing::debug!(%peer, ?reply_code, "answering request");
        Ok(Packet::new(reply_code.as_u8(), request.dict.clone(), request.secret.clone()))
    }
}
