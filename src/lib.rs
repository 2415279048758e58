//! A RADIUS (RFC 2865/2866/5176) client and server library, with an
//! optional RadSec (RFC 6614, RADIUS-over-TLS) transport.
//!
//! The dictionary, packet and authenticator/Message-Authenticator
//! machinery live under [`dictionary`] and [`packet`]; [`client`] and
//! [`server`] build a concrete UDP client/server on top of them, and
//! [`radsec`] (behind the `radsec` feature, on by default) does the same
//! over TLS. [`error::RadiusError`] is the single error type every
//! fallible call in this crate returns.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rust_radius::client::AsyncClient;
//! use rust_radius::config::ClientConfig;
//! use rust_radius::dictionary::value::DecodedValue;
//! use rust_radius::dictionary::Dictionary;
//! use rust_radius::packet::PacketCode;
//!
//! #[tokio::main]
//! async fn main() -> rust_radius::error::Result<()> {
//!     let dict = Arc::new(Dictionary::from_files(["dictionary/dictionary.radius"])?);
//!     let config = ClientConfig::new("127.0.0.1".parse().unwrap(), "testing123");
//!     let client = AsyncClient::new(config, dict).await?;
//!
//!     let mut request = client.new_request(PacketCode::AccessRequest);
//!     request.add("User-Name", DecodedValue::String("bob".into()))?;
//!     request.add("User-Password", DecodedValue::String("hello".into()))?;
//!
//!     let reply = client.send(request).await?;
//!     println!("{:?}", reply.packet_code());
//!     Ok(())
//! }
//! ```

pub mod bidict;
pub mod client;
pub mod config;
pub mod dictionary;
pub mod eap;
pub mod error;
pub mod host;
pub mod packet;
#[cfg(feature = "radsec")]
pub mod radsec;
pub mod server;

pub use error::{RadiusError, Result};
