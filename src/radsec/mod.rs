// radsec/mod.rs - RADIUS-over-TLS (RFC 6614) transport.
//
// Plain RADIUS/UDP framing and encryption ride on obfuscation (PwCrypt)
// and per-attribute secrets; RadSec instead puts the whole exchange
// inside a TLS 1.2+ session over TCP/2083 and keeps the wire format
// byte-for-byte identical to UDP RADIUS, which is why this module only
// adds framing, TLS setup and the fixed `"radsec"` secret on top of
// `packet::codec`.

pub mod client;
pub mod framing;
pub mod server;
pub mod tls;

pub use client::{RadSecClient, RADSEC_SECRET};
pub use server::{RadSecHandler, RadSecServer};
