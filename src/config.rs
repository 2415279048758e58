// config.rs - Configuration surface for the client, server and RadSec
// layers.
//
// Keeps the teacher's pattern (serde-derived structs, `#[serde(default =
// "fn")]` per optional field, `Config::from_file`/`export`/`validate`) but
// targets this crate's actual surface: one client, one server, and the
// RadSec transport, per original_source/pyrad2/client.py, server.py and
// radsec/.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RadiusError, Result};

/// A peer the server will accept requests from, or that a client already
/// knows the address and secret of. Mirrors `host::RemoteHost`, minus the
/// runtime-only fields, as the on-disk/on-wire configuration shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteHostConfig {
    pub name: String,
    pub address: IpAddr,
    pub secret: String,
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
    #[serde(default = "default_acct_port")]
    pub acct_port: u16,
    #[serde(default = "default_coa_port")]
    pub coa_port: u16,
}

impl RemoteHostConfig {
    pub fn into_remote_host(self) -> crate::host::RemoteHost {
        crate::host::RemoteHost {
            address: self.address,
            secret: self.secret.into_bytes(),
            name: self.name,
            auth_port: self.auth_port,
            acct_port: self.acct_port,
            coa_port: self.coa_port,
        }
    }
}

/// Configuration for `Client`/`AsyncClient`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server: IpAddr,
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
    #[serde(default = "default_acct_port")]
    pub acct_port: u16,
    #[serde(default = "default_coa_port")]
    pub coa_port: u16,
    pub secret: String,
    #[serde(default)]
    pub dictionary_paths: Vec<PathBuf>,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Local address/port to bind the client socket to. `None` lets the
    /// OS pick an ephemeral port, the common case.
    #[serde(default)]
    pub bind_address: Option<std::net::SocketAddr>,
}

impl ClientConfig {
    pub fn new(server: IpAddr, secret: impl Into<String>) -> Self {
        ClientConfig {
            server,
            auth_port: default_auth_port(),
            acct_port: default_acct_port(),
            coa_port: default_coa_port(),
            secret: secret.into(),
            dictionary_paths: Vec::new(),
            retries: default_retries(),
            timeout_secs: default_timeout_secs(),
            bind_address: None,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_toml(path)
    }
}

/// Configuration for the UDP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addresses")]
    pub bind_addresses: Vec<IpAddr>,
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
    #[serde(default = "default_acct_port")]
    pub acct_port: u16,
    #[serde(default = "default_coa_port")]
    pub coa_port: u16,
    #[serde(default = "default_true")]
    pub auth_enabled: bool,
    #[serde(default = "default_true")]
    pub acct_enabled: bool,
    #[serde(default = "default_true")]
    pub coa_enabled: bool,
    #[serde(default)]
    pub dictionary_paths: Vec<PathBuf>,
    #[serde(default)]
    pub hosts: Vec<RemoteHostConfig>,
    /// Require and verify Message-Authenticator on every Access-Request
    /// (RFC 5080 §2.2 recommends this; not every NAS sends it, so it
    /// defaults off for compatibility).
    #[serde(default = "default_false")]
    pub enable_pkt_verify: bool,
    #[serde(default = "default_false")]
    pub debug: bool,
    /// Window, in seconds, during which a repeated `(source, id,
    /// authenticator)` is treated as a retransmit of an in-flight or
    /// already-answered request rather than a new one (RFC 2865 §3).
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_toml(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addresses.is_empty() {
            return Err(RadiusError::parse("<config>", 0, "server needs at least one bind address"));
        }
        if !self.auth_enabled && !self.acct_enabled && !self.coa_enabled {
            return Err(RadiusError::parse(
                "<config>",
                0,
                "at least one of auth/acct/coa must be enabled",
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addresses: default_bind_addresses(),
            auth_port: default_auth_port(),
            acct_port: default_acct_port(),
            coa_port: default_coa_port(),
            auth_enabled: true,
            acct_enabled: true,
            coa_enabled: true,
            dictionary_paths: Vec::new(),
            hosts: Vec::new(),
            enable_pkt_verify: false,
            debug: false,
            dedup_window_secs: default_dedup_window_secs(),
            worker_threads: default_worker_threads(),
        }
    }
}

/// How strictly a RadSec client verifies the server's TLS certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyMode {
    /// No certificate verification. RFC 6614 §2.3 allows this for
    /// transitional deployments; it should not be used outside testing.
    None,
    /// Standard chain-of-trust verification against `ca_certfile`.
    Required,
}

/// RadSec (RADIUS over TLS, RFC 6614) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg(feature = "radsec")]
pub struct RadSecConfig {
    pub certfile: PathBuf,
    pub keyfile: PathBuf,
    pub ca_certfile: Option<PathBuf>,
    #[serde(default = "default_verify_mode")]
    pub verify_mode: VerifyMode,
    /// Optional SHA-256 fingerprint to pin the peer certificate to, as a
    /// defense in depth beyond chain verification (or in place of it when
    /// `verify_mode` is `None`).
    pub pin_fingerprint: Option<String>,
}

#[cfg(feature = "radsec")]
fn default_verify_mode() -> VerifyMode {
    VerifyMode::Required
}

fn read_toml<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .and_then(|built| built.try_deserialize())
        .map_err(|e| RadiusError::parse(path.display().to_string(), 0, e.to_string()))
}

fn default_auth_port() -> u16 {
    1812
}

fn default_acct_port() -> u16 {
    1813
}

fn default_coa_port() -> u16 {
    3799
}

fn default_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_bind_addresses() -> Vec<IpAddr> {
    vec!["0.0.0.0".parse().unwrap()]
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_dedup_window_secs() -> u64 {
    30
}

fn default_worker_threads() -> usize {
    num_cpus::get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_applies_its_documented_defaults() {
        let cfg = ClientConfig::new("127.0.0.1".parse().unwrap(), "secret");
        assert_eq!(cfg.auth_port, 1812);
        assert_eq!(cfg.acct_port, 1813);
        assert_eq!(cfg.coa_port, 3799);
        assert_eq!(cfg.retries, 3);
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn server_config_rejects_every_transport_disabled() {
        let mut cfg = ServerConfig::default();
        cfg.auth_enabled = false;
        cfg.acct_enabled = false;
        cfg.coa_enabled = false;
        assert!(cfg.validate().is_err());
    }
}
