// radsec/tls.rs - TLS material loading and certificate pinning for RadSec.
//
// Grounded in the teacher's dependency choice of `rustls`/`tokio-rustls`
// for async TLS (Cargo.toml) and in RFC 6614 §§2.3-2.4 (mutual
// authentication is recommended; fingerprint pinning is a common
// deployment practice when a private CA isn't available).

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::SystemTime;

use rustls::client::{ServerCertVerified, ServerCertVerifier, WebPkiVerifier};
use rustls::{Certificate, PrivateKey, RootCertStore};
use sha2::{Digest, Sha256};

use crate::config::{RadSecConfig, VerifyMode};
use crate::error::{PacketError, RadiusError, Result};

pub fn load_cert_chain(path: &std::path::Path) -> Result<Vec<Certificate>> {
    let file = File::open(path).map_err(RadiusError::Io)?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .map_err(|e| RadiusError::Tls(format!("failed to parse certificate {}: {}", path.display(), e)))?;
    Ok(certs.into_iter().map(Certificate).collect())
}

pub fn load_private_key(path: &std::path::Path) -> Result<PrivateKey> {
    let file = File::open(path).map_err(RadiusError::Io)?;
    let mut reader = BufReader::new(file);
    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut reader)
        .map_err(|e| RadiusError::Tls(format!("failed to parse private key {}: {}", path.display(), e)))?;
    keys.pop()
        .map(PrivateKey)
        .ok_or_else(|| RadiusError::Tls(format!("no private key found in {}", path.display())))
}

pub fn sha256_fingerprint(cert: &Certificate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&cert.0);
    hex::encode(hasher.finalize())
}

pub fn server_tls_config(config: &RadSecConfig) -> Result<rustls::ServerConfig> {
    let chain = load_cert_chain(&config.certfile)?;
    let key = load_private_key(&config.keyfile)?;
    rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .map_err(|e| RadiusError::Tls(e.to_string()))
}

pub fn client_tls_config(config: &RadSecConfig) -> Result<rustls::ClientConfig> {
    let builder = rustls::ClientConfig::builder().with_safe_defaults();

    let client_config = match (config.verify_mode, &config.pin_fingerprint) {
        (VerifyMode::None, fingerprint) => {
            let verifier = Arc::new(FingerprintOrNoneVerifier {
                pinned_fingerprint: fingerprint.clone(),
            });
            builder.with_custom_certificate_verifier(verifier).with_no_client_auth()
        }
        (VerifyMode::Required, pin) => {
            let mut roots = RootCertStore::empty();
            if let Some(ca_path) = &config.ca_certfile {
                for cert in load_cert_chain(ca_path)? {
                    roots
                        .add(&cert)
                        .map_err(|e| RadiusError::Tls(format!("invalid CA certificate: {}", e)))?;
                }
            }
            match pin {
                // Pinning is additive to chain verification, never a
                // substitute for it: both must pass.
                Some(fingerprint) => {
                    let verifier = Arc::new(ChainAndFingerprintVerifier {
                        inner: WebPkiVerifier::new(roots, Vec::new()),
                        pinned_fingerprint: fingerprint.clone(),
                    });
                    builder.with_custom_certificate_verifier(verifier).with_no_client_auth()
                }
                None => builder.with_root_certificates(roots).with_no_client_auth(),
            }
        }
    };
    Ok(client_config)
}

/// Used only for `VerifyMode::None`: accepts a connection if no pinned
/// fingerprint is configured (verification fully disabled) or the peer's
/// leaf certificate's SHA-256 fingerprint matches the configured one,
/// regardless of chain-of-trust. `VerifyMode::Required` with a pinned
/// fingerprint goes through `ChainAndFingerprintVerifier` instead, since
/// pinning there is additive to chain verification, not a replacement.
struct FingerprintOrNoneVerifier {
    pinned_fingerprint: Option<String>,
}

impl ServerCertVerifier for FingerprintOrNoneVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match &self.pinned_fingerprint {
            None => Ok(ServerCertVerified::assertion()),
            Some(expected) => {
                let actual = sha256_fingerprint(end_entity);
                if actual.eq_ignore_ascii_case(expected) {
                    Ok(ServerCertVerified::assertion())
                } else {
                    Err(rustls::Error::General(format!(
                        "peer certificate fingerprint {} does not match pinned {}",
                        actual, expected
                    )))
                }
            }
        }
    }
}

/// `VerifyMode::Required` plus a pinned fingerprint: the peer certificate
/// must pass standard chain-of-trust verification *and* match the pinned
/// SHA-256 fingerprint. Either failing rejects the connection.
struct ChainAndFingerprintVerifier {
    inner: WebPkiVerifier,
    pinned_fingerprint: String,
}

impl ServerCertVerifier for ChainAndFingerprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        intermediates: &[Certificate],
        server_name: &rustls::ServerName,
        scts: &mut dyn Iterator<Item = &[u8]>,
        ocsp_response: &[u8],
        now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        self.inner
            .verify_server_cert(end_entity, intermediates, server_name, scts, ocsp_response, now)?;

        let actual = sha256_fingerprint(end_entity);
        if actual.eq_ignore_ascii_case(&self.pinned_fingerprint) {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::General(format!(
                "peer certificate fingerprint {} does not match pinned {}",
                actual, self.pinned_fingerprint
            )))
        }
    }
}

pub fn fingerprint_error(reason: impl Into<String>) -> RadiusError {
    RadiusError::Packet(PacketError::Framing(reason.into()))
}
