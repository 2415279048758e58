// error.rs - Typed error taxonomy for rust-radius
//
// Every fallible library API returns `Result<T, RadiusError>`. Library code
// never panics on malformed input; `unwrap()`/`expect()` are reserved for
// invariants already checked earlier in the same function or for test code.

use std::io;
use std::net::IpAddr;

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, RadiusError>;

/// Unified error type surfaced to callers of the dictionary, packet codec,
/// and transport layers.
#[derive(Debug, thiserror::Error)]
pub enum RadiusError {
    /// Packet encode/decode/verification failure.
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    /// Dictionary file parse failure. Fatal at load time.
    #[error("dictionary parse error in {file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    /// No reply received within the retry/timeout budget.
    #[error("timed out waiting for a reply after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    /// An in-flight `send_packet` was cancelled before a reply arrived.
    #[error("request was cancelled")]
    Cancelled,

    /// A datagram or connection came from a peer not present in the host
    /// registry.
    #[error("no matching host for {0}")]
    Authorization(IpAddr),

    /// Every RADIUS identifier for a destination is currently in-flight.
    #[error("identifier space exhausted for this destination")]
    IdsExhausted,

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS handshake or certificate-verification failure (RadSec).
    #[cfg(feature = "radsec")]
    #[error("TLS error: {0}")]
    Tls(String),
}

impl RadiusError {
    pub fn parse(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        RadiusError::Parse {
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}

/// Errors raised while encoding, decoding, or verifying a RADIUS packet.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet header is corrupt: {0}")]
    CorruptHeader(String),

    #[error("packet length {declared} is invalid (must be 20..=4095)")]
    InvalidLength { declared: usize },

    #[error("packet length {declared} exceeds received {actual} bytes")]
    LengthExceedsBuffer { declared: usize, actual: usize },

    #[error("attribute {code} declares length {length}, which is too small")]
    AttributeTooSmall { code: u8, length: usize },

    #[error("attribute at offset {offset} runs past the end of the packet")]
    AttributeOverrun { offset: usize },

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("attribute {name} value cannot be encoded as {datatype}: {reason}")]
    EncodeFailure {
        name: String,
        datatype: &'static str,
        reason: String,
    },

    #[error("attribute {name} value cannot be decoded as {datatype}: {reason}")]
    DecodeFailure {
        name: String,
        datatype: &'static str,
        reason: String,
    },

    #[error("value too long for a single AVP: {len} bytes")]
    ValueTooLong { len: usize },

    #[error("TLV body too long for a single AVP: {len} bytes")]
    TlvTooLong { len: usize },

    #[error("encrypt={0} is recognised but not supported")]
    UnsupportedEncryption(u8),

    #[error("secret must not be empty for this operation")]
    EmptySecret,

    #[error("Message-Authenticator attribute is missing")]
    MissingMessageAuthenticator,

    #[error("Message-Authenticator verification failed")]
    MessageAuthenticatorMismatch,

    #[error("reply authenticator verification failed")]
    ReplyAuthenticatorMismatch,

    #[error("reply id {reply_id} does not match request id {request_id}")]
    IdMismatch { request_id: u8, reply_id: u8 },

    #[error("invalid RadSec frame: {0}")]
    Framing(String),
}
