// packet/mod.rs - A decoded RADIUS packet: header, authenticator and an
// insertion-ordered attribute map.
//
// Grounded in original_source/pyrad2's `Packet`/`AuthPacket`/`AcctPacket`
// (pyrad2/packet.py, read via tests/test_packet.py) and RFC 2865/2866/5176.
// `attributes` is an `IndexMap` rather than a `HashMap` specifically to
// preserve on-wire AVP order, which several conformance tests (and some
// NAS implementations) depend on.

pub mod auth;
pub mod codec;

use std::net::SocketAddr;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::dictionary::value::{DecodedSlot, DecodedValue, RawSlot};
use crate::dictionary::Dictionary;
use crate::error::{PacketError, RadiusError, Result};

/// Standard RADIUS packet codes (RFC 2865 §3, RFC 2866 §3, RFC 5176 §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketCode {
    AccessRequest,
    AccessAccept,
    AccessReject,
    AccountingRequest,
    AccountingResponse,
    AccessChallenge,
    StatusServer,
    StatusClient,
    DisconnectRequest,
    DisconnectAck,
    DisconnectNak,
    CoaRequest,
    CoaAck,
    CoaNak,
    Other(u8),
}

impl PacketCode {
    pub fn from_u8(code: u8) -> Self {
        match code {
            1 => PacketCode::AccessRequest,
            2 => PacketCode::AccessAccept,
            3 => PacketCode::AccessReject,
            4 => PacketCode::AccountingRequest,
            5 => PacketCode::AccountingResponse,
            11 => PacketCode::AccessChallenge,
            12 => PacketCode::StatusServer,
            13 => PacketCode::StatusClient,
            40 => PacketCode::DisconnectRequest,
            41 => PacketCode::DisconnectAck,
            42 => PacketCode::DisconnectNak,
            43 => PacketCode::CoaRequest,
            44 => PacketCode::CoaAck,
            45 => PacketCode::CoaNak,
            other => PacketCode::Other(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            PacketCode::AccessRequest => 1,
            PacketCode::AccessAccept => 2,
            PacketCode::AccessReject => 3,
            PacketCode::AccountingRequest => 4,
            PacketCode::AccountingResponse => 5,
            PacketCode::AccessChallenge => 11,
            PacketCode::StatusServer => 12,
            PacketCode::StatusClient => 13,
            PacketCode::DisconnectRequest => 40,
            PacketCode::DisconnectAck => 41,
            PacketCode::DisconnectNak => 42,
            PacketCode::CoaRequest => 43,
            PacketCode::CoaAck => 44,
            PacketCode::CoaNak => 45,
            PacketCode::Other(v) => *v,
        }
    }

    /// Whether this is a reply code (its authenticator is MD5 over
    /// code+id+length+request-authenticator+body+secret, rather than
    /// computed from the packet's own fields alone).
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            PacketCode::AccessAccept
                | PacketCode::AccessReject
                | PacketCode::AccessChallenge
                | PacketCode::AccountingResponse
                | PacketCode::DisconnectAck
                | PacketCode::DisconnectNak
                | PacketCode::CoaAck
                | PacketCode::CoaNak
        )
    }
}

/// Key under which one attribute's value(s) are stored in a packet's
/// attribute map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    /// A standard (non-vendor) attribute, keyed by its AVP code.
    Standard(u8),
    /// A vendor sub-attribute decoded out of a Vendor-Specific (26) AVP,
    /// keyed by vendor id and sub-attribute code.
    Vendor(u32, u8),
    /// A Vendor-Specific AVP whose value was too short to even contain a
    /// vendor id; kept opaque rather than dropped.
    Unknown(u8),
}

/// A RADIUS packet: header fields plus an insertion-ordered attribute map.
#[derive(Debug, Clone)]
pub struct Packet {
    pub code: u8,
    pub id: u8,
    pub authenticator: [u8; 16],
    pub secret: Vec<u8>,
    pub dict: Arc<Dictionary>,
    pub attributes: IndexMap<AttributeKey, RawSlot>,
    /// The exact bytes this packet was decoded from, kept for
    /// Message-Authenticator/reply-authenticator verification (which must
    /// hash the wire form, not a re-encoding of it).
    pub raw_packet: Option<Vec<u8>>,
    /// Byte offset of the Message-Authenticator attribute's 16-byte value
    /// within `raw_packet`, if one was present.
    pub message_authenticator_position: Option<usize>,
    pub source: Option<SocketAddr>,
}

impl Packet {
    pub fn new(code: u8, dict: Arc<Dictionary>, secret: impl Into<Vec<u8>>) -> Self {
        // RFC 2865 §5.2 User-Password obfuscation keys off the Request
        // Authenticator, so an Access-Request needs one before any
        // attribute is added, not just at encode time.
        let authenticator = if PacketCode::from_u8(code) == PacketCode::AccessRequest {
            auth::random_authenticator()
        } else {
            [0u8; 16]
        };
        Packet {
            code,
            id: 0,
            authenticator,
            secret: secret.into(),
            dict,
            attributes: IndexMap::new(),
            raw_packet: None,
            message_authenticator_position: None,
            source: None,
        }
    }

    pub fn packet_code(&self) -> PacketCode {
        PacketCode::from_u8(self.code)
    }

    /// Add a value to a standard attribute, a vendor sub-attribute
    /// (`"Vendor-Name.Attribute-Name"`), or a child of a standard TLV
    /// container (`"Container-Name.Child-Name"`). Appends rather than
    /// replaces, matching multi-valued AVP semantics. `User-Password`
    /// attributes are obfuscated here (RFC 2865 §5.2), keyed to this
    /// packet's current Authenticator — set it before calling `add` if it
    /// needs to differ from the one `new` already generated.
    pub fn add(&mut self, name: &str, value: DecodedValue) -> Result<()> {
        if let Some((parent_name, child_name)) = name.split_once('.') {
            if self.dict.vendor_id_by_name(parent_name).is_none() {
                if let Some(parent) = self.dict.attribute_by_name(parent_name) {
                    if let Some(child) = parent.children.get(child_name) {
                        let encoded = child.encode(&value)?;
                        match self
                            .attributes
                            .entry(AttributeKey::Standard(parent.code))
                            .or_insert_with(|| RawSlot::Tlv(IndexMap::new()))
                        {
                            RawSlot::Tlv(children) => children.entry(child.code).or_default().push(encoded),
                            RawSlot::Leaf(_) => {
                                return Err(RadiusError::Packet(PacketError::EncodeFailure {
                                    name: parent.name.clone(),
                                    datatype: parent.datatype.name(),
                                    reason: "attribute is a leaf value, not a TLV container".to_string(),
                                }))
                            }
                        }
                        return Ok(());
                    }
                }
            }
        }

        let attr = self.dict.resolve(name)?;
        let mut encoded = attr.encode(&value)?;
        if attr.encrypt == crate::dictionary::attribute::Encrypt::UserPassword {
            encoded = auth::pwcrypt_encode(&encoded, &self.secret, &self.authenticator);
        }
        let key = match attr.vendor {
            Some(vendor_id) => AttributeKey::Vendor(vendor_id, attr.code),
            None => AttributeKey::Standard(attr.code),
        };
        match self.attributes.entry(key).or_insert_with(|| RawSlot::Leaf(Vec::new())) {
            RawSlot::Leaf(values) => values.push(encoded),
            RawSlot::Tlv(_) => {
                return Err(RadiusError::Packet(PacketError::EncodeFailure {
                    name: attr.name.clone(),
                    datatype: attr.datatype.name(),
                    reason: "attribute is a TLV/VSA container, not a leaf value".to_string(),
                }))
            }
        }
        Ok(())
    }

    /// Replace all existing values of an attribute with a single value.
    pub fn set(&mut self, name: &str, value: DecodedValue) -> Result<()> {
        let attr = self.dict.resolve(name)?;
        let key = match attr.vendor {
            Some(vendor_id) => AttributeKey::Vendor(vendor_id, attr.code),
            None => AttributeKey::Standard(attr.code),
        };
        self.attributes.shift_remove(&key);
        self.add(name, value)
    }

    pub fn raw_by_code(&self, code: u8) -> Option<&RawSlot> {
        self.attributes.get(&AttributeKey::Standard(code))
    }

    pub fn raw_by_vendor_code(&self, vendor_id: u32, code: u8) -> Option<&RawSlot> {
        self.attributes.get(&AttributeKey::Vendor(vendor_id, code))
    }

    /// Decode every instance of a named attribute.
    pub fn get(&self, name: &str) -> Result<Option<DecodedSlot>> {
        let attr = self.dict.resolve(name)?;
        let key = match attr.vendor {
            Some(vendor_id) => AttributeKey::Vendor(vendor_id, attr.code),
            None => AttributeKey::Standard(attr.code),
        };
        let Some(slot) = self.attributes.get(&key) else {
            return Ok(None);
        };
        match slot {
            RawSlot::Leaf(instances) => {
                let decoded = instances
                    .iter()
                    .map(|raw| {
                        if attr.encrypt == crate::dictionary::attribute::Encrypt::UserPassword {
                            let plain = auth::pwcrypt_decode(raw, &self.secret, &self.authenticator);
                            let trimmed_len = plain.iter().rposition(|&b| b != 0).map(|i| i + 1).unwrap_or(0);
                            attr.decode(&plain[..trimmed_len])
                        } else {
                            attr.decode(raw)
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(RadiusError::Packet)?;
                Ok(Some(DecodedSlot::Leaf(decoded)))
            }
            RawSlot::Tlv(children_raw) => {
                let mut out = IndexMap::new();
                for (name, child) in &attr.children {
                    if let Some(instances) = children_raw.get(&child.code) {
                        let decoded = instances
                            .iter()
                            .map(|raw| child.decode(raw))
                            .collect::<Result<Vec<_>, _>>()
                            .map_err(RadiusError::Packet)?;
                        out.insert(name.clone(), decoded);
                    }
                }
                Ok(Some(DecodedSlot::Tlv(out)))
            }
        }
    }

    /// Get the first decoded value of a named attribute, the common case
    /// for single-valued attributes like `User-Name`.
    pub fn get_one(&self, name: &str) -> Result<Option<DecodedValue>> {
        match self.get(name)? {
            Some(DecodedSlot::Leaf(mut values)) if !values.is_empty() => Ok(Some(values.remove(0))),
            _ => Ok(None),
        }
    }
}
