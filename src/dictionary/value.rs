// value.rs - Decoded and raw value shapes shared by the dictionary and the
// packet codec.
//
// The packet's attribute map stores a `RawSlot` per key (raw bytes, as the
// wire carries them) and exposes a `DecodedSlot` at the name-keyed façade
// (decoded Rust values). This mirrors pyrad2's rule that "values stored
// under an integer key are always raw bytes; values stored under a name key
// are decoded forms" (spec data model, Packet).

use std::net::{Ipv4Addr, Ipv6Addr};

use indexmap::IndexMap;

/// A single decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    String(String),
    Bytes(Vec<u8>),
    Integer(u32),
    Integer64(u64),
    Signed(i32),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Ipv6Prefix(Ipv6Addr, u8),
    /// Colon-separated hex octets, e.g. `"00:11:22:33:44:55"`.
    Ether(String),
    /// Colon-separated hex quads, e.g. `"0011:2233:4455:6677"`.
    Ifid(String),
    /// Seconds since the Unix epoch.
    Date(u32),
}

impl DecodedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DecodedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<u32> {
        match self {
            DecodedValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DecodedValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// One raw-bytes instance of a leaf attribute, or the sub-attribute map of a
/// TLV/VSA container. A standard or vendor attribute slot holds a list of
/// leaf instances (multi-valued attributes each emit their own AVP); a TLV
/// slot holds exactly one nested sub-code -> instances map.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSlot {
    Leaf(Vec<Vec<u8>>),
    Tlv(IndexMap<u8, Vec<Vec<u8>>>),
}

impl RawSlot {
    pub fn as_leaf(&self) -> Option<&[Vec<u8>]> {
        match self {
            RawSlot::Leaf(v) => Some(v),
            RawSlot::Tlv(_) => None,
        }
    }

    pub fn as_tlv(&self) -> Option<&IndexMap<u8, Vec<Vec<u8>>>> {
        match self {
            RawSlot::Tlv(m) => Some(m),
            RawSlot::Leaf(_) => None,
        }
    }
}

/// The decoded counterpart of `RawSlot`, returned through the name-keyed
/// façade.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedSlot {
    Leaf(Vec<DecodedValue>),
    Tlv(IndexMap<String, Vec<DecodedValue>>),
}

impl DecodedSlot {
    pub fn as_leaf(&self) -> Option<&[DecodedValue]> {
        match self {
            DecodedSlot::Leaf(v) => Some(v),
            DecodedSlot::Tlv(_) => None,
        }
    }
}
