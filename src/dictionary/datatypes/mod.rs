// dictionary/datatypes/mod.rs - The closed set of RADIUS wire datatypes.
//
// Grounded in original_source/pyrad2/datatypes/{__init__,base,types,structural}.py.
// Modelled as a closed tagged enum rather than open inheritance (spec
// Design Notes §9: "Datatypes form a closed set; implement as a tagged
// variant with a common trait/interface").

mod structural;
mod types;

pub use structural::{decode_tlv, decode_vsa, encode_tlv, encode_vsa};
pub(crate) use types::parse_int;

use std::fmt;

/// Error surfaced by a single datatype's encode/decode/parse operation,
/// before the attribute name is known to the caller. `Attribute::{encode,
/// decode,parse}` wrap this into a `PacketError::{Encode,Decode}Failure`
/// carrying the attribute's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeError(pub String);

impl fmt::Display for DataTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DataTypeError {
    pub fn new(msg: impl Into<String>) -> Self {
        DataTypeError(msg.into())
    }
}

pub type DtResult<T> = Result<T, DataTypeError>;

/// The full set of RADIUS dictionary datatypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Octets,
    Ipaddr,
    Ipv6addr,
    Ipv6prefix,
    Date,
    Integer,
    Short,
    Byte,
    Signed,
    Integer64,
    Ether,
    Ifid,
    AscendBinary,
    Tlv,
    Vsa,
}

impl DataType {
    /// Parse a dictionary-file type token, e.g. `"integer"` or
    /// `"octets[253]"` (the `[...]` length hint, if present, is ignored
    /// here and stripped by the dictionary parser before this is called).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => DataType::String,
            "octets" => DataType::Octets,
            "ipaddr" => DataType::Ipaddr,
            "ipv6addr" => DataType::Ipv6addr,
            "ipv6prefix" => DataType::Ipv6prefix,
            "date" => DataType::Date,
            "integer" => DataType::Integer,
            "short" => DataType::Short,
            "byte" => DataType::Byte,
            "signed" => DataType::Signed,
            "integer64" => DataType::Integer64,
            "ether" => DataType::Ether,
            "ifid" => DataType::Ifid,
            "abinary" => DataType::AscendBinary,
            "tlv" => DataType::Tlv,
            "vsa" => DataType::Vsa,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Octets => "octets",
            DataType::Ipaddr => "ipaddr",
            DataType::Ipv6addr => "ipv6addr",
            DataType::Ipv6prefix => "ipv6prefix",
            DataType::Date => "date",
            DataType::Integer => "integer",
            DataType::Short => "short",
            DataType::Byte => "byte",
            DataType::Signed => "signed",
            DataType::Integer64 => "integer64",
            DataType::Ether => "ether",
            DataType::Ifid => "ifid",
            DataType::AscendBinary => "abinary",
            DataType::Tlv => "tlv",
            DataType::Vsa => "vsa",
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, DataType::Tlv | DataType::Vsa)
    }

    /// Translate a decoded value into wire bytes. Only valid for leaf
    /// (non-structural) types; TLV/VSA containers are encoded via
    /// `structural::encode_tlv`/`encode_vsa`, which need the attribute's
    /// `children` map and are driven from the packet codec.
    pub fn encode(&self, decoded: &super::value::DecodedValue) -> DtResult<Vec<u8>> {
        types::encode(*self, decoded)
    }

    /// Inverse of `encode`, for leaf types.
    pub fn decode(&self, raw: &[u8]) -> DtResult<super::value::DecodedValue> {
        types::decode(*self, raw)
    }

    /// Parse a dictionary `VALUE` line token (or any user-facing string
    /// form) into a decoded value ready to hand to `encode`.
    pub fn parse(&self, s: &str) -> DtResult<super::value::DecodedValue> {
        types::parse(*self, s)
    }

    /// Render a decoded value back into its canonical string form.
    pub fn print(&self, decoded: &super::value::DecodedValue) -> String {
        types::print(*self, decoded)
    }
}
