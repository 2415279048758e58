// dictionary/attribute.rs - A single ATTRIBUTE definition.
//
// Grounded in original_source/pyrad2/dictionary/attribute.py. An `Attribute`
// doubles as a TLV/VSA namespace: its `children` map holds nested
// sub-attribute definitions keyed by name, with `attrindex` as the
// name<->code side-table pyrad2 keeps for the reverse lookup during
// decode.

use indexmap::IndexMap;

use crate::bidict::BiDict;
use crate::dictionary::datatypes::DataType;
use crate::dictionary::value::DecodedValue;
use crate::error::PacketError;

/// Encryption scheme an attribute's value undergoes on the wire, per the
/// dictionary file's `encrypt=N` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encrypt {
    /// No obfuscation.
    None,
    /// RFC 2865 §5.2 User-Password obfuscation.
    UserPassword,
    /// Tunnel-Password obfuscation (RFC 2868). Recognised but not
    /// supported: encoding or decoding an attribute with this flag fails
    /// with `PacketError::UnsupportedEncryption` absent a confirmed wire
    /// test vector.
    TunnelPassword,
    /// Ascend's proprietary "send/receive secret" scheme. Recognised but
    /// not supported, for the same reason as `TunnelPassword`.
    Ascend,
}

impl Encrypt {
    pub fn from_flag(flag: u8) -> Self {
        match flag {
            1 => Encrypt::UserPassword,
            2 => Encrypt::TunnelPassword,
            3 => Encrypt::Ascend,
            _ => Encrypt::None,
        }
    }

    pub fn as_flag(&self) -> u8 {
        match self {
            Encrypt::None => 0,
            Encrypt::UserPassword => 1,
            Encrypt::TunnelPassword => 2,
            Encrypt::Ascend => 3,
        }
    }
}

/// One `ATTRIBUTE` line, plus (for `tlv`/`vsa` containers) the nested
/// sub-attributes declared under it.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub code: u8,
    pub datatype: DataType,
    /// `Some(vendor_id)` when this attribute was declared inside a
    /// `BEGIN-VENDOR`/`END-VENDOR` block.
    pub vendor: Option<u32>,
    pub encrypt: Encrypt,
    /// RFC 2868 "tagged" attributes carry an extra leading tag octet.
    pub has_tag: bool,
    /// Symbolic `VALUE` names for this attribute, keyed to their encoded
    /// wire bytes.
    pub values: BiDict<String, Vec<u8>>,
    /// Sub-attribute definitions, present only when `datatype` is `Tlv` or
    /// `Vsa`.
    pub children: IndexMap<String, Attribute>,
    /// Sub-attribute name <-> code, mirroring `children`'s keys for
    /// decode-time reverse lookup.
    pub attrindex: BiDict<String, u8>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, code: u8, datatype: DataType) -> Self {
        Attribute {
            name: name.into(),
            code,
            datatype,
            vendor: None,
            encrypt: Encrypt::None,
            has_tag: false,
            values: BiDict::new(),
            children: IndexMap::new(),
            attrindex: BiDict::new(),
        }
    }

    pub fn with_vendor(mut self, vendor_id: u32) -> Self {
        self.vendor = Some(vendor_id);
        self
    }

    pub fn with_encrypt(mut self, encrypt: Encrypt) -> Self {
        self.encrypt = encrypt;
        self
    }

    pub fn with_tag(mut self, has_tag: bool) -> Self {
        self.has_tag = has_tag;
        self
    }

    /// Register a nested sub-attribute under a TLV/VSA container.
    pub fn add_child(&mut self, child: Attribute) {
        self.attrindex.add(child.name.clone(), child.code);
        self.children.insert(child.name.clone(), child);
    }

    pub fn child_by_code(&self, code: u8) -> Option<&Attribute> {
        self.attrindex
            .get_backward(&code)
            .and_then(|name| self.children.get(name))
    }

    /// Register a symbolic `VALUE` name for this attribute.
    pub fn add_value(&mut self, name: impl Into<String>, encoded: Vec<u8>) {
        self.values.add(name.into(), encoded);
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Vec<u8>> {
        self.values.get_forward(&name.to_string())
    }

    pub fn name_by_value(&self, encoded: &[u8]) -> Option<&str> {
        self.values.get_backward(&encoded.to_vec()).map(|s| s.as_str())
    }

    /// Encode a decoded value into wire bytes for this attribute's leaf
    /// datatype. Not valid for `Tlv`/`Vsa` attributes; those are assembled
    /// by the packet codec from their children's encoded bytes.
    pub fn encode(&self, decoded: &DecodedValue) -> Result<Vec<u8>, PacketError> {
        if matches!(self.encrypt, Encrypt::TunnelPassword | Encrypt::Ascend) {
            return Err(PacketError::UnsupportedEncryption(self.encrypt.as_flag()));
        }
        self.datatype
            .encode(decoded)
            .map_err(|e| PacketError::EncodeFailure {
                name: self.name.clone(),
                datatype: self.datatype.name(),
                reason: e.to_string(),
            })
    }

    pub fn decode(&self, raw: &[u8]) -> Result<DecodedValue, PacketError> {
        if matches!(self.encrypt, Encrypt::TunnelPassword | Encrypt::Ascend) {
            return Err(PacketError::UnsupportedEncryption(self.encrypt.as_flag()));
        }
        self.datatype
            .decode(raw)
            .map_err(|e| PacketError::DecodeFailure {
                name: self.name.clone(),
                datatype: self.datatype.name(),
                reason: e.to_string(),
            })
    }

    /// Parse a user-facing string (CLI argument, config value, or
    /// dictionary `VALUE` line token) into a decoded value ready for
    /// `encode`. Prefers a registered symbolic `VALUE` name over the
    /// datatype's generic string parser.
    pub fn parse(&self, s: &str) -> Result<DecodedValue, PacketError> {
        if let Some(encoded) = self.value_by_name(s) {
            return self.decode(encoded);
        }
        self.datatype
            .parse(s)
            .map_err(|e| PacketError::EncodeFailure {
                name: self.name.clone(),
                datatype: self.datatype.name(),
                reason: e.to_string(),
            })
    }

    pub fn print(&self, decoded: &DecodedValue) -> String {
        if let Some(name) = self
            .encode(decoded)
            .ok()
            .and_then(|bytes| self.name_by_value(&bytes))
        {
            return name.to_string();
        }
        self.datatype.print(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_value_round_trips_through_parse_and_print() {
        let mut attr = Attribute::new("Service-Type", 6, DataType::Integer);
        attr.add_value("Login-User", 1u32.to_be_bytes().to_vec());
        attr.add_value("Framed-User", 2u32.to_be_bytes().to_vec());

        let decoded = attr.parse("Login-User").unwrap();
        assert_eq!(decoded, DecodedValue::Integer(1));
        assert_eq!(attr.print(&decoded), "Login-User");
    }

    #[test]
    fn unsupported_encryption_is_rejected_at_encode_time() {
        let attr = Attribute::new("Tunnel-Password", 69, DataType::String)
            .with_encrypt(Encrypt::TunnelPassword);
        let err = attr.encode(&DecodedValue::String("secret".into())).unwrap_err();
        assert_eq!(err, PacketError::UnsupportedEncryption(2));
    }

    #[test]
    fn child_lookup_by_code_mirrors_attrindex() {
        let mut parent = Attribute::new("Test-Tlv", 1, DataType::Tlv);
        parent.add_child(Attribute::new("Test-Tlv-Str", 1, DataType::String));
        parent.add_child(Attribute::new("Test-Tlv-Int", 2, DataType::Integer));

        assert_eq!(parent.child_by_code(2).unwrap().name, "Test-Tlv-Int");
        assert!(parent.child_by_code(9).is_none());
    }
}
