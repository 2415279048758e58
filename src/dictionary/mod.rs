// dictionary/mod.rs - Attribute/vendor namespace assembled from dictionary
// files.
//
// Grounded in original_source/pyrad2/dictionary/dictionary.py's `Dictionary`
// class: a flat top-level `attributes` namespace, plus one nested namespace
// per declared `VENDOR`. `vendors` is seeded with the empty/"no vendor"
// entry `("", 0)`, matching pyrad2's own seed, so code that always looks a
// vendor id up through this map never has to special-case "no vendor".

pub mod attribute;
pub mod datatypes;
pub mod parser;
pub mod value;
pub mod vendor;

use std::path::Path;

use indexmap::IndexMap;

use crate::bidict::BiDict;
use crate::error::{RadiusError, Result};
use attribute::Attribute;
use vendor::Vendor;

#[derive(Debug, Clone)]
pub struct Dictionary {
    pub attributes: IndexMap<String, Attribute>,
    pub attrindex: BiDict<String, u8>,
    pub vendors: BiDict<String, u32>,
    pub vendor_namespaces: IndexMap<String, Vendor>,
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl Dictionary {
    pub fn new() -> Self {
        let mut vendors = BiDict::new();
        vendors.add(String::new(), 0);
        Dictionary {
            attributes: IndexMap::new(),
            attrindex: BiDict::new(),
            vendors,
            vendor_namespaces: IndexMap::new(),
        }
    }

    /// Parse a dictionary file (and any `$INCLUDE`s it pulls in) into this
    /// dictionary.
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        parser::parse_file(self, path.as_ref())
    }

    /// Build a dictionary from a single file, convenience wrapper around
    /// `new` + `read_file`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut dict = Self::new();
        dict.read_file(path)?;
        Ok(dict)
    }

    /// Build a dictionary from an ordered list of files, each read into the
    /// same namespace (later files may add vendors/attributes the earlier
    /// ones reference, but cannot redefine what's already there).
    pub fn from_files(paths: impl IntoIterator<Item = impl AsRef<Path>>) -> Result<Self> {
        let mut dict = Self::new();
        for path in paths {
            dict.read_file(path)?;
        }
        Ok(dict)
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_by_code(&self, code: u8) -> Option<&Attribute> {
        self.attrindex
            .get_backward(&code)
            .and_then(|name| self.attributes.get(name))
    }

    pub fn vendor_by_name(&self, name: &str) -> Option<&Vendor> {
        self.vendor_namespaces.get(name)
    }

    pub fn vendor_by_id(&self, id: u32) -> Option<&Vendor> {
        self.vendors
            .get_backward(&id)
            .and_then(|name| self.vendor_namespaces.get(name))
    }

    pub fn vendor_id_by_name(&self, name: &str) -> Option<u32> {
        self.vendors.get_forward(&name.to_string()).copied()
    }

    pub fn vendor_attribute_by_name(&self, vendor_id: u32, attr_name: &str) -> Option<&Attribute> {
        self.vendor_by_id(vendor_id)
            .and_then(|v| v.attribute_by_name(attr_name))
    }

    pub fn vendor_attribute_by_code(&self, vendor_id: u32, code: u8) -> Option<&Attribute> {
        self.vendor_by_id(vendor_id)
            .and_then(|v| v.attribute_by_code(code))
    }

    /// Resolve a `Vendor-Name.Attribute-Name`, plain `Attribute-Name`, or
    /// `Vendor-Specific.Vendor-Name.Attribute-Name` style lookup key used
    /// by the packet's name-keyed façade.
    pub fn resolve(&self, qualified_name: &str) -> Result<&Attribute> {
        if let Some((vendor_name, attr_name)) = qualified_name.split_once('.') {
            if let Some(vid) = self.vendor_id_by_name(vendor_name) {
                if let Some(attr) = self.vendor_attribute_by_name(vid, attr_name) {
                    return Ok(attr);
                }
            }
        }
        self.attribute_by_name(qualified_name)
            .ok_or_else(|| RadiusError::Packet(crate::error::PacketError::UnknownAttribute(qualified_name.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_dict(contents: &str) -> tempfile_dict::TempDict {
        tempfile_dict::TempDict::new(contents)
    }

    /// Minimal stand-in for a temp-file helper crate: writes to a uniquely
    /// named file under the OS temp dir and removes it on drop.
    mod tempfile_dict {
        use std::fs;
        use std::path::PathBuf;

        pub struct TempDict {
            pub path: PathBuf,
        }

        impl TempDict {
            pub fn new(contents: &str) -> Self {
                let mut path = std::env::temp_dir();
                let unique = format!(
                    "rust-radius-test-dict-{}-{}.txt",
                    std::process::id(),
                    contents.len()
                );
                path.push(unique);
                fs::write(&path, contents).unwrap();
                TempDict { path }
            }
        }

        impl Drop for TempDict {
            fn drop(&mut self) {
                let _ = fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn parses_attributes_values_and_vendor_blocks() {
        let dict_text = "\
ATTRIBUTE   User-Name      1   string
ATTRIBUTE   Service-Type   6   integer
VALUE       Service-Type   Login-User   1
VENDOR      Microsoft      311
BEGIN-VENDOR Microsoft
ATTRIBUTE   MS-CHAP-Response 2 octets
END-VENDOR  Microsoft
";
        let temp = write_dict(dict_text);
        let dict = Dictionary::from_file(&temp.path).unwrap();

        let user_name = dict.attribute_by_name("User-Name").unwrap();
        assert_eq!(user_name.code, 1);

        let service_type = dict.attribute_by_name("Service-Type").unwrap();
        assert_eq!(service_type.value_by_name("Login-User"), Some(&1u32.to_be_bytes().to_vec()));

        assert_eq!(dict.vendor_id_by_name("Microsoft"), Some(311));
        assert_eq!(
            dict.vendor_attribute_by_name(311, "MS-CHAP-Response").unwrap().code,
            2
        );
    }

    #[test]
    fn value_line_preceding_its_attribute_is_resolved_in_a_second_pass() {
        let dict_text = "\
VALUE       Service-Type   Login-User   1
ATTRIBUTE   Service-Type   6   integer
";
        let temp = write_dict(dict_text);
        let dict = Dictionary::from_file(&temp.path).unwrap();
        let service_type = dict.attribute_by_name("Service-Type").unwrap();
        assert_eq!(service_type.value_by_name("Login-User"), Some(&1u32.to_be_bytes().to_vec()));
    }

    #[test]
    fn dotted_codes_nest_sub_attributes_under_a_tlv_parent() {
        let dict_text = "\
ATTRIBUTE   Test-Tlv       1    tlv
ATTRIBUTE   Test-Tlv-Str   1.1  string
ATTRIBUTE   Test-Tlv-Int   1.2  integer
";
        let temp = write_dict(dict_text);
        let dict = Dictionary::from_file(&temp.path).unwrap();
        let tlv = dict.attribute_by_name("Test-Tlv").unwrap();
        assert_eq!(tlv.child_by_code(1).unwrap().name, "Test-Tlv-Str");
        assert_eq!(tlv.child_by_code(2).unwrap().name, "Test-Tlv-Int");
    }

    #[test]
    fn unresolved_value_after_full_parse_is_an_error() {
        let dict_text = "VALUE   Nonexistent   Foo   1\n";
        let temp = write_dict(dict_text);
        let err = Dictionary::from_file(&temp.path).unwrap_err();
        assert!(matches!(err, RadiusError::Parse { .. }));
    }
}
