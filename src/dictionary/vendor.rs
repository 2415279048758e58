// dictionary/vendor.rs - A BEGIN-VENDOR/END-VENDOR block's attribute
// namespace.
//
// Grounded in original_source/pyrad2/dictionary/vendor.py. A `Vendor` is
// structurally the same kind of name<->code namespace as `Attribute`'s
// `children`/`attrindex`, just scoped to a whole `VENDOR` id instead of one
// TLV container.

use indexmap::IndexMap;

use crate::bidict::BiDict;
use crate::dictionary::attribute::Attribute;

#[derive(Debug, Clone)]
pub struct Vendor {
    pub name: String,
    pub id: u32,
    pub attributes: IndexMap<String, Attribute>,
    pub attrindex: BiDict<String, u8>,
}

impl Vendor {
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Vendor {
            name: name.into(),
            id,
            attributes: IndexMap::new(),
            attrindex: BiDict::new(),
        }
    }

    pub fn add_attribute(&mut self, attr: Attribute) {
        self.attrindex.add(attr.name.clone(), attr.code);
        self.attributes.insert(attr.name.clone(), attr);
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_by_code(&self, code: u8) -> Option<&Attribute> {
        self.attrindex
            .get_backward(&code)
            .and_then(|name| self.attributes.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::datatypes::DataType;

    #[test]
    fn attributes_are_reachable_by_name_and_by_code() {
        let mut vendor = Vendor::new("Microsoft", 311);
        vendor.add_attribute(Attribute::new("MS-CHAP-Response", 2, DataType::Octets));

        assert_eq!(vendor.attribute_by_name("MS-CHAP-Response").unwrap().code, 2);
        assert_eq!(
            vendor.attribute_by_code(2).unwrap().name,
            "MS-CHAP-Response"
        );
        assert!(vendor.attribute_by_code(99).is_none());
    }
}
