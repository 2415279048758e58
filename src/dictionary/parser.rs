// dictionary/parser.rs - Dictionary file grammar.
//
// Grounded in original_source/pyrad2/dictionary/dictionary.py: a line-based
// grammar of `ATTRIBUTE`, `VALUE`, `VENDOR`, `BEGIN-VENDOR`/`END-VENDOR` and
// `$INCLUDE` directives, parsed in two passes because a `VALUE` line may
// precede the `ATTRIBUTE` line it names (pyrad2 queues unresolved `VALUE`
// lines and replays them once the whole file, and its `$INCLUDE`s, have
// been read).

use std::fs;
use std::path::{Path, PathBuf};

use crate::dictionary::attribute::{Attribute, Encrypt};
use crate::dictionary::datatypes::{parse_int, DataType};
use crate::dictionary::vendor::Vendor;
use crate::dictionary::Dictionary;
use crate::error::RadiusError;

/// Attribute codes accept decimal, `0x...` hex, and `0o...` octal, the same
/// as a `VALUE` line's literal (`int(value, 0)` in the original grammar).
fn parse_attribute_code(field: &str, file: &str, line: usize) -> Result<u8, RadiusError> {
    let v = parse_int(field).map_err(|e| RadiusError::parse(file, line, e.to_string()))?;
    u8::try_from(v).map_err(|_| RadiusError::parse(file, line, format!("attribute code {:?} does not fit in a byte", field)))
}

/// A `VALUE` line that could not be resolved immediately because its
/// attribute had not yet been declared.
struct PendingValue {
    vendor: Option<String>,
    attribute: String,
    value_name: String,
    value_literal: String,
    file: String,
    line: usize,
}

pub fn parse_file(dict: &mut Dictionary, path: &Path) -> Result<(), RadiusError> {
    let mut pending = Vec::new();
    parse_file_into(dict, path, &mut pending)?;
    resolve_pending(dict, pending)
}

fn parse_file_into(
    dict: &mut Dictionary,
    path: &Path,
    pending: &mut Vec<PendingValue>,
) -> Result<(), RadiusError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        RadiusError::parse(path.display().to_string(), 0, format!("cannot read file: {}", e))
    })?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let file_label = path.display().to_string();

    let mut current_vendor: Option<String> = None;

    for (idx, raw_line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let keyword = tokens[0].to_uppercase();

        match keyword.as_str() {
            "$INCLUDE" => {
                let rest = tokens.get(1).ok_or_else(|| {
                    RadiusError::parse(&file_label, line_no, "$INCLUDE needs a path")
                })?;
                let include_path = resolve_include(&dir, rest);
                parse_file_into(dict, &include_path, pending)?;
            }
            "ATTRIBUTE" => {
                parse_attribute_line(dict, &tokens, current_vendor.as_deref(), &file_label, line_no)?;
            }
            "VALUE" => {
                parse_value_line(dict, &tokens, current_vendor.as_deref(), &file_label, line_no, pending)?;
            }
            "VENDOR" => {
                parse_vendor_line(dict, &tokens, &file_label, line_no)?;
            }
            "BEGIN-VENDOR" => {
                let name = tokens.get(1).ok_or_else(|| {
                    RadiusError::parse(&file_label, line_no, "BEGIN-VENDOR needs a vendor name")
                })?;
                if !dict.vendors.has_forward(&name.to_string()) {
                    return Err(RadiusError::parse(
                        &file_label,
                        line_no,
                        format!("BEGIN-VENDOR references unknown vendor {:?}", name),
                    ));
                }
                current_vendor = Some(name.to_string());
            }
            "END-VENDOR" => {
                current_vendor = None;
            }
            other => {
                return Err(RadiusError::parse(
                    &file_label,
                    line_no,
                    format!("unrecognised directive {:?}", other),
                ));
            }
        }
    }
    Ok(())
}

fn resolve_include(dir: &Path, rest: &str) -> PathBuf {
    let candidate = Path::new(rest);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        dir.join(candidate)
    }
}

/// `ATTRIBUTE name code type [options]`. A dotted code (`1.2`) declares a
/// nested sub-attribute: the first segment names the parent TLV/VSA
/// attribute's code in the current scope, and the remainder addresses the
/// (possibly multiply) nested container to insert into.
fn parse_attribute_line(
    dict: &mut Dictionary,
    tokens: &[&str],
    current_vendor: Option<&str>,
    file: &str,
    line: usize,
) -> Result<(), RadiusError> {
    if tokens.len() < 4 {
        return Err(RadiusError::parse(file, line, "ATTRIBUTE needs name, code and type"));
    }
    let name = tokens[1].to_string();
    let code_field = tokens[2];
    let type_field = tokens[3];
    let options = tokens.get(4).copied().unwrap_or("");

    let (base_type, _length_hint) = split_type_hint(type_field);
    let datatype = DataType::from_name(base_type).ok_or_else(|| {
        RadiusError::parse(file, line, format!("unknown datatype {:?}", base_type))
    })?;

    let mut encrypt = Encrypt::None;
    let mut has_tag = false;
    if !options.is_empty() {
        for opt in options.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some(val) = opt.strip_prefix("encrypt=") {
                let flag: u8 = val
                    .parse()
                    .map_err(|_| RadiusError::parse(file, line, format!("bad encrypt= value {:?}", val)))?;
                encrypt = Encrypt::from_flag(flag);
            } else if opt == "has_tag" {
                has_tag = true;
            }
        }
    }

    // Legacy inline-vendor form: `ATTRIBUTE name code type vendor-name`. Only
    // recognised when the 4th token wasn't consumed as `encrypt=`/`has_tag`
    // above — a FreeRADIUS-era shorthand for declaring a vendor
    // sub-attribute without a surrounding BEGIN-VENDOR/END-VENDOR block.
    // `concat` is a historical marker some dictionaries use in this slot;
    // attributes carrying it are dropped rather than treated as a vendor.
    let mut inline_vendor: Option<String> = None;
    if !options.is_empty() && !has_tag && encrypt == Encrypt::None {
        if options == "concat" {
            return Ok(());
        }
        if !dict.vendors.has_forward(&options.to_string()) {
            return Err(RadiusError::parse(file, line, format!("unknown vendor {:?}", options)));
        }
        inline_vendor = Some(options.to_string());
    }

    let effective_vendor = inline_vendor.as_deref().or(current_vendor);
    let vendor_id = effective_vendor.and_then(|v| dict.vendors.get_forward(&v.to_string()).copied());

    if code_field.contains('.') {
        let segments: Vec<&str> = code_field.split('.').collect();
        let root_code = parse_attribute_code(segments[0], file, line)?;
        let leaf_code = parse_attribute_code(segments.last().unwrap(), file, line)?;

        let mut child = Attribute::new(name, leaf_code, datatype).with_encrypt(encrypt);
        if let Some(vid) = vendor_id {
            child = child.with_vendor(vid);
        }
        child = child.with_tag(has_tag);

        let middle = &segments[1..segments.len() - 1];
        insert_nested(dict, effective_vendor, root_code, middle, child, file, line)?;
        return Ok(());
    }

    let code = parse_attribute_code(code_field, file, line)?;

    let mut attr = Attribute::new(name, code, datatype).with_encrypt(encrypt).with_tag(has_tag);
    if let Some(vid) = vendor_id {
        attr = attr.with_vendor(vid);
    }

    match effective_vendor {
        Some(vname) => {
            let vendor = dict.vendor_namespaces.get_mut(vname).ok_or_else(|| {
                RadiusError::parse(file, line, format!("unknown vendor scope {:?}", vname))
            })?;
            vendor.add_attribute(attr);
        }
        None => {
            dict.attrindex.add(attr.name.clone(), attr.code);
            dict.attributes.insert(attr.name.clone(), attr);
        }
    }
    Ok(())
}

/// Walk from a root TLV/VSA attribute's code through zero or more
/// intermediate child codes, then insert `child` into the container found
/// at the end of that path.
fn insert_nested(
    dict: &mut Dictionary,
    current_vendor: Option<&str>,
    root_code: u8,
    middle: &[&str],
    child: Attribute,
    file: &str,
    line: usize,
) -> Result<(), RadiusError> {
    let root: &mut Attribute = match current_vendor {
        Some(vname) => {
            let vendor = dict.vendor_namespaces.get_mut(vname).ok_or_else(|| {
                RadiusError::parse(file, line, format!("unknown vendor scope {:?}", vname))
            })?;
            vendor
                .attrindex
                .get_backward(&root_code)
                .cloned()
                .and_then(|name| vendor.attributes.get_mut(&name))
                .ok_or_else(|| {
                    RadiusError::parse(
                        file,
                        line,
                        format!("dotted code references unknown parent attribute {}", root_code),
                    )
                })?
        }
        None => {
            let name = dict.attrindex.get_backward(&root_code).cloned().ok_or_else(|| {
                RadiusError::parse(
                    file,
                    line,
                    format!("dotted code references unknown parent attribute {}", root_code),
                )
            })?;
            dict.attributes.get_mut(&name).unwrap()
        }
    };

    let mut cursor = root;
    for segment in middle {
        let code = parse_attribute_code(segment, file, line)?;
        let name = cursor.attrindex.get_backward(&code).cloned().ok_or_else(|| {
            RadiusError::parse(file, line, format!("dotted code references unknown nested attribute {}", code))
        })?;
        cursor = cursor.children.get_mut(&name).unwrap();
    }
    cursor.add_child(child);
    Ok(())
}

fn parse_value_line(
    dict: &mut Dictionary,
    tokens: &[&str],
    current_vendor: Option<&str>,
    file: &str,
    line: usize,
    pending: &mut Vec<PendingValue>,
) -> Result<(), RadiusError> {
    if tokens.len() < 4 {
        return Err(RadiusError::parse(file, line, "VALUE needs attribute, name and value"));
    }
    let attr_name = tokens[1];
    let value_name = tokens[2];
    let value_literal = tokens[3];

    if try_resolve_value(dict, current_vendor, attr_name, value_name, value_literal, file, line)? {
        return Ok(());
    }
    pending.push(PendingValue {
        vendor: current_vendor.map(str::to_string),
        attribute: attr_name.to_string(),
        value_name: value_name.to_string(),
        value_literal: value_literal.to_string(),
        file: file.to_string(),
        line,
    });
    Ok(())
}

fn try_resolve_value(
    dict: &mut Dictionary,
    vendor: Option<&str>,
    attr_name: &str,
    value_name: &str,
    value_literal: &str,
    file: &str,
    line: usize,
) -> Result<bool, RadiusError> {
    let attr = match vendor {
        Some(vname) => dict
            .vendor_namespaces
            .get_mut(vname)
            .and_then(|v| v.attributes.get_mut(attr_name)),
        None => dict.attributes.get_mut(attr_name),
    };
    let Some(attr) = attr else { return Ok(false) };

    let decoded = attr
        .datatype
        .parse(value_literal)
        .map_err(|e| RadiusError::parse(file, line, e.to_string()))?;
    let encoded = attr
        .datatype
        .encode(&decoded)
        .map_err(|e| RadiusError::parse(file, line, e.to_string()))?;
    attr.add_value(value_name, encoded);
    Ok(true)
}

fn resolve_pending(dict: &mut Dictionary, pending: Vec<PendingValue>) -> Result<(), RadiusError> {
    for item in pending {
        let resolved = try_resolve_value(
            dict,
            item.vendor.as_deref(),
            &item.attribute,
            &item.value_name,
            &item.value_literal,
            &item.file,
            item.line,
        )?;
        if !resolved {
            return Err(RadiusError::parse(
                item.file,
                item.line,
                format!("VALUE references undeclared attribute {:?}", item.attribute),
            ));
        }
    }
    Ok(())
}

fn parse_vendor_line(
    dict: &mut Dictionary,
    tokens: &[&str],
    file: &str,
    line: usize,
) -> Result<(), RadiusError> {
    if tokens.len() < 3 {
        return Err(RadiusError::parse(file, line, "VENDOR needs a name and an id"));
    }
    let name = tokens[1].to_string();
    let id: u32 = tokens[2]
        .parse()
        .map_err(|_| RadiusError::parse(file, line, format!("bad vendor id {:?}", tokens[2])))?;
    dict.vendors.add(name.clone(), id);
    dict.vendor_namespaces.insert(name.clone(), Vendor::new(name, id));
    Ok(())
}

/// Strip a `type[length]` hint (e.g. `octets[253]`) down to the bare type
/// name; the numeric hint is documentation only, the codec enforces the
/// real 253-byte AVP ceiling unconditionally.
fn split_type_hint(type_field: &str) -> (&str, Option<&str>) {
    match type_field.split_once('[') {
        Some((base, rest)) => (base, rest.strip_suffix(']')),
        None => (type_field, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(contents: &str) -> Result<Dictionary, RadiusError> {
        let mut path = std::env::temp_dir();
        path.push(format!("rust-radius-parser-test-{}-{}.txt", std::process::id(), contents.len()));
        std::fs::write(&path, contents).unwrap();
        let mut dict = Dictionary::new();
        let result = parse_file(&mut dict, &path);
        std::fs::remove_file(&path).ok();
        result.map(|_| dict)
    }

    #[test]
    fn attribute_codes_accept_hex_and_octal_as_well_as_decimal() {
        let dict = parse_str(
            "ATTRIBUTE Test-Hex 0x20 integer\n\
             ATTRIBUTE Test-Oct 0o40 integer\n\
             ATTRIBUTE Test-Dec 33 integer\n",
        )
        .unwrap();
        assert_eq!(dict.attribute_by_name("Test-Hex").unwrap().code, 32);
        assert_eq!(dict.attribute_by_name("Test-Oct").unwrap().code, 32);
        assert_eq!(dict.attribute_by_name("Test-Dec").unwrap().code, 33);
    }

    #[test]
    fn inline_vendor_form_files_the_attribute_under_the_named_vendor() {
        let dict = parse_str(
            "VENDOR Acme 999\n\
             ATTRIBUTE Acme-Widget 1 string Acme\n",
        )
        .unwrap();
        assert!(dict.attribute_by_name("Acme-Widget").is_none());
        let vendor = dict.vendor_namespaces.get("Acme").unwrap();
        assert_eq!(vendor.attribute_by_name("Acme-Widget").unwrap().vendor, Some(999));
    }

    #[test]
    fn inline_vendor_form_rejects_an_unknown_vendor_name() {
        let err = parse_str("ATTRIBUTE Bogus-Widget 1 string Nobody\n").unwrap_err();
        assert!(matches!(err, RadiusError::Parse { .. }));
    }

    #[test]
    fn inline_vendor_form_silently_drops_concat_marked_attributes() {
        let dict = parse_str("ATTRIBUTE Fragmented-Thing 1 octets concat\n").unwrap();
        assert!(dict.attribute_by_name("Fragmented-Thing").is_none());
    }
}
