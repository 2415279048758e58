// dictionary/datatypes/types.rs - Leaf datatype encode/decode/parse/print.
//
// Grounded in original_source/pyrad2/datatypes/types.py, port for port: each
// function below corresponds to one `Datatype` subclass's `encode`,
// `decode`, `parse` and `print` methods there.

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};

use super::{DataType, DataTypeError, DtResult};
use crate::dictionary::value::DecodedValue;

pub fn encode(dt: DataType, decoded: &DecodedValue) -> DtResult<Vec<u8>> {
    match dt {
        DataType::String => match decoded {
            DecodedValue::String(s) => Ok(s.clone().into_bytes()),
            DecodedValue::Bytes(b) => Ok(b.clone()),
            other => Err(wrong_shape("string", other)),
        },
        DataType::Octets => match decoded {
            DecodedValue::Bytes(b) => Ok(b.clone()),
            // A decimal string is packed as the big-endian bytes of its
            // integer value with leading zero bytes stripped, not as the
            // literal ASCII digits (pyrad2's `Octets.encode` does the same
            // for its `isinstance(decoded, str)` + all-digits case).
            DecodedValue::String(s) if s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty() => {
                let n: u32 = s
                    .parse()
                    .map_err(|e| DataTypeError::new(format!("invalid decimal octets value {:?}: {}", s, e)))?;
                let packed = n.to_be_bytes();
                let first_nonzero = packed.iter().position(|&b| b != 0).unwrap_or(packed.len() - 1);
                Ok(packed[first_nonzero..].to_vec())
            }
            DecodedValue::String(s) => Ok(s.clone().into_bytes()),
            other => Err(wrong_shape("octets", other)),
        },
        DataType::Ipaddr => match decoded {
            DecodedValue::Ipv4(addr) => Ok(addr.octets().to_vec()),
            other => Err(wrong_shape("ipaddr", other)),
        },
        DataType::Ipv6addr => match decoded {
            DecodedValue::Ipv6(addr) => Ok(addr.octets().to_vec()),
            other => Err(wrong_shape("ipv6addr", other)),
        },
        DataType::Ipv6prefix => match decoded {
            DecodedValue::Ipv6Prefix(addr, prefix_len) => {
                if *prefix_len > 128 {
                    return Err(DataTypeError::new(format!(
                        "ipv6prefix length {} exceeds 128",
                        prefix_len
                    )));
                }
                let nbytes = (*prefix_len as usize).div_ceil(8);
                let mut out = vec![0u8, *prefix_len];
                out.extend_from_slice(&addr.octets()[..nbytes]);
                Ok(out)
            }
            other => Err(wrong_shape("ipv6prefix", other)),
        },
        DataType::Date => match decoded {
            DecodedValue::Date(secs) => Ok(secs.to_be_bytes().to_vec()),
            other => Err(wrong_shape("date", other)),
        },
        DataType::Integer => match decoded {
            DecodedValue::Integer(v) => Ok(v.to_be_bytes().to_vec()),
            other => Err(wrong_shape("integer", other)),
        },
        DataType::Short => match decoded {
            DecodedValue::Integer(v) => {
                let v: u16 = (*v).try_into().map_err(|_| {
                    DataTypeError::new(format!("{} does not fit in a short (u16)", v))
                })?;
                Ok(v.to_be_bytes().to_vec())
            }
            other => Err(wrong_shape("short", other)),
        },
        DataType::Byte => match decoded {
            DecodedValue::Integer(v) => {
                let v: u8 = (*v)
                    .try_into()
                    .map_err(|_| DataTypeError::new(format!("{} does not fit in a byte", v)))?;
                Ok(vec![v])
            }
            other => Err(wrong_shape("byte", other)),
        },
        DataType::Signed => match decoded {
            DecodedValue::Signed(v) => Ok(v.to_be_bytes().to_vec()),
            other => Err(wrong_shape("signed", other)),
        },
        DataType::Integer64 => match decoded {
            DecodedValue::Integer64(v) => Ok(v.to_be_bytes().to_vec()),
            other => Err(wrong_shape("integer64", other)),
        },
        DataType::Ether => match decoded {
            DecodedValue::Ether(s) => parse_hex_groups(s, 6, ':'),
            other => Err(wrong_shape("ether", other)),
        },
        DataType::Ifid => match decoded {
            DecodedValue::Ifid(s) => parse_hex_quads(s),
            other => Err(wrong_shape("ifid", other)),
        },
        DataType::AscendBinary => match decoded {
            DecodedValue::Bytes(b) => Ok(b.clone()),
            other => Err(wrong_shape("abinary", other)),
        },
        DataType::Tlv | DataType::Vsa => Err(DataTypeError::new(
            "structural datatypes are not encoded through the leaf codec",
        )),
    }
}

pub fn decode(dt: DataType, raw: &[u8]) -> DtResult<DecodedValue> {
    match dt {
        DataType::String => Ok(DecodedValue::String(
            String::from_utf8_lossy(raw).into_owned(),
        )),
        DataType::Octets => Ok(DecodedValue::Bytes(raw.to_vec())),
        DataType::Ipaddr => {
            let arr: [u8; 4] = raw
                .try_into()
                .map_err(|_| DataTypeError::new(format!("expected 4 bytes, got {}", raw.len())))?;
            Ok(DecodedValue::Ipv4(Ipv4Addr::from(arr)))
        }
        DataType::Ipv6addr => {
            let arr: [u8; 16] = raw.try_into().map_err(|_| {
                DataTypeError::new(format!("expected 16 bytes, got {}", raw.len()))
            })?;
            Ok(DecodedValue::Ipv6(Ipv6Addr::from(arr)))
        }
        DataType::Ipv6prefix => {
            if raw.len() < 2 {
                return Err(DataTypeError::new("ipv6prefix needs at least 2 bytes"));
            }
            let prefix_len = raw[1];
            if prefix_len > 128 {
                return Err(DataTypeError::new(format!(
                    "ipv6prefix length {} exceeds 128",
                    prefix_len
                )));
            }
            let nbytes = (prefix_len as usize).div_ceil(8);
            if raw.len() < 2 + nbytes {
                return Err(DataTypeError::new("ipv6prefix body shorter than declared"));
            }
            let mut octets = [0u8; 16];
            octets[..nbytes].copy_from_slice(&raw[2..2 + nbytes]);
            Ok(DecodedValue::Ipv6Prefix(Ipv6Addr::from(octets), prefix_len))
        }
        DataType::Date => {
            let arr: [u8; 4] = raw
                .try_into()
                .map_err(|_| DataTypeError::new(format!("expected 4 bytes, got {}", raw.len())))?;
            Ok(DecodedValue::Date(u32::from_be_bytes(arr)))
        }
        DataType::Integer => {
            let arr: [u8; 4] = raw
                .try_into()
                .map_err(|_| DataTypeError::new(format!("expected 4 bytes, got {}", raw.len())))?;
            Ok(DecodedValue::Integer(u32::from_be_bytes(arr)))
        }
        DataType::Short => {
            let arr: [u8; 2] = raw
                .try_into()
                .map_err(|_| DataTypeError::new(format!("expected 2 bytes, got {}", raw.len())))?;
            Ok(DecodedValue::Integer(u16::from_be_bytes(arr) as u32))
        }
        DataType::Byte => {
            if raw.len() != 1 {
                return Err(DataTypeError::new(format!(
                    "expected 1 byte, got {}",
                    raw.len()
                )));
            }
            Ok(DecodedValue::Integer(raw[0] as u32))
        }
        DataType::Signed => {
            let arr: [u8; 4] = raw
                .try_into()
                .map_err(|_| DataTypeError::new(format!("expected 4 bytes, got {}", raw.len())))?;
            Ok(DecodedValue::Signed(i32::from_be_bytes(arr)))
        }
        DataType::Integer64 => {
            let arr: [u8; 8] = raw
                .try_into()
                .map_err(|_| DataTypeError::new(format!("expected 8 bytes, got {}", raw.len())))?;
            Ok(DecodedValue::Integer64(u64::from_be_bytes(arr)))
        }
        DataType::Ether => {
            if raw.len() != 6 {
                return Err(DataTypeError::new(format!(
                    "expected 6 bytes, got {}",
                    raw.len()
                )));
            }
            Ok(DecodedValue::Ether(format_hex_groups(raw, ':')))
        }
        DataType::Ifid => {
            if raw.len() != 8 {
                return Err(DataTypeError::new(format!(
                    "expected 8 bytes, got {}",
                    raw.len()
                )));
            }
            let quads: Vec<String> = raw
                .chunks(2)
                .map(|pair| format!("{:02x}{:02x}", pair[0], pair[1]))
                .collect();
            Ok(DecodedValue::Ifid(quads.join(":")))
        }
        DataType::AscendBinary => Ok(DecodedValue::Bytes(raw.to_vec())),
        DataType::Tlv | DataType::Vsa => Err(DataTypeError::new(
            "structural datatypes are not decoded through the leaf codec",
        )),
    }
}

pub fn parse(dt: DataType, s: &str) -> DtResult<DecodedValue> {
    match dt {
        DataType::String => Ok(DecodedValue::String(s.to_string())),
        DataType::Octets => {
            if let Some(hexpart) = s.strip_prefix("0x") {
                Ok(DecodedValue::Bytes(hex::decode(hexpart).map_err(|e| {
                    DataTypeError::new(format!("invalid hex literal: {}", e))
                })?))
            } else {
                Ok(DecodedValue::Bytes(s.as_bytes().to_vec()))
            }
        }
        DataType::Ipaddr => s
            .parse::<Ipv4Addr>()
            .map(DecodedValue::Ipv4)
            .map_err(|e| DataTypeError::new(format!("invalid ipaddr {:?}: {}", s, e))),
        DataType::Ipv6addr => s
            .parse::<Ipv6Addr>()
            .map(DecodedValue::Ipv6)
            .map_err(|e| DataTypeError::new(format!("invalid ipv6addr {:?}: {}", s, e))),
        DataType::Ipv6prefix => {
            let (addr_part, len_part) = s
                .split_once('/')
                .ok_or_else(|| DataTypeError::new("ipv6prefix must be addr/len"))?;
            let addr: Ipv6Addr = addr_part
                .parse()
                .map_err(|e| DataTypeError::new(format!("invalid ipv6prefix address: {}", e)))?;
            let len: u8 = len_part
                .parse()
                .map_err(|e| DataTypeError::new(format!("invalid ipv6prefix length: {}", e)))?;
            Ok(DecodedValue::Ipv6Prefix(addr, len))
        }
        DataType::Date => parse_int(s).map(|v| DecodedValue::Date(v as u32)),
        DataType::Integer => parse_int(s).map(|v| DecodedValue::Integer(v as u32)),
        DataType::Short => parse_int(s).map(|v| DecodedValue::Integer(v as u32)),
        DataType::Byte => parse_int(s).map(|v| DecodedValue::Integer(v as u32)),
        DataType::Signed => parse_int(s).map(|v| DecodedValue::Signed(v as i32)),
        DataType::Integer64 => parse_int(s).map(DecodedValue::Integer64),
        DataType::Ether => Ok(DecodedValue::Ether(s.to_string())),
        DataType::Ifid => Ok(DecodedValue::Ifid(s.to_string())),
        DataType::AscendBinary => Ok(DecodedValue::Bytes(s.as_bytes().to_vec())),
        DataType::Tlv | DataType::Vsa => Err(DataTypeError::new(
            "structural datatypes have no scalar parse form",
        )),
    }
}

pub fn print(dt: DataType, decoded: &DecodedValue) -> String {
    match (dt, decoded) {
        (DataType::String, DecodedValue::String(s)) => s.clone(),
        (DataType::Octets, DecodedValue::Bytes(b)) => format!("0x{}", hex::encode(b)),
        (DataType::Ipaddr, DecodedValue::Ipv4(a)) => a.to_string(),
        (DataType::Ipv6addr, DecodedValue::Ipv6(a)) => a.to_string(),
        (DataType::Ipv6prefix, DecodedValue::Ipv6Prefix(a, len)) => format!("{}/{}", a, len),
        (DataType::Date, DecodedValue::Date(v)) => DateTime::<Utc>::from_timestamp(*v as i64, 0)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_else(|| v.to_string()),
        (DataType::Integer, DecodedValue::Integer(v)) => v.to_string(),
        (DataType::Short, DecodedValue::Integer(v)) => v.to_string(),
        (DataType::Byte, DecodedValue::Integer(v)) => v.to_string(),
        (DataType::Signed, DecodedValue::Signed(v)) => v.to_string(),
        (DataType::Integer64, DecodedValue::Integer64(v)) => v.to_string(),
        (DataType::Ether, DecodedValue::Ether(s)) => s.clone(),
        (DataType::Ifid, DecodedValue::Ifid(s)) => s.replace(':', ""),
        (DataType::AscendBinary, DecodedValue::Bytes(b)) => format!("0x{}", hex::encode(b)),
        _ => String::new(),
    }
}

fn wrong_shape(expected: &str, got: &DecodedValue) -> DataTypeError {
    DataTypeError::new(format!("expected a value fit for {}, got {:?}", expected, got))
}

/// Accepts decimal, `0x...` hex, and `0o...` octal, matching the dictionary
/// grammar's `int(value, 0)` VALUE-line convention.
pub(crate) fn parse_int(s: &str) -> DtResult<u64> {
    let s = s.trim();
    let (neg, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let v = if let Some(hexpart) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hexpart, 16)
    } else if let Some(octpart) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        u64::from_str_radix(octpart, 8)
    } else {
        s.parse::<u64>()
    }
    .map_err(|e| DataTypeError::new(format!("invalid integer literal {:?}: {}", s, e)))?;
    if neg {
        Ok((v as i64).wrapping_neg() as u64)
    } else {
        Ok(v)
    }
}

fn parse_hex_groups(s: &str, expected_groups: usize, sep: char) -> DtResult<Vec<u8>> {
    let groups: Vec<&str> = s.split(sep).collect();
    if groups.len() != expected_groups {
        return Err(DataTypeError::new(format!(
            "expected {} groups separated by '{}', got {}",
            expected_groups,
            sep,
            groups.len()
        )));
    }
    groups
        .iter()
        .map(|g| {
            u8::from_str_radix(g, 16)
                .map_err(|e| DataTypeError::new(format!("invalid hex octet {:?}: {}", g, e)))
        })
        .collect()
}

fn parse_hex_quads(s: &str) -> DtResult<Vec<u8>> {
    let groups: Vec<&str> = s.split(':').collect();
    if groups.len() != 4 {
        return Err(DataTypeError::new(format!(
            "ifid needs 4 colon-separated quads, got {}",
            groups.len()
        )));
    }
    let mut out = Vec::with_capacity(8);
    for g in groups {
        let quad = u16::from_str_radix(g, 16)
            .map_err(|e| DataTypeError::new(format!("invalid hex quad {:?}: {}", g, e)))?;
        out.extend_from_slice(&quad.to_be_bytes());
    }
    Ok(out)
}

fn format_hex_groups(raw: &[u8], sep: char) -> String {
    raw.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(&sep.to_string())
}
