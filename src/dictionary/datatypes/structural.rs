// dictionary/datatypes/structural.rs - TLV and Vendor-Specific (VSA) framing.
//
// Grounded in original_source/pyrad2/datatypes/structural.py (`Tlv`, `Vsa`)
// and tests/test_packet.py's `testPktEncodeLongTlvAttribute`/VSA split
// vectors. Operates purely on raw, already-leaf-encoded bytes: the packet
// codec is responsible for turning each child attribute's decoded value
// into bytes (via `Attribute::encode`) before assembling the sub-code ->
// instances map this module frames.

use indexmap::IndexMap;

use super::{DataTypeError, DtResult};
use crate::dictionary::value::RawSlot;

const MAX_AVP_VALUE: usize = 253;
const VENDOR_ID_LEN: usize = 4;

/// Frame a TLV container's already-encoded sub-attribute instances into one
/// or more contiguous bodies, each `subcode(1) len(1) value` repeated in map
/// order. More than one body is returned when the sub-attribute instances
/// don't all fit under the 253-byte top-level AVP value ceiling, in which
/// case the container is re-emitted across multiple top-level AVPs of the
/// same code, mirroring `encode_vsa`'s split for Vendor-Specific.
pub fn encode_tlv(values: &IndexMap<u8, Vec<Vec<u8>>>) -> DtResult<Vec<Vec<u8>>> {
    let mut units: Vec<Vec<u8>> = Vec::new();
    for (&subcode, instances) in values {
        for instance in instances {
            if instance.len() + 2 > 255 {
                return Err(DataTypeError::new(format!(
                    "TLV sub-attribute {} value of {} bytes exceeds the 253-byte limit",
                    subcode,
                    instance.len()
                )));
            }
            let mut unit = Vec::with_capacity(2 + instance.len());
            unit.push(subcode);
            unit.push((2 + instance.len()) as u8);
            unit.extend_from_slice(instance);
            units.push(unit);
        }
    }

    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    for unit in units {
        if unit.len() > MAX_AVP_VALUE {
            return Err(DataTypeError::new(
                "a single TLV sub-attribute instance does not fit in one top-level AVP",
            ));
        }
        if !current.is_empty() && current.len() + unit.len() > MAX_AVP_VALUE {
            chunks.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(&unit);
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }

    Ok(chunks)
}

/// Inverse of `encode_tlv`. Preserves the order sub-codes were first seen
/// and appends repeat instances to the same key, matching `IndexMap`'s
/// insertion-order guarantee.
pub fn decode_tlv(raw: &[u8]) -> DtResult<IndexMap<u8, Vec<Vec<u8>>>> {
    let mut out: IndexMap<u8, Vec<Vec<u8>>> = IndexMap::new();
    let mut offset = 0;
    while offset < raw.len() {
        if offset + 2 > raw.len() {
            return Err(DataTypeError::new("truncated TLV sub-attribute header"));
        }
        let subcode = raw[offset];
        let len = raw[offset + 1] as usize;
        if len < 2 {
            return Err(DataTypeError::new(format!(
                "TLV sub-attribute {} declares length {}, which is too small",
                subcode, len
            )));
        }
        if offset + len > raw.len() {
            return Err(DataTypeError::new(format!(
                "TLV sub-attribute {} runs past the end of the container",
                subcode
            )));
        }
        let value = raw[offset + 2..offset + len].to_vec();
        out.entry(subcode).or_default().push(value);
        offset += len;
    }
    Ok(out)
}

/// Encode a Vendor-Specific container. Returns one or more AVP values (each
/// already including the 4-byte vendor id prefix); more than one is
/// returned when the sub-attribute instances cannot all fit under the
/// 253-byte AVP value ceiling, per RFC 2865's "recommended" VSA form, which
/// allows the same vendor id to appear in more than one Vendor-Specific
/// attribute.
pub fn encode_vsa(vendor_id: u32, values: &IndexMap<u8, Vec<Vec<u8>>>) -> DtResult<Vec<Vec<u8>>> {
    let tlv_budget = MAX_AVP_VALUE - VENDOR_ID_LEN;

    let mut units: Vec<Vec<u8>> = Vec::new();
    for (&subcode, instances) in values {
        for instance in instances {
            if instance.len() + 2 > 255 {
                return Err(DataTypeError::new(format!(
                    "vendor sub-attribute {} value of {} bytes exceeds the 253-byte limit",
                    subcode,
                    instance.len()
                )));
            }
            let mut unit = Vec::with_capacity(2 + instance.len());
            unit.push(subcode);
            unit.push((2 + instance.len()) as u8);
            unit.extend_from_slice(instance);
            units.push(unit);
        }
    }

    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    for unit in units {
        if unit.len() > tlv_budget {
            return Err(DataTypeError::new(
                "a single vendor sub-attribute instance does not fit in one Vendor-Specific AVP",
            ));
        }
        if !current.is_empty() && current.len() + unit.len() > tlv_budget {
            chunks.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(&unit);
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }

    Ok(chunks
        .into_iter()
        .map(|tlv_body| {
            let mut out = Vec::with_capacity(VENDOR_ID_LEN + tlv_body.len());
            out.extend_from_slice(&vendor_id.to_be_bytes());
            out.extend_from_slice(&tlv_body);
            out
        })
        .collect())
}

/// Decode a single Vendor-Specific AVP value into its vendor id and
/// sub-attribute map.
///
/// RFC 2865's "recommended" VSA form needs at least 4 bytes of vendor id
/// plus a minimal 2-byte sub-attribute header and 1 byte of value (8 bytes
/// total). Shorter values are a legitimate, if non-conformant, wire form a
/// handful of vendors emit; rather than reject the packet, this keeps the
/// bytes as an opaque single instance so callers can still see the raw
/// attribute and its vendor id (when present).
pub fn decode_vsa(raw: &[u8]) -> DtResult<(u32, RawSlot)> {
    if raw.len() < 8 {
        let vendor_id = if raw.len() >= 4 {
            u32::from_be_bytes(raw[..4].try_into().unwrap())
        } else {
            0
        };
        return Ok((vendor_id, RawSlot::Leaf(vec![raw.to_vec()])));
    }
    let vendor_id = u32::from_be_bytes(raw[..4].try_into().unwrap());
    let tlv = decode_tlv(&raw[4..])?;
    Ok((vendor_id, RawSlot::Tlv(tlv)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tlv_round_trips_multiple_instances_of_the_same_subcode() {
        let mut values: IndexMap<u8, Vec<Vec<u8>>> = IndexMap::new();
        values.insert(1, vec![b"one".to_vec(), b"two".to_vec()]);
        values.insert(2, vec![b"three".to_vec()]);

        let chunks = encode_tlv(&values).unwrap();
        assert_eq!(chunks.len(), 1);
        let decoded = decode_tlv(&chunks[0]).unwrap();
        assert_eq!(decoded.get(&1).unwrap(), &vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(decoded.get(&2).unwrap(), &vec![b"three".to_vec()]);
    }

    #[test]
    fn tlv_splits_across_multiple_top_level_avps_when_the_budget_is_exceeded() {
        let mut values: IndexMap<u8, Vec<Vec<u8>>> = IndexMap::new();
        // Each instance is 100 bytes of value -> 102-byte unit; five of
        // them (510 bytes) can't fit in one 253-byte AVP value.
        values.insert(9, vec![vec![0xAB; 100]; 5]);

        let chunks = encode_tlv(&values).unwrap();
        assert!(chunks.len() > 1);

        // Merging each chunk's decode the way codec.rs does reassembles the
        // original sub-attribute instances regardless of the split.
        let mut merged: IndexMap<u8, Vec<Vec<u8>>> = IndexMap::new();
        for chunk in &chunks {
            assert!(chunk.len() <= MAX_AVP_VALUE);
            for (subcode, instances) in decode_tlv(chunk).unwrap() {
                merged.entry(subcode).or_default().extend(instances);
            }
        }
        assert_eq!(merged.get(&9).unwrap().len(), 5);
    }

    #[test]
    fn vsa_splits_across_multiple_avps_when_the_budget_is_exceeded() {
        let mut values: IndexMap<u8, Vec<Vec<u8>>> = IndexMap::new();
        // Each instance is 100 bytes of value -> 102-byte unit; five of
        // them (510 bytes) can't fit in one 249-byte TLV budget.
        values.insert(9, vec![vec![0xAB; 100]; 5]);

        let chunks = encode_vsa(311, &values).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= MAX_AVP_VALUE);
            assert_eq!(&chunk[..4], &311u32.to_be_bytes());
        }
    }

    #[test]
    fn vsa_decode_preserves_short_form_as_opaque_bytes() {
        let raw = vec![0, 0, 1, 55, 9, 2]; // 6 bytes: too short to be a full sub-TLV
        let (vendor_id, slot) = decode_vsa(&raw).unwrap();
        assert_eq!(vendor_id, 311);
        assert_eq!(slot.as_leaf().unwrap(), &[raw]);
    }
}
