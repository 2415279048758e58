// packet/codec.rs - Wire encode/decode for a whole packet.
//
// Grounded in original_source/pyrad2/packet.py (`Packet.__bytes__`,
// `Packet.DecodePacket`) and the RFC 2865 §3 header: `code(1) id(1)
// length(2) authenticator(16)` followed by a run of `type(1) length(1)
// value` AVPs.

use std::sync::Arc;

use indexmap::IndexMap;

use super::auth::{
    compute_message_authenticator, compute_reply_authenticator, compute_request_authenticator,
    random_authenticator,
};
use super::{AttributeKey, Packet, PacketCode};
use crate::dictionary::datatypes::{decode_tlv, decode_vsa, encode_tlv, encode_vsa};
use crate::dictionary::value::RawSlot;
use crate::dictionary::Dictionary;
use crate::error::{PacketError, Result};

const HEADER_LEN: usize = 20;
const MIN_PACKET_LEN: usize = 20;
const MAX_PACKET_LEN: usize = 4095;
const VENDOR_SPECIFIC_CODE: u8 = 26;
const MESSAGE_AUTHENTICATOR_CODE: u8 = 80;

/// Assemble a packet's attribute map into the AVP byte stream, returning
/// the body bytes and, if a Message-Authenticator attribute was present,
/// the offset of its 16-byte value within that body.
fn encode_attributes(attributes: &IndexMap<AttributeKey, RawSlot>) -> Result<(Vec<u8>, Option<usize>)> {
    // Vendor sub-attributes are keyed individually but must be re-grouped
    // by vendor id at encode time, since one Vendor-Specific AVP carries
    // every sub-attribute for that vendor (RFC 2865 §5.26).
    let mut vendor_groups: IndexMap<u32, IndexMap<u8, Vec<Vec<u8>>>> = IndexMap::new();

    let mut body = Vec::new();
    let mut ma_offset = None;

    for (key, slot) in attributes {
        match key {
            AttributeKey::Standard(code) => match slot {
                RawSlot::Leaf(instances) => {
                    for value in instances {
                        if value.len() + 2 > 255 {
                            return Err(PacketError::ValueTooLong { len: value.len() }.into());
                        }
                        if *code == MESSAGE_AUTHENTICATOR_CODE {
                            ma_offset = Some(body.len() + 2);
                        }
                        body.push(*code);
                        body.push((2 + value.len()) as u8);
                        body.extend_from_slice(value);
                    }
                }
                RawSlot::Tlv(children) => {
                    let chunks = encode_tlv(children).map_err(|e| PacketError::EncodeFailure {
                        name: format!("attribute {}", code),
                        datatype: "tlv",
                        reason: e.to_string(),
                    })?;
                    for chunk in chunks {
                        if chunk.len() + 2 > 255 {
                            return Err(PacketError::TlvTooLong { len: chunk.len() }.into());
                        }
                        body.push(*code);
                        body.push((2 + chunk.len()) as u8);
                        body.extend_from_slice(&chunk);
                    }
                }
            },
            AttributeKey::Vendor(vendor_id, subcode) => {
                let instances = match slot {
                    RawSlot::Leaf(v) => v.clone(),
                    RawSlot::Tlv(_) => {
                        return Err(PacketError::EncodeFailure {
                            name: format!("vendor {} attribute {}", vendor_id, subcode),
                            datatype: "vsa",
                            reason: "nested TLV-within-VSA is not supported".to_string(),
                        }
                        .into())
                    }
                };
                vendor_groups
                    .entry(*vendor_id)
                    .or_default()
                    .entry(*subcode)
                    .or_default()
                    .extend(instances);
            }
            AttributeKey::Unknown(code) => {
                if let RawSlot::Leaf(instances) = slot {
                    for value in instances {
                        body.push(*code);
                        body.push((2 + value.len().min(253)) as u8);
                        body.extend_from_slice(&value[..value.len().min(253)]);
                    }
                }
            }
        }
    }

    for (vendor_id, sub_map) in vendor_groups {
        let chunks = encode_vsa(vendor_id, &sub_map).map_err(|e| PacketError::EncodeFailure {
            name: format!("vendor {}", vendor_id),
            datatype: "vsa",
            reason: e.to_string(),
        })?;
        for chunk in chunks {
            if chunk.len() + 2 > 255 {
                return Err(PacketError::ValueTooLong { len: chunk.len() }.into());
            }
            body.push(VENDOR_SPECIFIC_CODE);
            body.push((2 + chunk.len()) as u8);
            body.extend_from_slice(&chunk);
        }
    }

    Ok((body, ma_offset))
}

/// Parse the AVP stream following the header into an attribute map, plus
/// the offset of a Message-Authenticator value if one was present.
fn decode_attributes(
    buf: &[u8],
    dict: &Dictionary,
) -> Result<(IndexMap<AttributeKey, RawSlot>, Option<usize>)> {
    let mut attributes: IndexMap<AttributeKey, RawSlot> = IndexMap::new();
    let mut ma_offset = None;
    let mut offset = 0;

    while offset < buf.len() {
        if offset + 2 > buf.len() {
            return Err(PacketError::AttributeOverrun { offset }.into());
        }
        let code = buf[offset];
        let len = buf[offset + 1] as usize;
        if len < 2 {
            return Err(PacketError::AttributeTooSmall { code, length: len }.into());
        }
        if offset + len > buf.len() {
            return Err(PacketError::AttributeOverrun { offset }.into());
        }
        let value = &buf[offset + 2..offset + len];

        if code == MESSAGE_AUTHENTICATOR_CODE {
            ma_offset = Some(offset + 2);
        }

        if code == VENDOR_SPECIFIC_CODE {
            let (vendor_id, slot) = decode_vsa(value).map_err(|e| PacketError::DecodeFailure {
                name: "Vendor-Specific".to_string(),
                datatype: "vsa",
                reason: e.to_string(),
            })?;
            match slot {
                RawSlot::Tlv(sub_map) => {
                    for (subcode, instances) in sub_map {
                        match attributes
                            .entry(AttributeKey::Vendor(vendor_id, subcode))
                            .or_insert_with(|| RawSlot::Leaf(Vec::new()))
                        {
                            RawSlot::Leaf(existing) => existing.extend(instances),
                            RawSlot::Tlv(_) => unreachable!("vendor slots are always leaf"),
                        }
                    }
                }
                RawSlot::Leaf(opaque) => {
                    match attributes
                        .entry(AttributeKey::Unknown(VENDOR_SPECIFIC_CODE))
                        .or_insert_with(|| RawSlot::Leaf(Vec::new()))
                    {
                        RawSlot::Leaf(existing) => existing.extend(opaque),
                        RawSlot::Tlv(_) => unreachable!("unknown slots are always leaf"),
                    }
                }
            }
        } else {
            let attr = dict.attribute_by_code(code);
            let is_tlv = attr.map(|a| a.datatype.is_structural()).unwrap_or(false);
            if is_tlv {
                let decoded_tlv = decode_tlv(value).map_err(|e| PacketError::DecodeFailure {
                    name: attr.unwrap().name.clone(),
                    datatype: "tlv",
                    reason: e.to_string(),
                })?;
                match attributes
                    .entry(AttributeKey::Standard(code))
                    .or_insert_with(|| RawSlot::Tlv(IndexMap::new()))
                {
                    RawSlot::Tlv(existing) => {
                        for (subcode, instances) in decoded_tlv {
                            existing.entry(subcode).or_default().extend(instances);
                        }
                    }
                    RawSlot::Leaf(_) => unreachable!("TLV attributes always decode to a Tlv slot"),
                }
            } else {
                match attributes
                    .entry(AttributeKey::Standard(code))
                    .or_insert_with(|| RawSlot::Leaf(Vec::new()))
                {
                    RawSlot::Leaf(existing) => existing.push(value.to_vec()),
                    RawSlot::Tlv(_) => unreachable!("leaf attributes always decode to a Leaf slot"),
                }
            }
        }

        offset += len;
    }

    Ok((attributes, ma_offset))
}

/// Serialize a packet to its wire form. Computes (and stores back into
/// `packet.authenticator`) the Authenticator appropriate to the packet's
/// code, and, if a Message-Authenticator attribute is present, its
/// HMAC-MD5 value.
///
/// For reply codes, `packet.authenticator` must already hold the
/// *request's* Authenticator when this is called (the usual "build a
/// reply" flow: copy the request authenticator in, add attributes, then
/// encode) — encode overwrites it with the final reply Authenticator
/// before returning.
pub fn encode(packet: &mut Packet) -> Result<Vec<u8>> {
    let (mut body, ma_offset) = encode_attributes(&packet.attributes)?;
    let length = HEADER_LEN + body.len();
    if length > MAX_PACKET_LEN {
        return Err(PacketError::InvalidLength { declared: length }.into());
    }
    let length_u16 = length as u16;

    let code = packet.code;
    let id = packet.id;
    let packet_code = PacketCode::from_u8(code);

    // Packet::new already generates the Request Authenticator for an
    // Access-Request at construction time, since User-Password obfuscation
    // needs it before attributes are even added. This only catches a
    // packet built some other way (e.g. a bare struct literal) that
    // reached encode() with the authenticator still unset.
    if matches!(packet_code, PacketCode::AccessRequest) && packet.authenticator == [0u8; 16] {
        packet.authenticator = random_authenticator();
    }
    let request_authenticator_for_reply = packet.authenticator;

    if let Some(offset) = ma_offset {
        body[offset..offset + 16].fill(0);
        let mut header_and_body = Vec::with_capacity(HEADER_LEN + body.len());
        header_and_body.push(code);
        header_and_body.push(id);
        header_and_body.extend_from_slice(&length_u16.to_be_bytes());
        header_and_body.extend_from_slice(&packet.authenticator);
        header_and_body.extend_from_slice(&body);

        let mac = compute_message_authenticator(&header_and_body, &packet.secret)?;
        body[offset..offset + 16].copy_from_slice(&mac);
    }

    let final_authenticator = match packet_code {
        PacketCode::AccessRequest => packet.authenticator,
        _ if packet_code.is_reply() => compute_reply_authenticator(
            code,
            id,
            length_u16,
            &request_authenticator_for_reply,
            &body,
            &packet.secret,
        ),
        _ => compute_request_authenticator(code, id, length_u16, &body, &packet.secret),
    };
    packet.authenticator = final_authenticator;

    let mut out = Vec::with_capacity(length);
    out.push(code);
    out.push(id);
    out.extend_from_slice(&length_u16.to_be_bytes());
    out.extend_from_slice(&final_authenticator);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse a wire packet. Does not itself verify the Authenticator or
/// Message-Authenticator — callers with the necessary context (the
/// matching request, for a reply; the shared secret either way) call
/// `Packet::verify_reply`/`packet::auth::verify_message_authenticator`
/// explicitly once they have it.
pub fn decode(buf: &[u8], dict: Arc<Dictionary>, secret: Vec<u8>) -> Result<Packet> {
    if buf.len() < MIN_PACKET_LEN {
        return Err(PacketError::InvalidLength { declared: buf.len() }.into());
    }
    let code = buf[0];
    let id = buf[1];
    let declared_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    if !(MIN_PACKET_LEN..=MAX_PACKET_LEN).contains(&declared_len) {
        return Err(PacketError::InvalidLength { declared: declared_len }.into());
    }
    if declared_len > buf.len() {
        return Err(PacketError::LengthExceedsBuffer {
            declared: declared_len,
            actual: buf.len(),
        }
        .into());
    }
    let mut authenticator = [0u8; 16];
    authenticator.copy_from_slice(&buf[4..20]);

    let body = &buf[20..declared_len];
    let (attributes, ma_offset) = decode_attributes(body, &dict)?;

    Ok(Packet {
        code,
        id,
        authenticator,
        secret,
        dict,
        attributes,
        raw_packet: Some(buf[..declared_len].to_vec()),
        message_authenticator_position: ma_offset.map(|o| o + HEADER_LEN),
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::attribute::Attribute;
    use crate::dictionary::datatypes::DataType;
    use crate::dictionary::value::DecodedValue;
    use crate::packet::auth::verify_reply_authenticator;

    fn test_dict() -> Arc<Dictionary> {
        let mut dict = Dictionary::new();
        dict.attributes.insert(
            "User-Name".to_string(),
            Attribute::new("User-Name", 1, DataType::String),
        );
        dict.attrindex.add("User-Name".to_string(), 1);
        Arc::new(dict)
    }

    #[test]
    fn encode_then_decode_preserves_attribute_values() {
        let dict = test_dict();
        let mut pkt = Packet::new(PacketCode::AccessRequest.as_u8(), dict.clone(), b"secret".to_vec());
        pkt.id = 7;
        pkt.add("User-Name", DecodedValue::String("alice".into())).unwrap();

        let wire = encode(&mut pkt).unwrap();
        let decoded = decode(&wire, dict, b"secret".to_vec()).unwrap();

        assert_eq!(decoded.code, PacketCode::AccessRequest.as_u8());
        assert_eq!(decoded.id, 7);
        assert_eq!(
            decoded.get_one("User-Name").unwrap().unwrap(),
            DecodedValue::String("alice".into())
        );
    }

    #[test]
    fn reply_authenticator_verifies_against_the_request() {
        let dict = test_dict();
        let mut request = Packet::new(PacketCode::AccessRequest.as_u8(), dict.clone(), b"secret".to_vec());
        request.id = 3;
        request.authenticator = [9u8; 16];
        request.add("User-Name", DecodedValue::String("bob".into())).unwrap();
        let request_wire = encode(&mut request).unwrap();
        let request_auth = request.authenticator;

        let mut reply = Packet::new(PacketCode::AccessAccept.as_u8(), dict, b"secret".to_vec());
        reply.id = request.id;
        reply.authenticator = request_auth;
        let reply_wire = encode(&mut reply).unwrap();

        let reply_len = u16::from_be_bytes([reply_wire[2], reply_wire[3]]);
        let reply_body = &reply_wire[20..];
        assert!(verify_reply_authenticator(
            reply_wire[0],
            reply_wire[1],
            reply_len,
            &request_auth,
            reply_body,
            b"secret",
            &reply.authenticator,
        )
        .is_ok());
        let _ = request_wire;
    }
}
