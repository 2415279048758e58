// Decoding a reply whose Message-Authenticator covers multiple instances
// of the same attribute that do *not* appear sequentially in the AVP
// stream. Mirrors
// original_source/tests/test_packet.py::_create_reply_with_duplicate_attributes,
// which exists specifically because `Packet::add`'s own API always groups
// same-coded attributes together and so can't produce this shape itself —
// only a NAS sending genuinely interleaved AVPs can, and `codec::decode`
// has to merge them correctly regardless of position.

use std::sync::Arc;

use rust_radius::dictionary::Dictionary;
use rust_radius::packet::auth::{compute_message_authenticator, compute_reply_authenticator, verify_message_authenticator};
use rust_radius::packet::codec;
use rust_radius::dictionary::value::RawSlot;

const TEST_STRING_CODE: u8 = 1;
const TEST_INTEGER_CODE: u8 = 2;
const MESSAGE_AUTHENTICATOR_CODE: u8 = 80;
const ACCESS_ACCEPT: u8 = 2;

fn avp(code: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![code, (2 + value.len()) as u8];
    out.extend_from_slice(value);
    out
}

#[test]
fn non_sequential_duplicate_attributes_merge_correctly_and_message_authenticator_verifies() {
    let secret = b"secret".to_vec();
    let request_authenticator = [7u8; 16];
    let id = 42u8;

    let mut attributes = Vec::new();
    attributes.extend(avp(TEST_STRING_CODE, b"test"));
    attributes.extend(avp(TEST_INTEGER_CODE, &1u32.to_be_bytes()));
    attributes.extend(avp(TEST_STRING_CODE, b"test"));
    attributes.extend(avp(MESSAGE_AUTHENTICATOR_CODE, &[0u8; 16]));

    let length = (20 + attributes.len()) as u16;
    let mut header = Vec::new();
    header.push(ACCESS_ACCEPT);
    header.push(id);
    header.extend_from_slice(&length.to_be_bytes());

    let mut header_and_body = header.clone();
    header_and_body.extend_from_slice(&request_authenticator);
    header_and_body.extend_from_slice(&attributes);
    let mac = compute_message_authenticator(&header_and_body, &secret).unwrap();

    let ma_value_offset = attributes.len() - 16;
    attributes[ma_value_offset..].copy_from_slice(&mac);

    let reply_authenticator =
        compute_reply_authenticator(ACCESS_ACCEPT, id, length, &request_authenticator, &attributes, &secret);

    let mut wire = header;
    wire.extend_from_slice(&reply_authenticator);
    wire.extend_from_slice(&attributes);

    let dict = Arc::new(Dictionary::new());
    let decoded = codec::decode(&wire, dict, secret.clone()).unwrap();

    match decoded.raw_by_code(TEST_STRING_CODE).unwrap() {
        RawSlot::Leaf(instances) => {
            assert_eq!(instances.len(), 2);
            assert_eq!(instances[0], b"test".to_vec());
            assert_eq!(instances[1], b"test".to_vec());
        }
        RawSlot::Tlv(_) => panic!("expected a leaf slot"),
    }

    let raw = decoded.raw_packet.as_ref().unwrap();
    let offset = decoded.message_authenticator_position.unwrap();
    let received = raw[offset..offset + 16].to_vec();
    let mut zeroed = raw.clone();
    zeroed[offset..offset + 16].fill(0);
    assert!(verify_message_authenticator(&zeroed, &secret, &received).is_ok());
}
