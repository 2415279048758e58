// Byte-exact Accounting-Request vector, cross-checked against
// original_source/tests/test_packet.py's `AcctPacketTests` fixture
// (`RequestPacket()` with no attributes, secret `b"secret"`).

use std::sync::Arc;

use rust_radius::dictionary::Dictionary;
use rust_radius::packet::codec;
use rust_radius::packet::{Packet, PacketCode};

#[test]
fn accounting_request_with_no_attributes_matches_the_known_vector() {
    let dict = Arc::new(Dictionary::new());
    let mut pkt = Packet::new(PacketCode::AccountingRequest.as_u8(), dict, b"secret".to_vec());
    pkt.id = 0;

    let wire = codec::encode(&mut pkt).unwrap();

    let expected: [u8; 20] = [
        0x04, 0x00, 0x00, 0x14, 0x95, 0xdf, 0x90, 0xcc, 0x62, 0x6e, 0xfb, 0x15, 0x47, 0x21, 0x13,
        0xea, 0xfa, 0x3e, 0x36, 0x0f,
    ];
    assert_eq!(wire, expected);
}
