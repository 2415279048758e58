// Full Packet/codec round trips through a standard TLV container and
// through a Vendor-Specific AVP wide enough to require splitting across
// more than one Vendor-Specific (26) instance — distinct from
// dictionary/datatypes/structural.rs's lower-level unit tests, which
// exercise `encode_tlv`/`encode_vsa` directly rather than through
// `Packet::add`/`get`.

use std::fs;
use std::sync::Arc;

use rust_radius::dictionary::value::DecodedValue;
use rust_radius::dictionary::Dictionary;
use rust_radius::packet::codec;
use rust_radius::packet::{Packet, PacketCode};

fn write_dict(contents: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "rust-radius-it-dict-{}-{}.txt",
        std::process::id(),
        contents.len()
    ));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn tlv_container_round_trips_through_add_and_get() {
    let contents = "\
ATTRIBUTE Test-Tlv 241 tlv
ATTRIBUTE Test-Tlv-Str 241.1 string
ATTRIBUTE Test-Tlv-Int 241.2 integer
";
    let path = write_dict(contents);
    let dict = Arc::new(Dictionary::from_file(&path).unwrap());
    fs::remove_file(&path).ok();

    let mut pkt = Packet::new(PacketCode::AccessRequest.as_u8(), dict, b"secret".to_vec());
    pkt.add("Test-Tlv.Test-Tlv-Str", DecodedValue::String("hello".into())).unwrap();
    pkt.add("Test-Tlv.Test-Tlv-Int", DecodedValue::Integer(7)).unwrap();

    let wire = codec::encode(&mut pkt).unwrap();
    let decoded = codec::decode(&wire, pkt.dict.clone(), b"secret".to_vec()).unwrap();

    let rust_radius::dictionary::value::DecodedSlot::Tlv(children) = decoded.get("Test-Tlv").unwrap().unwrap() else {
        panic!("expected a TLV slot");
    };
    assert_eq!(children["Test-Tlv-Str"], vec![DecodedValue::String("hello".into())]);
    assert_eq!(children["Test-Tlv-Int"], vec![DecodedValue::Integer(7)]);
}

#[test]
fn wide_vendor_specific_attribute_splits_across_multiple_avp_instances() {
    let contents = "\
VENDOR Test-Vendor 12345
BEGIN-VENDOR Test-Vendor
ATTRIBUTE Test-Vendor-Str 1 string
END-VENDOR Test-Vendor
";
    let path = write_dict(contents);
    let dict = Arc::new(Dictionary::from_file(&path).unwrap());
    fs::remove_file(&path).ok();

    let mut pkt = Packet::new(PacketCode::AccountingRequest.as_u8(), dict, b"secret".to_vec());
    // Each instance is capped at 253 bytes; add enough 200-byte strings
    // that the vendor-specific payload can't fit in a single AVP.
    let value = "x".repeat(200);
    for _ in 0..5 {
        pkt.add("Test-Vendor.Test-Vendor-Str", DecodedValue::String(value.clone())).unwrap();
    }

    let wire = codec::encode(&mut pkt).unwrap();

    let mut offset = 20;
    let mut vsa_avp_count = 0;
    while offset < wire.len() {
        let code = wire[offset];
        let len = wire[offset + 1] as usize;
        if code == 26 {
            vsa_avp_count += 1;
        }
        offset += len;
    }
    assert!(vsa_avp_count > 1, "expected the vendor attribute to split across multiple AVPs, got {}", vsa_avp_count);

    let decoded = codec::decode(&wire, pkt.dict.clone(), b"secret".to_vec()).unwrap();
    let rust_radius::dictionary::value::DecodedSlot::Leaf(values) =
        decoded.get("Test-Vendor.Test-Vendor-Str").unwrap().unwrap()
    else {
        panic!("expected a leaf slot");
    };
    assert_eq!(values.len(), 5);
    for v in values {
        assert_eq!(v, DecodedValue::String(value.clone()));
    }
}
