// eap.rs - EAP-MD5 (RFC 3748 §5.4) framing, transport-agnostic.
//
// RADIUS carries EAP frames opaquely inside one or more EAP-Message
// attributes (RFC 3579 §3.1); this module only builds and parses the EAP
// layer itself; callers are responsible for getting the bytes in and out
// of a `Packet`'s EAP-Message attribute(s) and for copying the State
// attribute through unchanged between challenge and response, as RFC 2865
// §5.24 requires of any attribute a client doesn't otherwise understand.
//
// Grounded in RFC 3748 (EAP) and RFC 3579 §3.2 (EAP over RADIUS); encode
// style follows packet/auth.rs's own MD5 use (md-5 crate, explicit byte
// layout, typed decode errors).

use md5::{Digest, Md5};

use crate::error::PacketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EapCode {
    Request,
    Response,
    Success,
    Failure,
}

impl EapCode {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => EapCode::Request,
            2 => EapCode::Response,
            3 => EapCode::Success,
            4 => EapCode::Failure,
            _ => return None,
        })
    }

    fn as_u8(self) -> u8 {
        match self {
            EapCode::Request => 1,
            EapCode::Response => 2,
            EapCode::Success => 3,
            EapCode::Failure => 4,
        }
    }
}

const TYPE_IDENTITY: u8 = 1;
const TYPE_MD5_CHALLENGE: u8 = 4;

/// A parsed EAP-Request/MD5-Challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Md5Challenge {
    pub identifier: u8,
    pub challenge: Vec<u8>,
}

/// Build an EAP-Response/Identity frame (the first response in any EAP
/// conversation, RFC 3748 §5.1).
pub fn build_identity_response(identifier: u8, identity: &str) -> Vec<u8> {
    let value_size = identity.len() as u8;
    let mut body = Vec::with_capacity(1 + 1 + identity.len());
    body.push(value_size);
    body.extend_from_slice(identity.as_bytes());
    build_frame(EapCode::Response, identifier, TYPE_IDENTITY, &body)
}

/// Parse an EAP-Request/MD5-Challenge frame.
pub fn parse_md5_challenge(frame: &[u8]) -> Result<Md5Challenge, PacketError> {
    let (code, identifier, type_data) = parse_frame(frame)?;
    if code != EapCode::Request {
        return Err(PacketError::DecodeFailure {
            name: "EAP-Message".to_string(),
            datatype: "eap",
            reason: "expected an EAP-Request".to_string(),
        });
    }
    let (eap_type, body) = type_data;
    if eap_type != TYPE_MD5_CHALLENGE {
        return Err(PacketError::DecodeFailure {
            name: "EAP-Message".to_string(),
            datatype: "eap",
            reason: format!("expected MD5-Challenge (type 4), got type {}", eap_type),
        });
    }
    let value_size = *body.first().ok_or_else(|| PacketError::DecodeFailure {
        name: "EAP-Message".to_string(),
        datatype: "eap",
        reason: "MD5-Challenge body is empty".to_string(),
    })? as usize;
    if body.len() < 1 + value_size {
        return Err(PacketError::DecodeFailure {
            name: "EAP-Message".to_string(),
            datatype: "eap",
            reason: "MD5-Challenge value-size exceeds the frame".to_string(),
        });
    }
    Ok(Md5Challenge {
        identifier,
        challenge: body[1..1 + value_size].to_vec(),
    })
}

/// Build the matching EAP-Response/MD5-Challenge: `MD5(identifier ||
/// password || challenge)`, RFC 3748 §5.4 (CHAP's RFC 1994 digest, reused
/// verbatim as the EAP method).
pub fn build_md5_challenge_response(identifier: u8, password: &[u8], challenge: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update([identifier]);
    hasher.update(password);
    hasher.update(challenge);
    let digest: [u8; 16] = hasher.finalize().into();

    let mut body = Vec::with_capacity(1 + 16);
    body.push(16u8);
    body.extend_from_slice(&digest);
    build_frame(EapCode::Response, identifier, TYPE_MD5_CHALLENGE, &body)
}

pub fn is_success(frame: &[u8]) -> bool {
    parse_frame(frame)
        .map(|(code, _, _)| code == EapCode::Success)
        .unwrap_or(false)
}

pub fn is_failure(frame: &[u8]) -> bool {
    parse_frame(frame)
        .map(|(code, _, _)| code == EapCode::Failure)
        .unwrap_or(false)
}

fn build_frame(code: EapCode, identifier: u8, eap_type: u8, type_data: &[u8]) -> Vec<u8> {
    let length = 4 + 1 + type_data.len();
    let mut out = Vec::with_capacity(length);
    out.push(code.as_u8());
    out.push(identifier);
    out.extend_from_slice(&(length as u16).to_be_bytes());
    out.push(eap_type);
    out.extend_from_slice(type_data);
    out
}

type FrameParts<'a> = (EapCode, u8, (u8, &'a [u8]));

fn parse_frame(frame: &[u8]) -> Result<FrameParts<'_>, PacketError> {
    if frame.len() < 4 {
        return Err(PacketError::DecodeFailure {
            name: "EAP-Message".to_string(),
            datatype: "eap",
            reason: "frame shorter than the 4-byte EAP header".to_string(),
        });
    }
    let code = EapCode::from_u8(frame[0]).ok_or_else(|| PacketError::DecodeFailure {
        name: "EAP-Message".to_string(),
        datatype: "eap",
        reason: format!("unknown EAP code {}", frame[0]),
    })?;
    let identifier = frame[1];
    let length = u16::from_be_bytes([frame[2], frame[3]]) as usize;
    if length > frame.len() {
        return Err(PacketError::DecodeFailure {
            name: "EAP-Message".to_string(),
            datatype: "eap",
            reason: "declared length exceeds the frame".to_string(),
        });
    }
    if matches!(code, EapCode::Success | EapCode::Failure) {
        return Ok((code, identifier, (0, &[])));
    }
    if length < 5 {
        return Err(PacketError::DecodeFailure {
            name: "EAP-Message".to_string(),
            datatype: "eap",
            reason: "Request/Response frame has no type field".to_string(),
        });
    }
    Ok((code, identifier, (frame[4], &frame[5..length])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_response_round_trips_its_header() {
        let frame = build_identity_response(1, "alice");
        let (code, identifier, (eap_type, body)) = parse_frame(&frame).unwrap();
        assert_eq!(code, EapCode::Response);
        assert_eq!(identifier, 1);
        assert_eq!(eap_type, TYPE_IDENTITY);
        assert_eq!(&body[1..], b"alice");
    }

    #[test]
    fn md5_challenge_round_trips_and_response_digest_matches_chap_semantics() {
        let challenge_frame = build_frame(EapCode::Request, 9, TYPE_MD5_CHALLENGE, &{
            let mut body = vec![16u8];
            body.extend_from_slice(&[0xAA; 16]);
            body
        });
        let parsed = parse_md5_challenge(&challenge_frame).unwrap();
        assert_eq!(parsed.identifier, 9);
        assert_eq!(parsed.challenge, vec![0xAA; 16]);

        let response = build_md5_challenge_response(9, b"letmein", &parsed.challenge);
        let (code, identifier, (eap_type, body)) = parse_frame(&response).unwrap();
        assert_eq!(code, EapCode::Response);
        assert_eq!(identifier, 9);
        assert_eq!(eap_type, TYPE_MD5_CHALLENGE);

        let mut hasher = Md5::new();
        hasher.update([9u8]);
        hasher.update(b"letmein");
        hasher.update([0xAA; 16]);
        let expected: [u8; 16] = hasher.finalize().into();
        assert_eq!(&body[1..], &expected);
    }

    #[test]
    fn success_and_failure_frames_are_recognised() {
        assert!(is_success(&build_frame(EapCode::Success, 3, 0, &[])));
        assert!(is_failure(&build_frame(EapCode::Failure, 3, 0, &[])));
        assert!(!is_success(&build_frame(EapCode::Failure, 3, 0, &[])));
    }
}
