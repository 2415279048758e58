// packet/auth.rs - Authenticator computation, Message-Authenticator,
// User-Password obfuscation ("PwCrypt") and CHAP verification.
//
// Grounded in original_source/pyrad2/packet.py (`CreateAuthenticator`,
// `PwCrypt`, `VerifyReply`, `VerifyChapPasswd`) and RFC 2865 §§3, 5.2, 5.3,
// RFC 2869 §5.13, and RFC 3579 §3.2 (Message-Authenticator).

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::RngCore;

use crate::error::PacketError;

type HmacMd5 = Hmac<Md5>;

/// 16 cryptographically random bytes, used as the Request Authenticator of
/// an Access-Request (RFC 2865 §3: "should be unpredictable and unique").
pub fn random_authenticator() -> [u8; 16] {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// The Authenticator for a request whose authenticity the server itself
/// must later be able to verify: Accounting-Request, CoA-Request,
/// Disconnect-Request. RFC 2866 §3: `MD5(Code+ID+Length+16 zero octets+
/// request attributes+shared secret)`.
pub fn compute_request_authenticator(
    code: u8,
    id: u8,
    length: u16,
    attributes: &[u8],
    secret: &[u8],
) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update([code, id]);
    hasher.update(length.to_be_bytes());
    hasher.update([0u8; 16]);
    hasher.update(attributes);
    hasher.update(secret);
    hasher.finalize().into()
}

/// The Authenticator for any reply packet. RFC 2865 §3: `MD5(Code+ID+
/// Length+RequestAuth+Attributes+Secret)`.
pub fn compute_reply_authenticator(
    code: u8,
    id: u8,
    length: u16,
    request_authenticator: &[u8; 16],
    attributes: &[u8],
    secret: &[u8],
) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update([code, id]);
    hasher.update(length.to_be_bytes());
    hasher.update(request_authenticator);
    hasher.update(attributes);
    hasher.update(secret);
    hasher.finalize().into()
}

pub fn verify_reply_authenticator(
    code: u8,
    id: u8,
    length: u16,
    request_authenticator: &[u8; 16],
    attributes: &[u8],
    secret: &[u8],
    received: &[u8; 16],
) -> Result<(), PacketError> {
    let expected =
        compute_reply_authenticator(code, id, length, request_authenticator, attributes, secret);
    if expected == *received {
        Ok(())
    } else {
        Err(PacketError::ReplyAuthenticatorMismatch)
    }
}

/// RFC 2865 §5.2 User-Password obfuscation ("PwCrypt"). The password is
/// zero-padded up to a multiple of 16 bytes, then XORed block-by-block
/// against `MD5(secret || authenticator)` for the first block and
/// `MD5(secret || previous ciphertext block)` thereafter.
pub fn pwcrypt_encode(password: &[u8], secret: &[u8], authenticator: &[u8; 16]) -> Vec<u8> {
    let padded_len = password.len().div_ceil(16).max(1) * 16;
    let mut padded = password.to_vec();
    padded.resize(padded_len, 0);

    let mut out = Vec::with_capacity(padded_len);
    let mut prev: Vec<u8> = authenticator.to_vec();

    for block in padded.chunks(16) {
        let mut hasher = Md5::new();
        hasher.update(secret);
        hasher.update(&prev);
        let mask: [u8; 16] = hasher.finalize().into();

        let mut cipher_block = [0u8; 16];
        for i in 0..16 {
            cipher_block[i] = block[i] ^ mask[i];
        }
        out.extend_from_slice(&cipher_block);
        prev = cipher_block.to_vec();
    }
    out
}

/// Inverse of `pwcrypt_encode`. Returns the zero-padded plaintext exactly
/// as it was before encoding; callers that want a `String` should trim
/// trailing NUL bytes themselves (the padding is indistinguishable from a
/// password that happens to end in NULs).
pub fn pwcrypt_decode(ciphertext: &[u8], secret: &[u8], authenticator: &[u8; 16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ciphertext.len());
    let mut prev: Vec<u8> = authenticator.to_vec();

    for block in ciphertext.chunks(16) {
        let mut hasher = Md5::new();
        hasher.update(secret);
        hasher.update(&prev);
        let mask: [u8; 16] = hasher.finalize().into();

        for (i, byte) in block.iter().enumerate() {
            out.push(byte ^ mask[i]);
        }
        prev = block.to_vec();
    }
    out
}

/// RFC 2865 §5.3 CHAP-Password verification: the trailing 16 bytes of
/// CHAP-Password must equal `MD5(chap_id || password || challenge)`. The
/// challenge is the dedicated CHAP-Challenge attribute if the NAS sent
/// one, falling back to the request Authenticator otherwise (RFC 2865
/// §5.3: "If the CHAP Challenge value is required to be more than 16
/// octets ... this attribute ... otherwise, the request authenticator...").
pub fn chap_verify(chap_id: u8, password: &[u8], challenge: &[u8], response: &[u8]) -> bool {
    if response.len() != 16 {
        return false;
    }
    let mut hasher = Md5::new();
    hasher.update([chap_id]);
    hasher.update(password);
    hasher.update(challenge);
    let expected: [u8; 16] = hasher.finalize().into();
    expected == response
}

/// Compute the Message-Authenticator (attribute 80) HMAC-MD5 over a fully
/// assembled wire packet. `packet_with_zeroed_mac` must be the complete
/// header+attributes buffer with the Message-Authenticator attribute's
/// 16-byte value already zeroed (RFC 2869 §5.13/RFC 3579 §3.2: the HMAC is
/// computed as if that value were all zero octets).
pub fn compute_message_authenticator(
    packet_with_zeroed_mac: &[u8],
    secret: &[u8],
) -> Result<[u8; 16], PacketError> {
    let mut mac = HmacMd5::new_from_slice(secret)
        .map_err(|_| PacketError::EmptySecret)?;
    mac.update(packet_with_zeroed_mac);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 16];
    out.copy_from_slice(&result);
    Ok(out)
}

pub fn verify_message_authenticator(
    packet_with_zeroed_mac: &[u8],
    secret: &[u8],
    received: &[u8],
) -> Result<(), PacketError> {
    if received.len() != 16 {
        return Err(PacketError::MessageAuthenticatorMismatch);
    }
    let expected = compute_message_authenticator(packet_with_zeroed_mac, secret)?;
    if expected == received {
        Ok(())
    } else {
        Err(PacketError::MessageAuthenticatorMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pwcrypt_round_trips_a_short_password() {
        let secret = b"xyzzy5461";
        let authenticator = [
            0x99, 0x02, 0x4d, 0xab, 0x3b, 0x0a, 0x4e, 0x8b, 0x11, 0x1a, 0x7f, 0x8e, 0x3d, 0x9c,
            0x21, 0x44,
        ];
        let password = b"Simplon";

        let encoded = pwcrypt_encode(password, secret, &authenticator);
        assert_eq!(encoded.len(), 16);

        let decoded = pwcrypt_decode(&encoded, secret, &authenticator);
        assert_eq!(&decoded[..password.len()], password);
        assert!(decoded[password.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn pwcrypt_handles_passwords_longer_than_one_block() {
        let secret = b"secret";
        let authenticator = [7u8; 16];
        let password = b"this password is definitely longer than sixteen bytes";

        let encoded = pwcrypt_encode(password, secret, &authenticator);
        assert_eq!(encoded.len() % 16, 0);
        let decoded = pwcrypt_decode(&encoded, secret, &authenticator);
        assert_eq!(&decoded[..password.len()], &password[..]);
    }

    #[test]
    fn chap_verify_accepts_a_matching_response_and_rejects_a_tampered_one() {
        let chap_id = 7u8;
        let password = b"letmein";
        let challenge = [1u8; 16];

        let mut hasher = Md5::new();
        hasher.update([chap_id]);
        hasher.update(password);
        hasher.update(challenge);
        let response: [u8; 16] = hasher.finalize().into();

        assert!(chap_verify(chap_id, password, &challenge, &response));

        let mut tampered = response;
        tampered[0] ^= 0xFF;
        assert!(!chap_verify(chap_id, password, &challenge, &tampered));
    }

    #[test]
    fn message_authenticator_round_trips_and_rejects_tampering() {
        let secret = b"shared-secret";
        let mut packet = vec![1u8, 42, 0, 40];
        packet.extend_from_slice(&[0u8; 16]); // authenticator
        packet.extend_from_slice(&[80, 18]); // Message-Authenticator AVP header
        packet.extend_from_slice(&[0u8; 16]); // zeroed placeholder

        let mac = compute_message_authenticator(&packet, secret).unwrap();
        let mac_offset = packet.len() - 16;
        packet[mac_offset..].copy_from_slice(&mac);

        let mut verify_buf = packet.clone();
        verify_buf[mac_offset..].fill(0);
        assert!(verify_message_authenticator(&verify_buf, secret, &mac).is_ok());

        let mut tampered = packet.clone();
        tampered[5] ^= 0xFF; // corrupt an unrelated attribute byte
        let mut tampered_zeroed = tampered.clone();
        tampered_zeroed[mac_offset..].fill(0);
        assert!(verify_message_authenticator(&tampered_zeroed, secret, &mac).is_err());
    }
}
