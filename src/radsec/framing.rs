// radsec/framing.rs - Stream framing for RADIUS-over-TLS.
//
// Grounded in original_source/pyrad2/utils.py's `read_radius_packet`: a
// RADIUS packet is self-delimiting (the header's length field covers the
// whole packet), so framing over a TCP/TLS stream is just "read the fixed
// 4-byte prefix to learn the length, then read the rest."

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{PacketError, RadiusError, Result};

const HEADER_LEN: usize = 4;
const MIN_PACKET_LEN: usize = 20;
const MAX_PACKET_LEN: usize = 4095;

/// Read exactly one framed RADIUS packet off `stream`. Returns `Ok(None)`
/// on a clean EOF before any bytes of a new packet arrive; any other
/// short read is a framing error.
pub async fn read_packet<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; HEADER_LEN];
    match read_exact_or_eof(stream, &mut header).await? {
        false => return Ok(None),
        true => {}
    }

    let declared_len = u16::from_be_bytes([header[2], header[3]]) as usize;
    if !(MIN_PACKET_LEN..=MAX_PACKET_LEN).contains(&declared_len) {
        return Err(PacketError::Framing(format!(
            "declared packet length {} out of range",
            declared_len
        ))
        .into());
    }

    let mut rest = vec![0u8; declared_len - HEADER_LEN];
    stream.read_exact(&mut rest).await.map_err(RadiusError::Io)?;

    let mut full = Vec::with_capacity(declared_len);
    full.extend_from_slice(&header);
    full.extend_from_slice(&rest);
    Ok(Some(full))
}

pub async fn write_packet<S: AsyncWrite + Unpin>(stream: &mut S, wire: &[u8]) -> Result<()> {
    stream.write_all(wire).await.map_err(RadiusError::Io)?;
    stream.flush().await.map_err(RadiusError::Io)
}

/// Like `AsyncReadExt::read_exact`, but distinguishes "EOF before any byte
/// was read" (a clean end of stream between packets) from "EOF partway
/// through the buffer" (a framing error).
async fn read_exact_or_eof<S: AsyncRead + Unpin>(stream: &mut S, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await.map_err(RadiusError::Io)?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(PacketError::Framing("connection closed mid-header".to_string()).into());
        }
        filled += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_a_single_self_delimited_packet() {
        let mut packet = vec![2u8, 1, 0, 20];
        packet.extend_from_slice(&[0u8; 16]);
        let mut cursor = Cursor::new(packet.clone());

        let read_back = read_packet(&mut cursor).await.unwrap().unwrap();
        assert_eq!(read_back, packet);
        assert!(read_packet(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_an_out_of_range_declared_length() {
        let packet = vec![2u8, 1, 0, 3, 0, 0, 0];
        let mut cursor = Cursor::new(packet);
        assert!(read_packet(&mut cursor).await.is_err());
    }
}
