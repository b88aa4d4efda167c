//! WebSocket frame codec.
//!
//! Wire layout: byte 0 carries FIN in the high bit and the opcode in the
//! low nibble; byte 1 carries the mask flag in the high bit and a 7-bit
//! length that escapes to a big-endian 16-bit length at 126 and a
//! big-endian 64-bit length at 127. A 4-byte mask key follows when the
//! mask flag is set, then the payload.

use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Frame opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Control frames never carry message payloads.
    pub fn is_control(&self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment of the message.
    pub fin: bool,
    pub opcode: Opcode,
    /// Mask key, present on client frames.
    pub mask: Option<[u8; 4]>,
    pub payload_len: u64,
}

#[derive(Debug)]
pub enum FrameError {
    /// Reserved opcode bits on the wire.
    BadOpcode(u8),
    Io(io::Error),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::BadOpcode(bits) => write!(f, "unknown opcode {bits:#x}"),
            FrameError::Io(e) => write!(f, "frame read failed: {e}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<io::Error> for FrameError {
    fn from(error: io::Error) -> Self {
        FrameError::Io(error)
    }
}

/// Encode a server frame header. Server frames always set FIN and are
/// never masked.
pub fn encode_header(opcode: Opcode, payload_len: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(10);
    header.push(0x80 | opcode as u8);
    if payload_len <= 125 {
        header.push(payload_len as u8);
    } else if payload_len <= 65535 {
        header.push(126);
        header.extend_from_slice(&(payload_len as u16).to_be_bytes());
    } else {
        header.push(127);
        header.extend_from_slice(&(payload_len as u64).to_be_bytes());
    }
    header
}

/// Read and decode a frame header, extended length and mask key included.
pub async fn read_header<R>(reader: &mut R) -> Result<FrameHeader, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut fixed = [0u8; 2];
    reader.read_exact(&mut fixed).await?;

    let fin = fixed[0] & 0x80 != 0;
    let opcode =
        Opcode::from_bits(fixed[0] & 0x0F).ok_or(FrameError::BadOpcode(fixed[0] & 0x0F))?;
    let masked = fixed[1] & 0x80 != 0;

    let mut payload_len = u64::from(fixed[1] & 0x7F);
    if payload_len == 126 {
        let mut ext = [0u8; 2];
        reader.read_exact(&mut ext).await?;
        payload_len = u64::from(u16::from_be_bytes(ext));
    } else if payload_len == 127 {
        let mut ext = [0u8; 8];
        reader.read_exact(&mut ext).await?;
        payload_len = u64::from_be_bytes(ext);
    }

    let mask = if masked {
        let mut key = [0u8; 4];
        reader.read_exact(&mut key).await?;
        Some(key)
    } else {
        None
    };

    Ok(FrameHeader {
        fin,
        opcode,
        mask,
        payload_len,
    })
}

/// XOR the payload with the mask key. Applying the same key twice returns
/// the original bytes, so masking and unmasking share this function.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_form_boundaries() {
        // 7-bit form up to 125
        assert_eq!(encode_header(Opcode::Binary, 125).len(), 2);
        // 16-bit form from 126 to 65535
        assert_eq!(encode_header(Opcode::Binary, 126).len(), 4);
        assert_eq!(encode_header(Opcode::Binary, 65535).len(), 4);
        // 64-bit form beyond
        assert_eq!(encode_header(Opcode::Binary, 65536).len(), 10);
    }

    #[test]
    fn fin_is_the_high_bit() {
        let header = encode_header(Opcode::Text, 0);
        assert_eq!(header[0], 0x81);
    }

    #[tokio::test]
    async fn decodes_extended_length() {
        let mut wire: &[u8] = &[0x82, 126, 0x01, 0x00];
        let header = read_header(&mut wire).await.unwrap();
        assert!(header.fin);
        assert_eq!(header.opcode, Opcode::Binary);
        assert_eq!(header.payload_len, 256);
        assert_eq!(header.mask, None);
    }

    #[test]
    fn mask_round_trips() {
        let key = [0xA1, 0x5C, 0x03, 0xFF];
        let original: Vec<u8> = (0u8..=255).collect();
        let mut data = original.clone();
        apply_mask(&mut data, key);
        assert_ne!(data, original);
        apply_mask(&mut data, key);
        assert_eq!(data, original);
    }
}
