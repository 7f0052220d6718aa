//! Save-file frame parsing and name-field validation

use super::codes::{CHUNK_LEN, FRAME_HEADER_LEN, NAME_FIELD_LEN};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),
    #[error("invalid name field: {0}")]
    BadName(&'static str),
    #[error("packet number {number} out of range 1..={total}")]
    BadPacketNumber { number: u16, total: u16 },
}

/// One save-file packet:
/// `content_size(4) | decrypted_size(4) | packet_number(2) | total_packets(2) |
/// file_name(255, NUL-padded)` followed by exactly 1024 ciphertext bytes.
#[derive(Debug, Clone)]
pub struct FileTransferFrame {
    pub content_size: u32,
    pub decrypted_size: u32,
    pub packet_number: u16,
    pub total_packets: u16,
    pub file_name: String,
    pub ciphertext: [u8; CHUNK_LEN],
}

impl FileTransferFrame {
    pub fn parse(payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() < FRAME_HEADER_LEN + CHUNK_LEN {
            return Err(FrameError::TooShort(payload.len()));
        }
        let content_size = u32::from_le_bytes(payload[0..4].try_into().unwrap());
        let decrypted_size = u32::from_le_bytes(payload[4..8].try_into().unwrap());
        let packet_number = u16::from_le_bytes(payload[8..10].try_into().unwrap());
        let total_packets = u16::from_le_bytes(payload[10..12].try_into().unwrap());
        if total_packets == 0 || packet_number == 0 || packet_number > total_packets {
            return Err(FrameError::BadPacketNumber {
                number: packet_number,
                total: total_packets,
            });
        }
        let file_name = parse_name(&payload[12..12 + NAME_FIELD_LEN])?;
        let mut ciphertext = [0u8; CHUNK_LEN];
        ciphertext.copy_from_slice(&payload[FRAME_HEADER_LEN..FRAME_HEADER_LEN + CHUNK_LEN]);
        Ok(Self {
            content_size,
            decrypted_size,
            packet_number,
            total_packets,
            file_name,
            ciphertext,
        })
    }

    /// True when this packet is the declared last one; its plaintext gets
    /// trailing zero padding stripped before it is appended.
    pub fn is_final(&self) -> bool {
        self.packet_number == self.total_packets
    }
}

/// Decode a NUL-padded/NUL-terminated name field into a validated string.
///
/// Names come straight off the wire and end up as filesystem path
/// components, so anything that could escape the per-account directory is
/// rejected here rather than at the `Path::join` site.
pub fn parse_name(field: &[u8]) -> Result<String, FrameError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    if field[end..].iter().any(|&b| b != 0) {
        return Err(FrameError::BadName("interior NUL byte"));
    }
    let name = std::str::from_utf8(&field[..end]).map_err(|_| FrameError::BadName("not UTF-8"))?;
    if name.is_empty() {
        return Err(FrameError::BadName("empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(FrameError::BadName("path separator"));
    }
    if name == "." || name == ".." {
        return Err(FrameError::BadName("relative path component"));
    }
    Ok(name.to_string())
}
