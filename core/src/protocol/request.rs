//! Inbound request framing — the fixed 23-byte little-endian header

use super::codes::{CLIENT_ID_LEN, MAX_PAYLOAD_LEN, REQUEST_HEADER_LEN};
use thiserror::Error;

/// Errors raised while parsing inbound frames. All of these are transport
/// faults: the connection is closed without sending a response.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("short header: got {0} bytes, expected {REQUEST_HEADER_LEN}")]
    ShortHeader(usize),
    #[error("payload length {0} exceeds limit {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge(u32),
}

/// Parsed request header. The payload is read separately, only after the
/// full header has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub client_id: [u8; CLIENT_ID_LEN],
    pub version: u8,
    pub code: u16,
    pub payload_length: u32,
}

impl RequestHeader {
    /// Parse exactly 23 header bytes (little-endian fields).
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() != REQUEST_HEADER_LEN {
            return Err(ProtocolError::ShortHeader(buf.len()));
        }
        let mut client_id = [0u8; CLIENT_ID_LEN];
        client_id.copy_from_slice(&buf[..CLIENT_ID_LEN]);
        let version = buf[16];
        let code = u16::from_le_bytes([buf[17], buf[18]]);
        let payload_length = u32::from_le_bytes([buf[19], buf[20], buf[21], buf[22]]);
        if payload_length > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLarge(payload_length));
        }
        Ok(Self {
            client_id,
            version,
            code,
            payload_length,
        })
    }

    /// Serialize back to the 23-byte wire layout.
    pub fn to_bytes(&self) -> [u8; REQUEST_HEADER_LEN] {
        let mut buf = [0u8; REQUEST_HEADER_LEN];
        buf[..CLIENT_ID_LEN].copy_from_slice(&self.client_id);
        buf[16] = self.version;
        buf[17..19].copy_from_slice(&self.code.to_le_bytes());
        buf[19..23].copy_from_slice(&self.payload_length.to_le_bytes());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codes::PROTOCOL_VERSION;

    #[test]
    fn test_header_parse_round_trip() {
        let header = RequestHeader {
            client_id: [0xAB; 16],
            version: PROTOCOL_VERSION,
            code: 1025,
            payload_length: 300,
        };
        let bytes = header.to_bytes();
        let parsed = RequestHeader::parse(&bytes).expect("valid header");
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_field_layout() {
        let mut bytes = [0u8; REQUEST_HEADER_LEN];
        bytes[0] = 0x11;
        bytes[15] = 0x22;
        bytes[16] = 3; // version
        bytes[17..19].copy_from_slice(&1028u16.to_le_bytes());
        bytes[19..23].copy_from_slice(&1291u32.to_le_bytes());

        let parsed = RequestHeader::parse(&bytes).expect("valid header");
        assert_eq!(parsed.client_id[0], 0x11);
        assert_eq!(parsed.client_id[15], 0x22);
        assert_eq!(parsed.version, 3);
        assert_eq!(parsed.code, 1028);
        assert_eq!(parsed.payload_length, 1291);
    }

    #[test]
    fn test_short_header_rejected() {
        let bytes = [0u8; 10];
        assert!(matches!(
            RequestHeader::parse(&bytes),
            Err(ProtocolError::ShortHeader(10))
        ));
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let header = RequestHeader {
            client_id: [0; 16],
            version: PROTOCOL_VERSION,
            code: 1028,
            payload_length: MAX_PAYLOAD_LEN + 1,
        };
        let bytes = header.to_bytes();
        assert!(matches!(
            RequestHeader::parse(&bytes),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }
}
