//! Outbound responses — construction and wire encoding
//!
//! Every response shares the header layout
//! `version(1) | code(2, LE) | payload_length(4, LE)` followed by the
//! payload. Constructors below cover the full response vocabulary; the
//! dispatcher never assembles payload bytes by hand.

use super::codes::{ResponseCode, CLIENT_ID_LEN, NAME_FIELD_LEN, PROTOCOL_VERSION};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// An outbound response, ready to serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: ResponseCode,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn registration_success(client_id: [u8; CLIENT_ID_LEN]) -> Self {
        Self {
            code: ResponseCode::RegistrationSuccess,
            payload: client_id.to_vec(),
        }
    }

    pub fn registration_failed() -> Self {
        Self {
            code: ResponseCode::RegistrationFailed,
            payload: Vec::new(),
        }
    }

    pub fn key_delivery(client_id: [u8; CLIENT_ID_LEN], wrapped_key: &[u8]) -> Self {
        let mut payload = client_id.to_vec();
        payload.extend_from_slice(wrapped_key);
        Self {
            code: ResponseCode::KeyDelivery,
            payload,
        }
    }

    pub fn login_success(client_id: [u8; CLIENT_ID_LEN], wrapped_key: &[u8]) -> Self {
        let mut payload = client_id.to_vec();
        payload.extend_from_slice(wrapped_key);
        Self {
            code: ResponseCode::LoginSuccess,
            payload,
        }
    }

    pub fn login_failed(client_id: [u8; CLIENT_ID_LEN]) -> Self {
        Self {
            code: ResponseCode::LoginFailed,
            payload: client_id.to_vec(),
        }
    }

    pub fn generic_error() -> Self {
        Self {
            code: ResponseCode::GenericError,
            payload: Vec::new(),
        }
    }

    /// CRC report after the final packet of a transfer:
    /// `client_id(16) | content_size(4) | file_name(255, NUL-padded) | digest(4)`.
    pub fn crc_report(
        client_id: [u8; CLIENT_ID_LEN],
        content_size: u32,
        file_name: &str,
        digest: u32,
    ) -> Self {
        let mut payload = Vec::with_capacity(CLIENT_ID_LEN + 4 + NAME_FIELD_LEN + 4);
        payload.extend_from_slice(&client_id);
        payload.extend_from_slice(&content_size.to_le_bytes());
        let mut name_field = [0u8; NAME_FIELD_LEN];
        let len = file_name.len().min(NAME_FIELD_LEN);
        name_field[..len].copy_from_slice(&file_name.as_bytes()[..len]);
        payload.extend_from_slice(&name_field);
        payload.extend_from_slice(&digest.to_le_bytes());
        Self {
            code: ResponseCode::CrcReport,
            payload,
        }
    }

    pub fn final_confirmation(client_id: [u8; CLIENT_ID_LEN]) -> Self {
        Self {
            code: ResponseCode::FinalConfirmation,
            payload: client_id.to_vec(),
        }
    }

    /// Serialize header + payload to a single buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(7 + self.payload.len());
        buf.push(PROTOCOL_VERSION);
        buf.extend_from_slice(&(self.code as u16).to_le_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Write the full response to the connection.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_error_encoding() {
        let bytes = Response::generic_error().to_bytes();
        assert_eq!(bytes.len(), 7);
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 1607);
        assert_eq!(u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]), 0);
    }

    #[test]
    fn test_registration_success_carries_id() {
        let id = [7u8; 16];
        let bytes = Response::registration_success(id).to_bytes();
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 1600);
        assert_eq!(&bytes[7..23], &id);
    }

    #[test]
    fn test_key_delivery_appends_wrapped_key() {
        let id = [1u8; 16];
        let wrapped = vec![9u8; 128];
        let resp = Response::key_delivery(id, &wrapped);
        assert_eq!(resp.payload.len(), 16 + 128);
        assert_eq!(&resp.payload[16..], wrapped.as_slice());
    }

    #[test]
    fn test_crc_report_layout() {
        let id = [2u8; 16];
        let resp = Response::crc_report(id, 2500, "f.txt", 0xDEADBEEF);
        assert_eq!(resp.payload.len(), 16 + 4 + 255 + 4);
        assert_eq!(&resp.payload[..16], &id);
        assert_eq!(
            u32::from_le_bytes(resp.payload[16..20].try_into().unwrap()),
            2500
        );
        assert_eq!(&resp.payload[20..25], b"f.txt");
        assert!(resp.payload[25..275].iter().all(|&b| b == 0));
        assert_eq!(
            u32::from_le_bytes(resp.payload[275..279].try_into().unwrap()),
            0xDEADBEEF
        );
    }

    #[tokio::test]
    async fn test_write_to_stream() {
        let mut buf = Vec::new();
        Response::final_confirmation([3u8; 16])
            .write_to(&mut buf)
            .await
            .expect("write");
        assert_eq!(buf.len(), 7 + 16);
        assert_eq!(u16::from_le_bytes([buf[1], buf[2]]), 1604);
    }
}
