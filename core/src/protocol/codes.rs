//! Protocol constants — request/response codes and frame sizes

/// Protocol version byte carried in every request and response header.
pub const PROTOCOL_VERSION: u8 = 3;

/// Request header: client_id(16) | version(1) | code(2) | payload_length(4).
pub const REQUEST_HEADER_LEN: usize = 23;

/// Response header: version(1) | code(2) | payload_length(4).
pub const RESPONSE_HEADER_LEN: usize = 7;

/// Upper bound on `payload_length` accepted before allocation.
/// The largest legitimate payload is a save-file request
/// (267-byte sub-header + 1024-byte ciphertext chunk).
pub const MAX_PAYLOAD_LEN: u32 = 64 * 1024;

/// Length of the opaque client identifier.
pub const CLIENT_ID_LEN: usize = 16;

/// NUL-padded file-name field width in save-file and public-key payloads.
pub const NAME_FIELD_LEN: usize = 255;

/// Fixed ciphertext chunk size per save-file packet.
pub const CHUNK_LEN: usize = 1024;

/// Save-file sub-header: content_size(4) | decrypted_size(4) |
/// packet_number(2) | total_packets(2) | file_name(255).
pub const FRAME_HEADER_LEN: usize = 267;

/// Inbound request kinds, one arm per wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RequestCode {
    Registration = 1025,
    ReceivePublicKey = 1026,
    Login = 1027,
    SaveFile = 1028,
    TransferSuccess = 1029,
    CrcMismatch = 1030,
    TransferFailed = 1031,
}

impl RequestCode {
    /// Map a wire code to a request kind. Unknown codes stay `None` so the
    /// dispatcher can take the explicit unknown-code path.
    pub fn from_wire(code: u16) -> Option<Self> {
        match code {
            1025 => Some(Self::Registration),
            1026 => Some(Self::ReceivePublicKey),
            1027 => Some(Self::Login),
            1028 => Some(Self::SaveFile),
            1029 => Some(Self::TransferSuccess),
            1030 => Some(Self::CrcMismatch),
            1031 => Some(Self::TransferFailed),
            _ => None,
        }
    }
}

/// Outbound response kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ResponseCode {
    RegistrationSuccess = 1600,
    RegistrationFailed = 1601,
    KeyDelivery = 1602,
    CrcReport = 1603,
    FinalConfirmation = 1604,
    LoginSuccess = 1605,
    LoginFailed = 1606,
    GenericError = 1607,
}
