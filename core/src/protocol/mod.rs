//! Wire protocol — request framing, save-file frames, outbound responses

pub mod codes;
pub mod frame;
pub mod request;
pub mod response;

pub use codes::{RequestCode, ResponseCode, CHUNK_LEN, CLIENT_ID_LEN, FRAME_HEADER_LEN,
    MAX_PAYLOAD_LEN, NAME_FIELD_LEN, PROTOCOL_VERSION, REQUEST_HEADER_LEN};
pub use frame::{parse_name, FileTransferFrame, FrameError};
pub use request::{ProtocolError, RequestHeader};
pub use response::Response;
