//! Per-connection protocol loop
//!
//! One `Connection` owns one accepted stream and its `Session`. The loop
//! is strictly sequential: read a framed request, handle it, write the
//! response, repeat until the session goes inactive or the transport
//! fails.
//!
//! Fault policy (kept as the deployed clients expect it):
//! - transport faults (empty/short read, oversize payload) close the
//!   connection silently;
//! - an unrecognized request code answers with a generic error and closes;
//! - application faults answer with a generic error and usually leave the
//!   session open for a retry — the file-write path is the one exception
//!   and is fatal.

use crate::crypto;
use crate::identity::{client_id_hex, derive_client_id, ClientId};
use crate::ingest::FileIngest;
use crate::protocol::{
    parse_name, FileTransferFrame, RequestCode, RequestHeader, Response, NAME_FIELD_LEN,
    REQUEST_HEADER_LEN,
};
use crate::session::Session;
use crate::store::{AccountStore, Existence};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, info, warn};

pub struct Connection<S> {
    stream: S,
    peer: String,
    store: Arc<dyn AccountStore>,
    ingest: FileIngest,
    session: Session,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Connection<S> {
    pub fn new(stream: S, peer: String, store: Arc<dyn AccountStore>, ingest: FileIngest) -> Self {
        Self {
            stream,
            peer,
            store,
            ingest,
            session: Session::new(),
        }
    }

    /// Serve requests until the client disconnects or the session ends.
    pub async fn run(mut self) {
        while self.session.active {
            let header = match self.read_header().await {
                Ok(Some(header)) => header,
                Ok(None) => {
                    debug!(peer = %self.peer, "client disconnected");
                    return;
                }
                Err(e) => {
                    warn!(peer = %self.peer, error = %e, "failed to receive request");
                    return;
                }
            };

            let mut payload = vec![0u8; header.payload_length as usize];
            if let Err(e) = self.stream.read_exact(&mut payload).await {
                warn!(peer = %self.peer, error = %e, "failed to receive payload");
                return;
            }

            // The header's id is the client's claimed identity for this
            // request; registration replaces it with the derived id.
            self.session.client_id = Some(header.client_id);

            let result = match RequestCode::from_wire(header.code) {
                Some(RequestCode::Registration) => self.handle_register(&payload).await,
                Some(RequestCode::ReceivePublicKey) => self.handle_public_key(&payload).await,
                Some(RequestCode::Login) => self.handle_login(&payload).await,
                Some(RequestCode::SaveFile) => self.handle_save_file(&payload).await,
                Some(RequestCode::TransferSuccess) => self.handle_transfer_success(&payload).await,
                Some(RequestCode::CrcMismatch) => {
                    self.handle_crc_mismatch(&payload);
                    Ok(())
                }
                Some(RequestCode::TransferFailed) => self.handle_transfer_failed(&payload).await,
                None => {
                    warn!(peer = %self.peer, code = header.code, "unknown request code");
                    self.session.active = false;
                    self.send(Response::generic_error()).await
                }
            };

            if let Err(e) = result {
                warn!(peer = %self.peer, error = %e, "failed to send response");
                return;
            }
        }
    }

    /// Read the fixed 23-byte header. `Ok(None)` is a clean disconnect
    /// (the peer closed before sending anything); a partial header or an
    /// out-of-bounds payload length is a transport fault.
    async fn read_header(&mut self) -> io::Result<Option<RequestHeader>> {
        let mut buf = [0u8; REQUEST_HEADER_LEN];
        let n = self.stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        let mut filled = n;
        while filled < REQUEST_HEADER_LEN {
            let m = self.stream.read(&mut buf[filled..]).await?;
            if m == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("short header: {filled} bytes"),
                ));
            }
            filled += m;
        }
        RequestHeader::parse(&buf)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    async fn send(&mut self, response: Response) -> io::Result<()> {
        response.write_to(&mut self.stream).await
    }

    fn current_id(&self) -> ClientId {
        self.session.client_id.unwrap_or([0u8; 16])
    }

    async fn handle_register(&mut self, payload: &[u8]) -> io::Result<()> {
        let name = match parse_name(payload) {
            Ok(name) => name,
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "rejected registration name");
                self.session.active = false;
                return self.send(Response::registration_failed()).await;
            }
        };

        match self.store.account_exists(&name) {
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "account lookup failed");
                self.send(Response::generic_error()).await
            }
            Ok(Existence::Exists) => {
                info!(peer = %self.peer, name = %name, "registration rejected, name taken");
                self.session.active = false;
                self.send(Response::registration_failed()).await
            }
            Ok(Existence::Absent) => {
                let id = derive_client_id(&name);
                if let Err(e) = self.store.create_account(&id, &name) {
                    warn!(peer = %self.peer, error = %e, "account creation failed");
                    return self.send(Response::generic_error()).await;
                }
                info!(peer = %self.peer, name = %name, id = %client_id_hex(&id), "registered");
                self.session.client_id = Some(id);
                self.session.name = Some(name);
                self.send(Response::registration_success(id)).await
            }
        }
    }

    async fn handle_login(&mut self, payload: &[u8]) -> io::Result<()> {
        let id = self.current_id();
        let name = match parse_name(payload) {
            Ok(name) => name,
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "rejected login name");
                return self.send(Response::login_failed(id)).await;
            }
        };

        match self.store.account_exists_with_id(&id, &name) {
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "account lookup failed");
                self.send(Response::generic_error()).await
            }
            Ok(Existence::Exists) => {
                info!(peer = %self.peer, name = %name, "logged in");
                self.session.name = Some(name);
                // Every login mints a fresh session key.
                if !self.exchange_keys().await? {
                    return Ok(());
                }
                let wrapped = match self.store.get_wrapped_key(&id) {
                    Ok(Some(wrapped)) => wrapped,
                    Ok(None) => {
                        warn!(peer = %self.peer, "wrapped key missing after exchange");
                        return self.send(Response::generic_error()).await;
                    }
                    Err(e) => {
                        warn!(peer = %self.peer, error = %e, "wrapped key lookup failed");
                        return self.send(Response::generic_error()).await;
                    }
                };
                self.send(Response::login_success(id, &wrapped)).await?;
                if let Err(e) = self.store.touch_last_seen(&id) {
                    warn!(peer = %self.peer, error = %e, "failed to update last-seen");
                }
                debug!(peer = %self.peer, "sent session key");
                Ok(())
            }
            Ok(Existence::Absent) => {
                info!(peer = %self.peer, name = %name, "login rejected, unknown name or id");
                self.send(Response::login_failed(id)).await
            }
        }
    }

    async fn handle_public_key(&mut self, payload: &[u8]) -> io::Result<()> {
        let id = self.current_id();
        // First 255 bytes are a NUL-padded name field; the key blob is
        // everything after it.
        let key_blob = payload.get(NAME_FIELD_LEN..).unwrap_or(&[]);
        if let Err(e) = self.store.set_public_key(&id, key_blob) {
            warn!(peer = %self.peer, error = %e, "failed to store public key");
            return self.send(Response::generic_error()).await;
        }
        debug!(peer = %self.peer, "received public key");
        if !self.exchange_keys().await? {
            return Ok(());
        }
        let wrapped = match self.store.get_wrapped_key(&id) {
            Ok(Some(wrapped)) => wrapped,
            Ok(None) => {
                warn!(peer = %self.peer, "wrapped key missing after exchange");
                return self.send(Response::generic_error()).await;
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "wrapped key lookup failed");
                return self.send(Response::generic_error()).await;
            }
        };
        self.send(Response::key_delivery(id, &wrapped)).await?;
        debug!(peer = %self.peer, "sent session key");
        Ok(())
    }

    /// Mint a fresh session key, wrap it under the client's stored public
    /// key, and persist the wrapped form. Sends a generic error and
    /// returns `false` on any failure; callers must not touch the session
    /// key unless this returned `true`.
    async fn exchange_keys(&mut self) -> io::Result<bool> {
        let id = self.current_id();
        let public_key = match self.store.get_public_key(&id) {
            Ok(Some(der)) => der,
            Ok(None) => {
                warn!(peer = %self.peer, "no public key on record");
                self.send(Response::generic_error()).await?;
                return Ok(false);
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "public key lookup failed");
                self.send(Response::generic_error()).await?;
                return Ok(false);
            }
        };

        let key = crypto::generate_session_key();
        let wrapped = match crypto::wrap_session_key(&public_key, &key) {
            Ok(wrapped) => wrapped,
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "session key wrap failed");
                self.send(Response::generic_error()).await?;
                return Ok(false);
            }
        };
        if let Err(e) = self.store.set_wrapped_key(&id, &wrapped) {
            warn!(peer = %self.peer, error = %e, "failed to store wrapped key");
            self.send(Response::generic_error()).await?;
            return Ok(false);
        }
        self.session.session_key = Some(key);
        debug!(peer = %self.peer, id = %client_id_hex(&id), "generated session key");
        Ok(true)
    }

    async fn handle_save_file(&mut self, payload: &[u8]) -> io::Result<()> {
        match self.save_chunk(payload).await {
            Ok(Some(response)) => self.send(response).await,
            Ok(None) => Ok(()),
            Err(e) => {
                // The one application fault that is fatal to the session.
                warn!(peer = %self.peer, error = %e, "failed to save file chunk");
                self.session.active = false;
                self.send(Response::generic_error()).await
            }
        }
    }

    /// Process one save-file packet. Returns the CRC report once the last
    /// packet of the transfer has been appended.
    async fn save_chunk(&mut self, payload: &[u8]) -> Result<Option<Response>, SaveError> {
        let frame = FileTransferFrame::parse(payload)?;
        let account = self.session.name.clone().ok_or(SaveError::NoAccount)?;

        let path = if self.session.chunk_count == 0 {
            info!(
                peer = %self.peer,
                file = %frame.file_name,
                packets = frame.total_packets,
                "receiving file"
            );
            self.ingest.begin(&account, &frame.file_name)?
        } else {
            self.ingest.file_path(&account, &frame.file_name)
        };

        let key = self.session.session_key.as_ref().ok_or(SaveError::NoSessionKey)?;
        let mut plaintext = crypto::decrypt_chunk(key, &frame.ciphertext)?;
        if frame.is_final() {
            plaintext = crypto::strip_zero_padding(plaintext);
        }
        self.ingest.append(&path, &plaintext)?;
        self.session.chunk_count += 1;
        debug!(
            peer = %self.peer,
            file = %frame.file_name,
            packet = frame.packet_number,
            total = frame.total_packets,
            "received packet"
        );

        if self.session.chunk_count == frame.total_packets {
            info!(peer = %self.peer, file = %frame.file_name, "received all packets");
            self.session.chunk_count = 0;
            let digest = self.ingest.digest(&path)?;
            return Ok(Some(Response::crc_report(
                self.current_id(),
                frame.content_size,
                &frame.file_name,
                digest,
            )));
        }
        Ok(None)
    }

    fn handle_crc_mismatch(&self, payload: &[u8]) {
        let file = parse_name(payload).unwrap_or_else(|_| "<invalid>".to_string());
        // No state change; the client re-sends the disputed chunks.
        info!(peer = %self.peer, file = %file, "client reported CRC mismatch, expecting resend");
    }

    async fn handle_transfer_success(&mut self, payload: &[u8]) -> io::Result<()> {
        let id = self.current_id();
        let (account, file_name) = match self.outcome_target(payload) {
            Some(target) => target,
            None => return self.send(Response::generic_error()).await,
        };
        let path = self.ingest.file_path(&account, &file_name);
        if let Err(e) = self
            .store
            .record_file(&id, &file_name, &path.to_string_lossy(), true)
        {
            warn!(peer = %self.peer, error = %e, "failed to record file");
            return self.send(Response::generic_error()).await;
        }
        info!(peer = %self.peer, file = %file_name, "transfer confirmed, closing session");
        self.session.active = false;
        self.send(Response::final_confirmation(id)).await
    }

    async fn handle_transfer_failed(&mut self, payload: &[u8]) -> io::Result<()> {
        let id = self.current_id();
        let (account, file_name) = match self.outcome_target(payload) {
            Some(target) => target,
            None => return self.send(Response::generic_error()).await,
        };
        info!(
            peer = %self.peer,
            file = %file_name,
            "client exhausted its retry budget, dropping partial file"
        );
        if let Err(e) = self.ingest.discard(&account, &file_name) {
            warn!(peer = %self.peer, error = %e, "failed to remove partial file");
        }
        let path = self.ingest.file_path(&account, &file_name);
        if let Err(e) = self
            .store
            .record_file(&id, &file_name, &path.to_string_lossy(), false)
        {
            warn!(peer = %self.peer, error = %e, "failed to record file");
            return self.send(Response::generic_error()).await;
        }
        self.session.active = false;
        self.send(Response::final_confirmation(id)).await
    }

    /// Resolve the (account, file name) pair an outcome request refers to.
    fn outcome_target(&self, payload: &[u8]) -> Option<(String, String)> {
        let account = match &self.session.name {
            Some(name) => name.clone(),
            None => {
                warn!(peer = %self.peer, "transfer outcome without an authenticated session");
                return None;
            }
        };
        match parse_name(payload) {
            Ok(file_name) => Some((account, file_name)),
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "rejected outcome file name");
                None
            }
        }
    }
}

/// Failure inside the save-file path. All variants terminate the session.
#[derive(Debug, thiserror::Error)]
enum SaveError {
    #[error(transparent)]
    Frame(#[from] crate::protocol::FrameError),
    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),
    #[error(transparent)]
    Ingest(#[from] crate::ingest::IngestError),
    #[error("no authenticated account for this session")]
    NoAccount,
    #[error("no session key negotiated")]
    NoSessionKey,
}

// ============================================================================
// TESTS
// ============================================================================
