//! End-to-end upload flow against a live connection loop
//!
//! Drives a scripted client over an in-memory duplex stream:
//! 1. register
//! 2. send RSA public key, receive the wrapped session key
//! 3. stream an encrypted file in fixed-size chunks
//! 4. check the server's CRC report against an independent digest
//! 5. confirm (or abandon) the transfer

use aes::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
use dropvault_core::checksum;
use dropvault_core::connection::Connection;
use dropvault_core::derive_client_id;
use dropvault_core::ingest::FileIngest;
use dropvault_core::protocol::{
    RequestHeader, CHUNK_LEN, NAME_FIELD_LEN, PROTOCOL_VERSION, REQUEST_HEADER_LEN,
};
use dropvault_core::store::{AccountStore, MemoryAccountStore};
use rsa::pkcs8::EncodePublicKey;
use rsa::{Oaep, RsaPrivateKey};
use sha1::Sha1;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

const REGISTRATION: u16 = 1025;
const RECEIVE_PUBLIC_KEY: u16 = 1026;
const SAVE_FILE: u16 = 1028;
const TRANSFER_SUCCESS: u16 = 1029;
const TRANSFER_FAILED: u16 = 1031;

const REGISTRATION_SUCCESS: u16 = 1600;
const KEY_DELIVERY: u16 = 1602;
const CRC_REPORT: u16 = 1603;
const FINAL_CONFIRMATION: u16 = 1604;

fn request(client_id: [u8; 16], code: u16, payload: &[u8]) -> Vec<u8> {
    let header = RequestHeader {
        client_id,
        version: PROTOCOL_VERSION,
        code,
        payload_length: payload.len() as u32,
    };
    let mut buf = header.to_bytes().to_vec();
    assert_eq!(buf.len(), REQUEST_HEADER_LEN);
    buf.extend_from_slice(payload);
    buf
}

async fn read_response(stream: &mut DuplexStream) -> (u16, Vec<u8>) {
    let mut header = [0u8; 7];
    stream.read_exact(&mut header).await.expect("response header");
    assert_eq!(header[0], PROTOCOL_VERSION);
    let code = u16::from_le_bytes([header[1], header[2]]);
    let len = u32::from_le_bytes([header[3], header[4], header[5], header[6]]) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.expect("response payload");
    (code, payload)
}

fn spawn_server(
    root: &Path,
    store: Arc<dyn AccountStore>,
) -> (DuplexStream, tokio::task::JoinHandle<()>) {
    let (client, server) = tokio::io::duplex(256 * 1024);
    let connection = Connection::new(server, "test-peer".to_string(), store, FileIngest::new(root));
    (client, tokio::spawn(connection.run()))
}

/// Encrypt one zero-padded 1024-byte chunk the way the client does.
fn encrypt_chunk(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    assert!(plaintext.len() <= CHUNK_LEN);
    let mut buf = vec![0u8; CHUNK_LEN];
    buf[..plaintext.len()].copy_from_slice(plaintext);
    Aes256CbcEnc::new(key.into(), (&[0u8; 16]).into())
        .encrypt_padded_mut::<NoPadding>(&mut buf, CHUNK_LEN)
        .expect("encrypt");
    buf
}

fn save_file_payload(
    content_size: u32,
    packet_number: u16,
    total_packets: u16,
    file_name: &str,
    ciphertext: &[u8],
) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&content_size.to_le_bytes());
    payload.extend_from_slice(&(ciphertext.len() as u32).to_le_bytes());
    payload.extend_from_slice(&packet_number.to_le_bytes());
    payload.extend_from_slice(&total_packets.to_le_bytes());
    let mut name_field = [0u8; NAME_FIELD_LEN];
    name_field[..file_name.len()].copy_from_slice(file_name.as_bytes());
    payload.extend_from_slice(&name_field);
    payload.extend_from_slice(ciphertext);
    payload
}

/// Register, send the public key, and unwrap the delivered session key.
async fn establish_session(
    stream: &mut DuplexStream,
    name: &str,
    private_key: &RsaPrivateKey,
) -> ([u8; 16], [u8; 32]) {
    let mut name_payload = name.as_bytes().to_vec();
    name_payload.push(0);
    stream
        .write_all(&request([0u8; 16], REGISTRATION, &name_payload))
        .await
        .expect("register");
    let (code, payload) = read_response(stream).await;
    assert_eq!(code, REGISTRATION_SUCCESS);
    let id: [u8; 16] = payload.as_slice().try_into().expect("16-byte id");
    assert_eq!(id, derive_client_id(name));

    let der = private_key
        .to_public_key()
        .to_public_key_der()
        .expect("encode public key")
        .as_bytes()
        .to_vec();
    let mut key_payload = vec![0u8; NAME_FIELD_LEN];
    key_payload[..name.len()].copy_from_slice(name.as_bytes());
    key_payload.extend_from_slice(&der);
    stream
        .write_all(&request(id, RECEIVE_PUBLIC_KEY, &key_payload))
        .await
        .expect("send public key");

    let (code, payload) = read_response(stream).await;
    assert_eq!(code, KEY_DELIVERY);
    assert_eq!(&payload[..16], &id);
    let unwrapped = private_key
        .decrypt(Oaep::new::<Sha1>(), &payload[16..])
        .expect("unwrap session key");
    let session_key: [u8; 32] = unwrapped.as_slice().try_into().expect("32-byte key");
    (id, session_key)
}

#[tokio::test]
async fn test_full_upload_scenario() {
    let root = tempfile::tempdir().expect("tempdir");
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    let (mut client, handle) = spawn_server(root.path(), store.clone());

    let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).expect("keygen");
    let (id, session_key) = establish_session(&mut client, "alice", &private_key).await;

    // A 2500-byte file split into 3 packets of 1024 (last one zero-padded)
    let content: Vec<u8> = (1..=2500u32).map(|i| (i % 251) as u8 + 1).collect();
    assert!(content.iter().all(|&b| b != 0), "padding strip needs a non-zero tail");
    let total_packets = 3u16;
    for (index, chunk) in content.chunks(CHUNK_LEN).enumerate() {
        let ciphertext = encrypt_chunk(&session_key, chunk);
        let payload = save_file_payload(
            content.len() as u32,
            index as u16 + 1,
            total_packets,
            "f.txt",
            &ciphertext,
        );
        client
            .write_all(&request(id, SAVE_FILE, &payload))
            .await
            .expect("send packet");
    }

    // After the last packet: CRC report with an independently checkable digest
    let (code, payload) = read_response(&mut client).await;
    assert_eq!(code, CRC_REPORT);
    assert_eq!(&payload[..16], &id);
    assert_eq!(
        u32::from_le_bytes(payload[16..20].try_into().unwrap()),
        content.len() as u32
    );
    assert_eq!(&payload[20..25], b"f.txt");
    let digest = u32::from_le_bytes(payload[275..279].try_into().unwrap());
    assert_eq!(digest, checksum::bytes_digest(&content));

    // The reassembled file is byte-identical to the plaintext
    let on_disk = std::fs::read(root.path().join("alice").join("f.txt")).expect("read upload");
    assert_eq!(on_disk, content);

    // Confirm: final confirmation, then the session closes
    client
        .write_all(&request(id, TRANSFER_SUCCESS, b"f.txt\0"))
        .await
        .expect("confirm");
    let (code, payload) = read_response(&mut client).await;
    assert_eq!(code, FINAL_CONFIRMATION);
    assert_eq!(payload, id.to_vec());
    handle.await.expect("connection task ended");
}

#[tokio::test]
async fn test_failed_transfer_cleans_up() {
    let root = tempfile::tempdir().expect("tempdir");
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());
    let (mut client, handle) = spawn_server(root.path(), store.clone());

    let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).expect("keygen");
    let (id, session_key) = establish_session(&mut client, "bob", &private_key).await;

    // Send the first of two packets, then give up
    let chunk: Vec<u8> = vec![7u8; CHUNK_LEN];
    let ciphertext = encrypt_chunk(&session_key, &chunk);
    let payload = save_file_payload(2048, 1, 2, "big.bin", &ciphertext);
    client
        .write_all(&request(id, SAVE_FILE, &payload))
        .await
        .expect("send packet");

    client
        .write_all(&request(id, TRANSFER_FAILED, b"big.bin\0"))
        .await
        .expect("abandon");
    let (code, payload) = read_response(&mut client).await;
    assert_eq!(code, FINAL_CONFIRMATION);
    assert_eq!(payload, id.to_vec());
    handle.await.expect("connection task ended");

    // Partial file and the now-empty account directory are gone
    assert!(!root.path().join("bob").join("big.bin").exists());
    assert!(!root.path().join("bob").exists());
}

#[tokio::test]
async fn test_relogin_delivers_a_fresh_wrapped_key() {
    const LOGIN: u16 = 1027;
    const LOGIN_SUCCESS: u16 = 1605;

    let root = tempfile::tempdir().expect("tempdir");
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());

    let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 1024).expect("keygen");
    let (id, first_key) = {
        let (mut client, handle) = spawn_server(root.path(), store.clone());
        let pair = establish_session(&mut client, "carol", &private_key).await;
        drop(client);
        handle.await.expect("connection task");
        pair
    };

    // Fresh connection: log back in with the assigned id
    let (mut client, handle) = spawn_server(root.path(), store.clone());
    client
        .write_all(&request(id, LOGIN, b"carol\0"))
        .await
        .expect("login");
    let (code, payload) = read_response(&mut client).await;
    assert_eq!(code, LOGIN_SUCCESS);
    assert_eq!(&payload[..16], &id);
    let second_key = private_key
        .decrypt(Oaep::new::<Sha1>(), &payload[16..])
        .expect("unwrap session key");

    // A login mints a fresh session key; it must differ from the first
    assert_ne!(second_key.as_slice(), first_key.as_ref());
    drop(client);
    handle.await.expect("connection task");
}
