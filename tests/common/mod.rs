//! Shared helpers: an in-process fake Tuya device and frame decoding.

// Not every test file uses every helper
#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tuyalan::codec::version_header;
use tuyalan::crypto::{self, PaddingMode};
use tuyalan::protocol::{self, CommandType, TuyaMessage, Version};
use tuyalan::{MemoryStore, Registry};

pub const LOCAL_KEY: &str = "0123456789abcdef";
pub const DEV_ID: &str = "bf00112233445566";
pub const DEVICE_KEY: &str = "lamp";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// What the fake device does after reading a request.
pub enum Reply {
    /// Write these bytes, then close.
    Bytes(Vec<u8>),
    /// Write each chunk with a pause in between, then close.
    Chunks(Vec<Vec<u8>>, Duration),
    /// Close without answering.
    Close,
    /// Keep the connection open without answering.
    Silent(Duration),
}

/// Accepts one connection per reply, forwarding each request frame.
pub async fn spawn_device(replies: Vec<Reply>) -> (u16, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for reply in replies {
            let (mut socket, _) = match listener.accept().await {
                Ok(s) => s,
                Err(_) => return,
            };
            let request = read_request(&mut socket).await;
            let _ = tx.send(request);

            match reply {
                Reply::Bytes(bytes) => {
                    let _ = socket.write_all(&bytes).await;
                }
                Reply::Chunks(chunks, pause) => {
                    for chunk in chunks {
                        let _ = socket.write_all(&chunk).await;
                        let _ = socket.flush().await;
                        tokio::time::sleep(pause).await;
                    }
                }
                Reply::Close => {}
                Reply::Silent(hold) => tokio::time::sleep(hold).await,
            }
        }
    });

    (port, rx)
}

async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if protocol::ends_with_suffix(&buf) {
                    break;
                }
            }
        }
    }
    buf
}

/// Registry holding a single device pointing at the fake device's port.
pub fn registry_for(port: u16) -> Arc<Registry> {
    let records = json!([{
        "key": DEVICE_KEY,
        "name": "Desk lamp",
        "ip": "127.0.0.1",
        "port": port,
        "devId": DEV_ID,
        "localKey": LOCAL_KEY,
        "ver": "3.3",
    }]);
    Registry::open(Arc::new(MemoryStore::new(records.to_string()))).unwrap()
}

/// Decodes a frame the client sent: (sequence, command, JSON body).
pub fn decode_request(frame: &[u8]) -> (u32, u32, Value) {
    let header = protocol::parse_header(frame).unwrap();
    assert_eq!(header.total_length(), frame.len());
    assert_eq!(protocol::verify_crc(frame), Some(true));

    let mut payload = &frame[protocol::HEADER_LEN..frame.len() - protocol::FOOTER_LEN];
    if header.cmd == CommandType::Control as u32 {
        assert_eq!(&payload[..3], b"3.3");
        payload = &payload[protocol::VERSION_HEADER_LEN..];
    }
    let plain = crypto::decrypt(payload, LOCAL_KEY.as_bytes(), PaddingMode::Strict).unwrap();
    (header.seqno, header.cmd, serde_json::from_slice(&plain).unwrap())
}

/// A status reply the way devices send it: return code, version header, ciphertext.
pub fn status_reply(body: &Value) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 0];
    payload.extend_from_slice(&version_header(Version::V3_3));
    payload.extend(crypto::encrypt(&serde_json::to_vec(body).unwrap(), LOCAL_KEY.as_bytes()).unwrap());
    protocol::pack_message(&TuyaMessage {
        seqno: 0,
        cmd: CommandType::DpQuery as u32,
        payload,
    })
    .unwrap()
}
