//! End-to-end tests of the command API against a fake device on localhost.

mod common;

use common::*;
use serde_json::{Number, Value, json};
use std::time::{Duration, Instant};
use tuyalan::{ClientConfig, TuyaClient, TuyaError};

fn quick_config() -> ClientConfig {
    ClientConfig::default()
        .with_response_timeout(Duration::from_millis(400))
        .with_ack_timeout(Duration::from_millis(200))
}

#[tokio::test]
async fn power_sends_control_frame() {
    init_logger();
    let (port, mut requests) = spawn_device(vec![Reply::Bytes(b"ack".to_vec())]).await;
    let client = TuyaClient::with_config(registry_for(port), quick_config());

    client.send_power(DEVICE_KEY, true).await.unwrap();

    let (seqno, cmd, body) = decode_request(&requests.recv().await.unwrap());
    assert_eq!(seqno, 1);
    assert_eq!(cmd, 0x07);
    assert_eq!(body["devId"], DEV_ID);
    assert_eq!(body["uid"], "");
    assert!(body["t"].is_u64());
    assert_eq!(body["dps"], json!({"20": true}));
}

#[tokio::test]
async fn brightness_is_clamped_on_the_wire() {
    init_logger();
    let (port, mut requests) = spawn_device(vec![Reply::Close, Reply::Close, Reply::Close]).await;
    let client = TuyaClient::with_config(registry_for(port), quick_config());

    client.send_brightness(DEV_ID, 5000.0).await.unwrap();
    client.send_brightness(DEV_ID, -10.0).await.unwrap();
    client.send_brightness(DEVICE_KEY, 333.6).await.unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let (seqno, _, body) = decode_request(&requests.recv().await.unwrap());
        seen.push((seqno, body["dps"]["22"].clone()));
    }
    assert_eq!(
        seen,
        vec![(1, json!(1000)), (2, json!(0)), (3, json!(334))]
    );
}

#[tokio::test]
async fn query_status_decodes_reply() {
    init_logger();
    let reply = status_reply(&json!({"devId": DEV_ID, "dps": {"20": true, "22": 512}}));
    let (port, mut requests) = spawn_device(vec![Reply::Bytes(reply)]).await;
    let client = TuyaClient::with_config(registry_for(port), quick_config());

    let status = client.query_status(DEVICE_KEY).await.unwrap();
    assert!(status.on);
    assert_eq!(status.brightness, Some(Number::from(512)));
    assert_eq!(Value::Object(status.dps), json!({"20": true, "22": 512}));

    let (_, cmd, body) = decode_request(&requests.recv().await.unwrap());
    assert_eq!(cmd, 0x0a);
    assert!(body.get("dps").is_none());
}

#[tokio::test]
async fn query_status_reassembles_chunks() {
    init_logger();
    let reply = status_reply(&json!({"dps": {"20": false, "22": 10}}));
    let chunks = reply.chunks(7).map(<[u8]>::to_vec).collect();
    let (port, _requests) =
        spawn_device(vec![Reply::Chunks(chunks, Duration::from_millis(5))]).await;
    let client = TuyaClient::with_config(registry_for(port), quick_config());

    let status = client.query_status(DEVICE_KEY).await.unwrap();
    assert!(!status.on);
    assert_eq!(status.brightness, Some(Number::from(10)));
}

#[tokio::test]
async fn silent_device_hits_the_deadline() {
    init_logger();
    let (port, _requests) = spawn_device(vec![Reply::Silent(Duration::from_secs(3))]).await;
    let client = TuyaClient::with_config(registry_for(port), quick_config());

    let started = Instant::now();
    let err = client.query_status(DEVICE_KEY).await.unwrap_err();
    assert!(matches!(err, TuyaError::Protocol(_)), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn device_stalling_mid_frame_is_a_protocol_error() {
    init_logger();
    let reply = status_reply(&json!({"dps": {"20": true, "22": 512}}));
    let partial = vec![reply[..40].to_vec()];
    let (port, _requests) =
        spawn_device(vec![Reply::Chunks(partial, Duration::from_secs(3))]).await;
    let client = TuyaClient::with_config(registry_for(port), quick_config());

    let started = Instant::now();
    let err = client.query_status(DEVICE_KEY).await.unwrap_err();
    assert!(matches!(err, TuyaError::Protocol(_)), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn closed_connection_is_a_protocol_error() {
    init_logger();
    let (port, _requests) = spawn_device(vec![Reply::Close]).await;
    let client = TuyaClient::with_config(registry_for(port), quick_config());

    assert!(matches!(
        client.query_status(DEVICE_KEY).await,
        Err(TuyaError::Protocol(_))
    ));
}

#[tokio::test]
async fn oversized_reply_trips_the_buffer_guard() {
    init_logger();
    let (port, _requests) = spawn_device(vec![Reply::Bytes(vec![0x11; 300])]).await;
    let client = TuyaClient::with_config(
        registry_for(port),
        quick_config().with_max_frame_size(128),
    );

    let err = client.query_status(DEVICE_KEY).await.unwrap_err();
    assert!(matches!(err, TuyaError::Protocol(ref m) if m.contains("exceeds")), "got {err:?}");
}

#[tokio::test]
async fn refused_connection_is_a_connection_error() {
    init_logger();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = TuyaClient::with_config(registry_for(port), quick_config());
    assert!(matches!(
        client.send_power(DEVICE_KEY, false).await,
        Err(TuyaError::Connection(_))
    ));
    assert!(matches!(
        client.query_status(DEVICE_KEY).await,
        Err(TuyaError::Connection(_))
    ));
}

#[tokio::test]
async fn test_power_toggles_on_then_off() {
    init_logger();
    let (port, mut requests) = spawn_device(vec![Reply::Close, Reply::Close]).await;
    let client = TuyaClient::with_config(registry_for(port), quick_config());

    client.test_power(DEVICE_KEY).await.unwrap();

    let (s1, _, on) = decode_request(&requests.recv().await.unwrap());
    let (s2, _, off) = decode_request(&requests.recv().await.unwrap());
    assert_eq!((s1, s2), (1, 2));
    assert_eq!(on["dps"], json!({"20": true}));
    assert_eq!(off["dps"], json!({"20": false}));
}

#[tokio::test]
async fn set_value_sends_arbitrary_data_point() {
    init_logger();
    let (port, mut requests) = spawn_device(vec![Reply::Close]).await;
    let client = TuyaClient::with_config(registry_for(port), quick_config());

    client.set_value(DEVICE_KEY, 21, json!("colour")).await.unwrap();

    let (_, _, body) = decode_request(&requests.recv().await.unwrap());
    assert_eq!(body["dps"], json!({"21": "colour"}));
}
