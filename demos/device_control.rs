/**
 * Device Control Example
 *
 * Loads one device from an in-memory store, switches it on, sets brightness,
 * queries its status and switches it off again.
 *
 * Usage: cargo run --example device_control -- <ip> <devId> <localKey> [version]
 */
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tuyalan::{MemoryStore, Registry, TuyaClient};

#[tokio::main]
async fn main() {
    env_logger::init();
    println!("--- tuyalan - Device Control ---");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        eprintln!("usage: device_control <ip> <devId> <localKey> [version]");
        std::process::exit(2);
    }
    let version = args.get(3).map(String::as_str).unwrap_or("3.3");

    // 1. Build the registry from a device list, as a host settings store would hold it
    let records = serde_json::json!([{
        "name": "Demo device",
        "ip": args[0],
        "devId": args[1],
        "localKey": args[2],
        "ver": version,
    }]);
    let registry = match Registry::open(Arc::new(MemoryStore::new(records.to_string()))) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("[ERROR] Failed to load devices: {}", e);
            std::process::exit(1);
        }
    };
    if registry.devices().is_empty() {
        eprintln!("[ERROR] Device record rejected (check the 16 character local key and version)");
        std::process::exit(1);
    }
    let client = TuyaClient::new(registry);
    let id = args[1].as_str();

    // 2. Power on
    println!("[STEP 1] Switching ON...");
    if let Err(e) = client.send_power(id, true).await {
        eprintln!("[ERROR] Power on failed: {}", e);
    }
    sleep(Duration::from_secs(1)).await;

    // 3. Brightness
    println!("[STEP 2] Setting brightness to 50%...");
    if let Err(e) = client.send_brightness(id, 500.0).await {
        eprintln!("[ERROR] Brightness failed: {}", e);
    }
    sleep(Duration::from_secs(1)).await;

    // 4. Query status
    println!("[STEP 3] Querying current status...");
    match client.query_status(id).await {
        Ok(status) => println!(
            "[SUCCESS] on={} brightness={:?} dps={}",
            status.on,
            status.brightness,
            serde_json::Value::Object(status.dps)
        ),
        Err(e) => eprintln!("[ERROR] Status query failed ({}): {}", e.code(), e),
    }

    // 5. Power off
    println!("[STEP 4] Switching OFF...");
    if let Err(e) = client.send_power(id, false).await {
        eprintln!("[ERROR] Power off failed: {}", e);
    }

    println!("[INFO] Example finished.");
}
