//! Simple test client for the devctl daemon.
//!
//! Run with: cargo run --example test_client [ADDRESS]
//!
//! Expects a daemon configured like `config/daemon.toml`.

use std::io::{Read, Write};
use std::net::TcpStream;

use serde_json::{json, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:18944".to_string());
    println!("=== devctl Daemon Test Client ({}) ===\n", address);

    let mut stream = TcpStream::connect(&address)?;

    let requests = [
        ("Server", json!({ "Name": "Echo", "Id": "1", "Text": "ping" })),
        ("Server", json!({ "Name": "RequestDeviceIds", "Id": "2" })),
        ("Server", json!({ "Name": "RequestChannelIds", "Id": "3" })),
        ("Tracker", json!({ "Name": "Acquire", "Id": "42" })),
        ("Tracker", json!({ "Name": "Acquire", "Id": "43", "FrameCount": "10" })),
        ("Server", json!({ "Name": "GetTransform", "Id": "4", "TransformName": "TrackerToProbe" })),
        ("Capture", json!({ "Name": "StartRecording", "Id": "5", "CaptureDeviceId": "Capture" })),
        ("Capture", json!({ "Name": "StopRecording", "Id": "6", "CaptureDeviceId": "Capture" })),
        ("Tracker", json!({ "Name": "SelfDestruct", "Id": "7" })),
    ];

    for (device, attributes) in requests {
        println!("Request to {}: {}", device, attributes);
        let reply = send_request(&mut stream, device, attributes)?;
        println!("Reply: {}\n", serde_json::to_string_pretty(&reply)?);
    }

    println!("=== All requests sent ===");
    Ok(())
}

fn send_request(
    stream: &mut TcpStream,
    device: &str,
    attributes: Value,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request = json!({
        "device_name": device,
        "command": { "name": "Command", "attributes": attributes },
    });
    let bytes = serde_json::to_vec(&request)?;

    stream.write_all(&(bytes.len() as u32).to_be_bytes())?;
    stream.write_all(&bytes)?;
    stream.flush()?;

    let mut length = [0u8; 4];
    stream.read_exact(&mut length)?;
    let mut payload = vec![0u8; u32::from_be_bytes(length) as usize];
    stream.read_exact(&mut payload)?;

    Ok(serde_json::from_slice(&payload)?)
}
