// src/port.rs
//
// Serial device discovery by USB VID/PID with a static fallback name.

use serialport::{SerialPortInfo, SerialPortType};
use tracing::{debug, info, warn};

/// Hardware id string in the usual "USB VID:PID=0483:374B SER=..." shape.
pub fn hardware_id(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => format!(
            "USB VID:PID={:04X}:{:04X} SER={}",
            usb.vid,
            usb.pid,
            usb.serial_number.as_deref().unwrap_or("")
        ),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "BLUETOOTH".to_string(),
        SerialPortType::Unknown => "n/a".to_string(),
    }
}

/// First enumerated port whose hardware id carries the given VID/PID.
pub fn find_matching_port(ports: &[SerialPortInfo], vid: u16, pid: u16) -> Option<String> {
    let needle = format!("VID:PID={:04X}:{:04X}", vid, pid);
    ports
        .iter()
        .find(|p| hardware_id(p).contains(&needle))
        .map(|p| p.port_name.clone())
}

/// Resolve the device to open. Never fails: falls back to `fallback`.
pub fn resolve_port(vid: u16, pid: u16, fallback: &str) -> String {
    let ports = match serialport::available_ports() {
        Ok(p) => p,
        Err(e) => {
            warn!("serial port enumeration failed: {}", e);
            Vec::new()
        }
    };

    for p in &ports {
        debug!("found port {} [{}]", p.port_name, hardware_id(p));
    }

    match find_matching_port(&ports, vid, pid) {
        Some(name) => {
            info!("auto-detected {:04X}:{:04X} on {}", vid, pid, name);
            name
        }
        None => {
            info!(
                "no port with VID:PID={:04X}:{:04X}, using fallback {}",
                vid, pid, fallback
            );
            fallback.to_string()
        }
    }
}
