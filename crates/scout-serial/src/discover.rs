//! Serial port discovery
//!
//! Enumerates candidate console ports and filters out paths that are
//! never a network device's console: Bluetooth bridges, wireless
//! modems, kernel debug consoles. Linux additionally allows only the
//! well-known `ttyUSB*` / `ttyACM*` / `ttyS*` families.

use serialport::available_ports;
use tracing::debug;

use crate::error::SerialError;

/// A discovered serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortEntry {
    /// Device path (e.g. `/dev/ttyUSB0`, `/dev/cu.usbserial-FT123456`).
    pub path: String,
    /// Human-readable name derived from the path.
    pub friendly_name: String,
    /// Comma-joined chipset hints detected from the path basename.
    pub hints: String,
}

/// Host platform, threaded explicitly so the path rules are testable on
/// any build host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Linux,
    MacOs,
    Other,
}

impl HostPlatform {
    /// Platform of the running host.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            HostPlatform::Linux
        } else if cfg!(target_os = "macos") {
            HostPlatform::MacOs
        } else {
            HostPlatform::Other
        }
    }
}

/// Substrings that disqualify a path outright, case-insensitive.
const REJECTED_SUBSTRINGS: &[&str] = &[
    "bluetooth", "airpods", "wireless", "wlan", "rfcomm", "hci", "debug", "console",
];

/// Enumerate available serial ports, filtered for console candidates.
///
/// An empty result is not an error; enumeration failure is.
pub fn discover_ports() -> Result<Vec<SerialPortEntry>, SerialError> {
    let platform = HostPlatform::current();
    let raw = available_ports().map_err(|e| SerialError::EnumerationFailed(e.to_string()))?;

    let ports: Vec<SerialPortEntry> = raw
        .into_iter()
        .map(|p| p.port_name)
        .filter(|path| accept_port(path, platform))
        .map(|path| {
            let entry = SerialPortEntry {
                friendly_name: friendly_name(&path, platform),
                hints: chipset_hints(&path),
                path,
            };
            debug!(path = %entry.path, hints = %entry.hints, "discovered port");
            entry
        })
        .collect();

    debug!(count = ports.len(), "port discovery complete");
    Ok(ports)
}

/// Whether a path passes the console-candidate filter.
pub fn accept_port(path: &str, platform: HostPlatform) -> bool {
    let lower = path.to_lowercase();

    if REJECTED_SUBSTRINGS.iter().any(|s| lower.contains(s)) {
        return false;
    }

    match platform {
        // Only the well-known families; everything else on Linux is a
        // virtual or platform console.
        HostPlatform::Linux => {
            lower.starts_with("/dev/ttyusb")
                || lower.starts_with("/dev/ttyacm")
                || lower.starts_with("/dev/ttys")
        }
        // Both tty.* and cu.* are acceptable once the substring filter
        // has run.
        HostPlatform::MacOs | HostPlatform::Other => true,
    }
}

/// Human-readable name for a port path.
pub fn friendly_name(path: &str, platform: HostPlatform) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);

    match platform {
        HostPlatform::MacOs => base
            .strip_prefix("tty.")
            .or_else(|| base.strip_prefix("cu."))
            .unwrap_or(base)
            .to_string(),
        HostPlatform::Linux => {
            if let Some(n) = base.strip_prefix("ttyUSB") {
                format!("USB Serial {n}")
            } else if let Some(n) = base.strip_prefix("ttyACM") {
                format!("USB ACM {n}")
            } else if let Some(n) = base.strip_prefix("ttyS") {
                format!("Serial Port {n}")
            } else {
                base.to_string()
            }
        }
        HostPlatform::Other => base.to_string(),
    }
}

/// Chipset tokens detected by substring in the path basename.
pub fn chipset_hints(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path).to_lowercase();

    let mut hints = Vec::new();
    if base.contains("ftdi") {
        hints.push("FTDI");
    }
    if base.contains("cp210") {
        hints.push("CP210x");
    }
    if base.contains("ch34") {
        hints.push("CH34x");
    }
    if base.contains("pl2303") {
        hints.push("Prolific");
    }
    if base.contains("usbserial") {
        hints.push("USB-Serial");
    }
    if base.contains("usbmodem") {
        hints.push("USB-Modem");
    }

    hints.join(", ")
}
