//! Serial Console Access Layer
//!
//! Everything that touches an OS serial port: discovery of candidate
//! console ports, the [`Session`] actor that owns an opened port, and
//! the baud prober that finds a responsive rate and hands the capture
//! to the fingerprinting engine.
//!
//! The engine never depends on this crate; sessions plug into it by
//! implementing its transport trait.
//!
//! # Example
//!
//! ```rust,no_run
//! use scout_serial::discover_ports;
//!
//! for port in discover_ports().unwrap() {
//!     println!("{} ({})", port.path, port.friendly_name);
//! }
//! ```

pub mod discover;
pub mod error;
pub mod prober;
pub mod session;

pub use discover::{discover_ports, HostPlatform, SerialPortEntry};
pub use error::SerialError;
pub use prober::{probe_port, quick_probe, ProbeConfig, ProbeReport};
pub use session::{
    default_log_dir, translate_line_endings, ConsoleTransport, CrlfMode, Parity, Session,
    SessionConfig,
};
