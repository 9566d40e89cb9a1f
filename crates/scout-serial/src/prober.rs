//! Baud probing
//!
//! Opens a port at each configured baud in turn, sends a fixed wake-up
//! sequence, and collects whatever comes back. The first baud that
//! produces enough printable content wins and the capture is handed to
//! the fingerprinting engine. This is the one place in the core where
//! I/O errors are recovered by retrying — across bauds, by design.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use scout_engine::{
    analyze, clean_for_evidence, extract_last_prompt_line, finalize, Candidate, Fingerprint, Stage,
};
use scout_signatures::SignatureRegistry;

use crate::error::SerialError;

/// Parameters for baud probing.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Bauds to try, in order.
    pub bauds: Vec<u32>,
    /// Per-baud read deadline.
    pub timeout: Duration,
    /// Byte budget per baud attempt.
    pub max_bytes: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            bauds: vec![9600, 115_200],
            timeout: Duration::from_millis(800),
            max_bytes: 2048,
        }
    }
}

/// Outer deadline for [`quick_probe`].
const QUICK_PROBE_DEADLINE: Duration = Duration::from_secs(3);

/// Wake-up sequence: newline, ENTER spam to coax banners, a help query,
/// and a Ctrl-C to pull a banner out of a stuck pager.
const WAKE_SEQUENCE: &[&[u8]] = &[b"\r\n", b"\r\r\r\r\r", b"\r\n?\r\n", b"\r\n\x03\r\n"];

/// Pause between wake-up sends.
const WAKE_GAP: Duration = Duration::from_millis(100);

/// Minimum bytes for a baud attempt to count as responsive.
const MIN_RESPONSE_BYTES: usize = 10;
/// Minimum non-whitespace characters in the cleaned response.
const MIN_PRINTABLE_CHARS: usize = 5;

/// Result of probing one port across bauds.
#[derive(Debug)]
pub struct ProbeReport {
    /// Whether any baud passed the response heuristic.
    pub success: bool,
    /// The successful baud, zero when none responded.
    pub baud: u32,
    /// Raw capture from the best attempt.
    pub raw: Vec<u8>,
    /// Display-safe capture.
    pub cleaned: String,
    /// Stage observed at the winning baud.
    pub stage: Stage,
    /// Ranked candidates from the capture.
    pub candidates: Vec<Candidate>,
    /// Finalized identification (Unknown on failure).
    pub fingerprint: Fingerprint,
    /// The failure, when every baud came up empty.
    pub error: Option<SerialError>,
}

/// Probe a port across the configured bauds and fingerprint the device.
pub async fn probe_port(
    registry: &SignatureRegistry,
    port_path: &str,
    config: &ProbeConfig,
) -> ProbeReport {
    info!(port = port_path, bauds = ?config.bauds, timeout = ?config.timeout, "baud probe start");

    let mut best_raw = Vec::new();
    let mut best_cleaned = String::new();

    for &baud in &config.bauds {
        debug!(port = port_path, baud, "probing baud");
        match probe_single_baud(port_path, baud, config).await {
            Ok(capture) if looks_responsive(&capture) => {
                let cleaned = clean_for_evidence(&capture);
                let prompt_line = extract_last_prompt_line(&scout_engine::normalize(&cleaned));
                let (stage, candidates) = analyze(registry, &cleaned, &prompt_line);
                let mut fingerprint =
                    finalize(registry, stage, &candidates, &cleaned, &prompt_line, "");
                fingerprint.baud = baud;

                info!(
                    port = port_path,
                    baud,
                    stage = stage.as_str(),
                    vendor = %fingerprint.vendor,
                    os = %fingerprint.os,
                    "baud probe success"
                );
                return ProbeReport {
                    success: true,
                    baud,
                    raw: capture,
                    cleaned,
                    stage,
                    candidates,
                    fingerprint,
                    error: None,
                };
            }
            Ok(capture) => {
                // Garbage or silence; keep the best capture for display.
                if capture.len() > best_raw.len() {
                    best_cleaned = clean_for_evidence(&capture);
                    best_raw = capture;
                }
            }
            Err(e) => {
                debug!(port = port_path, baud, "baud attempt failed: {e}");
            }
        }
    }

    let error = SerialError::NoBaudResponded {
        bauds: config.bauds.clone(),
    };
    warn!(port = port_path, "baud probe failed: {error}");

    ProbeReport {
        success: false,
        baud: 0,
        raw: best_raw,
        cleaned: best_cleaned,
        stage: Stage::PreLogin,
        candidates: Vec::new(),
        fingerprint: Fingerprint::unknown(Stage::PreLogin, "No response at configured baud rates"),
        error: Some(error),
    }
}

/// Quick probe with default settings and a hard outer deadline.
pub async fn quick_probe(registry: &SignatureRegistry, port_path: &str) -> ProbeReport {
    let config = ProbeConfig::default();
    match tokio::time::timeout(QUICK_PROBE_DEADLINE, probe_port(registry, port_path, &config)).await
    {
        Ok(report) => report,
        Err(_) => {
            warn!(port = port_path, "quick probe hit outer deadline");
            ProbeReport {
                success: false,
                baud: 0,
                raw: Vec::new(),
                cleaned: String::new(),
                stage: Stage::PreLogin,
                candidates: Vec::new(),
                fingerprint: Fingerprint::unknown(
                    Stage::PreLogin,
                    "No response at configured baud rates",
                ),
                error: Some(SerialError::NoBaudResponded {
                    bauds: config.bauds,
                }),
            }
        }
    }
}

/// A baud attempt is successful when enough bytes arrived and the
/// cleaned text carries real content.
fn looks_responsive(capture: &[u8]) -> bool {
    if capture.len() < MIN_RESPONSE_BYTES {
        return false;
    }
    let printable = clean_for_evidence(capture)
        .chars()
        .filter(|c| !c.is_whitespace())
        .count();
    printable > MIN_PRINTABLE_CHARS
}

/// One attempt: open at 8/N/1, send the wake sequence, read up to the
/// byte budget until the deadline.
async fn probe_single_baud(
    port_path: &str,
    baud: u32,
    config: &ProbeConfig,
) -> Result<Vec<u8>, SerialError> {
    let mut stream = tokio_serial::new(port_path, baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .open_native_async()
        .map_err(|e| SerialError::OpenFailed {
            port: port_path.to_string(),
            source: e,
        })?;

    for (i, chunk) in WAKE_SEQUENCE.iter().enumerate() {
        if let Err(e) = stream.write_all(chunk).await {
            return Err(SerialError::WriteFailed(e.to_string()));
        }
        debug!(port = port_path, seq = i, "sent wake sequence");
        if i < WAKE_SEQUENCE.len() - 1 {
            tokio::time::sleep(WAKE_GAP).await;
        }
    }
    let _ = stream.flush().await;

    let mut capture = vec![0u8; config.max_bytes];
    let mut total = 0usize;
    let deadline = tokio::time::Instant::now() + config.timeout;

    while total < config.max_bytes {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, stream.read(&mut capture[total..])).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                total += n;
                // A burst usually trails more; give it a moment.
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(Err(e)) => {
                debug!(port = port_path, baud, read = total, "read error: {e}");
                break;
            }
            Err(_) => break,
        }
    }

    capture.truncate(total);
    debug!(port = port_path, baud, read = total, "baud attempt complete");
    Ok(capture)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_field_practice() {
        let config = ProbeConfig::default();
        assert_eq!(config.bauds, vec![9600, 115_200]);
        assert_eq!(config.timeout, Duration::from_millis(800));
        assert_eq!(config.max_bytes, 2048);
    }

    #[test]
    fn response_heuristic_requires_real_content() {
        assert!(!looks_responsive(b""));
        assert!(!looks_responsive(b"ab"));
        // Ten bytes of whitespace is still silence.
        assert!(!looks_responsive(b" \r\n \r\n \r\n  "));
        assert!(looks_responsive(b"Cisco IOS Software"));
        // Control garbage cleans down to too little.
        assert!(!looks_responsive(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x0b, 0x0e]));
    }

    #[tokio::test]
    async fn missing_port_exhausts_all_bauds() {
        let registry = SignatureRegistry::builtin();
        let config = ProbeConfig {
            bauds: vec![9600, 115_200],
            timeout: Duration::from_millis(50),
            max_bytes: 256,
        };

        let report = probe_port(&registry, "/dev/lanscout-nonexistent-tty", &config).await;

        assert!(!report.success);
        assert_eq!(report.fingerprint.vendor, "Unknown");
        assert_eq!(report.fingerprint.os, "Unknown");
        assert_eq!(report.fingerprint.confidence, 0.0);
        assert!(report
            .fingerprint
            .evidence
            .iter()
            .any(|e| e == "No response at configured baud rates"));
        assert!(matches!(
            report.error,
            Some(SerialError::NoBaudResponded { .. })
        ));
    }

    #[tokio::test]
    async fn quick_probe_fails_cleanly_on_missing_port() {
        let registry = SignatureRegistry::builtin();
        let report = quick_probe(&registry, "/dev/lanscout-nonexistent-tty").await;
        assert!(!report.success);
        assert!(report.error.is_some());
    }
}
