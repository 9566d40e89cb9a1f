//! Console snapshot fragment and redaction
//!
//! The snapshot is the only shape other subsystems see: a summary of the
//! session plus the structured fingerprint. Redaction is a pure value
//! transformation — it maps a snapshot to a snapshot, touches nothing on
//! disk, and applying it twice equals applying it once.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::finalize::Fingerprint;
use crate::stage::Stage;

/// Placeholder for redacted IPv4 literals.
pub const REDACTED_IP: &str = "[REDACTED-IP]";
/// Placeholder for redacted MAC literals.
pub const REDACTED_MAC: &str = "[REDACTED-MAC]";

static IP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").unwrap_or_else(|err| panic!("IP pattern: {err}"))
});

static MAC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5}\b")
        .unwrap_or_else(|err| panic!("MAC pattern: {err}"))
});

/// Structured identification data embedded in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintDetail {
    pub vendor: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prompt: String,
    pub baud: u32,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl FingerprintDetail {
    /// Stamp a fingerprint with the capture time.
    pub fn new(fp: &Fingerprint, timestamp: DateTime<Utc>) -> Self {
        Self {
            vendor: fp.vendor.clone(),
            os: fp.os.clone(),
            model: fp.model.clone(),
            stage: fp.stage,
            prompt: fp.prompt.clone(),
            baud: fp.baud,
            confidence: fp.confidence,
            evidence: fp.evidence.clone(),
            timestamp,
        }
    }
}

/// Snapshot embedding of one console session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleSnapshot {
    pub port: String,
    pub baud: u32,
    /// One-line `vendor/os (model)` summary.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
    #[serde(rename = "console_fingerprint")]
    pub detail: FingerprintDetail,
    pub bytes_written: u64,
    pub bytes_read: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
    /// First 2 KiB of the cleaned transcript.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transcript_head: String,
    /// Last 4 KiB of the cleaned transcript.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transcript_tail: String,
}

/// Transcript window sizes carried in the snapshot.
pub const TRANSCRIPT_HEAD_BYTES: usize = 2 * 1024;
pub const TRANSCRIPT_TAIL_BYTES: usize = 4 * 1024;

impl ConsoleSnapshot {
    /// Assemble a snapshot from the session summary and fingerprint.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        port: &str,
        fp: &Fingerprint,
        bytes_written: u64,
        bytes_read: u64,
        log_path: Option<String>,
        transcript: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            port: port.to_string(),
            baud: fp.baud,
            fingerprint: fp.summary(),
            detail: FingerprintDetail::new(fp, timestamp),
            bytes_written,
            bytes_read,
            log_path,
            transcript_head: head_utf8(transcript, TRANSCRIPT_HEAD_BYTES).to_string(),
            transcript_tail: tail_utf8(transcript, TRANSCRIPT_TAIL_BYTES).to_string(),
        }
    }

    /// Redacted copy of the snapshot. Every IPv4 and colon-separated MAC
    /// literal in the fingerprint summary, model, prompt and evidence is
    /// replaced by a placeholder. Idempotent.
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        out.fingerprint = redact_text(&out.fingerprint);
        out.detail.model = redact_text(&out.detail.model);
        out.detail.prompt = redact_text(&out.detail.prompt);
        out.detail.evidence = out.detail.evidence.iter().map(|e| redact_text(e)).collect();
        out
    }
}

/// Replace IPv4 and MAC literals with placeholders.
pub fn redact_text(text: &str) -> String {
    let pass = IP_PATTERN.replace_all(text, REDACTED_IP);
    MAC_PATTERN.replace_all(&pass, REDACTED_MAC).into_owned()
}

/// Longest prefix of at most `max` bytes that stays on a char boundary.
fn head_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Longest suffix of at most `max` bytes that stays on a char boundary.
fn tail_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::finalize::Fingerprint;

    fn sample_fingerprint() -> Fingerprint {
        Fingerprint {
            vendor: "Cisco".into(),
            os: "IOS".into(),
            model: "WS-C2960 mgmt 192.168.1.1".into(),
            prompt: "R1#".into(),
            stage: Stage::Prompt,
            baud: 9600,
            confidence: 0.9,
            evidence: vec![
                "prompt: Cisco IOS prompt".into(),
                "uplink aa:bb:cc:dd:ee:ff seen".into(),
            ],
        }
    }

    fn sample_snapshot() -> ConsoleSnapshot {
        ConsoleSnapshot::new(
            "/dev/ttyUSB0",
            &sample_fingerprint(),
            42,
            1024,
            Some("/tmp/console.log".into()),
            "banner text\nR1#",
            Utc::now(),
        )
    }

    #[test]
    fn redaction_masks_ip_and_mac() {
        let redacted = sample_snapshot().redacted();
        assert!(redacted.fingerprint.contains(REDACTED_IP));
        assert!(!redacted.fingerprint.contains("192.168.1.1"));
        assert!(redacted.detail.model.contains(REDACTED_IP));
        assert!(redacted.detail.evidence[1].contains(REDACTED_MAC));
        assert!(!redacted.detail.evidence[1].contains("aa:bb:cc"));
    }

    #[test]
    fn redaction_is_idempotent() {
        let once = sample_snapshot().redacted();
        let twice = once.redacted();
        assert_eq!(once, twice);
    }

    #[test]
    fn snapshot_serializes_with_wire_names() {
        let snap = sample_snapshot();
        let json = serde_json::to_value(&snap).unwrap();

        assert_eq!(json["port"], "/dev/ttyUSB0");
        assert_eq!(json["baud"], 9600);
        assert_eq!(json["console_fingerprint"]["stage"], "prompt");
        assert_eq!(json["console_fingerprint"]["vendor"], "Cisco");
        assert_eq!(json["bytes_read"], 1024);
        assert!(json["console_fingerprint"]["timestamp"].is_string());
    }

    #[test]
    fn transcript_windows_are_bounded() {
        let long = "x".repeat(10 * 1024);
        let fp = sample_fingerprint();
        let snap = ConsoleSnapshot::new("/dev/ttyUSB0", &fp, 0, 0, None, &long, Utc::now());
        assert_eq!(snap.transcript_head.len(), TRANSCRIPT_HEAD_BYTES);
        assert_eq!(snap.transcript_tail.len(), TRANSCRIPT_TAIL_BYTES);
    }

    #[test]
    fn transcript_windows_respect_char_boundaries() {
        let long = "\u{4e16}".repeat(4 * 1024);
        let fp = sample_fingerprint();
        let snap = ConsoleSnapshot::new("/dev/ttyUSB0", &fp, 0, 0, None, &long, Utc::now());
        assert!(snap.transcript_head.len() <= TRANSCRIPT_HEAD_BYTES);
        assert!(!snap.transcript_head.is_empty());
    }

    #[test]
    fn summary_redaction_in_place() {
        assert_eq!(redact_text("mgmt 10.0.0.1 up"), format!("mgmt {REDACTED_IP} up"));
        assert_eq!(
            redact_text("mac 00:1A:2B:3C:4D:5E"),
            format!("mac {REDACTED_MAC}")
        );
        let already = format!("mgmt {REDACTED_IP} up");
        assert_eq!(redact_text(&already), already);
    }
}
