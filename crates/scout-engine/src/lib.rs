//! Serial-Console Fingerprinting Engine
//!
//! This crate decides which network device is on the other end of an
//! RS-232 cable by passively watching the byte stream and, when a
//! candidate is confident enough, issuing one guarded read-only probe.
//!
//! # Pipeline
//!
//! bytes → [`normalize`] → [`detect_stage`] + [`analyze`] →
//! (optional [`maybe_probe`] → re-score) → [`finalize`] → snapshot/UI.
//!
//! The engine owns no I/O: probes run over the [`ProbeTransport`] trait,
//! which serial sessions implement. The signature table is an explicit
//! immutable [`SignatureRegistry`](scout_signatures::SignatureRegistry)
//! handed in by the caller.
//!
//! # Example
//!
//! ```rust
//! use scout_engine::{analyze, finalize, Stage};
//! use scout_signatures::SignatureRegistry;
//!
//! let registry = SignatureRegistry::builtin();
//! let rx = "User Access Verification\nCisco IOS Software\nR1#";
//!
//! let (stage, candidates) = analyze(&registry, rx, "R1#");
//! let result = finalize(&registry, stage, &candidates, rx, "R1#", "");
//!
//! assert_eq!(stage, Stage::Prompt);
//! assert_eq!(result.vendor, "Cisco");
//! ```

pub mod finalize;
pub mod normalize;
pub mod probe;
pub mod score;
pub mod snapshot;
pub mod stage;

pub use finalize::{clamp01, finalize, Fingerprint};
pub use normalize::{clean_for_evidence, extract_last_prompt_line, normalize, normalize_bytes};
pub use probe::{
    maybe_probe, ProbeError, ProbePolicy, ProbeRefusal, ProbeRun, ProbeTransport, TransportError,
    PROBE_CONFIDENCE_THRESHOLD,
};
pub use score::{analyze, candidates, Candidate};
pub use snapshot::{redact_text, ConsoleSnapshot, FingerprintDetail, REDACTED_IP, REDACTED_MAC};
pub use stage::{detect_stage, Stage};
