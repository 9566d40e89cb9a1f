//! Vendor Signature Catalogue
//!
//! This crate holds the knowledge base the fingerprinting engine scores
//! against: per-vendor [`Signature`]s (banner, login and prompt pattern
//! lists plus version-scrape regexes), the guarded read-only
//! [`SafeProbe`] catalogue, and the prompt/login/boot pattern tables
//! used for stage detection.
//!
//! Everything here is pure data plus regex matching — no I/O. All
//! patterns are compiled once when [`SignatureRegistry::builtin`] runs;
//! the registry is immutable afterwards and safe to share by reference.
//!
//! # Example
//!
//! ```rust
//! use scout_signatures::SignatureRegistry;
//!
//! let registry = SignatureRegistry::builtin();
//! assert!(registry.len() > 0);
//! assert!(registry.lookup("Cisco", "IOS").is_some());
//! ```

pub mod catalog;
pub mod pattern;
pub mod prompts;
pub mod safe_probe;

pub use catalog::{Signature, SignatureRegistry};
pub use pattern::LabeledPattern;
pub use prompts::{is_boot_banner, is_login_line, match_prompt, PromptPattern};
pub use safe_probe::SafeProbe;
