//! Signature scoring
//!
//! Walks the registry and turns pattern hits into ranked [`Candidate`]s.
//! Scores are additive over the three pattern lists — first match in
//! each list only — on top of the signature's base weight, clamped to
//! [0, 1].

use std::sync::Arc;

use tracing::debug;

use scout_signatures::{SafeProbe, SignatureRegistry};

use crate::finalize::clamp01;
use crate::normalize::{extract_last_prompt_line, normalize};
use crate::stage::{detect_stage, Stage};

/// Score added for a pre-login banner hit.
const PRELOGIN_SCORE: f64 = 0.5;
/// Score added for a login-line hit.
const LOGIN_SCORE: f64 = 0.2;
/// Score added for a prompt-line hit.
const PROMPT_SCORE: f64 = 0.35;

/// A scored signature match against the live RX stream.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub vendor: String,
    pub os: String,
    /// Clamped probability in [0, 1].
    pub prob: f64,
    /// Rule names that contributed, deduplicated.
    pub evidence: Vec<String>,
    /// Stage observed when the candidate was scored.
    pub stage: Stage,
    /// The matched last RX line.
    pub prompt: String,
    /// Catalogued probe for this platform, if any.
    pub next_safe_probe: Option<Arc<SafeProbe>>,
}

impl Candidate {
    /// Newline-joined evidence for display and guard checks.
    pub fn evidence_string(&self) -> String {
        self.evidence.join("\n")
    }
}

/// Score every signature against normalized RX text and the prompt line.
///
/// A signature with no pattern hit in any list yields no candidate, so
/// every candidate carries at least one evidence entry.
pub fn candidates(registry: &SignatureRegistry, rx: &str, prompt: &str) -> Vec<Candidate> {
    let mut out = Vec::new();

    for sig in registry.signatures() {
        let mut score = sig.base_weight;
        let mut evidence = Vec::with_capacity(4);
        let mut matched = false;

        if let Some(pat) = sig.pre_login.iter().find(|pat| pat.is_match(rx)) {
            score += PRELOGIN_SCORE;
            matched = true;
            evidence.push(format!("prelogin: {}", pat.label));
        }

        if let Some(pat) = sig.login.iter().find(|pat| pat.is_match(rx)) {
            score += LOGIN_SCORE;
            matched = true;
            evidence.push(format!("login: {}", pat.label));
        }

        if let Some(pat) = sig.prompt.iter().find(|pat| pat.is_match(prompt)) {
            score += PROMPT_SCORE;
            matched = true;
            evidence.push(format!("prompt: {}", pat.label));
        }

        if !matched {
            continue;
        }

        out.push(Candidate {
            vendor: sig.vendor.to_string(),
            os: sig.os.to_string(),
            prob: clamp01(score),
            evidence,
            stage: Stage::PreLogin,
            prompt: String::new(),
            next_safe_probe: sig.safe_probe.clone(),
        });
    }

    out
}

/// Process RX text and return the current stage plus ranked candidates.
///
/// `last_prompt` may be supplied by the caller (e.g. the session already
/// tracks it); when empty, the prompt line is extracted from the
/// normalized buffer.
pub fn analyze(
    registry: &SignatureRegistry,
    rx: &str,
    last_prompt: &str,
) -> (Stage, Vec<Candidate>) {
    let normalized = normalize(rx);
    debug!(rx_len = rx.len(), last_prompt, "analyzing rx buffer");

    let mut prompt_line = last_prompt.trim().to_string();
    if prompt_line.is_empty() {
        prompt_line = extract_last_prompt_line(&normalized);
    }

    let stage = detect_stage(&normalized, &prompt_line);

    let mut cands = candidates(registry, &normalized, &prompt_line);
    for cand in &mut cands {
        cand.stage = stage;
        cand.prompt = prompt_line.clone();
        cand.evidence = crate::finalize::dedupe(std::mem::take(&mut cand.evidence));
    }

    // Stable sort: descending probability, ties broken by vendor name.
    cands.sort_by(|a, b| {
        b.prob
            .partial_cmp(&a.prob)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.vendor.cmp(&b.vendor))
    });

    debug!(stage = stage.as_str(), candidates = cands.len(), "analysis complete");
    (stage, cands)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SignatureRegistry {
        SignatureRegistry::builtin()
    }

    #[test]
    fn cisco_banner_and_prompt_score_high() {
        let rx = "User Access Verification\n\nCisco IOS Software, C2960 Software\nR1#";
        let (stage, cands) = analyze(&registry(), rx, "R1#");

        assert_eq!(stage, Stage::Prompt);
        let top = &cands[0];
        assert_eq!(top.vendor, "Cisco");
        assert_eq!(top.os, "IOS");
        assert!(top.prob >= 0.8, "prob = {}", top.prob);
        assert!(top.next_safe_probe.is_some());
    }

    #[test]
    fn unmatched_signatures_yield_no_candidate() {
        let (_, cands) = analyze(&registry(), "complete noise with no markers", "");
        for cand in &cands {
            assert!(!cand.evidence.is_empty(), "{}/{} has no evidence", cand.vendor, cand.os);
        }
    }

    #[test]
    fn probabilities_stay_clamped() {
        let rx = "MikroTik RouterOS 7.10\n[admin@MikroTik] >";
        let (_, cands) = analyze(&registry(), rx, "[admin@MikroTik] >");
        for cand in &cands {
            assert!((0.0..=1.0).contains(&cand.prob));
        }
        assert_eq!(cands[0].vendor, "MikroTik");
    }

    #[test]
    fn ties_break_on_vendor_name() {
        let (_, cands) = analyze(&registry(), "", "host#");
        // Several prompt-only matches share the same score; ordering must
        // be deterministic and alphabetical within the tie.
        let tied: Vec<_> = cands
            .iter()
            .filter(|c| (c.prob - cands[0].prob).abs() < f64::EPSILON)
            .map(|c| c.vendor.clone())
            .collect();
        let mut sorted = tied.clone();
        sorted.sort();
        assert_eq!(tied, sorted);
    }

    #[test]
    fn caller_prompt_overrides_extraction() {
        let rx = "Cisco IOS Software\ngarbage tail line";
        let (stage, cands) = analyze(&registry(), rx, "R1#");
        assert_eq!(stage, Stage::Prompt);
        assert_eq!(cands[0].prompt, "R1#");
    }

    #[test]
    fn evidence_string_joins_lines() {
        let rx = "User Access Verification\nCisco IOS Software\nR1#";
        let (_, cands) = analyze(&registry(), rx, "R1#");
        let joined = cands[0].evidence_string();
        assert!(joined.contains("prelogin: User Access Verification"));
        assert!(joined.contains('\n'));
    }
}
