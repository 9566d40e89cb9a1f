//! Final identification result
//!
//! Collapses the ranked candidate list, the RX text and any probe
//! output into the single [`Fingerprint`] the snapshot and UI consume.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use scout_signatures::SignatureRegistry;

use crate::score::Candidate;
use crate::stage::Stage;

/// Maximum evidence entries kept on a finalized result.
const EVIDENCE_SHORTLIST: usize = 3;

/// The engine's public identification output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub vendor: String,
    pub os: String,
    /// Scraped model string; empty when nothing matched.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prompt: String,
    pub stage: Stage,
    pub baud: u32,
    /// Clamped confidence in [0, 1].
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

impl Fingerprint {
    /// Unknown result carrying a single evidence line explaining why.
    pub fn unknown(stage: Stage, evidence: &str) -> Self {
        Self {
            vendor: "Unknown".to_string(),
            os: "Unknown".to_string(),
            model: String::new(),
            prompt: String::new(),
            stage,
            baud: 0,
            confidence: 0.0,
            evidence: vec![evidence.to_string()],
        }
    }

    /// One-line summary: `vendor/os` with the model in parentheses when
    /// known.
    pub fn summary(&self) -> String {
        if self.model.is_empty() {
            format!("{}/{}", self.vendor, self.os)
        } else {
            format!("{}/{} ({})", self.vendor, self.os, self.model)
        }
    }
}

/// Derive the final result from the analysis context.
///
/// The top candidate wins. The model string comes from the signature's
/// version-scrape patterns against the RX text first, then against the
/// probe output. Evidence is deduplicated, capped at three entries, and
/// notes when probe output was captured.
pub fn finalize(
    registry: &SignatureRegistry,
    stage: Stage,
    candidates: &[Candidate],
    rx: &str,
    prompt: &str,
    probe_output: &str,
) -> Fingerprint {
    let Some(top) = candidates.first() else {
        warn!("finalize: no candidates for provided input");
        let mut result = Fingerprint::unknown(stage, "no candidates");
        result.prompt = prompt.trim().to_string();
        return result;
    };

    let mut result = Fingerprint {
        vendor: top.vendor.clone(),
        os: top.os.clone(),
        model: String::new(),
        prompt: prompt.trim().to_string(),
        stage,
        baud: 0,
        confidence: clamp01(top.prob),
        evidence: shortlist(top.evidence.clone()),
    };

    result.model = registry
        .scrape_model(&top.vendor, &top.os, rx)
        .or_else(|| {
            if probe_output.is_empty() {
                None
            } else {
                registry.scrape_model(&top.vendor, &top.os, probe_output)
            }
        })
        .unwrap_or_default();

    if !probe_output.is_empty() {
        let mut evidence = result.evidence;
        evidence.push("probe output captured".to_string());
        result.evidence = shortlist(evidence);
    }

    info!(
        vendor = %result.vendor,
        os = %result.os,
        model = %result.model,
        confidence = result.confidence,
        "finalized fingerprint"
    );
    result
}

/// Clamp a score into [0, 1].
pub fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Trim, drop empties and deduplicate while preserving order.
pub(crate) fn dedupe(entries: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty() && seen.insert(e.clone()))
        .collect()
}

fn shortlist(entries: Vec<String>) -> Vec<String> {
    let mut deduped = dedupe(entries);
    deduped.truncate(EVIDENCE_SHORTLIST);
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::score::analyze;

    fn registry() -> SignatureRegistry {
        SignatureRegistry::builtin()
    }

    #[test]
    fn empty_candidates_yield_unknown() {
        let result = finalize(&registry(), Stage::PreLogin, &[], "", "  login:  ", "");
        assert_eq!(result.vendor, "Unknown");
        assert_eq!(result.os, "Unknown");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.evidence, vec!["no candidates".to_string()]);
        assert_eq!(result.prompt, "login:");
    }

    #[test]
    fn model_scraped_from_probe_output_when_rx_has_none() {
        let reg = registry();
        let rx = "User Access Verification\nCisco IOS Software\nR1#";
        let (stage, cands) = analyze(&reg, rx, "R1#");

        let probe_out = "Model number          : WS-C2960-24TT-L\nR1#";
        let result = finalize(&reg, stage, &cands, rx, "R1#", probe_out);

        assert_eq!(result.vendor, "Cisco");
        assert!(result.model.contains("WS-C2960-24TT-L"));
        assert!(result
            .evidence
            .iter()
            .all(|e| !e.is_empty()));
    }

    #[test]
    fn evidence_is_deduped_and_capped() {
        let reg = registry();
        let cand = Candidate {
            vendor: "Cisco".into(),
            os: "IOS".into(),
            prob: 0.9,
            evidence: vec![
                "a".into(),
                " a ".into(),
                "b".into(),
                "c".into(),
                "d".into(),
            ],
            stage: Stage::Prompt,
            prompt: "R1#".into(),
            next_safe_probe: None,
        };
        let result = finalize(&reg, Stage::Prompt, &[cand], "", "R1#", "");
        assert_eq!(result.evidence, vec!["a", "b", "c"]);
    }

    #[test]
    fn confidence_is_clamped() {
        let reg = registry();
        let cand = Candidate {
            vendor: "Cisco".into(),
            os: "IOS".into(),
            prob: 1.7,
            evidence: vec!["prompt: Cisco IOS prompt".into()],
            stage: Stage::Prompt,
            prompt: "R1#".into(),
            next_safe_probe: None,
        };
        let result = finalize(&reg, Stage::Prompt, &[cand], "", "R1#", "");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn probe_capture_is_noted() {
        let reg = registry();
        let cand = Candidate {
            vendor: "MikroTik".into(),
            os: "RouterOS".into(),
            prob: 0.9,
            evidence: vec!["prelogin: RouterOS".into()],
            stage: Stage::Prompt,
            prompt: "[admin@MikroTik] >".into(),
            next_safe_probe: None,
        };
        let result = finalize(&reg, Stage::Prompt, &[cand], "", "", "uptime: 1d");
        assert!(result
            .evidence
            .iter()
            .any(|e| e == "probe output captured"));
    }

    #[test]
    fn summary_includes_model_when_present() {
        let mut fp = Fingerprint::unknown(Stage::PreLogin, "no candidates");
        assert_eq!(fp.summary(), "Unknown/Unknown");
        fp.vendor = "Cisco".into();
        fp.os = "IOS".into();
        fp.model = "WS-C2960-24TT-L".into();
        assert_eq!(fp.summary(), "Cisco/IOS (WS-C2960-24TT-L)");
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp01(-0.2), 0.0);
        assert_eq!(clamp01(0.4), 0.4);
        assert_eq!(clamp01(1.4), 1.0);
    }
}
