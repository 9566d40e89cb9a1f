//! Guarded safe-probe execution
//!
//! A safe probe writes one catalogued read-only command to the live
//! console and re-scores the candidate with whatever came back. Every
//! precondition must hold before a single byte is written; a refusal
//! never touches the session.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::finalize::clamp01;
use crate::score::Candidate;
use crate::stage::Stage;

/// Minimum candidate probability before a probe is allowed to run.
pub const PROBE_CONFIDENCE_THRESHOLD: f64 = 0.55;

/// Fallback read deadline when neither the caller nor the catalogue
/// supplies one.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1100);

/// Response terminators: common prompt trailers, checked against the
/// trimmed accumulator by the transport.
const PROBE_TERMINATORS: &[&str] = &["#", ">", "$", "\n"];

/// Write/read access to a live console, implemented by serial sessions
/// and by in-memory transports in tests.
pub trait ProbeTransport {
    /// Write raw bytes to the console.
    fn send(
        &mut self,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<usize, TransportError>> + Send;

    /// Accumulate RX text until the trimmed buffer ends with one of the
    /// terminators, the timeout fires, or the session closes. Timeouts
    /// and closure carry the partial content.
    fn read_until(
        &mut self,
        timeout: Duration,
        terminators: &[&str],
    ) -> impl std::future::Future<Output = Result<String, TransportError>> + Send;
}

/// Transport-level faults surfaced to the probe runner.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The OS write failed.
    #[error("console write failed: {0}")]
    Write(String),
    /// The read deadline fired; partial content is preserved.
    #[error("console read timed out")]
    Timeout { partial: String },
    /// The session closed mid-read; partial content is preserved.
    #[error("console session closed")]
    Closed { partial: String },
}

/// Caller policy for probe execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbePolicy {
    /// Allow probing while the prompt shows configuration mode. Off by
    /// default; flipping it on is an explicit operator decision.
    pub allow_probe_in_config_mode: bool,
}

/// Why a probe was refused without touching the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeRefusal {
    /// The candidate's signature carries no catalogued probe.
    NoProbeCatalogued,
    /// The console is not at an interactive prompt.
    WrongStage,
    /// Candidate probability below [`PROBE_CONFIDENCE_THRESHOLD`].
    LowConfidence,
    /// The probe's guard regex does not match the prompt line.
    GuardMismatch,
    /// The prompt shows configuration mode and policy forbids it.
    ConfigModePolicy,
}

impl ProbeRefusal {
    /// Short reason for logs and evidence.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeRefusal::NoProbeCatalogued => "no safe probe catalogued",
            ProbeRefusal::WrongStage => "not at an interactive prompt",
            ProbeRefusal::LowConfidence => "confidence below probe threshold",
            ProbeRefusal::GuardMismatch => "guard does not match prompt",
            ProbeRefusal::ConfigModePolicy => "configuration-mode prompt refused by policy",
        }
    }
}

/// Errors from a probe attempt.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// A precondition failed; the session was not written to.
    #[error("probe refused: {}", .0.as_str())]
    Refused(ProbeRefusal),
    /// The command could not be written.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Output of a completed probe.
#[derive(Debug)]
pub struct ProbeRun {
    /// Raw response text, as captured (possibly partial on timeout).
    pub output: String,
    /// Re-scored candidate; `None` when the read failed before a full
    /// response arrived, so the pre-probe candidate stands.
    pub updated: Option<Candidate>,
}

/// Execute the candidate's safe probe if every precondition holds.
///
/// Preconditions, checked in order: a probe is catalogued, the stage is
/// [`Stage::Prompt`], probability is at or above the threshold, the
/// guard matches the prompt line, and the configuration-mode policy
/// permits. Any failure returns [`ProbeError::Refused`] with nothing
/// written. At most one probe runs per identification cycle.
pub async fn maybe_probe<T: ProbeTransport>(
    session: &mut T,
    candidate: &Candidate,
    policy: ProbePolicy,
    timeout: Option<Duration>,
) -> Result<ProbeRun, ProbeError> {
    let probe = candidate
        .next_safe_probe
        .as_ref()
        .ok_or(ProbeError::Refused(ProbeRefusal::NoProbeCatalogued))?;

    if candidate.stage != Stage::Prompt {
        return Err(ProbeError::Refused(ProbeRefusal::WrongStage));
    }

    if candidate.prob < PROBE_CONFIDENCE_THRESHOLD {
        return Err(ProbeError::Refused(ProbeRefusal::LowConfidence));
    }

    if !probe.guard.is_match(&candidate.prompt) {
        return Err(ProbeError::Refused(ProbeRefusal::GuardMismatch));
    }

    // The shared Cisco-style guard admits configuration-mode prompts;
    // this policy check is the second refusal layer, owned here and not
    // by the UI.
    if !policy.allow_probe_in_config_mode && candidate.prompt.to_lowercase().contains("(config") {
        return Err(ProbeError::Refused(ProbeRefusal::ConfigModePolicy));
    }

    info!(
        vendor = %candidate.vendor,
        os = %candidate.os,
        prob = candidate.prob,
        probe = probe.name,
        "running safe probe"
    );

    let mut command = probe.command.to_string();
    if !command.ends_with('\n') {
        command.push_str("\r\n");
    }
    session.send(command.as_bytes()).await?;

    let deadline = timeout
        .filter(|t| !t.is_zero())
        .unwrap_or_else(|| match probe.timeout_ms {
            0 => DEFAULT_PROBE_TIMEOUT,
            ms => Duration::from_millis(ms),
        });

    let output = match session.read_until(deadline, PROBE_TERMINATORS).await {
        Ok(output) => output,
        Err(TransportError::Timeout { partial }) | Err(TransportError::Closed { partial }) => {
            warn!(probe = probe.name, captured = partial.len(), "probe read incomplete");
            return Ok(ProbeRun { output: partial, updated: None });
        }
        Err(err) => return Err(err.into()),
    };

    let mut updated = candidate.clone();
    let boost = probe.score(&output);
    if boost > 0.0 {
        updated.prob = clamp01(updated.prob + boost);
        updated.evidence.push(format!("{} probe expect matched", probe.name));
        debug!(probe = probe.name, "probe expect matched");
    } else {
        updated.evidence.push(format!("{} probe output recorded", probe.name));
    }

    if let Some(model) = probe.scrape_model(&output) {
        debug!(probe = probe.name, model = %model, "probe scraped model");
        updated.evidence.push(format!("model: {model}"));
    }

    info!(vendor = %candidate.vendor, os = %candidate.os, "probe completed");
    Ok(ProbeRun { output, updated: Some(updated) })
}
