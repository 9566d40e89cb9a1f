//! lanscout — on-site network diagnostics from a serial console
//!
//! The `identify` subcommand runs the full pipeline: baud probe, stage
//! classification and scoring, an optional guarded safe probe over a
//! live session, and a console snapshot on stdout or disk.

mod config;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scout_engine::{finalize, maybe_probe, ConsoleSnapshot, ProbeError, ProbePolicy};
use scout_serial::{discover_ports, probe_port, ProbeConfig, Session, SessionConfig};
use scout_signatures::SignatureRegistry;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "lanscout", version, about = "On-site network diagnostics toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate serial console ports
    Ports,
    /// Identify the device behind a serial console
    Identify {
        /// Port path (e.g. /dev/ttyUSB0)
        port: String,
        /// Try only this baud instead of the configured list
        #[arg(long)]
        baud: Option<u32>,
        /// Skip the guarded safe probe
        #[arg(long)]
        no_probe: bool,
        /// Permit the probe on a configuration-mode prompt
        #[arg(long)]
        allow_config_probe: bool,
        /// Write session transcripts
        #[arg(long)]
        log: bool,
        /// Redact IP and MAC literals in the snapshot
        #[arg(long)]
        redact: bool,
        /// Write the snapshot JSON to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lanscout=info,scout_engine=info,scout_serial=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Commands::Ports => list_ports(),
        Commands::Identify {
            port,
            baud,
            no_probe,
            allow_config_probe,
            log,
            redact,
            out,
        } => identify(&port, baud, no_probe, allow_config_probe, log, redact, out).await,
    }
}

fn list_ports() -> anyhow::Result<()> {
    let ports = discover_ports().context("port discovery failed")?;
    if ports.is_empty() {
        println!("No serial console candidates found.");
        return Ok(());
    }

    for port in ports {
        if port.hints.is_empty() {
            println!("{:<28} {}", port.path, port.friendly_name);
        } else {
            println!("{:<28} {} [{}]", port.path, port.friendly_name, port.hints);
        }
    }
    Ok(())
}

async fn identify(
    port: &str,
    baud: Option<u32>,
    no_probe: bool,
    allow_config_probe: bool,
    log: bool,
    redact: bool,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = Config::load();
    let registry = SignatureRegistry::builtin();

    let probe_config = ProbeConfig {
        bauds: baud.map(|b| vec![b]).unwrap_or_else(|| config.default_bauds.clone()),
        ..ProbeConfig::default()
    };

    let report = probe_port(&registry, port, &probe_config).await;

    let prompt = report.fingerprint.prompt.clone();
    let mut fingerprint = report.fingerprint.clone();
    let mut candidates = report.candidates.clone();
    let mut probe_output = String::new();

    let mut bytes_written = 0u64;
    let mut bytes_read = 0u64;
    let mut log_path = None;
    let mut transcript = report.cleaned.clone();

    let wants_probe = report.success
        && !no_probe
        && candidates
            .first()
            .is_some_and(|c| c.next_safe_probe.is_some());

    if wants_probe {
        let top = candidates[0].clone();

        let mut session_config = SessionConfig::new(port, report.baud);
        session_config.crlf_mode = config.crlf_mode;
        session_config.local_echo = config.local_echo;
        session_config.log_to_file = log || config.log_by_default;

        match Session::open(session_config) {
            Ok(mut session) => {
                let policy = ProbePolicy {
                    allow_probe_in_config_mode: allow_config_probe
                        || config.allow_probe_in_config_mode,
                };

                match maybe_probe(&mut session, &top, policy, None).await {
                    Ok(run) => {
                        probe_output = run.output;
                        if let Some(updated) = run.updated {
                            candidates[0] = updated;
                        }
                    }
                    Err(ProbeError::Refused(reason)) => {
                        info!(reason = reason.as_str(), "safe probe refused");
                    }
                    Err(err) => warn!("safe probe failed: {err}"),
                }

                fingerprint = finalize(
                    &registry,
                    report.stage,
                    &candidates,
                    &report.cleaned,
                    &prompt,
                    &probe_output,
                );
                fingerprint.baud = report.baud;

                let (read, written) = session.stats();
                bytes_read = read;
                bytes_written = written;
                log_path = session
                    .log_path()
                    .map(|p| p.display().to_string());
                if let Some(txt) = session.txt_log_path() {
                    if let Ok(text) = std::fs::read_to_string(txt) {
                        if !text.is_empty() {
                            transcript = format!("{transcript}{text}");
                        }
                    }
                }

                session.close().await;
            }
            Err(err) => warn!("session open failed, keeping passive result: {err}"),
        }
    }

    let snapshot = ConsoleSnapshot::new(
        port,
        &fingerprint,
        bytes_written,
        bytes_read,
        log_path,
        &transcript,
        chrono::Utc::now(),
    );
    let snapshot = if redact { snapshot.redacted() } else { snapshot };

    let json = serde_json::to_string_pretty(&snapshot).context("snapshot serialization")?;
    match out {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("writing snapshot to {}", path.display()))?;
            info!(path = %path.display(), "snapshot written");
        }
        None => println!("{json}"),
    }

    eprintln!(
        "{} @ {} baud: {} (confidence {:.2})",
        port,
        fingerprint.baud,
        fingerprint.summary(),
        fingerprint.confidence
    );
    Ok(())
}
