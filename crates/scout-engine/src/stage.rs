//! Interaction stage classification
//!
//! Decides what the tail of the RX stream currently shows: a bootloader,
//! a pre-login banner, a login challenge, or an interactive CLI prompt.
//! The stream may regress (a device reboot drops a `Prompt` session back
//! to `Boot`), so no monotonicity is assumed.

use serde::{Deserialize, Serialize};

use scout_signatures::{is_boot_banner, is_login_line, match_prompt};

/// Lifecycle phase of a console interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Banner or noise before any challenge.
    #[serde(rename = "prelogin")]
    PreLogin,
    /// Username/password challenge visible.
    #[serde(rename = "login")]
    Login,
    /// Interactive CLI prompt visible.
    #[serde(rename = "prompt")]
    Prompt,
    /// Bootloader output (U-Boot, ROMMON, GRUB).
    #[serde(rename = "bootloader")]
    Boot,
}

impl Stage {
    /// Snapshot wire name for the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PreLogin => "prelogin",
            Stage::Login => "login",
            Stage::Prompt => "prompt",
            Stage::Boot => "bootloader",
        }
    }
}

/// How many trailing non-empty lines the login scan examines.
const LOGIN_SCAN_LINES: usize = 4;

/// Classify the current RX tail. Pure: the same `(rx, prompt_line)`
/// always yields the same stage.
///
/// Decision order: boot markers anywhere in the text win, then a
/// recognized prompt line, then a login challenge within the last few
/// non-empty lines, and `PreLogin` otherwise.
pub fn detect_stage(rx: &str, prompt_line: &str) -> Stage {
    if is_boot_banner(rx) {
        return Stage::Boot;
    }

    if match_prompt(prompt_line).is_some() {
        return Stage::Prompt;
    }

    let lines: Vec<&str> = rx.lines().filter(|line| !line.trim().is_empty()).collect();
    let tail_start = lines.len().saturating_sub(LOGIN_SCAN_LINES);
    if lines[tail_start..].iter().any(|line| is_login_line(line)) {
        return Stage::Login;
    }

    Stage::PreLogin
}
