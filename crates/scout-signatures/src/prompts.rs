//! Stage-detection pattern tables
//!
//! These tables back the stage classifier: boot banners, login lines,
//! and a prompt-heuristic list that includes a generic shell catch-all.
//! The catch-all exists only so stage detection can say "this is an
//! interactive prompt" — it never contributes to scoring.

use std::sync::LazyLock;

use regex::Regex;

use crate::pattern::compile;

/// A prompt heuristic and the platform it hints at.
#[derive(Debug)]
pub struct PromptPattern {
    pub name: &'static str,
    pub regex: Regex,
    pub vendor: &'static str,
    pub os: &'static str,
}

static BOOT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        compile(r"(?i)\bU-Boot\b"),
        compile(r"(?i)rommon \d+ >"),
        compile(r"(?i)GNU GRUB"),
    ]
});

static LOGIN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        compile(r"(?i)^(username|user name|login|password):\s*$"),
        compile(r"(?i)amnesiac"),
    ]
});

static PROMPT_PATTERNS: LazyLock<Vec<PromptPattern>> = LazyLock::new(|| {
    let pat = |name, pattern, vendor, os| PromptPattern {
        name,
        regex: compile(pattern),
        vendor,
        os,
    };
    vec![
        pat(
            "cisco_ios",
            r"(?m)^([A-Za-z0-9._-]+)(\((config[^\)]*)\))?[#>] ?$",
            "Cisco",
            "IOS",
        ),
        pat("cisco_asa", r"(?m)^ciscoasa(?:\([^\)]*\))?[#>] ?$", "Cisco", "ASA"),
        pat("cisco_nxos", r"(?m)^(Nexus|switch)[#>] ?$", "Cisco", "NX-OS"),
        pat("cisco_iosxr", r"(?m)^RP/\d+/\S+:\S+# ?$", "Cisco", "IOS-XR"),
        pat("junos", r"(?m)^[\w\-]+@[\w\-.]+[>#] ?$", "Juniper", "JUNOS"),
        pat(
            "aruba_cx",
            r"(?mi)^(mgr|admin|[A-Za-z0-9._-]+)# ?$",
            "Aruba",
            "AOS-CX",
        ),
        pat(
            "aruba_aos_s",
            r"(?m)^(HP|Aruba|ProCurve)[\w\-]*[>#] ?$",
            "Aruba",
            "AOS-S",
        ),
        pat("mikrotik", r"(?m)^\[[^\]]+\]\s?> ?$", "MikroTik", "RouterOS"),
        pat(
            "edgeos",
            r"(?m)^[\w\-]+@[\w\-.]+(:~)?[$#] ?$",
            "Ubiquiti",
            "EdgeOS",
        ),
        pat("fortigate", r"(?m)^FGT\w*\s?[#>] ?$", "Fortinet", "FortiOS"),
        pat("paloalto", r"(?m)^[\w\-]+@PA-\w+[>#] ?$", "PaloAlto", "PAN-OS"),
        pat(
            "huawei_vrp",
            r"(?m)^(<[Hh][PpEe]?[^>]*>|\[[Hh].*?\])$",
            "Huawei",
            "VRP",
        ),
        pat("comware", r"(?m)^((<|\[)HPE?.*?(>|\]))$", "HPE", "Comware"),
        pat(
            "brocade_fastiron",
            r"(?m)^(ICX|BR-CD|FastIron).*?[#>] ?$",
            "Brocade/Extreme",
            "FastIron",
        ),
        pat("vyos", r"(?m)^vyos@.*[$#] ?$", "VyOS", "VyOS"),
        pat("openwrt", r"(?m)^root@OpenWrt:~#$", "OpenWrt", "OpenWrt"),
        pat("pfsense", r"(?m)^root@pfSense:~ #$", "pfSense/OPNsense", "pfSense"),
        pat("generic_hash", r"(?m)^.*[>#$] ?$", "Generic", "Shell"),
    ]
});

/// Whether the RX text contains a bootloader banner.
pub fn is_boot_banner(rx: &str) -> bool {
    BOOT_PATTERNS.iter().any(|re| re.is_match(rx))
}

/// Whether a single line looks like a login challenge.
pub fn is_login_line(line: &str) -> bool {
    LOGIN_PATTERNS.iter().any(|re| re.is_match(line))
}

/// Match a prompt line against the heuristic table.
pub fn match_prompt(prompt_line: &str) -> Option<&'static PromptPattern> {
    if prompt_line.is_empty() {
        return None;
    }
    PROMPT_PATTERNS.iter().find(|p| p.regex.is_match(prompt_line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_banners() {
        assert!(is_boot_banner("U-Boot 2020.01 (Jan 06 2020)"));
        assert!(is_boot_banner("rommon 1 >"));
        assert!(is_boot_banner("GNU GRUB version 2.06"));
        assert!(!is_boot_banner("Cisco IOS Software"));
    }

    #[test]
    fn login_lines() {
        assert!(is_login_line("Username:"));
        assert!(is_login_line("login: "));
        assert!(is_login_line("Password:"));
        assert!(is_login_line("Amnesiac (ttyu0)"));
        assert!(!is_login_line("R1#"));
    }

    #[test]
    fn prompt_table_prefers_specific_over_generic() {
        let hit = match_prompt("[admin@MikroTik] >").unwrap();
        assert_eq!(hit.name, "mikrotik");

        let hit = match_prompt("somehost$").unwrap();
        assert_eq!(hit.name, "generic_hash");

        assert!(match_prompt("").is_none());
        assert!(match_prompt("press any key").is_none());
    }

    #[test]
    fn config_mode_prompt_still_matches_cisco() {
        let hit = match_prompt("R1(config-if)#").unwrap();
        assert_eq!(hit.vendor, "Cisco");
    }
}
