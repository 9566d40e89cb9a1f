//! Safe probe catalogue
//!
//! A [`SafeProbe`] is a guarded, read-only command the engine may write
//! to a live console to refine an identification. Probes never change
//! device state: the catalogue below is limited to the `show` /
//! `display` / `get` / `print` / `uname` family. The guard regex must
//! match the current prompt line before the command is allowed out, and
//! the probe runner applies a further policy refusal for
//! configuration-mode prompts on top of the guard.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use crate::pattern::{compile, compile_all};

/// Fixed score boost applied when a probe's expect pattern matches.
pub const PROBE_EXPECT_BOOST: f64 = 0.2;

/// A catalogued read-only identification command.
#[derive(Debug)]
pub struct SafeProbe {
    /// Probe name used in evidence strings (e.g. "cisco_show_version").
    pub name: &'static str,
    /// Command text; the runner appends `\r\n` if absent.
    pub command: &'static str,
    /// Prompt-line regex that must match before the command is written.
    pub guard: Regex,
    /// Response patterns worth a fixed score boost.
    pub expect: Vec<Regex>,
    /// Response patterns whose first capture group yields a model string.
    pub scrape: Vec<Regex>,
    /// Hard read deadline for the probe response.
    pub timeout_ms: u64,
}

impl SafeProbe {
    /// Score boost for the probe output: [`PROBE_EXPECT_BOOST`] if any
    /// expect pattern matches, zero otherwise.
    pub fn score(&self, output: &str) -> f64 {
        if self.expect.iter().any(|re| re.is_match(output)) {
            PROBE_EXPECT_BOOST
        } else {
            0.0
        }
    }

    /// First model string scraped from the probe output, if any.
    pub fn scrape_model(&self, output: &str) -> Option<String> {
        for re in &self.scrape {
            if let Some(caps) = re.captures(output) {
                if let Some(m) = caps.get(1) {
                    let model = m.as_str().trim();
                    if !model.is_empty() {
                        return Some(model.to_string());
                    }
                }
            }
        }
        None
    }
}

// Guard expressions shared between probes. The Cisco-style guard admits
// configuration-mode prompts; the probe runner owns the `(config` refusal.
const GUARD_CISCO: &str = r"(?m)^([A-Za-z0-9._-]+)(\((config[^\)]*)\))?[#>] ?$";
const GUARD_MIKROTIK: &str = r"(?m)^\[[^\]]+\]\s?> ?$";
const GUARD_LINUX_SHELL: &str = r"(?m)[$#] ?$";
const GUARD_JUNOS: &str = r"(?m)^[\w\-]+@[\w\-.]+[>#] ?$";
const GUARD_HUAWEI: &str = r"(?m)^(<[Hh][PpEe]?[^>]*>|\[[Hh].*?\])$";
const GUARD_COMWARE: &str = r"(?m)^((<|\[)HPE?.*?(>|\]))$";
const GUARD_VYOS: &str = r"(?m)^vyos@.*[$#] ?$";
const GUARD_FORTIGATE: &str = r"(?m)^FGT\w*\s?[#>] ?$";
const GUARD_PALOALTO: &str = r"(?m)^[\w\-]+@PA-\w+[>#] ?$";

struct ProbeSpec {
    vendor: &'static str,
    os: &'static str,
    name: &'static str,
    command: &'static str,
    guard: &'static str,
    expect: &'static [&'static str],
    scrape: &'static [&'static str],
    timeout_ms: u64,
}

const PROBE_SPECS: &[ProbeSpec] = &[
    ProbeSpec {
        vendor: "Cisco",
        os: "IOS",
        name: "cisco_show_version",
        command: "show version",
        guard: GUARD_CISCO,
        expect: &[r"Cisco IOS Software", r"Configuration register"],
        scrape: &[
            r"(?m)^[Cc]isco (Catalyst|IOS|NX-OS).*?\b([A-Z0-9-]+)",
            r"(?m)^Processor board ID ([\w-]+)",
        ],
        timeout_ms: 1200,
    },
    ProbeSpec {
        vendor: "Cisco",
        os: "IOS-XE",
        name: "cisco_show_version",
        command: "show version",
        guard: GUARD_CISCO,
        expect: &[r"IOS[- ]XE", r"Cisco IOS Software"],
        scrape: &[r"(?m)^Cisco (\S+) Software", r"(?m)^cisco (\S+) \("],
        timeout_ms: 1200,
    },
    ProbeSpec {
        vendor: "Cisco",
        os: "NX-OS",
        name: "cisco_show_version",
        command: "show version",
        guard: GUARD_CISCO,
        expect: &[r"Nexus", r"NX-OS"],
        scrape: &[r"(?m)^Hardware\s+:\s+(.*)"],
        timeout_ms: 1400,
    },
    ProbeSpec {
        vendor: "Cisco",
        os: "IOS-XR",
        name: "cisco_show_version",
        command: "show version",
        guard: GUARD_CISCO,
        expect: &[r"IOS XR", r"cisco IOS XR"],
        scrape: &[r"(?m)^cisco IOS XR Software, Version ([\w.\-]+)"],
        timeout_ms: 1500,
    },
    ProbeSpec {
        vendor: "Cisco",
        os: "ASA",
        name: "cisco_show_version",
        command: "show version",
        guard: GUARD_CISCO,
        expect: &[r"Cisco Adaptive Security Appliance", r"ASA"],
        scrape: &[r"(?m)^Hardware\s+:\s+(.*)"],
        timeout_ms: 1400,
    },
    ProbeSpec {
        vendor: "Juniper",
        os: "JUNOS",
        name: "junos_show_version",
        command: "show version",
        guard: GUARD_JUNOS,
        expect: &[r"JUNOS", r"Model:"],
        scrape: &[r"(?m)^Model:\s+(\S+)"],
        timeout_ms: 1500,
    },
    ProbeSpec {
        vendor: "Aruba",
        os: "AOS-CX",
        name: "aruba_show_version",
        command: "show version",
        guard: GUARD_CISCO,
        expect: &[r"ArubaOS-CX", r"Version"],
        scrape: &[r"(?m)^Platform :\s+(.*)"],
        timeout_ms: 1500,
    },
    ProbeSpec {
        vendor: "Aruba",
        os: "AOS-S",
        name: "aruba_show_version",
        command: "show version",
        guard: GUARD_CISCO,
        expect: &[r"Aruba", r"Revision"],
        scrape: &[r"(?m)^ROM Version\s+:\s+(.*)"],
        timeout_ms: 1500,
    },
    ProbeSpec {
        vendor: "MikroTik",
        os: "RouterOS",
        name: "mikrotik_resource_print",
        command: "/system resource print",
        guard: GUARD_MIKROTIK,
        expect: &[r"(?i)routeros", r"(?i)uptime"],
        scrape: &[r"(?m)^board-name: (.*)"],
        timeout_ms: 1200,
    },
    ProbeSpec {
        vendor: "Ubiquiti",
        os: "EdgeOS",
        name: "linux_uname",
        command: "uname -a",
        guard: GUARD_LINUX_SHELL,
        expect: &[r"Linux", r"EdgeRouter"],
        scrape: &[r"Linux (\S+)"],
        timeout_ms: 1000,
    },
    ProbeSpec {
        vendor: "Linux/BusyBox",
        os: "Linux",
        name: "linux_uname",
        command: "uname -a",
        guard: GUARD_LINUX_SHELL,
        expect: &[r"Linux", r"version"],
        scrape: &[r"Linux (\S+)"],
        timeout_ms: 1000,
    },
    ProbeSpec {
        vendor: "Fortinet",
        os: "FortiOS",
        name: "fortigate_get_system_status",
        command: "get system status",
        guard: GUARD_FORTIGATE,
        expect: &[r"FortiGate", r"Version"],
        scrape: &[r"(?m)^Version: (.*)"],
        timeout_ms: 1400,
    },
    ProbeSpec {
        vendor: "PaloAlto",
        os: "PAN-OS",
        name: "paloalto_show_system_info",
        command: "show system info",
        guard: GUARD_PALOALTO,
        expect: &[r"system info", r"model"],
        scrape: &[r"(?m)^model:\s+(\S+)"],
        timeout_ms: 1400,
    },
    ProbeSpec {
        vendor: "Huawei",
        os: "VRP",
        name: "huawei_display_version",
        command: "display version",
        guard: GUARD_HUAWEI,
        expect: &[r"VRP", r"Huawei"],
        scrape: &[r"(?m)^Huawei Versatile Routing Platform Software\s+\(VRP\) (.*)"],
        timeout_ms: 1800,
    },
    ProbeSpec {
        vendor: "HPE",
        os: "Comware",
        name: "hpe_display_version",
        command: "display version",
        guard: GUARD_COMWARE,
        expect: &[r"Comware", r"System Description"],
        scrape: &[r"(?m)^HP Comware Platform Software, Version (.*)"],
        timeout_ms: 1600,
    },
    ProbeSpec {
        vendor: "Dell",
        os: "OS10",
        name: "dell_show_version",
        command: "show version",
        guard: GUARD_CISCO,
        expect: &[r"Dell EMC Networking OS10", r"OS10"],
        scrape: &[r"(?m)^Product:\s+(.*)"],
        timeout_ms: 1600,
    },
    ProbeSpec {
        vendor: "Brocade/Extreme",
        os: "FastIron",
        name: "brocade_show_version",
        command: "show version",
        guard: GUARD_CISCO,
        expect: &[r"FastIron", r"ICX"],
        scrape: &[r"(?m)^System Model:\s+(.*)"],
        timeout_ms: 1600,
    },
    ProbeSpec {
        vendor: "VyOS",
        os: "VyOS",
        name: "vyos_show_version",
        command: "show version",
        guard: GUARD_VYOS,
        expect: &[r"VyOS", r"Version"],
        scrape: &[r"(?m)^Version: (.*)"],
        timeout_ms: 1400,
    },
    ProbeSpec {
        vendor: "OpenWrt",
        os: "OpenWrt",
        name: "openwrt_release",
        command: "cat /etc/openwrt_release || uname -a",
        guard: GUARD_LINUX_SHELL,
        expect: &[r"OpenWrt", r"DISTRIB_ID"],
        scrape: &[r"(?m)^DISTRIB_DESCRIPTION='([^']+)'"],
        timeout_ms: 1200,
    },
    ProbeSpec {
        vendor: "pfSense/OPNsense",
        os: "pfSense",
        name: "pfsense_uname",
        command: "uname -a",
        guard: GUARD_LINUX_SHELL,
        expect: &[r"FreeBSD", r"pfSense"],
        scrape: &[r"FreeBSD (\S+)"],
        timeout_ms: 1200,
    },
];

/// Compile the full safe-probe catalogue, keyed by (vendor, os).
pub(crate) fn builtin_safe_probes() -> HashMap<(&'static str, &'static str), Arc<SafeProbe>> {
    PROBE_SPECS
        .iter()
        .map(|spec| {
            let probe = SafeProbe {
                name: spec.name,
                command: spec.command,
                guard: compile(spec.guard),
                expect: compile_all(spec.expect),
                scrape: compile_all(spec.scrape),
                timeout_ms: spec.timeout_ms,
            };
            ((spec.vendor, spec.os), Arc::new(probe))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_for(vendor: &str, os: &str) -> Arc<SafeProbe> {
        builtin_safe_probes()
            .get(&(vendor, os))
            .cloned()
            .unwrap_or_else(|| panic!("no probe for {vendor}/{os}"))
    }

    #[test]
    fn catalogue_compiles() {
        let probes = builtin_safe_probes();
        assert_eq!(probes.len(), PROBE_SPECS.len());
    }

    #[test]
    fn commands_are_read_only() {
        for probe in builtin_safe_probes().values() {
            let verb = probe
                .command
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .trim_start_matches('/');
            assert!(
                matches!(verb, "show" | "display" | "get" | "uname" | "cat" | "system"),
                "unexpected probe verb {verb:?} in {:?}",
                probe.command
            );
        }
    }

    #[test]
    fn cisco_guard_matches_exec_and_config_prompts() {
        let probe = probe_for("Cisco", "IOS");
        assert!(probe.guard.is_match("R1#"));
        assert!(probe.guard.is_match("R1>"));
        // The shared guard admits configuration mode; the runner's policy
        // refusal is the layer that blocks it.
        assert!(probe.guard.is_match("R1(config)#"));
        assert!(!probe.guard.is_match("login:"));
    }

    #[test]
    fn mikrotik_guard_matches_bracket_prompt() {
        let probe = probe_for("MikroTik", "RouterOS");
        assert!(probe.guard.is_match("[admin@MikroTik] >"));
        assert!(!probe.guard.is_match("R1#"));
    }

    #[test]
    fn score_boosts_on_expect_match() {
        let probe = probe_for("Cisco", "IOS");
        let output = "Cisco IOS Software, C2960 Software\nConfiguration register is 0xF";
        assert_eq!(probe.score(output), PROBE_EXPECT_BOOST);
        assert_eq!(probe.score("garbage"), 0.0);
    }

    #[test]
    fn scrape_model_from_probe_output() {
        let probe = probe_for("MikroTik", "RouterOS");
        let output = "uptime: 2w3d\nboard-name: CRS328-24P-4S+\nversion: 7.10";
        assert_eq!(probe.scrape_model(output).as_deref(), Some("CRS328-24P-4S+"));
        assert_eq!(probe.scrape_model("no model here"), None);
    }

    #[test]
    fn scrape_model_trims_whitespace() {
        let probe = probe_for("Juniper", "JUNOS");
        assert_eq!(
            probe.scrape_model("Model: mx204 \nJunos: 21.2R1").as_deref(),
            Some("mx204")
        );
    }
}
