//! Signature registry
//!
//! The registry is the immutable table of per-vendor signatures the
//! scorer walks. It is constructed explicitly with
//! [`SignatureRegistry::builtin`] and handed around by reference — no
//! global registration, so parallel tests each get their own copy.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::pattern::{compile_all, LabeledPattern};
use crate::safe_probe::{builtin_safe_probes, SafeProbe};

/// Identifying characteristics for one (vendor, OS) platform.
#[derive(Debug)]
pub struct Signature {
    /// Vendor display string; (vendor, os) is the unique key.
    pub vendor: &'static str,
    /// OS display string.
    pub os: &'static str,
    /// Small fixed prior added to every match, in [0, 0.15].
    pub base_weight: f64,
    /// Banner patterns matched against the full RX text.
    pub pre_login: Vec<LabeledPattern>,
    /// Login-line patterns matched against the full RX text.
    pub login: Vec<LabeledPattern>,
    /// Prompt patterns matched against the last non-empty RX line.
    pub prompt: Vec<LabeledPattern>,
    /// Ordered regexes whose first capture group yields a model string.
    pub version_scrape: Vec<Regex>,
    /// Guarded read-only probe for this platform, if catalogued.
    pub safe_probe: Option<Arc<SafeProbe>>,
}

impl Signature {
    /// First model string scraped from `text` by the version patterns.
    pub fn scrape_model(&self, text: &str) -> Option<String> {
        for re in &self.version_scrape {
            if let Some(caps) = re.captures(text) {
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

/// The immutable signature table.
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    signatures: Vec<Signature>,
}

impl SignatureRegistry {
    /// Build the full built-in catalogue. Compiles every pattern once;
    /// the result is read-only and safe to share across threads.
    pub fn builtin() -> Self {
        let probes = builtin_safe_probes();
        let probe = |vendor: &'static str, os: &'static str| probes.get(&(vendor, os)).cloned();

        let mut signatures = Vec::new();

        signatures.push(Signature {
            vendor: "Cisco",
            os: "IOS",
            base_weight: 0.05,
            pre_login: vec![
                LabeledPattern::new("User Access Verification", r"User Access Verification"),
                LabeledPattern::new("Cisco IOS banner", r"Cisco IOS"),
            ],
            login: vec![
                LabeledPattern::new("Username prompt", r"(?i)^username:"),
                LabeledPattern::new("Password prompt", r"(?i)^password:"),
            ],
            prompt: vec![LabeledPattern::new(
                "Cisco IOS prompt",
                r"(?m)^([A-Za-z0-9._-]+)(\((config[^\)]*)\))?[#>] ?$",
            )],
            version_scrape: compile_all(&[
                r"(?m)^[Cc]isco (Catalyst|Switch|Router)\s+([A-Z0-9-]+)",
                r"(?m)^Model number\s+:\s+(\S+)",
            ]),
            safe_probe: probe("Cisco", "IOS"),
        });

        signatures.push(Signature {
            vendor: "Cisco",
            os: "IOS-XE",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("Cisco IOS-XE", r"IOS[- ]XE")],
            login: vec![LabeledPattern::new("Username prompt", r"(?i)^username:")],
            prompt: vec![LabeledPattern::new(
                "Cisco IOS prompt",
                r"(?m)^([A-Za-z0-9._-]+)(\((config[^\)]*)\))?[#>] ?$",
            )],
            version_scrape: compile_all(&[r"(?m)^Cisco (\S+) Software", r"(?m)^cisco (\S+) \("]),
            safe_probe: probe("Cisco", "IOS-XE"),
        });

        signatures.push(Signature {
            vendor: "Cisco",
            os: "NX-OS",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new(
                "Cisco Nexus",
                r"Cisco Nexus Operating System",
            )],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new("NX-OS prompt", r"(?m)^(Nexus|switch)[#>] ?$")],
            version_scrape: compile_all(&[
                r"(?m)^\s*(cisco Nexus .*?)$",
                r"(?m)^Hardware\s+:\s+(.*)",
            ]),
            safe_probe: probe("Cisco", "NX-OS"),
        });

        signatures.push(Signature {
            vendor: "Cisco",
            os: "IOS-XR",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("IOS XR", r"IOS XR")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new("IOS XR prompt", r"(?m)^RP/\d+/\S+:\S+# ?$")],
            version_scrape: compile_all(&[r"(?m)^cisco IOS XR Software, Version ([\w.\-]+)"]),
            safe_probe: probe("Cisco", "IOS-XR"),
        });

        signatures.push(Signature {
            vendor: "Cisco",
            os: "ASA",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new(
                "Cisco ASA",
                r"Cisco Adaptive Security Appliance",
            )],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new(
                "ASA prompt",
                r"(?m)^ciscoasa(?:\([^\)]*\))?[#>] ?$",
            )],
            version_scrape: compile_all(&[r"(?m)^Hardware\s+:\s+(.*)"]),
            safe_probe: probe("Cisco", "ASA"),
        });

        signatures.push(Signature {
            vendor: "Aruba",
            os: "AOS-CX",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("ArubaOS-CX", r"ArubaOS-CX")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new(
                "Aruba CX prompt",
                r"(?mi)^(mgr|admin|[A-Za-z0-9._-]+)# ?$",
            )],
            version_scrape: compile_all(&[r"(?m)^Platform :\s+(.*)"]),
            safe_probe: probe("Aruba", "AOS-CX"),
        });

        signatures.push(Signature {
            vendor: "Aruba",
            os: "AOS-S",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new(
                "ArubaOS-S",
                r"Aruba 2930F|ProCurve|ArubaOS-S",
            )],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new(
                "Aruba AOS-S prompt",
                r"(?m)^(HP|Aruba|ProCurve)[\w\-]*[>#] ?$",
            )],
            version_scrape: compile_all(&[r"(?m)^Image stamp: (.*)", r"(?m)^ROM Version : (.*)"]),
            safe_probe: probe("Aruba", "AOS-S"),
        });

        signatures.push(Signature {
            vendor: "Juniper",
            os: "JUNOS",
            base_weight: 0.05,
            pre_login: vec![
                LabeledPattern::new("JUNOS", r"JUNOS"),
                LabeledPattern::new("Amnesiac", r"Amnesiac"),
            ],
            login: vec![LabeledPattern::new("login:", r"(?i)^login:")],
            prompt: vec![LabeledPattern::new(
                "Junos prompt",
                r"(?m)^[\w\-]+@[\w\-.]+[>#] ?$",
            )],
            version_scrape: compile_all(&[r"(?m)^Model:\s+(\S+)"]),
            safe_probe: probe("Juniper", "JUNOS"),
        });

        signatures.push(Signature {
            vendor: "MikroTik",
            os: "RouterOS",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("RouterOS", r"MikroTik RouterOS")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new(
                "MikroTik prompt",
                r"(?m)^\[[^\]]+\]\s?> ?$",
            )],
            version_scrape: compile_all(&[r"(?m)^\s*board-name:\s+(.*)"]),
            safe_probe: probe("MikroTik", "RouterOS"),
        });

        signatures.push(Signature {
            vendor: "Ubiquiti",
            os: "EdgeOS",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("EdgeOS", r"Welcome to EdgeOS")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new(
                "EdgeOS prompt",
                r"(?m)^[\w\-]+@[\w\-.]+(:~)?[$#] ?$",
            )],
            version_scrape: compile_all(&[r"(?m)^Linux (\S+)"]),
            safe_probe: probe("Ubiquiti", "EdgeOS"),
        });

        signatures.push(Signature {
            vendor: "Fortinet",
            os: "FortiOS",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("FortiGate", r"FortiGate")],
            login: vec![LabeledPattern::new("FortiGate login", r"FortiGate-\w+ login:")],
            prompt: vec![LabeledPattern::new(
                "FortiGate prompt",
                r"(?m)^FGT\w*\s?[#>] ?$",
            )],
            version_scrape: compile_all(&[r"(?m)^Version:\s+(.*)"]),
            safe_probe: probe("Fortinet", "FortiOS"),
        });

        signatures.push(Signature {
            vendor: "PaloAlto",
            os: "PAN-OS",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("PA banner", r"PA-\d+")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new(
                "PAN-OS prompt",
                r"(?m)^[\w\-]+@PA-\w+[>#] ?$",
            )],
            version_scrape: compile_all(&[r"(?m)^model:\s+(\S+)"]),
            safe_probe: probe("PaloAlto", "PAN-OS"),
        });

        signatures.push(Signature {
            vendor: "Huawei",
            os: "VRP",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("Huawei VRP", r"HUAWEI")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new(
                "VRP prompt",
                r"(?m)^(<[Hh][PpEe]?[^>]*>|\[[Hh].*?\])$",
            )],
            version_scrape: compile_all(&[
                r"(?m)^Product Version: (.*)",
                r"(?m)^Huawei Versatile Routing Platform Software \(VRP\) (.*)",
            ]),
            safe_probe: probe("Huawei", "VRP"),
        });

        signatures.push(Signature {
            vendor: "HPE",
            os: "Comware",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("Comware", r"Comware")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new(
                "Comware prompt",
                r"(?m)^((<|\[)HPE?.*?(>|\]))$",
            )],
            version_scrape: compile_all(&[
                r"(?m)^System Name: (.*)",
                r"(?m)^HP Comware Platform Software, Version (.*)",
            ]),
            safe_probe: probe("HPE", "Comware"),
        });

        signatures.push(Signature {
            vendor: "Dell",
            os: "OS10",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("Dell OS10", r"Dell EMC Networking OS10")],
            login: Vec::new(),
            prompt: vec![
                LabeledPattern::new("Dell prompt", r"(?m)^Dell\w*[#>] ?$"),
                LabeledPattern::new("Generic shell", r"(?m)^.*[>#] ?$"),
            ],
            version_scrape: compile_all(&[r"(?m)^Product:\s+(.*)"]),
            safe_probe: probe("Dell", "OS10"),
        });

        signatures.push(Signature {
            vendor: "Brocade/Extreme",
            os: "FastIron",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("FastIron", r"FastIron")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new(
                "ICX prompt",
                r"(?m)^(ICX|BR-CD|FastIron).*?[#>] ?$",
            )],
            version_scrape: compile_all(&[r"(?m)^System Model:\s+(.*)"]),
            safe_probe: probe("Brocade/Extreme", "FastIron"),
        });

        signatures.push(Signature {
            vendor: "VyOS",
            os: "VyOS",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("VyOS login", r"vyos login:")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new("VyOS prompt", r"(?m)^vyos@.*[$#] ?$")],
            version_scrape: compile_all(&[r"(?m)^Version: (.*)"]),
            safe_probe: probe("VyOS", "VyOS"),
        });

        signatures.push(Signature {
            vendor: "OpenWrt",
            os: "OpenWrt",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("OpenWrt", r"OpenWrt")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new("OpenWrt prompt", r"(?m)^root@OpenWrt:~#$")],
            version_scrape: compile_all(&[r"(?m)^DISTRIB_DESCRIPTION='([^']+)'"]),
            safe_probe: probe("OpenWrt", "OpenWrt"),
        });

        signatures.push(Signature {
            vendor: "pfSense/OPNsense",
            os: "pfSense",
            base_weight: 0.05,
            pre_login: vec![LabeledPattern::new("pfSense", r"pfSense")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new("pfSense prompt", r"(?m)^root@pfSense:~ #$")],
            version_scrape: compile_all(&[r"(?m)^FreeBSD (\S+)"]),
            safe_probe: probe("pfSense/OPNsense", "pfSense"),
        });

        signatures.push(Signature {
            vendor: "Bootloader",
            os: "U-Boot",
            base_weight: 0.1,
            pre_login: vec![LabeledPattern::new("U-Boot", r"\bU-Boot\b")],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new("U-Boot prompt", r"(?m)^=> ?$")],
            version_scrape: compile_all(&[r"U-Boot\s+(\S+)"]),
            safe_probe: None,
        });

        signatures.push(Signature {
            vendor: "Bootloader",
            os: "ROMMON",
            base_weight: 0.1,
            pre_login: vec![
                LabeledPattern::new("ROMMON", r"ROMMON"),
                LabeledPattern::new("System Bootstrap", r"System Bootstrap"),
            ],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new("rommon prompt", r"(?m)^rommon \d+ >$")],
            version_scrape: Vec::new(),
            safe_probe: None,
        });

        signatures.push(Signature {
            vendor: "Bootloader",
            os: "GRUB",
            base_weight: 0.1,
            pre_login: vec![LabeledPattern::new("GNU GRUB", r"GNU GRUB")],
            login: Vec::new(),
            prompt: Vec::new(),
            version_scrape: Vec::new(),
            safe_probe: None,
        });

        signatures.push(Signature {
            vendor: "Linux/BusyBox",
            os: "Linux",
            base_weight: 0.05,
            pre_login: vec![
                LabeledPattern::new("BusyBox", r"BusyBox"),
                LabeledPattern::new("Linux", r"Linux version"),
            ],
            login: Vec::new(),
            prompt: vec![LabeledPattern::new("Shell prompt", r"(?m)^.*[$#] ?$")],
            version_scrape: compile_all(&[r"Linux (\S+)"]),
            safe_probe: probe("Linux/BusyBox", "Linux"),
        });

        debug!(count = signatures.len(), "built signature registry");
        Self { signatures }
    }

    /// All signatures, in registration order.
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Number of registered signatures.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Find a signature by its (vendor, os) key.
    pub fn lookup(&self, vendor: &str, os: &str) -> Option<&Signature> {
        self.signatures
            .iter()
            .find(|sig| sig.vendor == vendor && sig.os == os)
    }

    /// Scrape a model string from `text` using the named signature's
    /// version patterns.
    pub fn scrape_model(&self, vendor: &str, os: &str, text: &str) -> Option<String> {
        self.lookup(vendor, os)?.scrape_model(text)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn builtin_has_unique_keys() {
        let registry = SignatureRegistry::builtin();
        let mut keys = HashSet::new();
        for sig in registry.signatures() {
            assert!(
                keys.insert((sig.vendor, sig.os)),
                "duplicate signature {}/{}",
                sig.vendor,
                sig.os
            );
        }
        assert_eq!(registry.len(), 23);
    }

    #[test]
    fn base_weights_are_small_priors() {
        for sig in SignatureRegistry::builtin().signatures() {
            assert!(
                (0.0..=0.15).contains(&sig.base_weight),
                "{}/{} weight {} out of range",
                sig.vendor,
                sig.os,
                sig.base_weight
            );
        }
    }

    #[test]
    fn every_signature_has_a_pattern() {
        for sig in SignatureRegistry::builtin().signatures() {
            assert!(
                !sig.pre_login.is_empty() || !sig.login.is_empty() || !sig.prompt.is_empty(),
                "{}/{} has no patterns at all",
                sig.vendor,
                sig.os
            );
        }
    }

    #[test]
    fn lookup_finds_cisco() {
        let registry = SignatureRegistry::builtin();
        let sig = registry.lookup("Cisco", "IOS").unwrap();
        assert!(sig.safe_probe.is_some());
        assert!(registry.lookup("Cisco", "CatOS").is_none());
    }

    #[test]
    fn cisco_model_scrape_prefers_model_number_line() {
        let registry = SignatureRegistry::builtin();
        let probe_out = "Switch Ports Model\nModel number          : WS-C2960-24TT-L\n";
        assert_eq!(
            registry.scrape_model("Cisco", "IOS", probe_out).as_deref(),
            Some("WS-C2960-24TT-L")
        );
    }

    #[test]
    fn bootloaders_have_no_safe_probe() {
        let registry = SignatureRegistry::builtin();
        for os in ["U-Boot", "ROMMON", "GRUB"] {
            assert!(registry.lookup("Bootloader", os).unwrap().safe_probe.is_none());
        }
    }
}
