//! Runtime risk probing
//!
//! The orchestrator only sees a [`RuntimeRiskReport`]. How it is produced
//! lives behind [`RiskProbe`] so each target can bring its own checks.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of local debugger and tamper probing
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeRiskReport {
    /// A debugger or tracer is attached to this process
    pub debugger_attached: bool,
    /// The environment shows signs of tampering
    pub tampered: bool,
    /// Human-readable findings, tamper findings first
    pub reasons: Vec<String>,
}

impl RuntimeRiskReport {
    /// A report with nothing detected
    pub fn clean() -> Self {
        Self::default()
    }

    /// Whether agent features must be disabled
    pub fn should_degrade_capabilities(&self) -> bool {
        self.debugger_attached || self.tampered
    }
}

/// Source of runtime risk reports
pub trait RiskProbe: Send + Sync {
    /// Probe the current process and environment
    fn probe(&self) -> RuntimeRiskReport;
}

/// Probe that always returns the same report
#[derive(Clone, Debug, Default)]
pub struct StaticRiskProbe {
    report: RuntimeRiskReport,
}

impl StaticRiskProbe {
    /// Always report `report`
    pub fn new(report: RuntimeRiskReport) -> Self {
        StaticRiskProbe { report }
    }

    /// Always report a clean environment
    pub fn clean() -> Self {
        Self::default()
    }
}

impl RiskProbe for StaticRiskProbe {
    fn probe(&self) -> RuntimeRiskReport {
        self.report.clone()
    }
}

/// Checks for the platform this binary was built for
#[derive(Clone, Debug)]
pub struct PlatformRiskProbe {
    /// Files whose presence indicates a compromised device
    pub indicator_paths: Vec<PathBuf>,
    /// Environment variables used for dynamic library injection
    pub injection_env_vars: Vec<String>,
    /// A path outside the sandbox; being able to write it is a finding
    pub sandbox_probe_path: Option<PathBuf>,
}

impl PlatformRiskProbe {
    /// Probe with an explicit check set
    pub fn new(
        indicator_paths: Vec<PathBuf>,
        injection_env_vars: Vec<String>,
        sandbox_probe_path: Option<PathBuf>,
    ) -> Self {
        PlatformRiskProbe {
            indicator_paths,
            injection_env_vars,
            sandbox_probe_path,
        }
    }

    fn tamper_findings(&self) -> Vec<String> {
        let mut reasons = Vec::new();

        for path in &self.indicator_paths {
            if path.exists() {
                reasons.push(format!("Suspicious path found: {}", path.display()));
            }
        }

        if let Some(probe_path) = &self.sandbox_probe_path {
            if std::fs::write(probe_path, b"probe").is_ok() {
                let _ = std::fs::remove_file(probe_path);
                reasons.push("Sandbox escape probe succeeded".to_string());
            }
        }

        if self
            .injection_env_vars
            .iter()
            .any(|var| std::env::var_os(var).is_some())
        {
            reasons.push("Dynamic library injection detected".to_string());
        }

        reasons
    }
}

impl Default for PlatformRiskProbe {
    fn default() -> Self {
        #[cfg(target_os = "ios")]
        let (paths, sandbox) = (
            [
                "/Applications/Cydia.app",
                "/Library/MobileSubstrate/MobileSubstrate.dylib",
                "/bin/bash",
                "/usr/sbin/sshd",
                "/etc/apt",
            ]
            .iter()
            .map(PathBuf::from)
            .collect(),
            Some(PathBuf::from("/private/wakeline_jailbreak_probe.txt")),
        );
        #[cfg(not(target_os = "ios"))]
        let (paths, sandbox) = (Vec::new(), None);

        #[cfg(any(target_os = "macos", target_os = "ios"))]
        let env_vars = vec!["DYLD_INSERT_LIBRARIES".to_string()];
        #[cfg(target_os = "linux")]
        let env_vars = vec!["LD_PRELOAD".to_string()];
        #[cfg(not(any(target_os = "macos", target_os = "ios", target_os = "linux")))]
        let env_vars = Vec::new();

        Self::new(paths, env_vars, sandbox)
    }
}

impl RiskProbe for PlatformRiskProbe {
    fn probe(&self) -> RuntimeRiskReport {
        let mut reasons = self.tamper_findings();
        let tampered = !reasons.is_empty();
        let debugger_attached = debugger_attached();
        if debugger_attached {
            reasons.push("Debugger attached".to_string());
        }

        RuntimeRiskReport {
            debugger_attached,
            tampered,
            reasons,
        }
    }
}

/// `TracerPid` is non-zero while a ptrace tracer is attached
#[cfg(target_os = "linux")]
fn debugger_attached() -> bool {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status
                .lines()
                .find_map(|line| line.strip_prefix("TracerPid:"))
                .map(|pid| pid.trim() != "0")
        })
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn debugger_attached() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrade_flag() {
        assert!(!RuntimeRiskReport::clean().should_degrade_capabilities());
        let report = RuntimeRiskReport {
            debugger_attached: true,
            ..Default::default()
        };
        assert!(report.should_degrade_capabilities());
        let report = RuntimeRiskReport {
            tampered: true,
            ..Default::default()
        };
        assert!(report.should_degrade_capabilities());
    }

    #[test]
    fn test_indicator_path_detected() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("Cydia.app");
        std::fs::write(&marker, b"").unwrap();

        let probe = PlatformRiskProbe::new(
            vec![marker.clone(), dir.path().join("absent")],
            Vec::new(),
            None,
        );
        let report = probe.probe();

        assert!(report.tampered);
        assert!(report.should_degrade_capabilities());
        assert_eq!(
            report.reasons[0],
            format!("Suspicious path found: {}", marker.display())
        );
    }

    #[test]
    fn test_injection_env_var_detected() {
        std::env::set_var("WAKELINE_TEST_INJECTED_LIBRARY", "/tmp/hook.so");
        let probe = PlatformRiskProbe::new(
            Vec::new(),
            vec!["WAKELINE_TEST_INJECTED_LIBRARY".to_string()],
            None,
        );
        let report = probe.probe();
        std::env::remove_var("WAKELINE_TEST_INJECTED_LIBRARY");

        assert!(report.tampered);
        assert!(report
            .reasons
            .contains(&"Dynamic library injection detected".to_string()));
    }

    #[test]
    fn test_sandbox_probe_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let probe_path = dir.path().join("probe.txt");
        let probe = PlatformRiskProbe::new(Vec::new(), Vec::new(), Some(probe_path.clone()));

        let report = probe.probe();
        assert!(report.tampered);
        assert!(!probe_path.exists());
    }

    #[test]
    fn test_static_probe() {
        let report = RuntimeRiskReport {
            debugger_attached: true,
            tampered: false,
            reasons: vec!["Debugger attached".to_string()],
        };
        assert_eq!(StaticRiskProbe::new(report.clone()).probe(), report);
        assert_eq!(StaticRiskProbe::clean().probe(), RuntimeRiskReport::clean());
    }
}
