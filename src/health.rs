//! Preflight checks for aptsentry
//!
//! A sweep only starts when the process runs as root, the sources directory
//! exists and the network is reachable. The retired directory is informative
//! only; it is created on demand.

use crate::probe::ServiceProber;
use crate::Config;
use std::path::Path;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Effective user is root
    pub privilege: CheckResult,
    /// Active sources directory status
    pub sources_dir: CheckResult,
    /// General internet reachability
    pub network: CheckResult,
    /// Retired directory status (warning only, not required)
    pub retired_dir: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    pub fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    pub fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    pub fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks
    pub async fn run(config: &Config, service: &dyn ServiceProber) -> Self {
        Self {
            privilege: Self::check_privilege(),
            sources_dir: Self::check_sources_dir(config),
            network: Self::check_network(config, service).await,
            retired_dir: Self::check_retired_dir(config),
        }
    }

    /// Required checks in order, stopping at the first failure.
    ///
    /// Unlike [`HealthCheck::run`] no network probe is made once an earlier
    /// check has failed.
    pub async fn preflight(
        config: &Config,
        service: &dyn ServiceProber,
    ) -> std::result::Result<(), CheckResult> {
        let privilege = Self::check_privilege();
        if !privilege.passed {
            return Err(privilege);
        }

        let sources_dir = Self::check_sources_dir(config);
        if !sources_dir.passed {
            return Err(sources_dir);
        }

        let network = Self::check_network(config, service).await;
        if !network.passed {
            return Err(network);
        }

        Ok(())
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.privilege.passed && self.sources_dir.passed && self.network.passed
    }

    /// Get list of failed checks (errors only, not warnings)
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| !r.passed && !r.is_warning)
            .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| r.is_warning)
            .collect()
    }

    /// Whether the process may rewrite the sources directory
    pub fn check_privilege() -> CheckResult {
        Self::privilege_result(nix::unistd::geteuid().is_root())
    }

    fn privilege_result(is_root: bool) -> CheckResult {
        if is_root {
            CheckResult::ok("Running as root")
        } else {
            CheckResult::error_with_details(
                "This program must be run as root.",
                "Re-run with sudo",
            )
        }
    }

    /// Check the active sources directory exists
    fn check_sources_dir(config: &Config) -> CheckResult {
        let dir = config.sources_directory();
        if dir.is_dir() {
            CheckResult::ok_with_details("Sources directory exists", dir.display().to_string())
        } else {
            CheckResult::error(format!("Our repo folder {} is missing.", dir.display()))
        }
    }

    async fn check_network(config: &Config, service: &dyn ServiceProber) -> CheckResult {
        let url = &config.probe.connectivity_url;
        if service.is_online(url).await {
            CheckResult::ok_with_details("Network connectivity", url.clone())
        } else {
            CheckResult::error_with_details(
                "We have no network connectivity!",
                format!("Could not reach {}", url),
            )
        }
    }

    fn check_retired_dir(config: &Config) -> CheckResult {
        let dir = config.retired_directory();
        Self::retired_dir_result(&dir)
    }

    fn retired_dir_result(dir: &Path) -> CheckResult {
        if dir.is_dir() {
            CheckResult::ok_with_details("Retired directory exists", dir.display().to_string())
        } else {
            CheckResult::warning_with_details(
                "No retired folder present",
                format!("{} will be created on the first sweep", dir.display()),
            )
        }
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 4] {
        [
            ("Privileges", &self.privilege),
            ("Sources Directory", &self.sources_dir),
            ("Network", &self.network),
            ("Retired Directory", &self.retired_dir),
        ]
    }
}
