//! systemd service control.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use perimeter_common::{PerimeterError, PerimeterResult, ServiceName};
use perimeter_config::SystemdConfig;

use crate::gateway::ServiceManager;

/// Drives units through `systemctl`
///
/// Services are addressed by their platform name; the unit name is
/// `<prefix><service>.service`.
#[derive(Debug, Clone)]
pub struct Systemctl {
    program: PathBuf,
    unit_prefix: String,
}

impl Systemctl {
    pub fn new(config: &SystemdConfig) -> Self {
        Self {
            program: PathBuf::from("systemctl"),
            unit_prefix: config.unit_prefix.clone(),
        }
    }

    /// Use a different `systemctl` binary
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn unit_name(&self, service: &ServiceName) -> String {
        format!("{}{}.service", self.unit_prefix, service)
    }

    pub async fn restart(&self, service: &ServiceName) -> PerimeterResult<()> {
        self.run("restart", service).await
    }

    async fn run(&self, action: &str, service: &ServiceName) -> PerimeterResult<()> {
        let unit = self.unit_name(service);
        debug!(action, unit = %unit, "Running systemctl");

        let output = Command::new(&self.program)
            .arg(action)
            .arg(&unit)
            .output()
            .await
            .map_err(|e| PerimeterError::restart(service.as_str(), e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(action, unit = %unit, status = %output.status, "systemctl failed");
            return Err(PerimeterError::restart(
                service.as_str(),
                format!("systemctl {} {}: {} {}", action, unit, output.status, stderr.trim()),
            ));
        }

        info!(action, unit = %unit, "systemctl completed");
        Ok(())
    }
}

#[async_trait]
impl ServiceManager for Systemctl {
    async fn restart_service(&self, service: &str) -> PerimeterResult<()> {
        self.restart(&ServiceName::new(service)).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_unit_name() {
        let systemctl = Systemctl::new(&SystemdConfig::default());
        assert_eq!(
            systemctl.unit_name(&ServiceName::new("platform.authelia")),
            "snap.platform.authelia.service"
        );
    }

    #[tokio::test]
    async fn test_successful_restart() {
        let systemctl = Systemctl::new(&SystemdConfig::default()).with_program("true");
        systemctl.restart_service("platform.authelia").await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_restart() {
        let systemctl = Systemctl::new(&SystemdConfig::default()).with_program("false");
        let err = systemctl
            .restart_service("platform.authelia")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PerimeterError::Restart { ref service, .. } if service == "platform.authelia"
        ));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let systemctl =
            Systemctl::new(&SystemdConfig::default()).with_program("/nonexistent/systemctl");
        let err = systemctl.restart_service("x").await.unwrap_err();
        assert!(matches!(err, PerimeterError::Restart { .. }));
    }
}
