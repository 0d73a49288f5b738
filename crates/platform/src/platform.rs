//! Production wiring of the control plane.

use std::sync::Arc;

use tracing::info;

use perimeter_common::PerimeterResult;
use perimeter_config::{Config, FileUserConfig};

use crate::access::AccessManager;
use crate::certificate::{CertificateScheduler, CertificateStrategy, CommandIssuer};
use crate::gateway::{GatewayProvisioner, RandomSecretGenerator, TemplateRenderer};
use crate::hooks::HookTrigger;
use crate::network::InterfaceNetworkInfo;
use crate::redirect::HttpRedirectClient;
use crate::systemd::Systemctl;

/// The three control plane components sharing one user config store
#[derive(Debug)]
pub struct Platform {
    pub user_config: Arc<FileUserConfig>,
    pub access: AccessManager,
    pub certificate: Arc<CertificateStrategy>,
    pub gateway: GatewayProvisioner,
    check_interval: std::time::Duration,
}

impl Platform {
    /// Build every component with its production collaborators
    pub fn from_config(config: &Config) -> PerimeterResult<Self> {
        let user_config = Arc::new(FileUserConfig::open(&config.platform.user_config)?);
        let network = Arc::new(InterfaceNetworkInfo::from_config(&config.network)?);
        // Probes are run by the redirect service from outside the network
        let redirect = Arc::new(HttpRedirectClient::new(&config.redirect, user_config.clone())?);

        let access = AccessManager::new(
            network.clone(),
            redirect.clone(),
            redirect,
            Arc::new(HookTrigger::new(config.platform.hooks_dir.clone())),
            user_config.clone(),
        )
        .with_web_access_port(config.platform.web_access_port);

        let certificate = Arc::new(CertificateStrategy::new(
            user_config.clone(),
            network,
            Arc::new(CommandIssuer::from_config(&config.certificate)),
        ));

        let gateway = GatewayProvisioner::new(
            &config.gateway,
            user_config.clone(),
            Arc::new(RandomSecretGenerator::new()),
            Arc::new(TemplateRenderer::new()?),
            Arc::new(Systemctl::new(&config.systemd)),
        );

        info!(
            user_config = %config.platform.user_config.display(),
            "Control plane initialized"
        );

        Ok(Self {
            user_config,
            access,
            certificate,
            gateway,
            check_interval: config.certificate.check_interval(),
        })
    }

    /// Scheduler running the certificate strategy at the configured interval
    pub fn certificate_scheduler(&self) -> CertificateScheduler {
        CertificateScheduler::new(self.certificate.clone()).with_interval(self.check_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perimeter_config::UserConfig;
    use tempfile::TempDir;

    #[test]
    fn test_from_config() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.platform.user_config = dir.path().join("user.json");
        config.certificate.check_interval_secs = 600;

        let platform = Platform::from_config(&config).unwrap();
        assert_eq!(platform.user_config.device_domain(), "localhost");
        assert_eq!(
            platform.certificate_scheduler().check_interval(),
            std::time::Duration::from_secs(600)
        );
    }
}
