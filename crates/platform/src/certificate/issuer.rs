//! Certificate issuance through an external command.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use perimeter_common::{PerimeterError, PerimeterResult};
use perimeter_config::CertificateConfig;

use super::strategy::CertificateIssuer;

/// Runs the configured issue command.
///
/// With no command configured, a request is only logged.
#[derive(Debug, Clone)]
pub struct CommandIssuer {
    program: Option<PathBuf>,
    args: Vec<String>,
}

impl CommandIssuer {
    pub fn new(program: Option<PathBuf>, args: Vec<String>) -> Self {
        Self { program, args }
    }

    pub fn from_config(config: &CertificateConfig) -> Self {
        Self::new(config.issue_command.clone(), config.issue_args.clone())
    }
}

#[async_trait]
impl CertificateIssuer for CommandIssuer {
    async fn request_public(&self) -> PerimeterResult<()> {
        let Some(program) = &self.program else {
            warn!("No certificate issue command configured, skipping request");
            return Ok(());
        };

        debug!(
            program = %program.display(),
            args = ?self.args,
            "Running certificate issue command"
        );

        let output = Command::new(program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| {
                PerimeterError::Certificate(format!(
                    "failed to run {}: {}",
                    program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PerimeterError::Certificate(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            )));
        }

        info!(program = %program.display(), "Certificate issue command completed");
        Ok(())
    }
}
