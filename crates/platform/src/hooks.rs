//! App hooks fired on access changes.
//!
//! Each installed app may ship an executable `access-change` hook:
//!
//! ```text
//! hooks/
//! ├── mail/
//! │   └── access-change
//! └── nextcloud/
//!     └── access-change
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use perimeter_common::{PerimeterError, PerimeterResult};

use crate::access::ChangeTrigger;

/// File name of the hook inside each app directory
pub const ACCESS_CHANGE_HOOK: &str = "access-change";

/// Runs every app's `access-change` hook
///
/// Hooks run one after another in app name order. Every hook runs even if
/// an earlier one failed; the notification fails if any hook failed.
#[derive(Debug, Clone)]
pub struct HookTrigger {
    hooks_dir: Option<PathBuf>,
}

impl HookTrigger {
    pub fn new(hooks_dir: Option<PathBuf>) -> Self {
        Self { hooks_dir }
    }

    /// Hooks present on disk, sorted by app name
    pub fn discover(&self) -> PerimeterResult<Vec<PathBuf>> {
        let Some(dir) = &self.hooks_dir else {
            return Ok(Vec::new());
        };
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Hooks directory missing");
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(dir)
            .map_err(|e| PerimeterError::Trigger(format!("{}: {}", dir.display(), e)))?;

        let mut hooks: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path().join(ACCESS_CHANGE_HOOK))
            .filter(|path| is_executable(path))
            .collect();
        hooks.sort();
        Ok(hooks)
    }
}

#[async_trait]
impl ChangeTrigger for HookTrigger {
    async fn notify(&self) -> PerimeterResult<()> {
        let hooks = self.discover()?;
        let mut failures = Vec::new();

        for hook in &hooks {
            debug!(hook = %hook.display(), "Running access change hook");
            match Command::new(hook).output().await {
                Ok(output) if output.status.success() => {}
                Ok(output) => {
                    warn!(
                        hook = %hook.display(),
                        status = %output.status,
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "Access change hook failed"
                    );
                    failures.push(format!("{} ({})", hook.display(), output.status));
                }
                Err(e) => {
                    warn!(hook = %hook.display(), error = %e, "Unable to run access change hook");
                    failures.push(format!("{} ({})", hook.display(), e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(PerimeterError::Trigger(failures.join(", ")));
        }

        info!(hooks = hooks.len(), "Access change hooks completed");
        Ok(())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_hook(root: &Path, app: &str, body: &str, mode: u32) -> PathBuf {
        let dir = root.join(app);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(ACCESS_CHANGE_HOOK);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_no_hooks_dir_is_noop() {
        HookTrigger::new(None).notify().await.unwrap();
        HookTrigger::new(Some(PathBuf::from("/nonexistent/hooks")))
            .notify()
            .await
            .unwrap();
    }

    #[test]
    fn test_discover_skips_non_executable() {
        let root = TempDir::new().unwrap();
        let a = write_hook(root.path(), "a-app", "exit 0", 0o755);
        write_hook(root.path(), "b-app", "exit 0", 0o644);
        let c = write_hook(root.path(), "c-app", "exit 0", 0o700);
        fs::create_dir(root.path().join("d-app")).unwrap();

        let hooks = HookTrigger::new(Some(root.path().to_path_buf()))
            .discover()
            .unwrap();
        assert_eq!(hooks, vec![a, c]);
    }

    #[tokio::test]
    async fn test_runs_every_hook() {
        let root = TempDir::new().unwrap();
        let marker = root.path().join("ran");
        write_hook(
            root.path(),
            "mail",
            &format!("echo mail >> {}", marker.display()),
            0o755,
        );
        write_hook(
            root.path(),
            "nextcloud",
            &format!("echo nextcloud >> {}", marker.display()),
            0o755,
        );

        HookTrigger::new(Some(root.path().to_path_buf()))
            .notify()
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(marker).unwrap(), "mail\nnextcloud\n");
    }

    #[tokio::test]
    async fn test_failure_reported_after_all_hooks_run() {
        let root = TempDir::new().unwrap();
        let marker = root.path().join("ran");
        write_hook(root.path(), "a-broken", "exit 2", 0o755);
        write_hook(
            root.path(),
            "b-ok",
            &format!("touch {}", marker.display()),
            0o755,
        );

        let err = HookTrigger::new(Some(root.path().to_path_buf()))
            .notify()
            .await
            .unwrap_err();

        assert!(matches!(err, PerimeterError::Trigger(_)));
        assert!(err.to_string().contains("a-broken"));
        assert!(marker.exists());
    }
}
