//! VBoxManage process execution with timeout control and error
//! classification.

use crowdvm_core::{SurfaceError, SurfaceResult};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured output of a completed VBoxManage invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs VBoxManage with a per-call time budget.
#[derive(Debug, Clone)]
pub struct VboxCommandRunner {
    vboxmanage: String,
    default_timeout: Duration,
}

impl VboxCommandRunner {
    pub fn new(vboxmanage: impl Into<String>, default_timeout: Duration) -> Self {
        Self {
            vboxmanage: vboxmanage.into(),
            default_timeout,
        }
    }

    /// Run with the default per-call timeout.
    pub async fn run(&self, args: &[&str]) -> SurfaceResult<CommandOutput> {
        self.run_with_timeout(args, self.default_timeout).await
    }

    /// Run with an explicit timeout (slow operations: VM start, snapshot
    /// restore).
    pub async fn run_with_timeout(
        &self,
        args: &[&str],
        timeout: Duration,
    ) -> SurfaceResult<CommandOutput> {
        debug!(program = %self.vboxmanage, ?args, "running VBoxManage");

        let child = Command::new(&self.vboxmanage)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(program = %self.vboxmanage, ?args, ?timeout, "VBoxManage call timed out");
                return Err(SurfaceError::Timeout(timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(classify_failure(&stderr));
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Map a non-zero VBoxManage exit to a surface error. The "machine is
/// not running" shape is what the executor's recovery path keys on.
pub(crate) fn classify_failure(stderr: &str) -> SurfaceError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("is not currently running")
        || lower.contains("machine is not running")
        || lower.contains("not powered up")
    {
        return SurfaceError::NotRunning;
    }

    let first_line = stderr
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("VBoxManage failed")
        .trim()
        .to_string();
    SurfaceError::Command(first_line)
}
