//! Process-backed gate capabilities
//!
//! The link probe greps the routing table for the VPN adapter name; the
//! controller spawns the connection manager executable.

use super::{GateController, LinkProbe};
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::{Child, Output, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Time allowed for one routing table dump
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a command to completion on a current-thread runtime.
///
/// The child is killed when it outlives `timeout`, in which case `None` is
/// returned.
fn run_with_timeout(mut command: Command, timeout: Duration) -> std::io::Result<Option<Output>> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match tokio::time::timeout(timeout, command.output()).await {
            Ok(output) => output.map(Some),
            Err(_) => Ok(None),
        }
    })
}

// ============================================================================
// Link Probe
// ============================================================================

/// Probe that looks for the VPN adapter in `route print` output
#[derive(Debug, Clone)]
pub struct RouteTableProbe {
    program: String,
    args: Vec<String>,
    adapter_name: String,
}

impl RouteTableProbe {
    /// Probe `route print` for the given adapter name
    pub fn new(adapter_name: impl Into<String>) -> Self {
        Self::with_command("route", ["print"], adapter_name)
    }

    /// Probe an arbitrary command's output for the adapter name
    pub fn with_command<I, S>(
        program: impl Into<String>,
        args: I,
        adapter_name: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            adapter_name: adapter_name.into(),
        }
    }
}

impl LinkProbe for RouteTableProbe {
    fn is_connected(&self) -> bool {
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        match run_with_timeout(command, PROBE_TIMEOUT) {
            Ok(Some(output)) => String::from_utf8_lossy(&output.stdout).contains(&self.adapter_name),
            Ok(None) => {
                debug!(program = %self.program, "Link probe timed out");
                false
            }
            Err(e) => {
                debug!(program = %self.program, "Link probe failed: {e}");
                false
            }
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Controller for the GlobalProtect client executable
#[derive(Debug)]
pub struct GlobalProtectController {
    path: PathBuf,
    manager: Mutex<Option<Child>>,
}

impl GlobalProtectController {
    /// Create a controller for the executable at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            manager: Mutex::new(None),
        }
    }

    /// Collect the launched manager if it has exited
    fn reap(&self) {
        let Ok(mut manager) = self.manager.lock() else {
            return;
        };
        let exited = match manager.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => {
                debug!(%status, "Connection manager exited");
                true
            }
            Some(Ok(None)) => {
                debug!("Connection manager still running");
                false
            }
            Some(Err(e)) => {
                debug!("Could not poll connection manager: {e}");
                false
            }
            None => false,
        };
        if exited {
            *manager = None;
        }
    }
}

impl Drop for GlobalProtectController {
    fn drop(&mut self) {
        self.reap();
    }
}

impl GateController for GlobalProtectController {
    fn launch(&self) -> Result<()> {
        self.reap();

        let child = std::process::Command::new(&self.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::GateLaunch {
                path: self.path.display().to_string(),
                message: if e.kind() == std::io::ErrorKind::NotFound {
                    "executable not found".to_string()
                } else {
                    e.to_string()
                },
            })?;

        if let Ok(mut manager) = self.manager.lock() {
            *manager = Some(child);
        }
        Ok(())
    }

    fn disconnect(&self, timeout: Duration) -> Result<()> {
        let mut command = Command::new(&self.path);
        command.arg("-d");

        let result = run_with_timeout(command, timeout);
        self.reap();

        match result? {
            Some(output) if output.status.success() => Ok(()),
            Some(output) => Err(Error::Other(format!(
                "disconnect command exited with {}",
                output.status
            ))),
            None => Err(Error::Other(format!(
                "disconnect command timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }
}
