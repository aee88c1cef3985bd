//! Privileged host command execution.
//!
//! Mount and export are delegated to `mount(8)` and `exportfs(8)`. FUSE
//! callbacks are synchronous, so commands are driven to completion on a tokio
//! runtime handle with a hard timeout; a timed-out child is killed.

use std::process::Stdio;
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

use crate::error::{PxeBootError, Result};

/// Default limit on one external command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs host commands through a tokio runtime handle with a timeout.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    handle: Handle,
    timeout: Duration,
}

impl CommandRunner {
    /// `handle` must belong to a multi-thread runtime: `block_on` through a
    /// current-thread handle never drives the process or timer drivers.
    pub fn new(handle: Handle, timeout: Duration) -> Result<Self> {
        if matches!(handle.runtime_flavor(), RuntimeFlavor::CurrentThread) {
            return Err(PxeBootError::Config {
                msg: "command runner needs a multi-thread tokio runtime".to_string(),
            });
        }
        Ok(Self { handle, timeout })
    }

    /// Per-command limit.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `program args..`; non-zero exit, spawn failure and timeout are all
    /// errors. Must not be called from inside the runtime.
    pub fn run(&self, program: &str, args: &[String]) -> Result<()> {
        let rendered = render_command(program, args);
        debug!("exec {}", rendered);

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = self.timeout;
        let outcome = self
            .handle
            .block_on(async move { tokio::time::timeout(timeout, cmd.output()).await });

        match outcome {
            Err(_) => {
                warn!("{} timed out after {:?}", rendered, timeout);
                Err(PxeBootError::CommandTimeout {
                    command: rendered,
                    timeout,
                })
            }
            Ok(Err(e)) => Err(PxeBootError::CommandFailed {
                command: rendered,
                reason: e.to_string(),
            }),
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(PxeBootError::CommandFailed {
                    command: rendered,
                    reason: format!("{}: {}", output.status, stderr.trim()),
                })
            }
        }
    }
}

/// Command line as logged and reported in errors.
pub fn render_command(program: &str, args: &[String]) -> String {
    let mut s = program.to_string();
    for arg in args {
        s.push(' ');
        s.push_str(arg);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_command() {
        let rendered = render_command("exportfs", &args(&["-o", "rw", "10.0.0.1:/srv/x"]));
        assert_eq!(rendered, "exportfs -o rw 10.0.0.1:/srv/x");
    }

    #[test]
    fn test_current_thread_handle_is_rejected() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let result = CommandRunner::new(rt.handle().clone(), Duration::from_secs(5));
        assert!(matches!(result, Err(PxeBootError::Config { .. })));
    }

    #[test]
    fn test_successful_command() {
        let rt = runtime();
        let runner = CommandRunner::new(rt.handle().clone(), Duration::from_secs(5)).unwrap();
        assert!(runner.run("sh", &args(&["-c", "exit 0"])).is_ok());
    }

    #[test]
    fn test_failing_command_reports_stderr() {
        let rt = runtime();
        let runner = CommandRunner::new(rt.handle().clone(), Duration::from_secs(5)).unwrap();
        let err = runner
            .run("sh", &args(&["-c", "echo nope >&2; exit 3"]))
            .unwrap_err();
        match err {
            PxeBootError::CommandFailed { reason, .. } => assert!(reason.contains("nope")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_program_is_command_failure() {
        let rt = runtime();
        let runner = CommandRunner::new(rt.handle().clone(), Duration::from_secs(5)).unwrap();
        let result = runner.run("/nonexistent/pxebootfs-helper", &[]);
        assert!(matches!(result, Err(PxeBootError::CommandFailed { .. })));
    }

    #[test]
    fn test_timeout_kills_command() {
        let rt = runtime();
        let runner = CommandRunner::new(rt.handle().clone(), Duration::from_millis(100)).unwrap();
        let result = runner.run("sh", &args(&["-c", "sleep 5"]));
        assert!(matches!(result, Err(PxeBootError::CommandTimeout { .. })));
    }
}
