//! Subprocess supervision for one sync invocation.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use synctide_core::config::SyncMode;

use crate::cancel::CancelFlag;
use crate::error::{io_err, EngineError};

/// Default sync tool binary, resolved through `PATH`.
pub const DEFAULT_TOOL: &str = "rclone";

/// How long a terminated child gets to exit before the forced kill.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Seam between the orchestrator and the subprocess layer.
pub trait Executor {
    /// Run one sync job to completion, returning the child's exit code.
    fn run(&self, mode: SyncMode, src: &str, dst: &str, flags: &[String])
        -> Result<i32, EngineError>;
}

/// Launches the external sync tool and supervises it: builds the argv,
/// streams the merged output, maps the exit status, tears the child down on
/// cancellation. Never retries.
#[derive(Debug, Clone)]
pub struct SyncExecutor {
    tool: PathBuf,
    cancel: Arc<CancelFlag>,
}

impl SyncExecutor {
    pub fn new(cancel: Arc<CancelFlag>) -> Self {
        Self {
            tool: PathBuf::from(DEFAULT_TOOL),
            cancel,
        }
    }

    /// Override the tool binary.
    pub fn with_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.tool = tool.into();
        self
    }

    /// Terminate, then escalate to a forced kill once [`KILL_GRACE`] runs
    /// out.
    fn shutdown_child(&self, child: &mut Child) {
        terminate(child);
        let deadline = Instant::now() + KILL_GRACE;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(100));
                }
                Ok(None) | Err(_) => break,
            }
        }
        if child.kill().is_ok() {
            let _ = child.wait();
            warn!("child did not exit after terminate; killed");
        }
    }
}

impl Executor for SyncExecutor {
    fn run(
        &self,
        mode: SyncMode,
        src: &str,
        dst: &str,
        flags: &[String],
    ) -> Result<i32, EngineError> {
        info!("starting {mode}: {src} {} {dst}", mode.arrow());

        // One pipe shared by both output streams keeps the child's own
        // interleaving intact.
        let (reader, writer) = os_pipe::pipe().map_err(|e| io_err("pipe", e))?;
        let writer_clone = writer.try_clone().map_err(|e| io_err("pipe", e))?;

        let mut command = Command::new(&self.tool);
        command
            .arg(mode.verb())
            .arg(src)
            .arg(dst)
            .args(flags)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(writer_clone);

        let mut child = command.spawn().map_err(|source| EngineError::Spawn {
            program: self.tool.display().to_string(),
            source,
        })?;
        // The Command still owns copies of the write ends; they must close
        // here or the reader never reaches EOF.
        drop(command);

        self.cancel.register_child(child.id());

        for line in BufReader::new(reader).lines() {
            if self.cancel.is_cancelled() {
                break;
            }
            let line = match line {
                Ok(line) => line,
                Err(_) => break,
            };
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                info!("[subprocess] {trimmed}");
            }
        }

        if self.cancel.is_cancelled() {
            warn!("terminating {mode} of {src} after interrupt");
            self.shutdown_child(&mut child);
            self.cancel.clear_child();
            return Err(EngineError::Cancelled);
        }

        let status = child.wait().map_err(|e| io_err(&self.tool, e))?;
        self.cancel.clear_child();

        let code = status.code().unwrap_or(-1);
        if code == 0 {
            info!("finished {mode}: {src} {} {dst}", mode.arrow());
        } else {
            error!("{mode} failed for {src} with exit code {code}");
        }
        Ok(code)
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    // SAFETY: kill(2) with SIGTERM touches no memory; delivery to an
    // already-exited child fails harmlessly with ESRCH.
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    // TerminateProcess is the only option; there is no graceful step.
    let _ = child.kill();
}
