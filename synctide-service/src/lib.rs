//! # synctide-service
//!
//! Install, uninstall, and inspect the recurring trigger that launches
//! `synctide run --service`: systemd user units on Unix-like hosts, a Task
//! Scheduler registration on Windows.
//!
//! Nothing here touches the run lock or executes sync tasks.

mod error;
pub mod systemd;
pub mod windows;

use std::path::Path;

pub use error::ServiceError;
pub use systemd::SystemdService;
pub use windows::WindowsTaskService;

/// Name shared by the unit files and the scheduled task.
pub const SERVICE_NAME: &str = "synctide";

/// Result of a service-lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation ran to completion in this process.
    Done,
    /// An elevated relaunch was spawned; this process must do nothing more.
    ElevationRequested,
}

/// Lifecycle manager for the recurring trigger.
pub trait ServiceManager {
    fn install(&self) -> Result<Outcome, ServiceError>;
    fn uninstall(&self) -> Result<Outcome, ServiceError>;
    fn status(&self) -> Result<Outcome, ServiceError>;
}

/// Select the implementation for this host, once, at startup. Callers never
/// branch on platform again.
pub fn platform_manager(home: &Path) -> Box<dyn ServiceManager> {
    if cfg!(windows) {
        Box::new(WindowsTaskService::new())
    } else {
        Box::new(SystemdService::new(home))
    }
}
