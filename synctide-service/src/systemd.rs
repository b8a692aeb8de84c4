//! systemd user units: render, install, enable, query.
//!
//! Units are user-scoped (`~/.config/systemd/user`), so installation needs
//! no root except for the one-time linger grant that keeps the timer alive
//! without an active login session.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use tracing::{info, warn};

use synctide_core::paths::current_user;

use crate::error::{io_err, ServiceError};
use crate::{Outcome, ServiceManager, SERVICE_NAME};

const SERVICE_TEMPLATE: &str = include_str!("templates/synctide.service");
const TIMER_TEMPLATE: &str = include_str!("templates/synctide.timer");
const EXEC_START_PLACEHOLDER: &str = "{{EXEC_START}}";

/// Number of trailing journal lines shown by `status`.
const STATUS_LOG_LINES: &str = "20";

/// Manages the user-scoped `synctide.service` + `synctide.timer` pair.
#[derive(Debug)]
pub struct SystemdService {
    home: PathBuf,
}

impl SystemdService {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn unit_dir(&self) -> PathBuf {
        self.home.join(".config").join("systemd").join("user")
    }

    pub fn service_path(&self) -> PathBuf {
        self.unit_dir().join(format!("{SERVICE_NAME}.service"))
    }

    pub fn timer_path(&self) -> PathBuf {
        self.unit_dir().join(format!("{SERVICE_NAME}.timer"))
    }
}

/// Render the service unit, substituting the program invocation.
pub fn render_service_unit(exec_start: &str) -> String {
    SERVICE_TEMPLATE.replace(EXEC_START_PLACEHOLDER, exec_start)
}

/// The quoted invocation written into `ExecStart=`.
pub fn exec_start_command() -> Result<String, ServiceError> {
    let exe = std::env::current_exe().map_err(ServiceError::CurrentExe)?;
    Ok(format!("\"{}\" run --service", exe.display()))
}

impl ServiceManager for SystemdService {
    fn install(&self) -> Result<Outcome, ServiceError> {
        let unit_dir = self.unit_dir();
        fs::create_dir_all(&unit_dir).map_err(|e| io_err(&unit_dir, e))?;

        let service_path = self.service_path();
        fs::write(&service_path, render_service_unit(&exec_start_command()?))
            .map_err(|e| io_err(&service_path, e))?;
        let timer_path = self.timer_path();
        fs::write(&timer_path, TIMER_TEMPLATE).map_err(|e| io_err(&timer_path, e))?;

        run_systemctl(&["daemon-reload"], false)?;
        run_systemctl(&["enable", "--now", &timer_unit()], false)?;

        // The linger grant needs root once; refusal must not undo the units
        // that are already installed and enabled.
        let user = current_user();
        info!("enabling linger for {user} (requires sudo)");
        match Command::new("sudo")
            .args(["loginctl", "enable-linger", user.as_str()])
            .status()
        {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(
                "loginctl enable-linger exited with {status}; the timer only runs while {user} is logged in"
            ),
            Err(err) => warn!(error = %err, "could not run loginctl enable-linger"),
        }

        info!(
            "installed {} and {}",
            service_path.display(),
            timer_path.display()
        );
        Ok(Outcome::Done)
    }

    fn uninstall(&self) -> Result<Outcome, ServiceError> {
        // "not found" is not an error; uninstall must be idempotent.
        run_systemctl(&["disable", "--now", &timer_unit()], true)?;

        for path in [self.service_path(), self.timer_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(io_err(&path, err)),
            }
        }

        run_systemctl(&["daemon-reload"], false)?;
        info!("uninstalled systemd units");
        Ok(Outcome::Done)
    }

    fn status(&self) -> Result<Outcome, ServiceError> {
        let timers = run_systemctl_capture(&["list-timers", &timer_unit(), "--no-pager"])?;
        print!("{timers}");

        let service = service_unit();
        let output = Command::new("journalctl")
            .args([
                "--user",
                "-u",
                service.as_str(),
                "-n",
                STATUS_LOG_LINES,
                "--no-hostname",
                "--no-pager",
            ])
            .output()
            .map_err(|e| io_err("journalctl", e))?;
        print!("{}", String::from_utf8_lossy(&output.stdout));
        if !output.status.success() {
            warn!("journalctl exited with {}", output.status);
        }
        Ok(Outcome::Done)
    }
}

fn timer_unit() -> String {
    format!("{SERVICE_NAME}.timer")
}

fn service_unit() -> String {
    format!("{SERVICE_NAME}.service")
}

fn run_systemctl(args: &[&str], ignore_failure: bool) -> Result<(), ServiceError> {
    run_systemctl_capture(args).map(|_| ()).or_else(|err| {
        if ignore_failure {
            Ok(())
        } else {
            Err(err)
        }
    })
}

fn run_systemctl_capture(args: &[&str]) -> Result<String, ServiceError> {
    let output = Command::new("systemctl")
        .arg("--user")
        .args(args)
        .output()
        .map_err(|e| io_err("systemctl", e))?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(ServiceError::Systemd(format!(
        "systemctl --user {} failed (status {}): {} {}",
        args.join(" "),
        output.status,
        stdout,
        stderr
    )))
}
