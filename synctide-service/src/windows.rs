//! Windows Task Scheduler registration, driven through PowerShell.
//!
//! Mutating operations require an elevated process. When the current
//! process is unprivileged they spawn an elevated relaunch of the same
//! invocation and report [`Outcome::ElevationRequested`]; the relaunch
//! becomes the effective operation.

use std::env;
use std::process::{Command, Output};

use tracing::info;

use synctide_core::paths::current_user;

use crate::error::ServiceError;
use crate::{Outcome, ServiceManager, SERVICE_NAME};

/// Repetition interval of the scheduled task, in minutes.
const REPEAT_MINUTES: u32 = 15;

/// PowerShell expression that evaluates to `True` in an elevated process.
const ELEVATION_QUERY: &str = "[Security.Principal.WindowsPrincipal]::new([Security.Principal.WindowsIdentity]::GetCurrent()).IsInRole([Security.Principal.WindowsBuiltInRole]::Administrator)";

/// Manages the `synctide` Task Scheduler registration.
#[derive(Debug, Default)]
pub struct WindowsTaskService;

impl WindowsTaskService {
    pub fn new() -> Self {
        Self
    }
}

/// Build the registration script for the scheduled task.
///
/// LogonType S4U runs the task in the background without persisting
/// credentials; the settings block keeps it alive on battery and fires a
/// missed trigger as soon as possible.
pub fn register_script(exe: &str, user: &str) -> String {
    format!(
        r#"$action = New-ScheduledTaskAction -Execute '{exe}' -Argument 'run --service'
$trigger = New-ScheduledTaskTrigger -Once -At "00:00" -RepetitionInterval (New-TimeSpan -Minutes {REPEAT_MINUTES})
$principal = New-ScheduledTaskPrincipal -UserId "{user}" -LogonType S4U
$settings = New-ScheduledTaskSettingsSet -AllowStartIfOnBatteries -DontStopIfGoingOnBatteries -StartWhenAvailable
Register-ScheduledTask -TaskName "{SERVICE_NAME}" -Action $action -Trigger $trigger -Principal $principal -Settings $settings -Force"#
    )
}

/// `DOMAIN\user` when a domain is set, bare user name otherwise.
pub fn format_task_user(domain: Option<&str>, user: &str) -> String {
    match domain {
        Some(domain) if !domain.is_empty() => format!("{domain}\\{user}"),
        _ => user.to_string(),
    }
}

fn scheduled_task_user() -> String {
    let user = env::var("USERNAME").unwrap_or_else(|_| current_user());
    format_task_user(env::var("USERDOMAIN").ok().as_deref(), &user)
}

impl ServiceManager for WindowsTaskService {
    fn install(&self) -> Result<Outcome, ServiceError> {
        if let Some(outcome) = ensure_elevated()? {
            return Ok(outcome);
        }

        let exe = env::current_exe().map_err(ServiceError::CurrentExe)?;
        let script = register_script(&exe.display().to_string(), &scheduled_task_user());
        run_powershell_checked(&script)?;
        info!("scheduled task '{SERVICE_NAME}' registered");
        Ok(Outcome::Done)
    }

    fn uninstall(&self) -> Result<Outcome, ServiceError> {
        if let Some(outcome) = ensure_elevated()? {
            return Ok(outcome);
        }

        // SilentlyContinue keeps removal idempotent when the task is gone.
        let script = format!(
            "Unregister-ScheduledTask -TaskName \"{SERVICE_NAME}\" -Confirm:$false -ErrorAction SilentlyContinue"
        );
        run_powershell_checked(&script)?;
        info!("scheduled task '{SERVICE_NAME}' removed");
        Ok(Outcome::Done)
    }

    fn status(&self) -> Result<Outcome, ServiceError> {
        let output = Command::new("schtasks")
            .args(["/Query", "/TN", SERVICE_NAME, "/V", "/FO", "LIST"])
            .output()
            .map_err(|e| ServiceError::Scheduler(format!("failed to launch schtasks: {e}")))?;

        if output.status.success() {
            print!("{}", String::from_utf8_lossy(&output.stdout));
        } else {
            println!("task '{SERVICE_NAME}' is not installed");
        }
        Ok(Outcome::Done)
    }
}

/// `Ok(None)` when already elevated; otherwise the relaunch has been
/// spawned and the caller must stop.
fn ensure_elevated() -> Result<Option<Outcome>, ServiceError> {
    if is_elevated()? {
        return Ok(None);
    }
    info!("requesting elevation; the privileged relaunch takes over");
    relaunch_elevated()?;
    Ok(Some(Outcome::ElevationRequested))
}

fn is_elevated() -> Result<bool, ServiceError> {
    let output = run_powershell(ELEVATION_QUERY)?;
    Ok(String::from_utf8_lossy(&output.stdout)
        .trim()
        .eq_ignore_ascii_case("true"))
}

fn relaunch_elevated() -> Result<(), ServiceError> {
    let exe = env::current_exe().map_err(ServiceError::CurrentExe)?;
    let args: Vec<String> = env::args().skip(1).collect();
    let script = elevation_script(&exe.display().to_string(), &args);
    run_powershell_checked(&script).map_err(|err| ServiceError::Elevation(err.to_string()))
}

/// `Start-Process -Verb RunAs` command line for the elevated relaunch.
pub fn elevation_script(exe: &str, args: &[String]) -> String {
    if args.is_empty() {
        return format!("Start-Process -FilePath '{exe}' -Verb RunAs");
    }
    let arg_list = args
        .iter()
        .map(|arg| format!("'{arg}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Start-Process -FilePath '{exe}' -ArgumentList {arg_list} -Verb RunAs")
}

fn run_powershell(script: &str) -> Result<Output, ServiceError> {
    Command::new("powershell")
        .args(["-NoProfile", "-Command", script])
        .output()
        .map_err(|e| ServiceError::Scheduler(format!("failed to launch powershell: {e}")))
}

fn run_powershell_checked(script: &str) -> Result<(), ServiceError> {
    let output = run_powershell(script)?;
    if output.status.success() {
        return Ok(());
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(ServiceError::Scheduler(format!(
        "powershell exited with {}: {} {}",
        output.status, stdout, stderr
    )))
}
