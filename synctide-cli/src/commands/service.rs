//! `synctide install|uninstall|status` — recurring-trigger lifecycle.
//!
//! These commands never touch the run lock and never execute a sync task.

use anyhow::{Context, Result};
use tracing::info;

use synctide_core::paths::workspace_root;
use synctide_service::{platform_manager, Outcome, ServiceManager};

use crate::logging;

pub fn install() -> Result<()> {
    match manager()?.install().context("failed to install the recurring trigger")? {
        Outcome::Done => info!("installation complete"),
        Outcome::ElevationRequested => {
            info!("elevation requested; the privileged process completes the installation");
        }
    }
    Ok(())
}

pub fn uninstall() -> Result<()> {
    match manager()?.uninstall().context("failed to remove the recurring trigger")? {
        Outcome::Done => info!("uninstall complete"),
        Outcome::ElevationRequested => {
            info!("elevation requested; the privileged process completes the removal");
        }
    }
    Ok(())
}

pub fn status() -> Result<()> {
    manager()?
        .status()
        .context("failed to query the recurring trigger")?;
    Ok(())
}

fn manager() -> Result<Box<dyn ServiceManager>> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    logging::init(&workspace_root(&home)).context("failed to initialize logging")?;
    Ok(platform_manager(&home))
}
