//! `synctide run` — one scheduled sync pass.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{error, warn};

use synctide_core::config::RunEnvironment;
use synctide_core::paths::{config_path, flags_path, workspace_root};
use synctide_core::{load_config, load_flags, ConfigError};
use synctide_engine::{CancelFlag, EngineError, RunOutcome, Runner};

use crate::logging;

/// Arguments for `synctide run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Force the background flag layer even on a terminal.
    #[arg(long)]
    pub service: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let root = workspace_root(&home);
        logging::init(&root).context("failed to initialize logging")?;

        let config = load_input(load_config(&config_path(&root)))?;
        let flags = load_input(load_flags(&flags_path(&root)))?;

        let environment = if self.service || !std::io::stdout().is_terminal() {
            RunEnvironment::Service
        } else {
            RunEnvironment::Terminal
        };

        let cancel = Arc::new(CancelFlag::new());
        let handler_flag = cancel.clone();
        ctrlc::set_handler(move || {
            warn!("interrupt received; terminating active sync");
            handler_flag.request();
        })
        .context("failed to install interrupt handler")?;

        let runner = Runner::new(config, flags, &root, &home, environment, cancel);
        match runner.run() {
            Ok(RunOutcome::Completed(report)) => {
                if report.failed > 0 {
                    warn!(failed = report.failed, "run finished with task failures");
                }
                Ok(())
            }
            // Overlapping schedule triggers are normal; the losing instance
            // exits cleanly.
            Ok(RunOutcome::SkippedLockHeld) => Ok(()),
            Err(EngineError::Cancelled) => {
                warn!("run cancelled by operator");
                Ok(())
            }
            Err(EngineError::Offline) => bail!("no network connection; run aborted"),
            Err(err) => Err(err).context("sync run failed"),
        }
    }
}

/// Missing or unreadable inputs are fatal before any lock or gate activity.
fn load_input<T>(result: std::result::Result<T, ConfigError>) -> Result<T> {
    result.map_err(|err| {
        error!("{err}");
        anyhow::anyhow!("{err}")
    })
}
