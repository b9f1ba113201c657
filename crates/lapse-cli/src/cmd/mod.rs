pub mod completions;
pub mod retention;
pub mod transition;
pub mod views;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use lapse_core::clock::{Clock, SystemClock};
use lapse_core::config::{LapseConfig, load_config};
use lapse_core::ledger::Ledger;
use lapse_core::lifecycle::Lifecycle;
use lapse_core::scheduler::Scheduler;

use crate::output::{CliError, OutputMode, render_error};

/// Engine wiring for one CLI invocation.
pub struct Desk {
    pub config: LapseConfig,
    pub ledger: Arc<Ledger>,
    pub clock: Arc<dyn Clock>,
}

impl Desk {
    /// Load `.lapse/config.toml` under `project_root` and open the item store it names.
    pub fn open(project_root: &Path, output: OutputMode) -> anyhow::Result<Self> {
        let config = match load_config(project_root) {
            Ok(config) => config,
            Err(err) => {
                let code = lapse_core::error::ErrorCode::ConfigParseError;
                render_error(
                    output,
                    &CliError::with_details(
                        format!("{err:#}"),
                        code.hint().unwrap_or_else(|| code.message()),
                        code.code(),
                    ),
                )?;
                return Err(err).context("loading lapse config");
            }
        };
        let store = config.store.open(project_root);
        tracing::debug!(path = %store.path().display(), "opened item store");

        Ok(Self {
            ledger: Arc::new(Ledger::new(Arc::new(store))),
            clock: Arc::new(SystemClock),
            config,
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new(Arc::clone(&self.ledger), Arc::clone(&self.clock))
    }

    /// A scheduler on this desk's store, with `clock` and `interval` overrides.
    pub fn scheduler(
        &self,
        clock: Option<Arc<dyn Clock>>,
        interval: Option<std::time::Duration>,
    ) -> Scheduler {
        Scheduler::new(
            Arc::clone(&self.ledger),
            clock.unwrap_or_else(|| Arc::clone(&self.clock)),
            self.config.retention.policy(),
            interval.unwrap_or_else(|| self.config.scheduler.interval()),
        )
    }
}
