mod executor;

use crate::config::{build_page, Config};
use crate::Result;
use executor::ExecutionContext;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use wtf_wait::FixturePage;

/// Result of running a scenario.
#[derive(Debug)]
pub struct RunResult {
    /// Whether every step succeeded.
    pub success: bool,
    /// Error message of the failing step.
    pub error: Option<String>,
    /// Number of top-level steps that completed.
    pub steps_executed: usize,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

/// Executes scenarios against the page they describe.
pub struct Runner {
    page: FixturePage,
}

impl Runner {
    /// Build the scenario's page. Its timeline starts now.
    pub fn new(config: &Config) -> Result<Self> {
        config.poll_config()?;
        debug!(
            "Building page for '{}' ({} elements)",
            config.name,
            config.page.iter().map(|e| e.count()).sum::<usize>()
        );
        Ok(Self {
            page: build_page(&config.page),
        })
    }

    /// The page steps run against.
    pub fn page(&self) -> &FixturePage {
        &self.page
    }

    /// Run the scenario, resolving includes against the working directory.
    pub fn run(&self, config: &Config) -> Result<RunResult> {
        self.run_with_base_path(config, ".")
    }

    /// Run the scenario with a base path for resolving includes.
    ///
    /// Stops at the first failing step. Only errors that prevent running at
    /// all are returned as `Err`.
    pub fn run_with_base_path(
        &self,
        config: &Config,
        base_path: impl AsRef<Path>,
    ) -> Result<RunResult> {
        let ctx = ExecutionContext::new(base_path.as_ref(), config.wait.clone());
        let start = Instant::now();
        info!("Running: {}", config.name);

        let mut steps_executed = 0;
        let mut error = None;
        for (i, step) in config.steps.iter().enumerate() {
            debug!("Executing step {}: {}", i + 1, step.name());
            if let Err(e) = executor::execute_with_context(&self.page, step, &ctx) {
                warn!("Step {} ({}) failed: {}", i + 1, step.name(), e);
                error = Some(format!("step {} ({}): {}", i + 1, step.name(), e));
                break;
            }
            steps_executed += 1;
        }

        Ok(RunResult {
            success: error.is_none(),
            error,
            steps_executed,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
