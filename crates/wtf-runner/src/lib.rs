//! # wtf-runner
//!
//! Scenario runner for wtf-wait. A YAML scenario describes a page (elements
//! and how they change over time) and a sequence of waits and interactions
//! to run against it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wtf_runner::{Config, Runner};
//!
//! # fn main() -> wtf_runner::Result<()> {
//! let config = Config::load("scenario.yaml")?;
//! let runner = Runner::new(&config)?;
//! let result = runner.run(&config)?;
//! println!("Success: {}", result.success);
//! # Ok(())
//! # }
//! ```

mod config;
mod runner;

pub use config::{
    build_page, ChangeSpec, Config, ElementSpec, Expect, ParamDef, Params, PatchSpec, Step,
    Target, WaitOverride, WaitSettings,
};
pub use runner::{RunResult, Runner};

/// Result type for wtf-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or running a scenario.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wait(#[from] wtf_wait::Error),

    #[error("step failed: {0}")]
    StepFailed(String),

    #[error("assertion failed: {0}")]
    AssertionFailed(String),
}
