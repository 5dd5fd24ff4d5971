use super::page::ElementSpec;
use super::params::{self, ParamDef, Params};
use super::steps::WaitOverride;
use super::Step;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use wtf_wait::PollConfig;

/// Top-level scenario structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name of this scenario.
    pub name: String,

    /// Parameter definitions (optional).
    #[serde(default)]
    pub params: HashMap<String, ParamDef>,

    /// Default timing for every wait in the scenario.
    #[serde(default)]
    pub wait: WaitSettings,

    /// The page the steps run against.
    #[serde(default)]
    pub page: Vec<ElementSpec>,

    /// Steps to execute, in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Config {
    /// Load a scenario from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_params(path, &Params::new())
    }

    /// Load a scenario from a YAML file with parameters.
    pub fn load_with_params<P: AsRef<Path>>(path: P, params: &Params) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse_with_params(&content, params)
    }

    /// Parse a scenario from a YAML string (no params).
    pub fn parse(yaml: &str) -> Result<Self> {
        Self::parse_with_params(yaml, &Params::new())
    }

    /// Parse a scenario from a YAML string with parameter substitution.
    pub fn parse_with_params(yaml: &str, params: &Params) -> Result<Self> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(yaml)?;

        // Definitions come from the raw document, before substitution
        let defs: HashMap<String, ParamDef> = match value.get("params") {
            Some(v) => serde_yaml::from_value(v.clone())?,
            None => HashMap::new(),
        };

        params::substitute_value(&mut value, params, &defs)?;

        let config: Config = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Poll config built from the `wait:` section.
    pub fn poll_config(&self) -> Result<PollConfig> {
        self.wait.poll_config()
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("name is required".into()));
        }
        self.poll_config()?;
        validate_steps(&self.steps, "steps")
    }
}

fn validate_steps(steps: &[Step], path: &str) -> Result<()> {
    for (i, step) in steps.iter().enumerate() {
        let here = format!("{}[{}] ({})", path, i, step.name());
        if let Some(wait) = step.wait() {
            if wait.poll_interval_ms == Some(0) {
                return Err(Error::Config(format!(
                    "{}: poll_interval_ms must be greater than 0",
                    here
                )));
            }
        }
        match step {
            Step::Select(s) if s.choices() != 1 => {
                return Err(Error::Config(format!(
                    "{}: specify exactly one of 'text', 'index' or 'random: true'",
                    here
                )));
            }
            Step::Repeat(r) => validate_steps(&r.steps, &format!("{}.steps", here))?,
            Step::Include(inc) if inc.path.is_empty() => {
                return Err(Error::Config(format!("{}: path is required", here)));
            }
            _ => {}
        }
    }
    Ok(())
}

fn default_timeout_ms() -> u64 {
    wtf_wait::DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    wtf_wait::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

/// Scenario-wide wait timing.
#[derive(Debug, Clone, Deserialize)]
pub struct WaitSettings {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WaitSettings {
    pub fn poll_config(&self) -> Result<PollConfig> {
        Ok(PollConfig::new(
            Duration::from_millis(self.timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )?)
    }

    /// These settings with a step's overrides applied.
    pub fn with_override(&self, step: &WaitOverride) -> Self {
        Self {
            timeout_ms: step.timeout_ms.unwrap_or(self.timeout_ms),
            poll_interval_ms: step.poll_interval_ms.unwrap_or(self.poll_interval_ms),
        }
    }
}
