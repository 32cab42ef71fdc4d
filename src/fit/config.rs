//! Configuration of a fit.

use crate::error::Result;
use crate::lm::LmConfig;
use crate::parameters::Parameter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration options for [`fit_with_config`](crate::fit::fit_with_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Solver settings
    pub lm: LmConfig,

    /// Starting value of parameters without an initial guess. Default: 1.0
    pub default_initial_value: f64,

    /// Evaluate breakpoint candidates on the rayon thread pool. Default: false
    pub parallel: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            lm: LmConfig::default(),
            default_initial_value: Parameter::DEFAULT_INITIAL_VALUE,
            parallel: false,
        }
    }
}

impl FitConfig {
    /// Set the solver settings.
    pub fn with_lm_config(mut self, lm: LmConfig) -> Self {
        self.lm = lm;
        self
    }

    /// Set the starting value of parameters without an initial guess.
    pub fn with_default_initial_value(mut self, value: f64) -> Self {
        self.default_initial_value = value;
        self
    }

    /// Evaluate breakpoint candidates in parallel. Has no effect without the
    /// `parallel` feature.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Serialize the configuration to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a configuration from a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save the configuration to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a configuration from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
