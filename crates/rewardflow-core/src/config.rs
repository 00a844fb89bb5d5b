//! Customization Configuration
//!
//! The static configuration of the reward-assignment pipeline: the reward
//! window, the enumerable set of projects, and each project's domain→model
//! mapping plus opaque training hyperparameters.
//!
//! Configuration is constructed explicitly from a parsed JSON value (or a
//! file) rather than loaded at import time, so tests and embedders control
//! exactly what the pipeline sees.
//!
//! ```ignore
//! let config = CustomizationConfig::from_json(r#"{
//!     "reward_window_in_seconds": 86400,
//!     "projects": {
//!         "messenger": {
//!             "models": { "default": "messenger-v3", "greetings": "greetings-v1" },
//!             "hyperparameters": { "max_age": 180 }
//!         }
//!     }
//! }"#)?;
//!
//! assert_eq!(config.model_for_domain("messenger", Some("greetings"))?, "greetings-v1");
//! assert_eq!(config.model_for_domain("messenger", Some("unknown"))?, "messenger-v3");
//! ```

use std::collections::BTreeMap;

use chrono::Duration;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Domain key used when a decision has no domain, and the fallback entry
/// consulted when a domain has no dedicated model.
pub const DEFAULT_MODEL_DOMAIN: &str = "default";

// Upper bound on the reward window (10 years). Keeps window arithmetic far
// away from chrono's Duration limits.
const MAX_REWARD_WINDOW_SECONDS: u64 = 315_360_000;

/// Per-project customization: legal models by domain, plus opaque
/// hyperparameter overrides passed through to downstream training.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub models: BTreeMap<String, String>,

    #[serde(default)]
    pub hyperparameters: serde_json::Map<String, Value>,
}

/// Static configuration for the whole pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomizationConfig {
    /// Width of the per-decision reward window, in seconds.
    pub reward_window_in_seconds: u64,

    /// Enumerable set of projects and their model mappings. A `BTreeMap`
    /// keeps project enumeration deterministic.
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectConfig>,
}

impl CustomizationConfig {
    /// Build from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Build from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.reward_window_in_seconds == 0 {
            return Err(Error::InvalidConfig(
                "reward_window_in_seconds must be > 0".to_string(),
            ));
        }
        if self.reward_window_in_seconds > MAX_REWARD_WINDOW_SECONDS {
            return Err(Error::InvalidConfig(format!(
                "reward_window_in_seconds must be <= {MAX_REWARD_WINDOW_SECONDS}"
            )));
        }
        for (project, pc) in &self.projects {
            if project.is_empty() {
                return Err(Error::InvalidConfig("empty project name".to_string()));
            }
            for (domain, model) in &pc.models {
                if model.is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "empty model name for project {project:?}, domain {domain:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The reward window `W` as a duration.
    pub fn reward_window(&self) -> Duration {
        Duration::seconds(self.reward_window_in_seconds as i64)
    }

    /// All configured project names, sorted.
    pub fn all_projects(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    pub fn project(&self, name: &str) -> Result<&ProjectConfig> {
        self.projects
            .get(name)
            .ok_or_else(|| Error::UnknownProject(name.to_string()))
    }

    /// Resolve the model that trains on decisions from `domain`.
    ///
    /// Looks up the domain in the project's model map, falling back to the
    /// `"default"` entry. A missing domain behaves like `"default"`.
    pub fn model_for_domain(&self, project: &str, domain: Option<&str>) -> Result<&str> {
        let models = &self.project(project)?.models;
        let domain = domain.unwrap_or(DEFAULT_MODEL_DOMAIN);
        models
            .get(domain)
            .or_else(|| models.get(DEFAULT_MODEL_DOMAIN))
            .map(String::as_str)
            .ok_or_else(|| Error::NoModelForDomain {
                project: project.to_string(),
                domain: domain.to_string(),
            })
    }
}
