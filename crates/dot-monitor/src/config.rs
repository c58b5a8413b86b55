use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use safety_core::SimulatorConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_TICK_MS: u64 = 100;
const DEFAULT_HISTORY_SECS: u64 = 5;
const DEFAULT_ADVISORY_TIMEOUT_SECS: u64 = 20;
const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_ADVISORY_LANGUAGE: &str = "English";

/// Remote advisory model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    /// Never written back out; comes from the file or `GEMINI_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Language the model is asked to answer in.
    pub language: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEMINI_URL.into(),
            model: DEFAULT_GEMINI_MODEL.into(),
            api_key: None,
            language: DEFAULT_ADVISORY_LANGUAGE.into(),
        }
    }
}

/// Top-level monitor configuration.
///
/// Layering: built-in defaults, then an optional TOML file, then
/// environment variables. Every public constructor validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default = "MonitorConfig::builtin")]
pub struct MonitorConfig {
    /// Simulation tick period.
    pub tick_ms: u64,
    /// History sampling period.
    pub history_secs: u64,
    /// Upper bound on a single remote advisory call.
    pub advisory_timeout_secs: u64,
    /// Seed the trend log with ambient readings at session start.
    pub backfill_history: bool,
    /// Fixed RNG seed for reproducible sessions.
    pub seed: Option<u64>,
    pub simulator: SimulatorConfig,
    pub gemini: GeminiConfig,
}

impl MonitorConfig {
    /// Defaults with no environment applied.
    pub fn builtin() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            history_secs: DEFAULT_HISTORY_SECS,
            advisory_timeout_secs: DEFAULT_ADVISORY_TIMEOUT_SECS,
            backfill_history: true,
            seed: None,
            simulator: SimulatorConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }

    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::builtin(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOT_*` / `GEMINI_*` overrides from `lookup`.
    ///
    /// Takes the lookup as a closure so tests don't have to touch the
    /// process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DOT_TICK_MS") {
            self.tick_ms = v.trim().parse().context("DOT_TICK_MS must be an integer")?;
        }
        if let Some(v) = lookup("DOT_HISTORY_SECS") {
            self.history_secs = v
                .trim()
                .parse()
                .context("DOT_HISTORY_SECS must be an integer")?;
        }
        if let Some(v) = lookup("DOT_ADVISORY_TIMEOUT_SECS") {
            self.advisory_timeout_secs = v
                .trim()
                .parse()
                .context("DOT_ADVISORY_TIMEOUT_SECS must be an integer")?;
        }
        if let Some(v) = lookup("DOT_DRIFT_BIAS") {
            self.simulator.drift_bias = v
                .trim()
                .parse()
                .context("DOT_DRIFT_BIAS must be a number")?;
        }
        if let Some(v) = lookup("DOT_SEED") {
            self.seed = Some(v.trim().parse().context("DOT_SEED must be an integer")?);
        }
        if let Some(key) = lookup("GEMINI_API_KEY").or_else(|| lookup("API_KEY")) {
            if !key.trim().is_empty() {
                self.gemini.api_key = Some(key.trim().to_string());
            }
        }
        if let Some(model) = lookup("DOT_GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(url) = lookup("DOT_GEMINI_URL") {
            self.gemini.base_url = url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.tick_ms > 0, "tick_ms must be greater than zero");
        ensure!(self.history_secs > 0, "history_secs must be greater than zero");
        ensure!(
            self.advisory_timeout_secs > 0,
            "advisory_timeout_secs must be greater than zero"
        );
        ensure!(
            self.simulator.drift_scale.is_finite() && self.simulator.drift_bias.is_finite(),
            "simulator drift parameters must be finite"
        );
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn history_interval(&self) -> Duration {
        Duration::from_secs(self.history_secs)
    }

    pub fn advisory_timeout(&self) -> Duration {
        Duration::from_secs(self.advisory_timeout_secs)
    }
}
