// src/config/engine.rs
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};

use crate::affinity::ModelParams;
use crate::ranking::RankingWeights;
use crate::synth::SynthesisParams;

pub const DEFAULT_CONFIG_PATH: &str = "config/synapse.toml";
pub const DEFAULT_DATA_PATH: &str = "data/observations.json";

pub const ENV_CONFIG_PATH: &str = "SYNAPSE_CONFIG_PATH";
pub const ENV_DATA_PATH: &str = "SYNAPSE_DATA_PATH";
pub const ENV_API_KEY: &str = "RECOMMENDER_API_KEY";

fn default_data_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_PATH)
}
fn default_limit() -> usize {
    10
}
fn default_max_limit() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    #[serde(default = "default_data_path")]
    pub path: PathBuf,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingSection {
    #[serde(flatten)]
    pub weights: RankingWeights,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for RankingSection {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

/// Full service configuration. The API key only ever comes from the env.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub synthesis: SynthesisParams,
    #[serde(default)]
    pub model: ModelParams,
    #[serde(default)]
    pub ranking: RankingSection,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl AppConfig {
    /// Resolve `$SYNAPSE_CONFIG_PATH` or `config/synapse.toml`, then apply env
    /// overrides. A missing file means built-in defaults.
    pub fn load() -> Result<Self> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            let mut cfg = Self::default();
            cfg.sanitize()?;
            cfg
        };

        if let Ok(p) = env::var(ENV_DATA_PATH) {
            if !p.trim().is_empty() {
                cfg.source.path = PathBuf::from(p.trim());
            }
        }
        cfg.api_key = env::var(ENV_API_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s)?;
        cfg.sanitize()?;
        Ok(cfg)
    }

    fn sanitize(&mut self) -> Result<()> {
        self.ranking.weights.validate()?;

        if self.ranking.max_limit == 0 {
            bail!("ranking.max_limit must be at least 1");
        }
        self.ranking.default_limit = self.ranking.default_limit.clamp(1, self.ranking.max_limit);

        if self.model.factors == 0 || self.model.epochs == 0 {
            bail!("model.factors and model.epochs must be at least 1");
        }
        if !(self.model.learning_rate.is_finite() && self.model.learning_rate > 0.0) {
            bail!("model.learning_rate must be positive");
        }
        if !(self.synthesis.steepness.is_finite() && self.synthesis.midpoint.is_finite()) {
            bail!("synthesis parameters must be finite");
        }
        Ok(())
    }
}
