pub mod manifest;

use serde::Deserialize;
use serving_core::config::{self as core_config, get_env, is_production};
use serving_core::error::AppError;
use std::env;
use std::path::PathBuf;

pub use manifest::{Manifest, ManifestError};

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    /// Model manifest; artifact paths inside it are relative to its directory.
    pub manifest_path: PathBuf,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl PredictionConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = is_production();

        Ok(PredictionConfig {
            common: common_config,
            manifest_path: get_env("MODELS_MANIFEST", Some("models/manifest.toml"), is_prod)?
                .into(),
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
        })
    }

    /// Directory that manifest-relative artifact paths resolve against.
    pub fn manifest_dir(&self) -> PathBuf {
        self.manifest_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default()
    }
}
