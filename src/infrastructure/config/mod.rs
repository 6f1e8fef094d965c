use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::error::{AppError, Result};

pub const CONFIG_FILE: &str = "survey_pdf.toml";
pub const ENV_PREFIX: &str = "SURVEY_PDF_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Rendered documents land in `{output_dir}/{run_id}/`.
    pub output_dir: PathBuf,
    /// Auto-split legacy "Checkbox"/"Number" exports when no transform is requested.
    pub legacy_detection: bool,
    /// Store the legacy profile on startup if its slug is free.
    pub seed_legacy_profile: bool,
    /// Field delimiter. Unset means detect it per upload.
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Trim surrounding whitespace from every cell.
    pub trim_values: bool,
    /// Request body cap for uploads.
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            database_url: "sqlite://survey_pdf.db".to_string(),
            output_dir: PathBuf::from("output"),
            legacy_detection: true,
            seed_legacy_profile: true,
            delimiter: None,
            trim_values: false,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Defaults, then `survey_pdf.toml`, then `SURVEY_PDF_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::ValidationError(format!("Invalid configuration: {}", e)))?;
        config.delimiter_byte()?;
        Ok(config)
    }

    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        match self.delimiter {
            None => Ok(None),
            Some(c) if c.is_ascii() => Ok(Some(c as u8)),
            Some(c) => Err(AppError::ValidationError(format!(
                "Delimiter must be a single ASCII character, got '{}'",
                c
            ))),
        }
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}
