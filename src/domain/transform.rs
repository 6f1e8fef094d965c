// ============================================================
// TRANSFORM PROFILES
// ============================================================
// Declarative column-remapping profiles, persisted by slug

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Source index that never exists in any row; projects to an empty string.
pub const UNMAPPED_SOURCE: usize = usize::MAX;

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap());

fn default_version() -> u32 {
    1
}

/// One output column fed by a raw column addressed by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    #[validate(length(min = 1, message = "outputName must not be empty"))]
    pub output_name: String,
    pub source_index: usize,
}

impl ColumnMapping {
    pub fn new(output_name: impl Into<String>, source_index: usize) -> Self {
        Self {
            output_name: output_name.into(),
            source_index,
        }
    }

    /// Output column with no source; always projects to "".
    pub fn unmapped(output_name: impl Into<String>) -> Self {
        Self::new(output_name, UNMAPPED_SOURCE)
    }

    pub fn is_unmapped(&self) -> bool {
        self.source_index == UNMAPPED_SOURCE
    }
}

/// A named, persisted column-remapping profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_title_column"))]
pub struct TransformConfig {
    #[validate(regex(
        path = *SLUG_PATTERN,
        message = "slug must be lowercase alphanumeric words joined by hyphens"
    ))]
    pub slug: String,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_column: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    #[validate(length(min = 1, message = "columns are required"), nested)]
    pub columns: Vec<ColumnMapping>,
}

fn validate_title_column(config: &TransformConfig) -> std::result::Result<(), ValidationError> {
    match &config.title_column {
        Some(title) if !config.columns.iter().any(|c| &c.output_name == title) => {
            let mut err = ValidationError::new("title_column");
            err.message = Some(format!("titleColumn '{}' is not an output column", title).into());
            Err(err)
        }
        _ => Ok(()),
    }
}

impl TransformConfig {
    /// Output header names, in mapping order.
    pub fn output_headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.output_name.clone()).collect()
    }

    /// Apply setup-time defaults: blank description gets a generic prompt,
    /// blank title column is treated as absent.
    pub fn normalized(mut self) -> Self {
        if self.description.trim().is_empty() {
            self.description = format!("Upload a CSV for {}", self.title);
        }
        if self
            .title_column
            .as_deref()
            .map(|t| t.trim().is_empty())
            .unwrap_or(false)
        {
            self.title_column = None;
        }
        self
    }
}
