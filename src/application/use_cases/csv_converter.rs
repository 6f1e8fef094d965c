// ============================================================
// CSV CONVERTER USE CASE
// ============================================================
// Orchestrate tokenizing, mapping resolution, projection and per-row rendering

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::application::use_cases::column_mapper::{identity_mapping, project};
use crate::application::use_cases::legacy_transform;
use crate::domain::error::{AppError, Result};
use crate::domain::table::{FilenameAllocator, NormalizedTable, RawTable};
use crate::domain::transform::{ColumnMapping, TransformConfig};
use crate::infrastructure::csv::CsvParser;
use crate::infrastructure::db::transform_store::TransformStore;
use crate::infrastructure::pdf::RowRenderer;

/// Which path produced the column mapping for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    Profile,
    Legacy,
    PassThrough,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMapping {
    pub mode: MappingMode,
    pub columns: Vec<ColumnMapping>,
}

/// Choose the mapping for a table. An explicit profile always wins; the
/// legacy heuristic only runs without one.
pub fn resolve_mapping(
    raw_headers: &[String],
    explicit: Option<&TransformConfig>,
    legacy_detection: bool,
) -> ResolvedMapping {
    if let Some(config) = explicit {
        return ResolvedMapping {
            mode: MappingMode::Profile,
            columns: config.columns.clone(),
        };
    }
    if legacy_detection && legacy_transform::detect(raw_headers) {
        return ResolvedMapping {
            mode: MappingMode::Legacy,
            columns: legacy_transform::derive_mapping(raw_headers),
        };
    }
    ResolvedMapping {
        mode: MappingMode::PassThrough,
        columns: identity_mapping(raw_headers),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub mode: MappingMode,
    pub transform: Option<String>,
    pub title_column: Option<String>,
    #[serde(flatten)]
    pub table: NormalizedTable,
    pub titles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RowArtifact {
    /// 0-based position of the source row
    pub index: usize,
    pub title: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub mode: MappingMode,
    pub headers: Vec<String>,
    pub artifacts: Vec<RowArtifact>,
    pub processing_time_ms: u64,
}

/// CSV to per-row document conversion
pub struct CsvConverter {
    store: Arc<dyn TransformStore>,
    renderer: Arc<dyn RowRenderer>,
    parser: CsvParser,
    legacy_detection: bool,
}

impl CsvConverter {
    pub fn new(store: Arc<dyn TransformStore>, renderer: Arc<dyn RowRenderer>) -> Self {
        Self {
            store,
            renderer,
            parser: CsvParser::new(),
            legacy_detection: true,
        }
    }

    pub fn with_parser(mut self, parser: CsvParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_legacy_detection(mut self, enabled: bool) -> Self {
        self.legacy_detection = enabled;
        self
    }

    async fn load_profile(&self, slug: Option<&str>) -> Result<Option<TransformConfig>> {
        let Some(slug) = slug else {
            return Ok(None);
        };
        match self.store.get(slug).await? {
            Some(config) => Ok(Some(config)),
            None => Err(AppError::UnknownTransform(slug.to_string())),
        }
    }

    fn tokenize(&self, bytes: &[u8]) -> Result<RawTable> {
        self.parser.parse_bytes(bytes).map_err(|e| match e {
            AppError::ParseError(msg) => AppError::ParseError(format!("tokenizing upload: {}", msg)),
            other => other,
        })
    }

    /// Normalize an upload without rendering anything.
    pub async fn preview(&self, bytes: &[u8], slug: Option<&str>) -> Result<TablePreview> {
        let profile = self.load_profile(slug).await?;
        let raw = self.tokenize(bytes)?;
        let (mode, table) = self.normalize(&raw, profile.as_ref())?;

        let title_column = profile.as_ref().and_then(|p| p.title_column.clone());
        let titles = (0..table.len())
            .map(|index| table.title_for(index, title_column.as_deref()))
            .collect();

        Ok(TablePreview {
            mode,
            transform: profile.map(|p| p.slug),
            title_column,
            table,
            titles,
        })
    }

    /// Normalize an upload and render one artifact per row. Any failure aborts
    /// the whole run; no partial output is returned.
    pub async fn convert(&self, bytes: &[u8], slug: Option<&str>) -> Result<Conversion> {
        let start = Instant::now();

        let profile = self.load_profile(slug).await?;
        let raw = self.tokenize(bytes)?;
        let (mode, table) = self.normalize(&raw, profile.as_ref())?;
        let title_column = profile.as_ref().and_then(|p| p.title_column.as_deref());

        let mut filenames = FilenameAllocator::new();
        let mut artifacts = Vec::with_capacity(table.len());
        for (index, record) in table.rows.iter().enumerate() {
            let title = table.title_for(index, title_column);
            let filename = filenames.allocate(&title, self.renderer.extension());
            let bytes = self
                .renderer
                .render(&table.headers, record, &title)
                .map_err(|e| {
                    AppError::RenderError(format!("row {} ({}): {}", index + 1, filename, e))
                })?;
            debug!(row = index + 1, filename = %filename, size = bytes.len(), "Rendered row");
            artifacts.push(RowArtifact {
                index,
                title,
                filename,
                bytes,
            });
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            mode = ?mode,
            transform = slug.unwrap_or("-"),
            rows = artifacts.len(),
            elapsed_ms = processing_time_ms,
            "Converted CSV"
        );

        Ok(Conversion {
            mode,
            headers: table.headers,
            artifacts,
            processing_time_ms,
        })
    }

    fn normalize(
        &self,
        raw: &RawTable,
        profile: Option<&TransformConfig>,
    ) -> Result<(MappingMode, NormalizedTable)> {
        if raw.rows.is_empty() {
            return Err(AppError::EmptyInput("after parsing".to_string()));
        }

        let mapping = resolve_mapping(&raw.headers, profile, self.legacy_detection);
        debug!(
            mode = ?mapping.mode,
            raw_columns = raw.headers.len(),
            output_columns = mapping.columns.len(),
            "Resolved column mapping"
        );

        let table = project(raw, &mapping.columns);
        if table.is_empty() {
            return Err(AppError::EmptyInput("after transform".to_string()));
        }
        Ok((mapping.mode, table))
    }
}
