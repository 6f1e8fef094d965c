use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::application::use_cases::csv_converter::CsvConverter;
use crate::application::use_cases::legacy_transform::legacy_profile;
use crate::domain::error::Result;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::csv::CsvParser;
use crate::infrastructure::db::transform_store::{SqliteTransformStore, TransformStore};
use crate::infrastructure::pdf::LopdfRenderer;
use crate::infrastructure::storage::OutputLayout;
use crate::interfaces::http::{add_log, AppState, LogEntry};

/// Build the service state from configuration: open the store, seed the
/// legacy profile and wire the converter.
pub async fn setup(config: AppConfig) -> Result<AppState> {
    let logs: Arc<Mutex<Vec<LogEntry>>> = Arc::new(Mutex::new(Vec::new()));

    let output = OutputLayout::new(config.output_dir.clone());
    output.ensure().map_err(|err| {
        error!(
            error = %err,
            output_dir = %config.output_dir.display(),
            "Failed to create output dir"
        );
        err
    })?;

    let store: Arc<dyn TransformStore> =
        Arc::new(SqliteTransformStore::init(&config.database_url).await?);

    if config.seed_legacy_profile && seed_legacy_profile(store.as_ref()).await? {
        add_log(
            &logs,
            "INFO",
            "Bootstrap",
            "Seeded legacy transform profile 'moores'",
        );
    }

    let state = build_state(config, store, logs)?;
    info!(
        output_dir = %state.output.root().display(),
        legacy_detection = state.config.legacy_detection,
        "Service state ready"
    );
    Ok(state)
}

/// Wire a converter around an existing store.
pub fn build_state(
    config: AppConfig,
    store: Arc<dyn TransformStore>,
    logs: Arc<Mutex<Vec<LogEntry>>>,
) -> Result<AppState> {
    let mut parser = CsvParser::new().with_trim(config.trim_values);
    if let Some(delimiter) = config.delimiter_byte()? {
        parser = parser.with_delimiter(delimiter);
    }
    let converter = CsvConverter::new(store.clone(), Arc::new(LopdfRenderer::new()))
        .with_parser(parser)
        .with_legacy_detection(config.legacy_detection);

    Ok(AppState {
        output: OutputLayout::new(config.output_dir.clone()),
        config,
        store,
        converter,
        logs,
    })
}

/// Store the legacy profile unless its slug is already taken. Returns whether
/// anything was written.
pub async fn seed_legacy_profile(store: &dyn TransformStore) -> Result<bool> {
    let profile = legacy_profile();
    if store.get(&profile.slug).await?.is_some() {
        return Ok(false);
    }
    store.put(&profile).await?;
    info!(slug = %profile.slug, version = profile.version, "Seeded legacy transform profile");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transform::{ColumnMapping, TransformConfig};
    use crate::infrastructure::db::transform_store::InMemoryTransformStore;

    #[tokio::test]
    async fn test_seed_is_idempotent_and_never_overwrites() {
        let store = InMemoryTransformStore::new();
        assert!(seed_legacy_profile(&store).await.unwrap());
        assert!(!seed_legacy_profile(&store).await.unwrap());

        let custom = TransformConfig {
            slug: "moores".to_string(),
            title: "Custom".to_string(),
            description: String::new(),
            title_column: None,
            version: 2,
            columns: vec![ColumnMapping::new("Only", 0)],
        };
        store.put(&custom).await.unwrap();
        assert!(!seed_legacy_profile(&store).await.unwrap());
        assert_eq!(store.get("moores").await.unwrap(), Some(custom));
    }

    #[tokio::test]
    async fn test_build_state_applies_parser_settings() {
        let store: Arc<dyn TransformStore> = Arc::new(InMemoryTransformStore::new());
        let logs = Arc::new(Mutex::new(Vec::new()));

        let config = AppConfig {
            trim_values: true,
            ..AppConfig::default()
        };
        let state = build_state(config, store.clone(), logs.clone()).unwrap();
        let preview = state
            .converter
            .preview(b"Customer Name;Email\n Alice ; a@x.io \n", None)
            .await
            .unwrap();
        assert_eq!(preview.table.rows[0]["Email"], "a@x.io");

        let config = AppConfig {
            delimiter: Some(','),
            ..AppConfig::default()
        };
        let state = build_state(config, store, logs).unwrap();
        let preview = state
            .converter
            .preview(b"Customer Name;Email\nAlice;a@x.io\n", None)
            .await
            .unwrap();
        assert_eq!(preview.table.headers, vec!["Customer Name;Email"]);
    }

    #[tokio::test]
    async fn test_setup_with_memory_database() {
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            output_dir: std::env::temp_dir().join(format!("survey-pdf-{}", uuid::Uuid::new_v4())),
            ..AppConfig::default()
        };
        let output_dir = config.output_dir.clone();

        let state = setup(config).await.unwrap();
        assert_eq!(state.store.list_slugs().await.unwrap(), vec!["moores"]);
        assert!(output_dir.exists());

        std::fs::remove_dir_all(output_dir).unwrap();
    }
}
