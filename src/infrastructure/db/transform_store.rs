use crate::domain::error::{AppError, Result};
use crate::domain::transform::TransformConfig;
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::RwLock;
use tracing::{debug, info};
use validator::Validate;

/// Persistence for transform profiles, keyed by slug.
#[async_trait]
pub trait TransformStore: Send + Sync {
    async fn get(&self, slug: &str) -> Result<Option<TransformConfig>>;
    /// Insert or replace. Configs are validated before they are written.
    async fn put(&self, config: &TransformConfig) -> Result<()>;
    /// All stored slugs, sorted.
    async fn list_slugs(&self) -> Result<Vec<String>>;
}

pub struct SqliteTransformStore {
    pool: Pool<Sqlite>,
}

impl SqliteTransformStore {
    pub async fn init(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to parse connection string: {}", e))
            })?
            .create_if_missing(true);

        // every in-memory connection is its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transforms (
                slug TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                config TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create table: {}", e)))?;

        info!(database_url = %database_url, "Transform store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl TransformStore for SqliteTransformStore {
    async fn get(&self, slug: &str) -> Result<Option<TransformConfig>> {
        let entity = sqlx::query_as::<_, TransformEntity>(
            "SELECT slug, config FROM transforms WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch transform: {}", e)))?;

        entity.map(TransformConfig::try_from).transpose()
    }

    async fn put(&self, config: &TransformConfig) -> Result<()> {
        config.validate()?;

        let serialized = serde_json::to_string(config)
            .map_err(|e| AppError::Internal(format!("Failed to serialize transform: {}", e)))?;

        sqlx::query(
            "INSERT INTO transforms (slug, version, config, updated_at)
             VALUES (?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(slug) DO UPDATE SET
                version = excluded.version,
                config = excluded.config,
                updated_at = excluded.updated_at",
        )
        .bind(&config.slug)
        .bind(config.version as i64)
        .bind(serialized)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to save transform: {}", e)))?;

        debug!(slug = %config.slug, version = config.version, "Saved transform");
        Ok(())
    }

    async fn list_slugs(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT slug FROM transforms ORDER BY slug")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list transforms: {}", e)))
    }
}

// Internal entity for database mapping
#[derive(sqlx::FromRow)]
struct TransformEntity {
    slug: String,
    config: String,
}

impl TryFrom<TransformEntity> for TransformConfig {
    type Error = AppError;

    fn try_from(e: TransformEntity) -> Result<Self> {
        serde_json::from_str(&e.config).map_err(|err| {
            AppError::DatabaseError(format!("Stored transform '{}' is corrupt: {}", e.slug, err))
        })
    }
}

/// Process-local store for tests.
#[derive(Default)]
pub struct InMemoryTransformStore {
    configs: RwLock<BTreeMap<String, TransformConfig>>,
}

impl InMemoryTransformStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(_: T) -> AppError {
        AppError::Internal("Transform store lock poisoned".to_string())
    }
}

#[async_trait]
impl TransformStore for InMemoryTransformStore {
    async fn get(&self, slug: &str) -> Result<Option<TransformConfig>> {
        let configs = self.configs.read().map_err(Self::poisoned)?;
        Ok(configs.get(slug).cloned())
    }

    async fn put(&self, config: &TransformConfig) -> Result<()> {
        config.validate()?;
        let mut configs = self.configs.write().map_err(Self::poisoned)?;
        configs.insert(config.slug.clone(), config.clone());
        Ok(())
    }

    async fn list_slugs(&self) -> Result<Vec<String>> {
        let configs = self.configs.read().map_err(Self::poisoned)?;
        Ok(configs.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transform::ColumnMapping;

    fn sample(slug: &str, version: u32) -> TransformConfig {
        TransformConfig {
            slug: slug.to_string(),
            title: "Sample".to_string(),
            description: "Sample survey".to_string(),
            title_column: Some("Name".to_string()),
            version,
            columns: vec![ColumnMapping::new("Name", 0), ColumnMapping::new("Email", 2)],
        }
    }

    async fn exercise_store(store: &dyn TransformStore) {
        assert_eq!(store.get("spring").await.unwrap(), None);

        store.put(&sample("spring", 1)).await.unwrap();
        store.put(&sample("autumn", 1)).await.unwrap();
        assert_eq!(store.get("spring").await.unwrap(), Some(sample("spring", 1)));

        store.put(&sample("spring", 2)).await.unwrap();
        assert_eq!(store.get("spring").await.unwrap().unwrap().version, 2);

        assert_eq!(store.list_slugs().await.unwrap(), vec!["autumn", "spring"]);

        let err = store.put(&sample("Bad Slug", 1)).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(store.list_slugs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        exercise_store(&InMemoryTransformStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let store = SqliteTransformStore::init("sqlite::memory:").await.unwrap();
        exercise_store(&store).await;
    }
}
