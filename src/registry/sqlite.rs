use super::{Capability, CapabilityStatus, NewCapability, Registry};
use crate::error::RegistryError;
use anyhow::Context;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use uuid::Uuid;

type CapabilityRow = (String, String, String, String, String, Option<String>);

/// SQLite-backed capability registry.
///
/// Uniqueness is enforced by a `LOWER(name)` index, so concurrent
/// insert-if-absent calls for the same normalized name resolve to a single
/// row regardless of which writer lands first.
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    /// Open (or create) the database at `db_path`.
    pub async fn new(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("create registry directory")?;
        }

        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .context("open SQLite database")?;

        init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// Pinned to one connection: every new `:memory:` connection would
    /// otherwise get its own empty database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("open in-memory SQLite")?;
        init_schema(&pool).await?;
        Ok(Self { pool })
    }
}

async fn init_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS capabilities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            instructions TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'ready',
            required_provider TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_capabilities_lower_name
            ON capabilities (LOWER(name));
        CREATE INDEX IF NOT EXISTS idx_capabilities_created_at
            ON capabilities (created_at);
        CREATE TABLE IF NOT EXISTS credentials (
            provider TEXT PRIMARY KEY,
            secret TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )
    .execute(pool)
    .await
    .context("init registry schema")?;

    tracing::debug!("registry schema ready");
    Ok(())
}

fn row_to_capability(row: CapabilityRow) -> Capability {
    let (id, name, description, instructions, status, required_provider) = row;
    Capability {
        id,
        name,
        description,
        instructions,
        status: CapabilityStatus::parse(&status),
        required_provider,
    }
}

const SELECT_COLUMNS: &str = "id, name, description, instructions, status, required_provider";

async fn fetch_by_name(pool: &SqlitePool, name: &str) -> anyhow::Result<Option<Capability>> {
    let row: Option<CapabilityRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM capabilities WHERE LOWER(name) = LOWER(?1) LIMIT 1"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("fetch capability by name")?;
    Ok(row.map(row_to_capability))
}

async fn fetch_by_id(pool: &SqlitePool, id: &str) -> anyhow::Result<Option<Capability>> {
    let row: Option<CapabilityRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLUMNS} FROM capabilities WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("fetch capability by id")?;
    Ok(row.map(row_to_capability))
}

impl Registry for SqliteRegistry {
    fn find_all(
        &self,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Capability>>> + Send + '_>> {
        Box::pin(async move {
            // Registration order: ranking ties fall back to insertion order.
            let rows: Vec<CapabilityRow> = sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM capabilities ORDER BY created_at ASC, rowid ASC"
            ))
            .fetch_all(&self.pool)
            .await
            .context("fetch all capabilities")?;
            Ok(rows.into_iter().map(row_to_capability).collect())
        })
    }

    fn find_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Capability>>> + Send + 'a>> {
        Box::pin(async move { fetch_by_name(&self.pool, name).await })
    }

    fn insert_if_absent<'a>(
        &'a self,
        spec: &'a NewCapability,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Capability>> + Send + 'a>> {
        Box::pin(async move {
            let name = spec.name.trim();
            if name.is_empty() {
                return Err(RegistryError::EmptyName.into());
            }

            let now = Utc::now().to_rfc3339();
            // OR IGNORE + reselect: on a unique-name collision the existing
            // row wins and the freshly built record is discarded.
            sqlx::query(
                "INSERT OR IGNORE INTO capabilities
                    (id, name, description, instructions, status, required_provider,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .bind(spec.description.trim())
            .bind(spec.instructions.trim())
            .bind(spec.status.as_str())
            .bind(spec.required_provider.as_deref())
            .bind(&now)
            .execute(&self.pool)
            .await
            .context("insert capability")?;

            fetch_by_name(&self.pool, name)
                .await?
                .ok_or_else(|| RegistryError::NotFound(name.to_string()).into())
        })
    }

    fn update_auth<'a>(
        &'a self,
        id: &'a str,
        status: CapabilityStatus,
        required_provider: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Capability>>> + Send + 'a>> {
        Box::pin(async move {
            sqlx::query(
                "UPDATE capabilities
                 SET status = ?1, required_provider = ?2, updated_at = ?3
                 WHERE id = ?4",
            )
            .bind(status.as_str())
            .bind(required_provider)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("update capability auth")?;

            fetch_by_id(&self.pool, id).await
        })
    }

    fn get_credential<'a>(
        &'a self,
        provider: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT secret FROM credentials WHERE provider = ?1")
                    .bind(provider)
                    .fetch_optional(&self.pool)
                    .await
                    .context("fetch credential")?;
            Ok(row.map(|(secret,)| secret))
        })
    }

    fn store_credential<'a>(
        &'a self,
        provider: &'a str,
        secret: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO credentials (provider, secret, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(provider) DO UPDATE SET secret = ?2, updated_at = ?3",
            )
            .bind(provider)
            .bind(secret)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .context("store credential")?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> NewCapability {
        NewCapability {
            name: name.to_string(),
            description: format!("{name} description"),
            instructions: format!("{name} instructions"),
            status: CapabilityStatus::Ready,
            required_provider: None,
        }
    }

    #[tokio::test]
    async fn insert_and_find_by_name() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        let stored = registry
            .insert_if_absent(&spec("auto_invoice_reports"))
            .await
            .unwrap();
        assert!(!stored.id.is_empty());
        assert_eq!(stored.status, CapabilityStatus::Ready);

        let found = registry
            .find_by_name("AUTO_Invoice_Reports")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, stored.id);
    }

    #[tokio::test]
    async fn insert_is_idempotent_on_case_insensitive_name() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        let first = registry.insert_if_absent(&spec("auto_sms_send")).await.unwrap();

        let mut duplicate = spec("Auto_SMS_Send");
        duplicate.description = "a different description".into();
        let second = registry.insert_if_absent(&duplicate).await.unwrap();

        // Existing row wins; the new record is discarded.
        assert_eq!(second.id, first.id);
        assert_eq!(second.description, first.description);

        let all = registry.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        let err = registry.insert_if_absent(&spec("   ")).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn find_all_preserves_registration_order() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        registry.insert_if_absent(&spec("first_cap")).await.unwrap();
        registry.insert_if_absent(&spec("second_cap")).await.unwrap();
        registry.insert_if_absent(&spec("third_cap")).await.unwrap();

        let names: Vec<String> = registry
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["first_cap", "second_cap", "third_cap"]);
    }

    #[tokio::test]
    async fn update_auth_persists_status_and_provider() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        let stored = registry.insert_if_absent(&spec("auto_stripe_sync")).await.unwrap();

        let updated = registry
            .update_auth(&stored.id, CapabilityStatus::NeedsCredential, Some("stripe"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, CapabilityStatus::NeedsCredential);
        assert_eq!(updated.required_provider.as_deref(), Some("stripe"));

        let missing = registry
            .update_auth("no-such-id", CapabilityStatus::Ready, None)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn credential_store_round_trip() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        assert!(registry.get_credential("stripe").await.unwrap().is_none());

        registry.store_credential("stripe", "sk_live_123").await.unwrap();
        assert_eq!(
            registry.get_credential("stripe").await.unwrap().as_deref(),
            Some("sk_live_123")
        );

        registry.store_credential("stripe", "sk_live_456").await.unwrap();
        assert_eq!(
            registry.get_credential("stripe").await.unwrap().as_deref(),
            Some("sk_live_456")
        );
    }
}
