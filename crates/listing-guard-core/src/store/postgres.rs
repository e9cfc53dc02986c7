use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{NewScan, Scan, ScanStore, StoreResult, StoredAlternative, StoredRedFlag};
use crate::pricing::AlternativeListing;
use crate::scanner::{RedFlag, Severity, MAX_SCAM_SCORE};

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgScanStore {
    pool: PgPool,
}

impl PgScanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, then apply the embedded migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to database")?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run database migrations")?;
        info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct ScanRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    title: String,
    url: Option<String>,
    image_url: Option<String>,
    scam_score: i16,
    analysis: String,
}

impl From<ScanRow> for Scan {
    fn from(row: ScanRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            title: row.title,
            url: row.url,
            image_url: row.image_url,
            scam_score: u8::try_from(row.scam_score.clamp(0, i16::from(MAX_SCAM_SCORE)))
                .unwrap_or(MAX_SCAM_SCORE),
            analysis: row.analysis,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RedFlagRow {
    id: Uuid,
    scan_id: Uuid,
    severity: String,
    description: String,
}

impl From<RedFlagRow> for StoredRedFlag {
    fn from(row: RedFlagRow) -> Self {
        Self {
            id: row.id,
            scan_id: row.scan_id,
            severity: Severity::parse_lenient(&row.severity),
            description: row.description,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AlternativeRow {
    id: Uuid,
    scan_id: Uuid,
    title: String,
    price: String,
    url: String,
    trusted: bool,
}

impl From<AlternativeRow> for StoredAlternative {
    fn from(row: AlternativeRow) -> Self {
        Self {
            id: row.id,
            scan_id: row.scan_id,
            title: row.title,
            price: row.price,
            url: row.url,
            trusted: row.trusted,
        }
    }
}

#[async_trait]
impl ScanStore for PgScanStore {
    async fn create_scan(&self, scan: NewScan) -> StoreResult<Scan> {
        let row = sqlx::query_as::<_, ScanRow>(
            r#"
            INSERT INTO scans (id, title, url, image_url, scam_score, analysis)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, created_at, title, url, image_url, scam_score, analysis
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&scan.title)
        .bind(&scan.url)
        .bind(&scan.image_url)
        .bind(i16::from(scan.scam_score.min(MAX_SCAM_SCORE)))
        .bind(&scan.analysis)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn insert_red_flags(&self, scan_id: Uuid, flags: &[RedFlag]) -> StoreResult<()> {
        for flag in flags {
            sqlx::query(
                r#"
                INSERT INTO red_flags (id, scan_id, severity, description)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(scan_id)
            .bind(flag.severity.as_str())
            .bind(&flag.description)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn insert_alternatives(
        &self,
        scan_id: Uuid,
        alternatives: &[AlternativeListing],
    ) -> StoreResult<()> {
        for alt in alternatives {
            sqlx::query(
                r#"
                INSERT INTO alternatives (id, scan_id, title, price, url, trusted)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(scan_id)
            .bind(&alt.title)
            .bind(&alt.price)
            .bind(&alt.url)
            .bind(alt.trusted)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn find_scan(&self, id: Uuid) -> StoreResult<Option<Scan>> {
        let row = sqlx::query_as::<_, ScanRow>(
            r#"
            SELECT id, created_at, title, url, image_url, scam_score, analysis
            FROM scans WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn red_flags_for(&self, scan_id: Uuid) -> StoreResult<Vec<StoredRedFlag>> {
        let rows = sqlx::query_as::<_, RedFlagRow>(
            r#"
            SELECT id, scan_id, severity, description
            FROM red_flags WHERE scan_id = $1 ORDER BY position
            "#,
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn alternatives_for(&self, scan_id: Uuid) -> StoreResult<Vec<StoredAlternative>> {
        let rows = sqlx::query_as::<_, AlternativeRow>(
            r#"
            SELECT id, scan_id, title, price, url, trusted
            FROM alternatives WHERE scan_id = $1 ORDER BY position
            "#,
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_scans(&self) -> StoreResult<Vec<Scan>> {
        let rows = sqlx::query_as::<_, ScanRow>(
            r#"
            SELECT id, created_at, title, url, image_url, scam_score, analysis
            FROM scans ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_scan(&self, id: Uuid) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM scans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn delete_red_flags_for(&self, scan_id: Uuid) -> StoreResult<u64> {
        let deleted = sqlx::query("DELETE FROM red_flags WHERE scan_id = $1")
            .bind(scan_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }

    async fn delete_alternatives_for(&self, scan_id: Uuid) -> StoreResult<u64> {
        let deleted = sqlx::query("DELETE FROM alternatives WHERE scan_id = $1")
            .bind(scan_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted)
    }
}
