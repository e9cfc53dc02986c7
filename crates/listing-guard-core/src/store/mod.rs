//! Persistence of completed scans together with their red flags and alternatives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::pricing::AlternativeListing;
use crate::scanner::{RedFlag, Severity};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryScanStore;
pub use postgres::PgScanStore;

/// A persisted scan. Immutable apart from deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub scam_score: u8,
    pub analysis: String,
}

/// Fields supplied when recording a scan; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScan {
    pub title: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub scam_score: u8,
    pub analysis: String,
}

impl NewScan {
    /// Build the scan this request would have produced without touching a store.
    pub fn into_transient(self) -> Scan {
        Scan {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            title: self.title,
            url: self.url,
            image_url: self.image_url,
            scam_score: self.scam_score,
            analysis: self.analysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRedFlag {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAlternative {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub title: String,
    pub price: String,
    pub url: String,
    pub trusted: bool,
}

/// A scan with its child rows, as returned by the history endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDetails {
    #[serde(flatten)]
    pub scan: Scan,
    #[serde(rename = "redFlags")]
    pub red_flags: Vec<StoredRedFlag>,
    pub alternatives: Vec<StoredAlternative>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("scan {id} not found")]
    NotFound { id: Uuid },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage abstraction for scans and their children.
#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn create_scan(&self, scan: NewScan) -> StoreResult<Scan>;

    async fn insert_red_flags(&self, scan_id: Uuid, flags: &[RedFlag]) -> StoreResult<()>;

    async fn insert_alternatives(
        &self,
        scan_id: Uuid,
        alternatives: &[AlternativeListing],
    ) -> StoreResult<()>;

    async fn find_scan(&self, id: Uuid) -> StoreResult<Option<Scan>>;

    async fn red_flags_for(&self, scan_id: Uuid) -> StoreResult<Vec<StoredRedFlag>>;

    async fn alternatives_for(&self, scan_id: Uuid) -> StoreResult<Vec<StoredAlternative>>;

    /// All scans, newest first.
    async fn list_scans(&self) -> StoreResult<Vec<Scan>>;

    /// Remove the scan row only. Red flags and alternatives are left in place;
    /// callers remove them with [`ScanStore::delete_red_flags_for`] and
    /// [`ScanStore::delete_alternatives_for`]. Returns `false` when nothing matched.
    async fn delete_scan(&self, id: Uuid) -> StoreResult<bool>;

    /// Remove every red flag recorded for `scan_id`, returning how many were removed.
    async fn delete_red_flags_for(&self, scan_id: Uuid) -> StoreResult<u64>;

    /// Remove every alternative recorded for `scan_id`, returning how many were removed.
    async fn delete_alternatives_for(&self, scan_id: Uuid) -> StoreResult<u64>;

    async fn load_details(&self, id: Uuid) -> StoreResult<ScanDetails> {
        let scan = self
            .find_scan(id)
            .await?
            .ok_or(StoreError::NotFound { id })?;
        let red_flags = self.red_flags_for(id).await?;
        let alternatives = self.alternatives_for(id).await?;
        Ok(ScanDetails {
            scan,
            red_flags,
            alternatives,
        })
    }

    async fn load_history(&self) -> StoreResult<Vec<ScanDetails>> {
        let scans = self.list_scans().await?;
        let mut history = Vec::with_capacity(scans.len());
        for scan in scans {
            let red_flags = self.red_flags_for(scan.id).await?;
            let alternatives = self.alternatives_for(scan.id).await?;
            history.push(ScanDetails {
                scan,
                red_flags,
                alternatives,
            });
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_flatten_scan_fields() {
        let scan = NewScan {
            title: "Sofa".into(),
            url: None,
            image_url: Some("https://img.example/sofa.jpg".into()),
            scam_score: 42,
            analysis: "Looks fine".into(),
        }
        .into_transient();
        let details = ScanDetails {
            scan: scan.clone(),
            red_flags: vec![StoredRedFlag {
                id: Uuid::new_v4(),
                scan_id: scan.id,
                severity: Severity::Low,
                description: "Short description".into(),
            }],
            alternatives: Vec::new(),
        };

        let value = serde_json::to_value(&details).unwrap();
        assert_eq!(value["id"], scan.id.to_string());
        assert_eq!(value["scam_score"], 42);
        assert_eq!(value["image_url"], "https://img.example/sofa.jpg");
        assert!(value["url"].is_null());
        assert_eq!(value["redFlags"][0]["severity"], "low");
        assert!(value["alternatives"].as_array().unwrap().is_empty());
    }

    #[test]
    fn not_found_mentions_id() {
        let id = Uuid::nil();
        assert_eq!(
            StoreError::NotFound { id }.to_string(),
            "scan 00000000-0000-0000-0000-000000000000 not found"
        );
    }
}
