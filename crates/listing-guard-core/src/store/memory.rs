use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    NewScan, Scan, ScanStore, StoreError, StoreResult, StoredAlternative, StoredRedFlag,
};
use crate::pricing::AlternativeListing;
use crate::scanner::RedFlag;

#[derive(Default)]
struct Tables {
    scans: Vec<Scan>,
    red_flags: Vec<StoredRedFlag>,
    alternatives: Vec<StoredAlternative>,
}

/// Process-local store used in tests and when no database is configured.
#[derive(Default)]
pub struct InMemoryScanStore {
    tables: RwLock<Tables>,
}

impl InMemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_scan(tables: &Tables, scan_id: Uuid) -> StoreResult<()> {
    if tables.scans.iter().any(|scan| scan.id == scan_id) {
        Ok(())
    } else {
        Err(StoreError::NotFound { id: scan_id })
    }
}

#[async_trait]
impl ScanStore for InMemoryScanStore {
    async fn create_scan(&self, scan: NewScan) -> StoreResult<Scan> {
        let scan = Scan {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            title: scan.title,
            url: scan.url,
            image_url: scan.image_url,
            scam_score: scan.scam_score,
            analysis: scan.analysis,
        };
        self.tables.write().await.scans.push(scan.clone());
        Ok(scan)
    }

    async fn insert_red_flags(&self, scan_id: Uuid, flags: &[RedFlag]) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        ensure_scan(&tables, scan_id)?;
        tables
            .red_flags
            .extend(flags.iter().map(|flag| StoredRedFlag {
                id: Uuid::new_v4(),
                scan_id,
                severity: flag.severity,
                description: flag.description.clone(),
            }));
        Ok(())
    }

    async fn insert_alternatives(
        &self,
        scan_id: Uuid,
        alternatives: &[AlternativeListing],
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        ensure_scan(&tables, scan_id)?;
        tables
            .alternatives
            .extend(alternatives.iter().map(|alt| StoredAlternative {
                id: Uuid::new_v4(),
                scan_id,
                title: alt.title.clone(),
                price: alt.price.clone(),
                url: alt.url.clone(),
                trusted: alt.trusted,
            }));
        Ok(())
    }

    async fn find_scan(&self, id: Uuid) -> StoreResult<Option<Scan>> {
        let tables = self.tables.read().await;
        Ok(tables.scans.iter().find(|scan| scan.id == id).cloned())
    }

    async fn red_flags_for(&self, scan_id: Uuid) -> StoreResult<Vec<StoredRedFlag>> {
        let tables = self.tables.read().await;
        Ok(tables
            .red_flags
            .iter()
            .filter(|flag| flag.scan_id == scan_id)
            .cloned()
            .collect())
    }

    async fn alternatives_for(&self, scan_id: Uuid) -> StoreResult<Vec<StoredAlternative>> {
        let tables = self.tables.read().await;
        Ok(tables
            .alternatives
            .iter()
            .filter(|alt| alt.scan_id == scan_id)
            .cloned()
            .collect())
    }

    async fn list_scans(&self) -> StoreResult<Vec<Scan>> {
        let tables = self.tables.read().await;
        let mut scans = tables.scans.clone();
        // Insertion order breaks ties between equal timestamps.
        scans.reverse();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(scans)
    }

    async fn delete_scan(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.scans.len();
        tables.scans.retain(|scan| scan.id != id);
        Ok(tables.scans.len() < before)
    }

    async fn delete_red_flags_for(&self, scan_id: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.red_flags.len();
        tables.red_flags.retain(|flag| flag.scan_id != scan_id);
        Ok((before - tables.red_flags.len()) as u64)
    }

    async fn delete_alternatives_for(&self, scan_id: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.alternatives.len();
        tables.alternatives.retain(|alt| alt.scan_id != scan_id);
        Ok((before - tables.alternatives.len()) as u64)
    }
}
