use crate::providers::bus_api::{BusApiClient, ResponseHeader, UpstreamError};
use crate::providers::xml::Node;
use crate::store::{self, NewStop, StoreError};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Rows requested per upstream page
pub const PAGE_SIZE: u32 = 1000;

/// Outcome of a successful sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub saved: u64,
    /// Upstream requests made, including the final empty page
    pub pages: u32,
}

/// Copies the upstream stop catalog into the local store.
///
/// Walks the paged enumeration endpoint until a page comes back without
/// items, inserting every stop whose `arsId` is not stored yet. The whole run
/// is one transaction: any failure rolls back every page saved so far.
pub struct StationSync {
    pool: SqlitePool,
    client: BusApiClient,
    max_pages: Option<u32>,
    running: Mutex<()>,
}

impl StationSync {
    pub fn new(pool: SqlitePool, client: BusApiClient, max_pages: Option<u32>) -> Self {
        Self {
            pool,
            client,
            max_pages,
            running: Mutex::new(()),
        }
    }

    /// Run a sync and render the outcome as `"saved N stops"` or `"error: ..."`.
    pub async fn report(&self) -> Result<String, String> {
        match self.run().await {
            Ok(summary) => Ok(format!("saved {} stops", summary.saved)),
            Err(e) => Err(format!("error: {}", e)),
        }
    }

    /// Run a full sync. Overlapping calls wait for the active run to finish.
    pub async fn run(&self) -> Result<SyncSummary, SyncError> {
        let _running = self.running.lock().await;
        info!("Starting station sync");

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        match self.sync_pages(&mut tx).await {
            Ok(summary) => {
                tx.commit().await.map_err(StoreError::from)?;
                info!(saved = summary.saved, pages = summary.pages, "Completed station sync");
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, "Station sync failed, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Failed to roll back station sync");
                }
                Err(e)
            }
        }
    }

    async fn sync_pages(&self, conn: &mut SqliteConnection) -> Result<SyncSummary, SyncError> {
        let mut page: u32 = 1;
        let mut saved: u64 = 0;

        loop {
            if let Some(max_pages) = self.max_pages {
                if page > max_pages {
                    return Err(SyncError::PageLimitExceeded(max_pages));
                }
            }

            let root = self.client.station_page(page, PAGE_SIZE).await?;

            if let Some(header) = ResponseHeader::from_root(&root) {
                debug!(
                    page,
                    code = %header.code,
                    message = %header.message,
                    item_count = %header.item_count,
                    "Bus API header"
                );
            }

            let items = root.path("msgBody").path("itemList").as_sequence();
            if items.is_empty() {
                info!(page, "No more items, enumeration complete");
                return Ok(SyncSummary { saved, pages: page });
            }

            let batch = stage_page(conn, items).await?;
            let inserted = store::insert_batch(conn, &batch).await?;
            saved += inserted;

            info!(page, items = items.len(), inserted, saved, "Stored page");
            page += 1;
        }
    }
}

/// Build the stop a page item describes, or `None` for virtual stops.
fn candidate(item: &Node) -> Option<NewStop> {
    let ars_id = item.path("arsId").text().trim();
    if store::is_sentinel_code(ars_id) {
        return None;
    }

    let direction = item
        .path("adirection")
        .as_text()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Some(NewStop {
        station_id: item.path("stId").text().trim().to_string(),
        station_name: item.path("stNm").text().trim().to_string(),
        ars_id: ars_id.to_string(),
        direction,
    })
}

/// Filter a page down to stops that are neither virtual nor already known.
///
/// Items keep upstream order; when a code repeats within the page the first
/// occurrence wins.
async fn stage_page(conn: &mut SqliteConnection, items: &[Node]) -> Result<Vec<NewStop>, StoreError> {
    let mut batch = Vec::new();
    let mut staged = HashSet::new();
    let mut rejected = 0usize;
    let mut existing = 0usize;

    for item in items {
        let Some(stop) = candidate(item) else {
            rejected += 1;
            continue;
        };

        if !staged.insert(stop.ars_id.clone()) {
            existing += 1;
            continue;
        }

        if store::find_by_external_code(&mut *conn, &stop.ars_id).await?.is_some() {
            existing += 1;
            continue;
        }

        batch.push(stop);
    }

    if rejected > 0 {
        warn!(rejected, "Skipped items without a physical stop code");
    }
    debug!(staged = batch.len(), existing, "Staged page");

    Ok(batch)
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("enumeration did not end within {0} pages")]
    PageLimitExceeded(u32),
}
