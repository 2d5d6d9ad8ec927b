use async_trait::async_trait;
use serde_json::Value;

use crate::error::SyncResult;
use crate::services::helium_api::ActivitySource;
use crate::services::window_planner::SyncWindow;

/// Receiver of drained activity pages, called once per non-empty page in
/// upstream order.
#[async_trait]
pub trait PageSink: Send {
    async fn handle_page(&mut self, records: Vec<Value>) -> SyncResult<()>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    /// Pages fetched, empty ones included
    pub pages: usize,
    pub records: usize,
}

/// Fetch every page of `window` for `address`, following cursors until the
/// upstream stops returning one.
///
/// A fetch or sink error aborts the drain; pages already handed to the sink
/// are not rolled back.
pub async fn drain_window<S, P>(
    source: &S,
    address: &str,
    window: &SyncWindow,
    sink: &mut P,
) -> SyncResult<DrainStats>
where
    S: ActivitySource + ?Sized,
    P: PageSink + ?Sized,
{
    let mut stats = DrainStats::default();

    let mut page = source
        .get_activity(address, window.min_date, window.max_date)
        .await?;

    loop {
        stats.pages += 1;
        stats.records += page.data.len();

        let cursor = page.cursor.take();

        if !page.is_empty() {
            sink.handle_page(page.data).await?;
        }

        let Some(cursor) = cursor else {
            break;
        };

        page = source.get_activity_page(address, &cursor).await?;
    }

    tracing::debug!(
        address = %address,
        window = %window,
        pages = stats.pages,
        records = stats.records,
        "Drained activity window"
    );

    Ok(stats)
}
