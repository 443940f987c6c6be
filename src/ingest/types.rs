// src/ingest/types.rs
use anyhow::Result;

use crate::item::{Origin, RawItem};

/// Adapter seam for one upstream source (a feed, a board, a snapshot file).
///
/// Adapters own their retries, rate limits and timeouts; the engine only sees
/// the finished result.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_items(&self) -> Result<Vec<RawItem>>;
    fn name(&self) -> &str;
    fn origin(&self) -> Origin;
}
