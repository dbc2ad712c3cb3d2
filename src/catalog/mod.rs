//! Catalog ingestion: fetch per-language documents, flatten, resolve
//! precedence, persist, and optionally feed the image sink.

pub mod client;
pub mod model;
pub mod resolve;

pub use client::{CatalogSource, RavensburgerCatalog};
pub use model::{CardRecord, CatalogCard, Category};
pub use resolve::{resolve, ResolveSummary};

use anyhow::{Context, Result};
use tracing::info;

use crate::images::{DownloadStats, ImageSink};
use crate::store::CardStore;

/// Outcome of one catalog sync run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    pub fetched: usize,
    pub resolve: ResolveSummary,
    pub stored: usize,
    pub images: Option<DownloadStats>,
}

/// Run the full catalog pipeline: fetch every language sequentially, resolve
/// variant precedence across all of them at once, upsert the survivors, then
/// download any missing images.
pub async fn sync_catalog(
    source: &dyn CatalogSource,
    store: &CardStore,
    sink: Option<&ImageSink>,
    languages: &[String],
) -> Result<SyncReport> {
    let mut records = Vec::new();
    for lang in languages {
        let cards = source
            .fetch_language(lang)
            .await
            .with_context(|| format!("fetching {lang} catalog"))?;
        for (category, card) in cards {
            records.push(CardRecord::from_card(lang, category, &card));
        }
    }
    let fetched = records.len();
    info!(languages = languages.len(), records = fetched, "catalog fetched");

    let (kept, summary) = resolve(records);
    let stored = store.store_records(&kept)?;

    let images = match sink {
        Some(sink) => Some(sink.download_missing(&kept).await?),
        None => None,
    };

    Ok(SyncReport {
        fetched,
        resolve: summary,
        stored,
        images,
    })
}
