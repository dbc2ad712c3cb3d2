//! Price reconciliation: apply one matching strategy between the feed and
//! the stored catalog, updating price columns on matched rows.

use std::collections::HashMap;

use anyhow::Result;
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::normalization::matching::{FeedProduct, MatchStrategy};
use crate::prices::client::PriceSource;
use crate::store::CardStore;

const UNMATCHED_SAMPLE_LIMIT: usize = 10;

/// Run summary for one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PriceReport {
    pub groups: usize,
    pub rows: usize,
    pub skipped_subtype: usize,
    pub updated: usize,
    pub unmatched: usize,
    pub unmatched_sample: Vec<String>,
}

/// Reconcile all feed groups against the store using a single strategy.
///
/// The strategy is fixed for the whole run. Only rows with subtype `Normal`
/// participate; an unmatched row is counted and sampled, never fatal, and no
/// catalog rows are ever created here.
pub async fn reconcile_prices(
    store: &CardStore,
    feed: &dyn PriceSource,
    strategy: &dyn MatchStrategy,
) -> Result<PriceReport> {
    store.ensure_price_columns()?;

    // Catalog index over the strategy's key space, first row wins per key.
    let mut index: HashMap<String, i64> = HashMap::new();
    for (id, identifier) in store.card_identifiers()? {
        let Some(key) = strategy.catalog_key(&identifier) else {
            debug!(identifier = %identifier, "identifier unmatchable under strategy");
            continue;
        };
        index.entry(key).or_insert(id);
    }
    info!(
        strategy = strategy.name(),
        indexed = index.len(),
        "catalog index built"
    );

    let mut report = PriceReport::default();
    let groups = feed.groups().await?;
    report.groups = groups.len();

    for group in &groups {
        let rows = feed.group_rows(group.group_id).await?;
        debug!(group_id = group.group_id, rows = rows.len(), "group rows loaded");
        for row in rows {
            report.rows += 1;
            if row.sub_type_name != "Normal" {
                report.skipped_subtype += 1;
                continue;
            }

            let product = FeedProduct {
                local_number: &row.ext_number,
                chapter: &group.chapter,
                abbreviation: &group.abbreviation,
            };
            let matched = strategy
                .feed_keys(&product)
                .into_iter()
                .find_map(|key| index.get(&key).copied());

            match matched {
                Some(card_id) => {
                    store.update_prices(card_id, row.low_price, row.mid_price, row.market_price)?;
                    report.updated += 1;
                }
                None => {
                    report.unmatched += 1;
                    if report.unmatched_sample.len() < UNMATCHED_SAMPLE_LIMIT {
                        report.unmatched_sample.push(format!(
                            "{}{} #{}",
                            group.chapter, group.abbreviation, row.ext_number
                        ));
                    }
                }
            }
        }
    }

    if report.unmatched > 0 {
        warn!(
            unmatched = report.unmatched,
            sample = %report.unmatched_sample.iter().join(", "),
            "feed rows without catalog match"
        );
    }
    info!(
        groups = report.groups,
        rows = report.rows,
        updated = report.updated,
        skipped_subtype = report.skipped_subtype,
        unmatched = report.unmatched,
        "price reconciliation finished"
    );
    Ok(report)
}
