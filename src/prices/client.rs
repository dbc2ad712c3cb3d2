//! Price feed retrieval: a JSON group listing, then one CSV export per
//! group. Group metadata is extracted leniently because the listing format
//! has drifted between a bare array and a `{ "results": [...] }` envelope.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::util::env::env_opt;

const DEFAULT_FEED_URL: &str = "https://tcgcsv.com/tcgplayer/71";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One product group from the feed listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceGroup {
    pub group_id: i64,
    pub chapter: String,
    pub abbreviation: String,
}

/// One product row from a group's CSV export. Prices may be blank.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceRow {
    #[serde(rename = "extNumber", default)]
    pub ext_number: String,
    #[serde(rename = "subTypeName", default)]
    pub sub_type_name: String,
    #[serde(rename = "lowPrice", default)]
    pub low_price: Option<f64>,
    #[serde(rename = "midPrice", default)]
    pub mid_price: Option<f64>,
    #[serde(rename = "marketPrice", default)]
    pub market_price: Option<f64>,
}

#[async_trait]
pub trait PriceSource {
    async fn groups(&self) -> Result<Vec<PriceGroup>, SyncError>;
    async fn group_rows(&self, group_id: i64) -> Result<Vec<PriceRow>, SyncError>;
}

/// Production feed client over the tcgcsv-style HTTP layout:
/// `{base}/groups` for the listing, `{base}/{group_id}/ProductsAndPrices.csv`
/// per group.
pub struct TcgCsvFeed {
    http: Client,
    base_url: String,
}

impl TcgCsvFeed {
    pub fn new(base_url: Option<String>) -> Result<Self, SyncError> {
        let base_url = base_url
            .or_else(|| env_opt("PRICE_FEED_URL"))
            .unwrap_or_else(|| DEFAULT_FEED_URL.to_string());
        let http = Client::builder()
            .user_agent(concat!("lorekeeper/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl PriceSource for TcgCsvFeed {
    async fn groups(&self) -> Result<Vec<PriceGroup>, SyncError> {
        let url = format!("{}/groups", self.base_url);
        info!(url = %url, "loading price feed groups");
        let raw: Value = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(parse_groups(&raw))
    }

    async fn group_rows(&self, group_id: i64) -> Result<Vec<PriceRow>, SyncError> {
        let url = format!("{}/{}/ProductsAndPrices.csv", self.base_url, group_id);
        info!(group_id, url = %url, "downloading group prices");
        let text = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_rows(&text)
    }
}

/// Extract groups from either a bare array or a `results` envelope. Entries
/// missing any of groupId/chapter/abbreviation are skipped with a warning.
pub fn parse_groups(raw: &Value) -> Vec<PriceGroup> {
    let entries = match raw {
        Value::Array(entries) => entries.as_slice(),
        Value::Object(obj) => obj
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    let mut groups = Vec::new();
    for entry in entries {
        let group_id = entry.get("groupId").and_then(Value::as_i64);
        let chapter = entry.get("chapter").map(scalar_string);
        let abbreviation = entry.get("abbreviation").map(scalar_string);
        match (group_id, chapter, abbreviation) {
            (Some(group_id), Some(chapter), Some(abbreviation)) => groups.push(PriceGroup {
                group_id,
                chapter,
                abbreviation,
            }),
            _ => warn!(entry = %entry, "skipping group with missing fields"),
        }
    }
    groups
}

/// Parse a CSV export into rows. A malformed row fails the whole group; the
/// feed ships machine-generated CSV, so a parse error means the format moved.
pub fn parse_rows(csv_text: &str) -> Result<Vec<PriceRow>, SyncError> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: PriceRow =
            row.map_err(|e| SyncError::SourceUnavailable(format!("price csv: {e}")))?;
        rows.push(row);
    }
    Ok(rows)
}

fn scalar_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_array_of_groups() {
        let raw = json!([
            { "groupId": 23303, "chapter": 1, "abbreviation": "ROF" },
            { "groupId": 23304, "chapter": "2", "abbreviation": "RIR" }
        ]);
        let groups = parse_groups(&raw);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].chapter, "1");
        assert_eq!(groups[1].abbreviation, "RIR");
    }

    #[test]
    fn parses_results_envelope_and_skips_partial_groups() {
        let raw = json!({ "results": [
            { "groupId": 1, "chapter": "1", "abbreviation": "ROF" },
            { "groupId": 2, "chapter": "2" }
        ]});
        let groups = parse_groups(&raw);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_id, 1);
    }

    #[test]
    fn parses_csv_rows_with_blank_prices() {
        let csv = "extNumber,subTypeName,lowPrice,midPrice,marketPrice\n\
                   12/204,Normal,0.5,1.0,0.8\n\
                   12/204,Foil,,,\n";
        let rows = parse_rows(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].market_price, Some(0.8));
        assert_eq!(rows[1].sub_type_name, "Foil");
        assert_eq!(rows[1].low_price, None);
    }

    #[test]
    fn extra_csv_columns_are_ignored() {
        let csv = "productId,extNumber,subTypeName,lowPrice,midPrice,marketPrice,url\n\
                   99,7,Normal,1,2,3,https://x\n";
        let rows = parse_rows(csv).unwrap();
        assert_eq!(rows[0].ext_number, "7");
    }
}
