//! End-to-end pipeline tests over in-memory SQLite and canned sources.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;

use lorekeeper::catalog::{sync_catalog, CatalogCard, CatalogSource, Category};
use lorekeeper::error::SyncError;
use lorekeeper::normalization::matching::strategy_by_name;
use lorekeeper::prices::{reconcile_prices, PriceGroup, PriceRow, PriceSource};
use lorekeeper::store::CardStore;

struct FakeCatalog {
    by_language: HashMap<String, Vec<(Category, CatalogCard)>>,
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_language(
        &self,
        lang: &str,
    ) -> Result<Vec<(Category, CatalogCard)>, SyncError> {
        Ok(self.by_language.get(lang).cloned().unwrap_or_default())
    }
}

struct FakeFeed {
    groups: Vec<PriceGroup>,
    rows: HashMap<i64, Vec<PriceRow>>,
}

#[async_trait]
impl PriceSource for FakeFeed {
    async fn groups(&self) -> Result<Vec<PriceGroup>, SyncError> {
        Ok(self.groups.clone())
    }

    async fn group_rows(&self, group_id: i64) -> Result<Vec<PriceRow>, SyncError> {
        Ok(self.rows.get(&group_id).cloned().unwrap_or_default())
    }
}

fn card(identifier: &str, deck_id: &str, image: &str) -> CatalogCard {
    let image_urls = if image.is_empty() {
        json!([])
    } else {
        json!([
            { "height": 512, "url": image },
            { "height": 2048, "url": format!("{image}-hi") }
        ])
    };
    serde_json::from_value(json!({
        "card_identifier": identifier,
        "name": "Card",
        "deck_building_id": deck_id,
        "image_urls": image_urls,
    }))
    .unwrap()
}

fn row(ext_number: &str, subtype: &str, market: Option<f64>) -> PriceRow {
    PriceRow {
        ext_number: ext_number.to_string(),
        sub_type_name: subtype.to_string(),
        low_price: market.map(|m| m / 2.0),
        mid_price: market,
        market_price: market,
    }
}

fn group(id: i64, chapter: &str, abbr: &str) -> PriceGroup {
    PriceGroup {
        group_id: id,
        chapter: chapter.to_string(),
        abbreviation: abbr.to_string(),
    }
}

fn market_price_of(store: &CardStore, identifier: &str) -> Option<f64> {
    store
        .conn()
        .query_row(
            "SELECT market_price FROM cards WHERE card_identifier = ?1",
            [identifier],
            |r| r.get(0),
        )
        .unwrap()
}

#[tokio::test]
async fn catalog_sync_resolves_and_stores() {
    let source = FakeCatalog {
        by_language: HashMap::from([
            (
                "en".to_string(),
                vec![
                    (Category::Characters, card("205/204 EN 6", "d1", "https://img/en")),
                    (Category::Characters, card("P1 EN 6", "d1", "https://img/promo")),
                ],
            ),
            (
                "de".to_string(),
                vec![(Category::Characters, card("205/204 DE 6", "d1", "https://img/de"))],
            ),
        ]),
    };
    let store = CardStore::open_in_memory().unwrap();
    let languages = vec!["en".to_string(), "de".to_string()];

    let report = sync_catalog(&source, &store, None, &languages).await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.resolve.dropped, 1);
    assert_eq!(report.stored, 2);
    assert_eq!(store.count_cards().unwrap(), 2);

    // German row carries the English image.
    let image: String = store
        .conn()
        .query_row(
            "SELECT image_url_512 FROM cards WHERE card_identifier = '205/204 DE 6'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(image, "https://img/en");
}

#[tokio::test]
async fn catalog_sync_is_idempotent() {
    let source = FakeCatalog {
        by_language: HashMap::from([(
            "en".to_string(),
            vec![(Category::Items, card("12/204 EN ROF", "d2", ""))],
        )]),
    };
    let store = CardStore::open_in_memory().unwrap();
    let languages = vec!["en".to_string()];

    sync_catalog(&source, &store, None, &languages).await.unwrap();
    sync_catalog(&source, &store, None, &languages).await.unwrap();
    assert_eq!(store.count_cards().unwrap(), 1);
}

#[tokio::test]
async fn token_strategy_matches_abbreviation_and_chapter_tags() {
    let source = FakeCatalog {
        by_language: HashMap::from([(
            "en".to_string(),
            vec![
                (Category::Characters, card("12/204 EN ROF", "d1", "")),
                (Category::Characters, card("25/204 EN 5", "d2", "")),
            ],
        )]),
    };
    let store = CardStore::open_in_memory().unwrap();
    sync_catalog(&source, &store, None, &["en".to_string()])
        .await
        .unwrap();

    let feed = FakeFeed {
        groups: vec![group(100, "1", "ROF"), group(200, "5", "SSK")],
        rows: HashMap::from([
            (100, vec![row("12/204", "Normal", Some(4.2))]),
            (200, vec![row("25", "Normal", Some(1.5))]),
        ]),
    };
    let strategy = strategy_by_name("token-normalized").unwrap();

    let report = reconcile_prices(&store, &feed, strategy.as_ref()).await.unwrap();
    assert_eq!(report.updated, 2);
    assert_eq!(report.unmatched, 0);
    assert_eq!(market_price_of(&store, "12/204 EN ROF"), Some(4.2));
    assert_eq!(market_price_of(&store, "25/204 EN 5"), Some(1.5));
}

#[tokio::test]
async fn non_normal_subtypes_never_update_prices() {
    let source = FakeCatalog {
        by_language: HashMap::from([(
            "en".to_string(),
            vec![(Category::Characters, card("12/204 EN ROF", "d1", ""))],
        )]),
    };
    let store = CardStore::open_in_memory().unwrap();
    sync_catalog(&source, &store, None, &["en".to_string()])
        .await
        .unwrap();

    let feed = FakeFeed {
        groups: vec![group(100, "1", "ROF")],
        rows: HashMap::from([(100, vec![row("12/204", "Foil", Some(99.0))])]),
    };
    let strategy = strategy_by_name("token-normalized").unwrap();

    let report = reconcile_prices(&store, &feed, strategy.as_ref()).await.unwrap();
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped_subtype, 1);
    assert_eq!(market_price_of(&store, "12/204 EN ROF"), None);
}

#[tokio::test]
async fn unmatched_rows_are_counted_with_bounded_sample() {
    let store = CardStore::open_in_memory().unwrap();
    let rows: Vec<PriceRow> = (0..25)
        .map(|i| row(&format!("{i}/204"), "Normal", Some(1.0)))
        .collect();
    let feed = FakeFeed {
        groups: vec![group(100, "1", "ROF")],
        rows: HashMap::from([(100, rows)]),
    };
    let strategy = strategy_by_name("token-normalized").unwrap();

    let report = reconcile_prices(&store, &feed, strategy.as_ref()).await.unwrap();
    assert_eq!(report.updated, 0);
    assert_eq!(report.unmatched, 25);
    assert_eq!(report.unmatched_sample.len(), 10);
}

#[tokio::test]
async fn exact_composite_matches_language_rewritten_identifiers() {
    let store = CardStore::open_in_memory().unwrap();
    // Composite-form identifiers as found in legacy-style stores.
    store
        .conn()
        .execute(
            "INSERT INTO cards (card_identifier) VALUES ('1ROF-DE-12_204')",
            [],
        )
        .unwrap();

    let feed = FakeFeed {
        groups: vec![group(100, "1", "ROF")],
        rows: HashMap::from([(100, vec![row("12/204", "Normal", Some(2.5))])]),
    };
    let strategy = strategy_by_name("exact-composite").unwrap();

    let report = reconcile_prices(&store, &feed, strategy.as_ref()).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(market_price_of(&store, "1ROF-DE-12_204"), Some(2.5));
}

#[tokio::test]
async fn reconciliation_heals_stores_without_price_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE cards (id INTEGER PRIMARY KEY AUTOINCREMENT, card_identifier TEXT UNIQUE);
             INSERT INTO cards (card_identifier) VALUES ('12/204 EN ROF');",
        )
        .unwrap();
    }

    let store = CardStore::open(&path).unwrap();
    let feed = FakeFeed {
        groups: vec![group(100, "1", "ROF")],
        rows: HashMap::from([(100, vec![row("12/204", "Normal", Some(3.0))])]),
    };
    let strategy = strategy_by_name("token-normalized").unwrap();

    let report = reconcile_prices(&store, &feed, strategy.as_ref()).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(market_price_of(&store, "12/204 EN ROF"), Some(3.0));
}

#[tokio::test]
async fn reconciliation_is_idempotent() {
    let source = FakeCatalog {
        by_language: HashMap::from([(
            "en".to_string(),
            vec![(Category::Characters, card("12/204 EN ROF", "d1", ""))],
        )]),
    };
    let store = CardStore::open_in_memory().unwrap();
    sync_catalog(&source, &store, None, &["en".to_string()])
        .await
        .unwrap();

    let feed = FakeFeed {
        groups: vec![group(100, "1", "ROF")],
        rows: HashMap::from([(100, vec![row("12/204", "Normal", Some(4.2))])]),
    };
    let strategy = strategy_by_name("token-normalized").unwrap();

    let first = reconcile_prices(&store, &feed, strategy.as_ref()).await.unwrap();
    let second = reconcile_prices(&store, &feed, strategy.as_ref()).await.unwrap();
    assert_eq!(first.updated, 1);
    assert_eq!(second.updated, 1);
    assert_eq!(market_price_of(&store, "12/204 EN ROF"), Some(4.2));
}
