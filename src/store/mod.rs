//! SQLite-backed card store. One `cards` table keyed by `card_identifier`;
//! schema creation is idempotent and price columns are self-healed on stores
//! created before price reconciliation existed.

pub mod legacy;

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::catalog::model::CardRecord;
use crate::error::SyncError;

const PRICE_COLUMNS: [&str; 3] = ["low_price", "mid_price", "market_price"];

pub struct CardStore {
    conn: Connection,
}

impl CardStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("opening card store at {}", path.as_ref().display()))?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS cards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    language TEXT,
    category TEXT,
    name TEXT,
    subtitle TEXT,
    sort_number INTEGER,
    rules_text TEXT,
    flavor_text TEXT,
    card_identifier TEXT UNIQUE,
    deck_building_id TEXT,
    rarity TEXT,
    author TEXT,
    ink_cost TEXT,
    quest_value TEXT,
    strength TEXT,
    willpower TEXT,
    ink_convertible INTEGER,
    card_sets TEXT,
    magic_ink_colors TEXT,
    image_url_512 TEXT,
    image_url_2048 TEXT,
    low_price REAL,
    mid_price REAL,
    market_price REAL,
    updated_at TEXT
);
"#,
        )?;
        Ok(())
    }

    /// Add any missing price columns. Stores created by earlier versions
    /// lack them; adding a column is the only healing performed, nothing is
    /// dropped or rewritten.
    pub fn ensure_price_columns(&self) -> Result<()> {
        let existing = sqlite_columns(&self.conn, "cards")?;
        for column in PRICE_COLUMNS {
            if !existing.contains(column) {
                let mismatch =
                    SyncError::SchemaMismatch(format!("cards table missing column {column}"));
                warn!(error = %mismatch, "healing store schema");
                self.conn
                    .execute(&format!("ALTER TABLE cards ADD COLUMN {column} REAL"), [])?;
            }
        }
        Ok(())
    }

    /// Insert or refresh one resolved record, keyed by its identifier.
    /// Existing price columns are left untouched.
    pub fn upsert_card(&self, record: &CardRecord) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO cards (
    language, category, name, subtitle, sort_number, rules_text, flavor_text,
    card_identifier, deck_building_id, rarity, author, ink_cost, quest_value,
    strength, willpower, ink_convertible, card_sets, magic_ink_colors,
    image_url_512, image_url_2048, updated_at
) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)
ON CONFLICT(card_identifier) DO UPDATE SET
    language = excluded.language,
    category = excluded.category,
    name = excluded.name,
    subtitle = excluded.subtitle,
    sort_number = excluded.sort_number,
    rules_text = excluded.rules_text,
    flavor_text = excluded.flavor_text,
    deck_building_id = excluded.deck_building_id,
    rarity = excluded.rarity,
    author = excluded.author,
    ink_cost = excluded.ink_cost,
    quest_value = excluded.quest_value,
    strength = excluded.strength,
    willpower = excluded.willpower,
    ink_convertible = excluded.ink_convertible,
    card_sets = excluded.card_sets,
    magic_ink_colors = excluded.magic_ink_colors,
    image_url_512 = excluded.image_url_512,
    image_url_2048 = excluded.image_url_2048,
    updated_at = excluded.updated_at
"#,
            params![
                record.language,
                record.category,
                record.name,
                record.subtitle,
                record.sort_number,
                record.rules_text,
                record.flavor_text,
                record.card_identifier,
                record.deck_building_id,
                record.rarity,
                record.author,
                record.ink_cost,
                record.quest_value,
                record.strength,
                record.willpower,
                record.ink_convertible as i64,
                record.card_sets,
                record.magic_ink_colors,
                record.image_url_512,
                record.image_url_2048,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// (row id, card_identifier) for every stored card, in insertion order.
    pub fn card_identifiers(&self) -> Result<Vec<(i64, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, card_identifier FROM cards ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn update_prices(
        &self,
        id: i64,
        low: Option<f64>,
        mid: Option<f64>,
        market: Option<f64>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE cards SET low_price = ?1, mid_price = ?2, market_price = ?3 WHERE id = ?4",
            params![low, mid, market, id],
        )?;
        Ok(())
    }

    pub fn count_cards(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Store all resolved records and log the outcome.
    pub fn store_records(&self, records: &[CardRecord]) -> Result<usize> {
        for record in records {
            self.upsert_card(record)
                .with_context(|| format!("upserting {}", record.card_identifier))?;
        }
        info!(records = records.len(), "card records stored");
        Ok(records.len())
    }
}

/// Lowercased column names of a table via PRAGMA introspection.
pub fn sqlite_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    let mut cols = HashSet::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        cols.insert(name.to_lowercase());
    }
    Ok(cols)
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
