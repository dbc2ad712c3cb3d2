//! Export the canonical `cards` table into a second SQLite database in the
//! legacy column layout consumed by older tooling.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::info;

use crate::store::CardStore;

/// One canonical row lifted into memory for export. Loose string columns are
/// parsed leniently at write time.
#[derive(Debug, Clone)]
struct SourceRow {
    language_is_english: bool,
    magic_ink_colors: String,
    ink_convertible: bool,
    rarity: String,
    category: String,
    card_identifier: String,
    card_sets: String,
    author: String,
    name: String,
    subtitle: String,
    ink_cost: String,
    quest_value: String,
    strength: String,
    willpower: String,
    flavor_text: String,
    rules_text: String,
    image_url: String,
    deck_building_id: String,
}

/// Copy every card into `dest_path` using the legacy schema. English rows
/// are written first and donate their image URL to later rows sharing a
/// deck-building id, mirroring the catalog-side inheritance for stores that
/// predate it.
pub fn export_legacy(store: &CardStore, dest_path: impl AsRef<Path>) -> Result<usize> {
    let rows = load_rows(store)?;
    let dest = Connection::open(dest_path.as_ref())
        .with_context(|| format!("opening legacy export at {}", dest_path.as_ref().display()))?;
    ensure_legacy_schema(&dest)?;

    let (english, other): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|r| r.language_is_english);

    let mut english_images: HashMap<String, String> = HashMap::new();
    let mut count = 0usize;

    for row in &english {
        if !row.deck_building_id.is_empty() && !row.image_url.is_empty() {
            english_images.insert(row.deck_building_id.clone(), row.image_url.clone());
        }
        insert_legacy(&dest, row, &row.image_url)?;
        count += 1;
    }

    for row in &other {
        let image_url = english_images
            .get(&row.deck_building_id)
            .cloned()
            .unwrap_or_else(|| row.image_url.clone());
        insert_legacy(&dest, row, &image_url)?;
        count += 1;
    }

    info!(rows = count, dest = %dest_path.as_ref().display(), "legacy export written");
    Ok(count)
}

fn load_rows(store: &CardStore) -> Result<Vec<SourceRow>> {
    let mut stmt = store.conn().prepare(
        r#"
SELECT card_identifier, magic_ink_colors, ink_convertible, rarity, category,
       card_sets, author, name, subtitle, ink_cost, quest_value, strength,
       willpower, flavor_text, rules_text, image_url_512, deck_building_id
FROM cards ORDER BY id
"#,
    )?;
    let rows = stmt.query_map([], |row| {
        let card_identifier: String = row.get(0)?;
        Ok(SourceRow {
            language_is_english: card_identifier.contains(" EN "),
            card_identifier,
            magic_ink_colors: row.get(1)?,
            ink_convertible: row.get::<_, i64>(2)? != 0,
            rarity: row.get(3)?,
            category: row.get(4)?,
            card_sets: row.get(5)?,
            author: row.get(6)?,
            name: row.get(7)?,
            subtitle: row.get(8)?,
            ink_cost: row.get(9)?,
            quest_value: row.get(10)?,
            strength: row.get(11)?,
            willpower: row.get(12)?,
            flavor_text: row.get(13)?,
            rules_text: row.get(14)?,
            image_url: row.get(15)?,
            deck_building_id: row.get(16)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn ensure_legacy_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS cards (
    id INTEGER PRIMARY KEY,
    color TEXT,
    inkwell BOOLEAN,
    rarity TEXT,
    type TEXT,
    fullIdentifier TEXT,
    setNumber INTEGER,
    number INTEGER,
    artist TEXT,
    baseName TEXT,
    fullName TEXT,
    simpleName TEXT,
    subtitle TEXT,
    cost INTEGER,
    lore INTEGER,
    strength INTEGER,
    willpower INTEGER,
    flavorText TEXT,
    fullText TEXT,
    story TEXT,
    imageUrl TEXT,
    deck_building_id TEXT
);
"#,
    )?;
    Ok(())
}

fn insert_legacy(conn: &Connection, row: &SourceRow, image_url: &str) -> Result<()> {
    let full_name = if row.subtitle.is_empty() {
        row.name.clone()
    } else {
        format!("{} - {}", row.name, row.subtitle)
    };
    conn.execute(
        r#"
INSERT INTO cards (
    color, inkwell, rarity, type, fullIdentifier, setNumber, number, artist,
    baseName, fullName, simpleName, subtitle, cost, lore, strength, willpower,
    flavorText, fullText, story, imageUrl, deck_building_id
) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)
"#,
        params![
            row.magic_ink_colors,
            row.ink_convertible as i64,
            row.rarity,
            row.category,
            row.card_identifier,
            int_or_zero(&row.card_sets),
            leading_number(&row.card_identifier),
            row.author,
            row.name,
            full_name,
            row.name,
            row.subtitle,
            int_or_zero(&row.ink_cost),
            int_or_zero(&row.quest_value),
            int_or_zero(&row.strength),
            int_or_zero(&row.willpower),
            row.flavor_text,
            row.rules_text,
            Option::<String>::None,
            image_url,
            row.deck_building_id,
        ],
    )?;
    Ok(())
}

fn int_or_zero(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

/// Collector number: portion of the identifier before the first `/`, 0 when
/// non-numeric (promo identifiers).
fn leading_number(identifier: &str) -> i64 {
    identifier
        .split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .parse()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::CardRecord;
    use tempfile::tempdir;

    fn record(identifier: &str, deck_id: &str, img: &str) -> CardRecord {
        CardRecord {
            language: (if identifier.contains(" EN ") { "en" } else { "de" }).to_string(),
            category: "characters".to_string(),
            name: "Elsa".to_string(),
            subtitle: "Snow Queen".to_string(),
            sort_number: 1,
            rules_text: "Rush".to_string(),
            flavor_text: String::new(),
            card_identifier: identifier.to_string(),
            deck_building_id: deck_id.to_string(),
            rarity: "rare".to_string(),
            author: "A. Artist".to_string(),
            ink_cost: "4".to_string(),
            quest_value: "2".to_string(),
            strength: "not-a-number".to_string(),
            willpower: "5".to_string(),
            ink_convertible: true,
            card_sets: "5".to_string(),
            magic_ink_colors: "Amber".to_string(),
            image_url_512: img.to_string(),
            image_url_2048: String::new(),
        }
    }

    #[test]
    fn exports_with_lenient_numbers_and_image_inheritance() {
        let store = CardStore::open_in_memory().unwrap();
        store
            .upsert_card(&record("42/204 EN 5", "d1", "https://img/en"))
            .unwrap();
        store.upsert_card(&record("42/204 DE 5", "d1", "")).unwrap();

        let dir = tempdir().unwrap();
        let dest = dir.path().join("legacy.db");
        let count = export_legacy(&store, &dest).unwrap();
        assert_eq!(count, 2);

        let conn = Connection::open(&dest).unwrap();
        let (number, strength, image): (i64, i64, String) = conn
            .query_row(
                "SELECT number, strength, imageUrl FROM cards WHERE fullIdentifier = '42/204 DE 5'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(number, 42);
        assert_eq!(strength, 0);
        assert_eq!(image, "https://img/en");

        let full_name: String = conn
            .query_row(
                "SELECT fullName FROM cards WHERE fullIdentifier = '42/204 EN 5'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(full_name, "Elsa - Snow Queen");
    }
}
