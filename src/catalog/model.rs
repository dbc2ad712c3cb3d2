use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Card categories consumed from the catalog document. Anything else in the
/// source's `cards` map is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Actions,
    Characters,
    Items,
    Locations,
}

impl Category {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "actions" => Some(Self::Actions),
            "characters" => Some(Self::Characters),
            "items" => Some(Self::Items),
            "locations" => Some(Self::Locations),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Actions => "actions",
            Self::Characters => "characters",
            Self::Items => "items",
            Self::Locations => "locations",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageUrl {
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub url: String,
}

/// One card as delivered by the catalog source. Numeric-ish fields arrive
/// inconsistently typed (number, string, or absent), so they stay as raw
/// values until flattening.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogCard {
    #[serde(default)]
    pub card_identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub sort_number: i64,
    #[serde(default)]
    pub rules_text: String,
    #[serde(default)]
    pub flavor_text: String,
    #[serde(default)]
    pub deck_building_id: String,
    #[serde(default)]
    pub rarity: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub ink_cost: Value,
    #[serde(default)]
    pub quest_value: Value,
    #[serde(default)]
    pub strength: Value,
    #[serde(default)]
    pub willpower: Value,
    #[serde(default)]
    pub ink_convertible: bool,
    #[serde(default)]
    pub card_sets: Vec<Value>,
    #[serde(default)]
    pub magic_ink_colors: Vec<String>,
    #[serde(default)]
    pub image_urls: Vec<ImageUrl>,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Per-language catalog document: a `cards` map of category name to card
/// array, plus whatever else the source ships alongside. Order is preserved
/// so the raw-dump output matches the source.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub cards: IndexMap<String, Vec<CatalogCard>>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl CatalogCard {
    /// URL of the image entry with the given height, if any.
    pub fn image_url(&self, height: i64) -> Option<&str> {
        self.image_urls
            .iter()
            .find(|e| e.height == height)
            .map(|e| e.url.as_str())
    }

    /// Set label: lowest numeric entry of `card_sets`, else the first entry
    /// stringified, else empty.
    pub fn card_sets_label(&self) -> String {
        let numeric = self
            .card_sets
            .iter()
            .filter_map(scalar_as_u64)
            .min();
        if let Some(n) = numeric {
            return n.to_string();
        }
        self.card_sets
            .first()
            .map(scalar_to_string)
            .unwrap_or_default()
    }

    /// Ink colors joined with " / ", each capitalized.
    pub fn ink_colors_label(&self) -> String {
        self.magic_ink_colors
            .iter()
            .map(|c| capitalize(c))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Flattened store row for one catalog card in one language. Loosely typed
/// columns stay strings; the source does not guarantee numerics.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRecord {
    pub language: String,
    pub category: String,
    pub name: String,
    pub subtitle: String,
    pub sort_number: i64,
    pub rules_text: String,
    pub flavor_text: String,
    pub card_identifier: String,
    pub deck_building_id: String,
    pub rarity: String,
    pub author: String,
    pub ink_cost: String,
    pub quest_value: String,
    pub strength: String,
    pub willpower: String,
    pub ink_convertible: bool,
    pub card_sets: String,
    pub magic_ink_colors: String,
    pub image_url_512: String,
    pub image_url_2048: String,
}

impl CardRecord {
    pub fn from_card(language: &str, category: Category, card: &CatalogCard) -> Self {
        Self {
            language: language.to_string(),
            category: category.as_str().to_string(),
            name: card.name.clone(),
            subtitle: card.subtitle.clone(),
            sort_number: card.sort_number,
            rules_text: card.rules_text.clone(),
            flavor_text: card.flavor_text.clone(),
            card_identifier: card.card_identifier.clone(),
            deck_building_id: card.deck_building_id.clone(),
            rarity: card.rarity.clone(),
            author: card.author.clone(),
            ink_cost: scalar_to_string(&card.ink_cost),
            quest_value: scalar_to_string(&card.quest_value),
            strength: scalar_to_string(&card.strength),
            willpower: scalar_to_string(&card.willpower),
            ink_convertible: card.ink_convertible,
            card_sets: card.card_sets_label(),
            magic_ink_colors: card.ink_colors_label(),
            image_url_512: card.image_url(512).unwrap_or_default().to_string(),
            image_url_2048: card.image_url(2048).unwrap_or_default().to_string(),
        }
    }

    /// Display name in "Name - Subtitle" form, or just the name when no
    /// subtitle exists.
    pub fn full_name(&self) -> String {
        if self.subtitle.is_empty() {
            self.name.clone()
        } else {
            format!("{} - {}", self.name, self.subtitle)
        }
    }

    /// Deduplication identity: the deck-building id when present, else the
    /// raw identifier (a record with neither shared id nor identifier never
    /// collides with another).
    pub fn identity(&self) -> &str {
        if self.deck_building_id.is_empty() {
            &self.card_identifier
        } else {
            &self.deck_building_id
        }
    }
}

fn scalar_as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Stringify a scalar without the JSON quoting `Value::to_string` adds.
pub fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let rest = chars.as_str().to_lowercase();
            first.to_uppercase().collect::<String>() + &rest
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card_from(value: Value) -> CatalogCard {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn deserializes_card_with_missing_fields() {
        let card = card_from(json!({ "card_identifier": "25/204 EN 5" }));
        assert_eq!(card.card_identifier, "25/204 EN 5");
        assert!(card.name.is_empty());
        assert!(card.image_urls.is_empty());
    }

    #[test]
    fn picks_image_by_height() {
        let card = card_from(json!({
            "image_urls": [
                { "height": 512, "url": "https://img.example/a-512.webp" },
                { "height": 2048, "url": "https://img.example/a-2048.webp" }
            ]
        }));
        assert_eq!(card.image_url(512), Some("https://img.example/a-512.webp"));
        assert_eq!(card.image_url(1024), None);
    }

    #[test]
    fn card_sets_label_prefers_lowest_numeric() {
        let card = card_from(json!({ "card_sets": ["7", 3, "not-a-number"] }));
        assert_eq!(card.card_sets_label(), "3");

        let card = card_from(json!({ "card_sets": ["promo"] }));
        assert_eq!(card.card_sets_label(), "promo");

        let card = card_from(json!({}));
        assert_eq!(card.card_sets_label(), "");
    }

    #[test]
    fn ink_colors_join_capitalized() {
        let card = card_from(json!({ "magic_ink_colors": ["amber", "STEEL"] }));
        assert_eq!(card.ink_colors_label(), "Amber / Steel");
    }

    #[test]
    fn record_flattens_loose_scalars() {
        let card = card_from(json!({
            "card_identifier": "25/204 EN 5",
            "name": "Elsa",
            "subtitle": "Snow Queen",
            "ink_cost": 4,
            "strength": "3",
            "willpower": null
        }));
        let record = CardRecord::from_card("en", Category::Characters, &card);
        assert_eq!(record.ink_cost, "4");
        assert_eq!(record.strength, "3");
        assert_eq!(record.willpower, "");
        assert_eq!(record.full_name(), "Elsa - Snow Queen");
        assert_eq!(record.category, "characters");
    }

    #[test]
    fn identity_falls_back_to_identifier() {
        let card = card_from(json!({ "card_identifier": "P1 EN 6" }));
        let record = CardRecord::from_card("en", Category::Actions, &card);
        assert_eq!(record.identity(), "P1 EN 6");

        let card = card_from(json!({
            "card_identifier": "P1 EN 6",
            "deck_building_id": "abc123"
        }));
        let record = CardRecord::from_card("en", Category::Actions, &card);
        assert_eq!(record.identity(), "abc123");
    }
}
