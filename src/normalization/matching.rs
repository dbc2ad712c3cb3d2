//! Cross-source matching strategies between catalog card identifiers and
//! price-feed product rows.
//!
//! A strategy maps both sides onto a shared string key space. The feed side
//! may emit several candidate keys per product (e.g. abbreviation vs chapter
//! label); the catalog side emits at most one key per identifier. Strategies
//! are pure and hold no state, so a run consults a fixed ordered list built
//! once via [`strategies`].

use itertools::Itertools;

/// Feed-side product identity, borrowed from the group metadata and the CSV
/// row it came from.
#[derive(Debug, Clone, Copy)]
pub struct FeedProduct<'a> {
    /// Collector number as printed in the feed (`extNumber`), possibly with a
    /// `/{total}` suffix.
    pub local_number: &'a str,
    /// Numeric chapter label of the product group (e.g. `"1"`).
    pub chapter: &'a str,
    /// Set abbreviation of the product group (e.g. `"ROF"`).
    pub abbreviation: &'a str,
}

pub trait MatchStrategy: Send + Sync {
    /// Stable name used for CLI selection and reporting.
    fn name(&self) -> &'static str;

    /// Candidate keys for a feed product, in preference order, deduplicated.
    fn feed_keys(&self, product: &FeedProduct<'_>) -> Vec<String>;

    /// Key for a catalog identifier, or `None` when the identifier does not
    /// carry enough structure for this strategy.
    fn catalog_key(&self, card_identifier: &str) -> Option<String>;
}

/// Composite-identifier equality: the feed key is assembled as
/// `{chapter}{abbreviation}-EN-{number}`, and catalog identifiers are
/// compared after rewriting their language segment to `-EN-`. Matches
/// catalogs that store identifiers in this composite form.
pub struct ExactComposite;

impl MatchStrategy for ExactComposite {
    fn name(&self) -> &'static str {
        "exact-composite"
    }

    fn feed_keys(&self, product: &FeedProduct<'_>) -> Vec<String> {
        vec![format!(
            "{}{}-EN-{}",
            product.chapter,
            product.abbreviation,
            product.local_number.replace('/', "_")
        )]
    }

    fn catalog_key(&self, card_identifier: &str) -> Option<String> {
        Some(
            card_identifier
                .replace("-DE-", "-EN-")
                .replace("-FR-", "-EN-")
                .replace("-IT-", "-EN-"),
        )
    }
}

/// Token-reduced matching for space-form identifiers such as
/// `"12/204 EN ROF"`: both sides reduce to `"{number} {set tag}"`, where the
/// number drops any `/{total}` suffix. The feed tries the set abbreviation
/// first and falls back to the numeric chapter label, covering catalogs that
/// tag identifiers with either.
pub struct TokenNormalized;

impl MatchStrategy for TokenNormalized {
    fn name(&self) -> &'static str {
        "token-normalized"
    }

    fn feed_keys(&self, product: &FeedProduct<'_>) -> Vec<String> {
        let number = product
            .local_number
            .split('/')
            .next()
            .unwrap_or(product.local_number)
            .trim();
        [product.abbreviation, product.chapter]
            .iter()
            .filter(|tag| !tag.is_empty())
            .map(|tag| format!("{number} {tag}"))
            .unique()
            .collect()
    }

    fn catalog_key(&self, card_identifier: &str) -> Option<String> {
        let tokens: Vec<&str> = card_identifier.split_whitespace().collect();
        if tokens.len() < 3 {
            return None;
        }
        let number = tokens[0].split('/').next().unwrap_or(tokens[0]);
        let tag = tokens[tokens.len() - 1];
        Some(format!("{number} {tag}"))
    }
}

/// The fixed strategy list for a reconciliation run, in application order.
pub fn strategies() -> Vec<Box<dyn MatchStrategy>> {
    vec![Box::new(ExactComposite), Box::new(TokenNormalized)]
}

/// Look up a single strategy by its stable name.
pub fn strategy_by_name(name: &str) -> Option<Box<dyn MatchStrategy>> {
    strategies().into_iter().find(|s| s.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product<'a>(num: &'a str, chapter: &'a str, abbr: &'a str) -> FeedProduct<'a> {
        FeedProduct {
            local_number: num,
            chapter,
            abbreviation: abbr,
        }
    }

    #[test]
    fn exact_composite_builds_english_composite_key() {
        let keys = ExactComposite.feed_keys(&product("12/204", "1", "ROF"));
        assert_eq!(keys, vec!["1ROF-EN-12_204".to_string()]);
    }

    #[test]
    fn exact_composite_rewrites_language_segment() {
        assert_eq!(
            ExactComposite.catalog_key("1ROF-DE-12_204").as_deref(),
            Some("1ROF-EN-12_204")
        );
        assert_eq!(
            ExactComposite.catalog_key("1ROF-EN-12_204").as_deref(),
            Some("1ROF-EN-12_204")
        );
    }

    #[test]
    fn token_normalized_reduces_both_sides_to_common_key() {
        let feed = TokenNormalized.feed_keys(&product("12/204", "1", "ROF"));
        let catalog = TokenNormalized.catalog_key("12/204 EN ROF").unwrap();
        assert!(feed.contains(&catalog));
    }

    #[test]
    fn token_normalized_falls_back_to_chapter_label() {
        let feed = TokenNormalized.feed_keys(&product("25", "5", "SSK"));
        assert_eq!(feed, vec!["25 SSK".to_string(), "25 5".to_string()]);
        let catalog = TokenNormalized.catalog_key("25/204 EN 5").unwrap();
        assert_eq!(catalog, "25 5");
        assert!(feed.contains(&catalog));
    }

    #[test]
    fn token_normalized_rejects_short_identifiers() {
        assert_eq!(TokenNormalized.catalog_key("25/204"), None);
        assert_eq!(TokenNormalized.catalog_key("25 EN"), None);
    }

    #[test]
    fn duplicate_feed_tags_collapse_to_one_key() {
        let feed = TokenNormalized.feed_keys(&product("7", "Q1", "Q1"));
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn strategy_lookup_by_name() {
        assert!(strategy_by_name("exact-composite").is_some());
        assert!(strategy_by_name("token-normalized").is_some());
        assert!(strategy_by_name("fuzzy").is_none());
    }
}
