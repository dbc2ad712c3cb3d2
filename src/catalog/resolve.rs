//! Variant precedence and attribute inheritance over flattened catalog
//! records.
//!
//! Records are partitioned into four buckets (normal/special crossed with
//! English/other) and resolved in a fixed stage order. All state lives in a
//! run-scoped [`RunContext`]; nothing survives between runs.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::catalog::model::CardRecord;
use crate::normalization::identifier::{self, ParsedIdentifier, Variant};

/// English image pair recorded during the normal-English stage, keyed by
/// deduplication identity. Donated to every later stage for the same
/// identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImagePair {
    pub url_512: String,
    pub url_2048: String,
}

/// Run-scoped resolution state. Consumed identities are tracked per
/// language, so a special printing is only suppressed by a normal printing
/// of the same language (English specials by English normals, German
/// specials by German normals, and so on).
#[derive(Debug, Default)]
struct RunContext {
    consumed: HashMap<String, HashSet<String>>,
    english_images: HashMap<String, ImagePair>,
}

impl RunContext {
    fn is_consumed(&self, language: &str, identity: &str) -> bool {
        self.consumed
            .get(language)
            .is_some_and(|ids| ids.contains(identity))
    }

    fn consume(&mut self, language: &str, identity: &str) -> bool {
        self.consumed
            .entry(language.to_string())
            .or_default()
            .insert(identity.to_string())
    }
}

/// Counters surfaced in the run summary.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResolveSummary {
    pub normal_english: usize,
    pub special_english: usize,
    pub normal_other: usize,
    pub special_other: usize,
    pub malformed: usize,
    pub kept: usize,
    pub dropped: usize,
    pub images_inherited: usize,
}

#[derive(Debug, Default)]
struct Buckets {
    normal_english: Vec<CardRecord>,
    special_english: Vec<CardRecord>,
    normal_other: Vec<CardRecord>,
    special_other: Vec<CardRecord>,
    malformed: usize,
}

/// Consumption key for a record: English records share one key regardless of
/// their source language folder, everything else keys on its language.
fn consumption_language(record: &CardRecord) -> &str {
    if identifier::is_english(&record.card_identifier) {
        "en"
    } else {
        &record.language
    }
}

fn partition(records: Vec<CardRecord>) -> Buckets {
    let mut buckets = Buckets::default();
    for record in records {
        let english = identifier::is_english(&record.card_identifier);
        let variant = match ParsedIdentifier::parse(&record.card_identifier) {
            Ok(parsed) => parsed.variant(),
            Err(e) => {
                // Unparseable identifiers still flow through, at the lowest
                // precedence.
                warn!(identifier = %record.card_identifier, error = %e, "malformed identifier");
                buckets.malformed += 1;
                buckets.special_other.push(record);
                continue;
            }
        };
        match (variant, english) {
            (Variant::Normal, true) => buckets.normal_english.push(record),
            (Variant::Special, true) => buckets.special_english.push(record),
            (Variant::Normal, false) => buckets.normal_other.push(record),
            (Variant::Special, false) => buckets.special_other.push(record),
        }
    }
    buckets
}

/// Resolve precedence across all fetched records and inherit English images.
///
/// Returns the kept records in stage order (normal English, special English,
/// normal other, special other) plus summary counters. Within a stage the
/// first record for a (language, identity) pair wins.
pub fn resolve(records: Vec<CardRecord>) -> (Vec<CardRecord>, ResolveSummary) {
    let total = records.len();
    let buckets = partition(records);

    let mut summary = ResolveSummary {
        normal_english: buckets.normal_english.len(),
        special_english: buckets.special_english.len(),
        normal_other: buckets.normal_other.len(),
        special_other: buckets.special_other.len(),
        malformed: buckets.malformed,
        ..Default::default()
    };

    let mut ctx = RunContext::default();
    let mut kept: Vec<CardRecord> = Vec::with_capacity(total);

    // Stage 1: normal English. Kept unless a stage-1 duplicate already
    // claimed the identity; image pair recorded for inheritance.
    for record in buckets.normal_english {
        let identity = record.identity().to_string();
        if !ctx.consume("en", &identity) {
            debug!(identifier = %record.card_identifier, "duplicate identity within stage");
            summary.dropped += 1;
            continue;
        }
        ctx.english_images.insert(
            identity,
            ImagePair {
                url_512: record.image_url_512.clone(),
                url_2048: record.image_url_2048.clone(),
            },
        );
        kept.push(record);
    }

    // Stage 2: special English. Kept only when no normal English printing
    // claimed the identity.
    for record in buckets.special_english {
        if ctx.is_consumed("en", record.identity()) {
            debug!(identifier = %record.card_identifier, "special printing shadowed");
            summary.dropped += 1;
            continue;
        }
        ctx.consume("en", record.identity());
        kept.push(record);
    }

    // Stage 3: normal other languages. Same first-wins rule per language;
    // English image inherited when a donor exists.
    for mut record in buckets.normal_other {
        let lang = consumption_language(&record).to_string();
        if !ctx.consume(&lang, record.identity()) {
            debug!(identifier = %record.card_identifier, "duplicate identity within stage");
            summary.dropped += 1;
            continue;
        }
        if inherit_image(&ctx, &mut record) {
            summary.images_inherited += 1;
        }
        kept.push(record);
    }

    // Stage 4: special other languages. Same-language suppression only.
    for mut record in buckets.special_other {
        let lang = consumption_language(&record).to_string();
        if ctx.is_consumed(&lang, record.identity()) {
            debug!(identifier = %record.card_identifier, "special printing shadowed");
            summary.dropped += 1;
            continue;
        }
        ctx.consume(&lang, record.identity());
        if inherit_image(&ctx, &mut record) {
            summary.images_inherited += 1;
        }
        kept.push(record);
    }

    summary.kept = kept.len();
    info!(
        total,
        kept = summary.kept,
        dropped = summary.dropped,
        malformed = summary.malformed,
        images_inherited = summary.images_inherited,
        "precedence resolved"
    );
    (kept, summary)
}

/// English donor image wins when present; otherwise the record keeps its own
/// (possibly empty) URLs. Both resolutions move together.
fn inherit_image(ctx: &RunContext, record: &mut CardRecord) -> bool {
    let Some(donor) = ctx.english_images.get(record.identity()) else {
        return false;
    };
    record.image_url_512 = donor.url_512.clone();
    record.image_url_2048 = donor.url_2048.clone();
    true
}
