use crate::error::SyncError;

/// Structured form of a raw card identifier such as `"25/204 EN 5"` or
/// `"P2 EN Q1"`.
///
/// Decomposition rules:
/// - the language code is the first two-uppercase-letter token bounded by
///   single spaces on both sides (first match wins; an earlier non-language
///   two-letter uppercase token would be taken instead — known ambiguity,
///   deliberately not resolved here)
/// - the local number is the substring before the first `/`, else the first
///   whitespace-delimited token
/// - the printing is normal iff the segment after the first `/` starts with a
///   digits-only token; anything else, including the absence of a `/`, is a
///   special (promo/alternate) printing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIdentifier {
    raw: String,
    local_number: String,
    language: String,
    trailing: String,
    variant: Variant,
}

/// Normal numbered release vs promotional/alternate printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Normal,
    Special,
}

/// Language-stripped join key unifying catalog and price-feed identities.
///
/// Deterministic and order-stable: parsing the same identifier twice always
/// yields the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    /// Local number with any `/{total}` suffix removed.
    pub number: String,
    /// Trailing set/chapter token of the identifier.
    pub set_tag: String,
}

impl ParsedIdentifier {
    /// Parse a raw identifier string. Pure function over its input; fails
    /// with `MalformedIdentifier` when no spaced two-letter language token
    /// exists.
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        let trimmed = raw.trim();
        let language = extract_language(trimmed)
            .ok_or_else(|| SyncError::MalformedIdentifier(raw.to_string()))?;

        let local_number = match trimmed.split_once('/') {
            Some((before, _)) => before.trim().to_string(),
            None => trimmed
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let trailing = trimmed
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            raw: trimmed.to_string(),
            local_number,
            language,
            trailing,
            variant: classify_variant(trimmed),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Local number as printed (may be alphanumeric for special printings).
    pub fn local_number(&self) -> &str {
        &self.local_number
    }

    /// Two-uppercase-letter language token.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Trailing token after the language code (set/chapter number or promo
    /// marker such as `Q1`).
    pub fn trailing_token(&self) -> &str {
        &self.trailing
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn is_normal(&self) -> bool {
        self.variant == Variant::Normal
    }

    /// Join key with the language stripped.
    pub fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey {
            number: self.local_number.clone(),
            set_tag: self.trailing.clone(),
        }
    }
}

/// Variant classification works on the raw string alone so that records whose
/// language token cannot be extracted can still be classified.
pub fn classify_variant(raw: &str) -> Variant {
    match raw.split_once('/') {
        Some((_, rest)) => {
            let lead = rest.split_whitespace().next().unwrap_or_default();
            if !lead.is_empty() && lead.bytes().all(|b| b.is_ascii_digit()) {
                Variant::Normal
            } else {
                Variant::Special
            }
        }
        None => Variant::Special,
    }
}

/// English detection is a literal marker test, kept independent of the
/// generic two-letter extraction: the English bucket drives precedence and
/// must not depend on ambiguity resolution in `extract_language`.
pub fn is_english(raw: &str) -> bool {
    raw.contains(" EN ")
}

fn extract_language(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    for i in 0..bytes.len().saturating_sub(3) {
        if bytes[i] == b' '
            && bytes[i + 1].is_ascii_uppercase()
            && bytes[i + 2].is_ascii_uppercase()
            && bytes[i + 3] == b' '
        {
            return Some(raw[i + 1..i + 3].to_string());
        }
    }
    None
}
