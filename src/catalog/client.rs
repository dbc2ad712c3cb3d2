//! Catalog retrieval: OAuth2 client-credentials token fetch, one JSON
//! document per language, optional raw dump of every card to disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::model::{CatalogCard, CatalogDocument, Category};
use crate::error::SyncError;
use crate::util::env::{env_opt, env_req};

const DEFAULT_TOKEN_URL: &str = "https://sso.ravensburger.de/token";
const DEFAULT_BASE_URL: &str = "https://api.lorcana.ravensburger.com/v2/catalog";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Supplier of per-language catalog records. Kept as a trait so tests can
/// feed canned documents without a network.
#[async_trait]
pub trait CatalogSource {
    /// All cards of the consumed categories for one language code.
    async fn fetch_language(&self, lang: &str)
        -> Result<Vec<(Category, CatalogCard)>, SyncError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

/// Production catalog client. Holds the bearer token for the lifetime of the
/// run; tokens are not refreshed mid-run.
pub struct RavensburgerCatalog {
    http: Client,
    base_url: String,
    bearer: String,
    dump_dir: Option<PathBuf>,
}

impl RavensburgerCatalog {
    /// Exchange the client-credentials secret (env `CATALOG_AUTH`, a
    /// pre-built Authorization header value) for a bearer token.
    pub async fn connect() -> Result<Self, SyncError> {
        let auth = env_req("CATALOG_AUTH")
            .map_err(|e| SyncError::SourceUnavailable(e.to_string()))?;
        let token_url =
            env_opt("CATALOG_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());
        let base_url =
            env_opt("CATALOG_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let http = Client::builder()
            .user_agent("")
            .timeout(HTTP_TIMEOUT)
            .build()?;

        debug!(url = %token_url, "requesting catalog token");
        let token: TokenResponse = http
            .post(&token_url)
            .header("Authorization", auth)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Self {
            http,
            base_url,
            bearer: format!("{} {}", token.token_type, token.access_token),
            dump_dir: None,
        })
    }

    /// Also write each fetched card as a pretty JSON file under `dir`.
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    fn dump_language(&self, lang: &str, document: &Value) {
        let Some(root) = &self.dump_dir else { return };
        if let Err(e) = dump_document(&root.join(lang), document) {
            warn!(lang, error = %e, "catalog dump failed");
        }
    }
}

#[async_trait]
impl CatalogSource for RavensburgerCatalog {
    async fn fetch_language(
        &self,
        lang: &str,
    ) -> Result<Vec<(Category, CatalogCard)>, SyncError> {
        let url = format!("{}/{}", self.base_url, lang);
        info!(lang, url = %url, "downloading catalog");

        let raw: Value = self
            .http
            .get(&url)
            .header("Authorization", &self.bearer)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        self.dump_language(lang, &raw);

        let document: CatalogDocument = serde_json::from_value(raw)
            .map_err(|e| SyncError::SourceUnavailable(format!("catalog document: {e}")))?;

        let mut cards = Vec::new();
        for (key, entries) in document.cards {
            let Some(category) = Category::from_key(&key) else {
                debug!(lang, category = %key, "skipping unconsumed category");
                continue;
            };
            for card in entries {
                cards.push((category, card));
            }
        }
        info!(lang, cards = cards.len(), "catalog downloaded");
        Ok(cards)
    }
}

/// File name for one dumped card: identifier with `/`→`_`, space-separated
/// tokens reversed and joined with `-`.
pub fn dump_filename(card_identifier: &str) -> String {
    let joined = card_identifier
        .replace('/', "_")
        .split(' ')
        .rev()
        .join("-");
    format!("{joined}.json")
}

fn dump_document(lang_dir: &Path, document: &Value) -> std::io::Result<()> {
    let Some(cards) = document.get("cards").and_then(Value::as_object) else {
        return Ok(());
    };

    for (category, entries) in cards {
        let dir = lang_dir.join("cards").join(category);
        std::fs::create_dir_all(&dir)?;
        let Some(entries) = entries.as_array() else { continue };
        for entry in entries {
            let mut entry = entry.clone();
            if let Some(abilities) = entry
                .get_mut("abilities")
                .and_then(Value::as_array_mut)
            {
                abilities.sort_by_key(|a| a.as_str().unwrap_or_default().to_string());
            }
            let identifier = entry
                .get("card_identifier")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let pretty = serde_json::to_string_pretty(&entry)?;
            std::fs::write(dir.join(dump_filename(identifier)), pretty)?;
        }
    }

    // Catalog envelope without the card payload, for diffing feed changes.
    let mut stripped = document.clone();
    if let Some(obj) = stripped.as_object_mut() {
        obj.remove("cards");
    }
    std::fs::create_dir_all(lang_dir)?;
    std::fs::write(
        lang_dir.join("catalog-no-cards.json"),
        serde_json::to_string_pretty(&stripped)?,
    )?;
    Ok(())
}
