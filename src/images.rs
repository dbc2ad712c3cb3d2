//! Card image sink: deterministic target paths under an images root,
//! write-once downloads, per-file failure logging.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::catalog::model::CardRecord;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const RESOLUTIONS: [i64; 2] = [512, 2048];

/// One planned download.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTarget {
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DownloadStats {
    pub written: usize,
    pub skipped_existing: usize,
    pub failed: usize,
}

pub struct ImageSink {
    root: PathBuf,
    http: Client,
}

impl ImageSink {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("lorekeeper/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            root: root.into(),
            http,
        })
    }

    /// Target path for one (language, resolution, identifier, url) tuple:
    /// `{root}/{language}/{resolution}/{sanitized identifier}{ext}`. The same
    /// inputs always plan the same path.
    pub fn plan(
        &self,
        language: &str,
        resolution: i64,
        card_identifier: &str,
        url: &str,
    ) -> ImageTarget {
        let file = format!(
            "{}{}",
            sanitize_identifier(card_identifier),
            extension_of(url)
        );
        ImageTarget {
            path: self
                .root
                .join(language)
                .join(resolution.to_string())
                .join(file),
            url: url.to_string(),
        }
    }

    /// Download every planned image that does not already exist on disk.
    /// Failures are logged per file and counted, never fatal.
    pub async fn download_missing(&self, records: &[CardRecord]) -> Result<DownloadStats> {
        let mut stats = DownloadStats::default();
        for record in records {
            for resolution in RESOLUTIONS {
                let url = match resolution {
                    512 => &record.image_url_512,
                    _ => &record.image_url_2048,
                };
                if url.is_empty() {
                    continue;
                }
                let target = self.plan(&record.language, resolution, &record.card_identifier, url);
                if target.path.exists() {
                    stats.skipped_existing += 1;
                    continue;
                }
                match self.fetch_one(&target).await {
                    Ok(()) => {
                        debug!(path = %target.path.display(), "image written");
                        stats.written += 1;
                    }
                    Err(e) => {
                        warn!(
                            identifier = %record.card_identifier,
                            url = %target.url,
                            error = %e,
                            "image download failed"
                        );
                        stats.failed += 1;
                    }
                }
            }
        }
        info!(
            written = stats.written,
            skipped = stats.skipped_existing,
            failed = stats.failed,
            "image sink finished"
        );
        Ok(stats)
    }

    async fn fetch_one(&self, target: &ImageTarget) -> Result<()> {
        if let Some(parent) = target.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let bytes = self
            .http
            .get(&target.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        std::fs::write(&target.path, &bytes)
            .with_context(|| format!("writing {}", target.path.display()))?;
        Ok(())
    }
}

fn sanitize_identifier(identifier: &str) -> String {
    identifier.replace([' ', '/'], "_")
}

/// File extension from the URL path, `.jpg` when the path carries none.
fn extension_of(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };
    Path::new(&path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| ".jpg".to_string())
}
