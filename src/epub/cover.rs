//! Cover image fetching from Open Library.
//!
//! One GET request per fetch, no retries. Open Library answers requests
//! for unknown ISBNs with a tiny placeholder image instead of a 404, so
//! anything under [`PLACEHOLDER_THRESHOLD`] bytes counts as "no cover".

use std::path::Path;
use tracing::info;

use crate::error::Result;

use super::opf::normalize_isbn;

/// Cover image service, keyed by ISBN.
pub const DEFAULT_COVER_SERVICE: &str = "https://covers.openlibrary.org/b/isbn";

/// Responses smaller than this are the service's 1x1 "not found" gif
/// (~43 bytes), never a real cover.
const PLACEHOLDER_THRESHOLD: u64 = 1000;

/// Outcome of a cover fetch. Transport failures are errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverStatus {
    Found,
    NotFound,
}

/// Fetches cover images by ISBN.
pub struct CoverFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl CoverFetcher {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_COVER_SERVICE)
    }

    /// Use a different service endpoint (tests point this at a mock server).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch the large cover for `isbn` and write it to `dest`.
    ///
    /// The destination is overwritten only when a real cover comes back;
    /// on [`CoverStatus::NotFound`] no file is touched.
    pub async fn fetch(&self, isbn: &str, dest: &Path) -> Result<CoverStatus> {
        let isbn = normalize_isbn(isbn);
        let url = format!("{}/{}-L.jpg", self.base_url, isbn);

        info!("fetching cover from {url}");
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            info!("cover fetch failed: HTTP {}", response.status());
            return Ok(CoverStatus::NotFound);
        }

        if let Some(length) = response.content_length() {
            if length < PLACEHOLDER_THRESHOLD {
                info!("cover not found (placeholder image returned)");
                return Ok(CoverStatus::NotFound);
            }
        }

        let payload = response.bytes().await?;

        // The length header can be absent or wrong; check the real size too.
        if (payload.len() as u64) < PLACEHOLDER_THRESHOLD {
            info!("cover not found (placeholder image returned)");
            return Ok(CoverStatus::NotFound);
        }

        std::fs::write(dest, &payload)?;
        info!("cover saved to {}", dest.display());
        Ok(CoverStatus::Found)
    }
}

impl Default for CoverFetcher {
    fn default() -> Self {
        Self::new()
    }
}
