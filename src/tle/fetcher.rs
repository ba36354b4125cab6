use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::FetchError;
use super::provider::{ElementSetProvider, ProviderSession};

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Retrieves element sets in batches and persists them to the cache file.
///
/// The cache file is only replaced after every batch has succeeded, with a single write of the
/// concatenated text.
pub struct TleFetcher<P> {
    provider: Arc<P>,
    cache_file: PathBuf,
    batch_size: usize,
}

impl<P: ElementSetProvider> TleFetcher<P> {
    pub fn new(provider: Arc<P>, cache_file: PathBuf, batch_size: usize) -> Self {
        Self {
            provider,
            cache_file,
            batch_size: batch_size.max(1),
        }
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Fetch all `catalog_ids` and return the raw text that was written to the cache.
    pub async fn fetch(&self, catalog_ids: &[u32]) -> Result<String, FetchError> {
        if catalog_ids.is_empty() {
            return Err(FetchError::NoSatellites);
        }

        log::info!("Fetching TLE data for {} satellites", catalog_ids.len());
        let session = self.provider.login().await.inspect_err(|e| {
            log::error!("TLE fetch aborted, login failed: {}", e);
        })?;

        let batch_count = catalog_ids.len().div_ceil(self.batch_size);
        let mut raw = String::new();
        for (i, batch) in catalog_ids.chunks(self.batch_size).enumerate() {
            let text = session.fetch_elements(batch).await.inspect_err(|e| {
                log::error!(
                    "TLE fetch aborted, batch {}/{} failed: {}",
                    i + 1,
                    batch_count,
                    e
                );
            })?;
            log::debug!("Batch {}/{}: {} bytes", i + 1, batch_count, text.len());

            let text = text.trim_end();
            if !text.is_empty() {
                raw.push_str(text);
                raw.push('\n');
            }
        }

        if !raw.lines().any(|l| l.trim_start().starts_with("1 ")) {
            log::error!("TLE fetch aborted, no element sets in response");
            return Err(FetchError::Malformed("no element sets in response".into()));
        }

        write_replacing(&self.cache_file, &raw).await?;
        log::info!("TLE cache updated ({})", self.cache_file.display());
        Ok(raw)
    }
}

/// Write to a sibling temp file, then rename over the target.
pub(crate) async fn write_replacing(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await
}
