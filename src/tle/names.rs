use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;

use super::error::{FetchError, NameMapError};
use super::fetcher::write_replacing;
use super::provider::{ElementSetProvider, ProviderSession};

/// What to do with an ID whose name lookup failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameRetryPolicy {
    /// Look the ID up again on the next store reload.
    #[default]
    OnReload,
    /// Remember the failure until the process restarts.
    OnRestart,
}

pub fn synthetic_name(catalog_id: u32) -> String {
    format!("SAT-{}", catalog_id)
}

/// Catalog ID to name, persisted as a JSON object keyed by the ID string.
#[derive(Debug)]
pub struct NameMap {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl NameMap {
    /// Load from `path`; a missing file is an empty map.
    pub fn load(path: PathBuf) -> Result<Self, NameMapError> {
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    pub fn get(&self, catalog_id: u32) -> Option<&str> {
        self.entries.get(&catalog_id.to_string()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Insert and write the whole map back to disk.
    pub async fn insert(&mut self, catalog_id: u32, name: String) -> Result<(), NameMapError> {
        self.entries.insert(catalog_id.to_string(), name);
        let json = serde_json::to_string_pretty(&self.entries)?;
        write_replacing(&self.path, &json).await?;
        Ok(())
    }
}

/// Resolves catalog IDs to names, asking the provider only for IDs not yet in the map.
///
/// Names are never refreshed once cached, so an upstream rename is not picked up until the
/// entry is removed from the map file by hand.
pub struct NameResolver<P> {
    provider: Arc<P>,
    map: Mutex<NameMap>,
    policy: NameRetryPolicy,
    failed: Mutex<HashSet<u32>>,
}

impl<P: ElementSetProvider> NameResolver<P> {
    pub fn new(provider: Arc<P>, map: NameMap, policy: NameRetryPolicy) -> Self {
        Self {
            provider,
            map: Mutex::new(map),
            policy,
            failed: Mutex::new(HashSet::new()),
        }
    }

    /// Resolve every ID. Misses share one provider session, opened only if needed; each
    /// failure falls back to the synthetic name for that ID alone and is not persisted.
    pub async fn resolve_all(&self, catalog_ids: &[u32]) -> HashMap<u32, String> {
        let mut map = self.map.lock().await;
        let mut failed = self.failed.lock().await;
        let mut resolved = HashMap::with_capacity(catalog_ids.len());
        let mut misses = Vec::new();

        for &id in catalog_ids {
            if resolved.contains_key(&id) || misses.contains(&id) {
                continue;
            }
            match map.get(id) {
                Some(name) => {
                    resolved.insert(id, name.to_string());
                }
                None if self.policy == NameRetryPolicy::OnRestart && failed.contains(&id) => {
                    resolved.insert(id, synthetic_name(id));
                }
                None => misses.push(id),
            }
        }

        if misses.is_empty() {
            return resolved;
        }

        log::info!("Resolving names for {} new satellites", misses.len());
        let session = match self.provider.login().await {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("Name lookup login failed: {}", e);
                None
            }
        };

        for id in misses {
            let lookup = match &session {
                Some(session) => session.lookup_name(id).await,
                None => Err(FetchError::Auth("no session".into())),
            };

            let name = match lookup {
                Ok(name) => {
                    if let Err(e) = map.insert(id, name.clone()).await {
                        log::error!("Failed to persist name for {}: {}", id, e);
                    }
                    failed.remove(&id);
                    name
                }
                Err(e) => {
                    log::warn!("Name lookup for {} failed: {}", id, e);
                    failed.insert(id);
                    synthetic_name(id)
                }
            };
            resolved.insert(id, name);
        }

        resolved
    }
}

#[cfg(test)]
impl<P: ElementSetProvider> NameResolver<P> {
    async fn cached(&self, catalog_id: u32) -> Option<String> {
        self.map.lock().await.get(catalog_id).map(String::from)
    }

    async fn resolve(&self, catalog_id: u32) -> String {
        self.resolve_all(&[catalog_id])
            .await
            .remove(&catalog_id)
            .unwrap_or_else(|| synthetic_name(catalog_id))
    }
}
