use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use sgp4::{Constants, Elements};

use super::error::{StoreError, TleParseError};
use super::names::{synthetic_name, NameResolver};
use super::provider::ElementSetProvider;

const TLE_LINE_LENGTH: usize = 69;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TleRecord {
    pub catalog_id: u32,
    pub name: String,
    pub line1: String,
    pub line2: String,
}

type Snapshot = Arc<HashMap<u32, TleRecord>>;

/// The set of element sets currently served.
///
/// A reload builds a complete new map and swaps it in under the write lock, so readers see
/// either the old snapshot or the new one.
#[derive(Default)]
pub struct TleStore {
    records: RwLock<Snapshot>,
}

impl TleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, catalog_id: u32) -> Option<TleRecord> {
        self.snapshot().get(&catalog_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Sorted catalog IDs in the current snapshot.
    pub fn catalog_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.snapshot().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Parse `raw`, resolve names and replace the whole collection. Returns the new size.
    pub async fn reload_from<P: ElementSetProvider>(
        &self,
        raw: &str,
        resolver: &NameResolver<P>,
    ) -> usize {
        let pairs = parse_pairs(raw);
        let ids: Vec<u32> = pairs.iter().map(|(id, _, _)| *id).collect();
        let mut names = resolver.resolve_all(&ids).await;

        let records: HashMap<u32, TleRecord> = pairs
            .into_iter()
            .map(|(catalog_id, line1, line2)| {
                let name = names
                    .remove(&catalog_id)
                    .unwrap_or_else(|| synthetic_name(catalog_id));
                let record = TleRecord {
                    catalog_id,
                    name,
                    line1,
                    line2,
                };
                (catalog_id, record)
            })
            .collect();

        let count = records.len();
        self.swap(Arc::new(records));
        log::info!("TLE store reloaded with {} satellites", count);
        count
    }

    /// Reload from the cache file. A missing file leaves the store untouched.
    pub async fn load_file<P: ElementSetProvider>(
        &self,
        path: &Path,
        resolver: &NameResolver<P>,
    ) -> Result<usize, StoreError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("TLE cache {} does not exist yet", path.display());
                return Ok(self.len());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(self.reload_from(&raw, resolver).await)
    }

    fn swap(&self, records: Snapshot) {
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = records;
    }
}

/// Split raw element-set text into validated `(catalog_id, line1, line2)` triples.
///
/// Bad pairs and stray lines are logged and skipped; the rest still load.
pub fn parse_pairs(raw: &str) -> Vec<(u32, String, String)> {
    let lines: Vec<&str> = raw
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        // Resynchronise on anything that cannot start a pair
        if !lines[i].starts_with('1') {
            log::warn!("Skipping stray TLE line {}: {}", i + 1, lines[i]);
            i += 1;
            continue;
        }
        let Some(line2) = lines.get(i + 1) else {
            log::warn!("Skipping bad TLE pair: {}", TleParseError::Unpaired(i + 1));
            break;
        };

        match validate_pair(lines[i], line2) {
            Ok(catalog_id) => {
                result.push((catalog_id, lines[i].to_string(), line2.to_string()));
                i += 2;
            }
            // A bad line 1 followed by another line 1: drop only the bad one
            Err(e) if line2.starts_with("1 ") => {
                log::warn!("Skipping bad TLE line: {} due to {}", lines[i], e);
                i += 1;
            }
            Err(e) => {
                log::warn!("Skipping bad TLE lines: {} {} due to {}", lines[i], line2, e);
                i += 2;
            }
        }
    }

    result
}

/// Catalog number from columns 3-7 of line 1.
pub fn catalog_id(line1: &str) -> Result<u32, TleParseError> {
    let field = line1
        .get(2..7)
        .ok_or_else(|| TleParseError::CatalogId(line1.to_string()))?;
    field
        .trim()
        .parse()
        .map_err(|_| TleParseError::CatalogId(field.to_string()))
}

fn validate_pair(line1: &str, line2: &str) -> Result<u32, TleParseError> {
    if !line1.starts_with("1 ") || !line2.starts_with("2 ") {
        return Err(TleParseError::LineNumber);
    }
    for line in [line1, line2] {
        if line.len() != TLE_LINE_LENGTH {
            return Err(TleParseError::Length(line.len()));
        }
    }

    let id1 = catalog_id(line1)?;
    let id2 = catalog_id(line2)?;
    if id1 != id2 {
        return Err(TleParseError::CatalogMismatch(id1, id2));
    }

    let elements = Elements::from_tle(None, line1.as_bytes(), line2.as_bytes())
        .map_err(|e| TleParseError::Elements(e.to_string()))?;
    Constants::from_elements(&elements).map_err(|e| TleParseError::Elements(e.to_string()))?;

    Ok(id1)
}
