use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::CatalogError;
use crate::models::{Ingredient, Source, SyncState};

/// The ordered list of ingredients as kept in the catalog file.
///
/// Loaded catalogs only come from [`Catalog::parse`], so they always have
/// unique string ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    items: Vec<Ingredient>,
}

/// One line of the sync health report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRow {
    pub id: String,
    pub name: String,
    pub external_id: Option<String>,
    /// `None` until the first successful sync.
    pub status: Option<SyncState>,
    pub last_synced_at: Option<String>,
    pub scraped_price: Option<f64>,
    pub scraped_unit_price: Option<f64>,
}

impl Catalog {
    /// Parse and validate catalog JSON. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, CatalogError> {
        let malformed = |reason: String| CatalogError::Malformed {
            path: origin.to_path_buf(),
            reason,
        };

        let value: Value = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
        let Value::Array(records) = value else {
            return Err(malformed("expected a JSON array of ingredients".into()));
        };

        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            let Value::Object(fields) = record else {
                return Err(malformed(format!("entry {idx} is not an object")));
            };
            let item = Ingredient::from_fields(fields);
            let id = match item.fields().get("id") {
                Some(Value::String(id)) if !id.trim().is_empty() => id.clone(),
                _ => return Err(malformed(format!("entry {idx} has no string id"))),
            };
            if !seen.insert(id.clone()) {
                return Err(malformed(format!("duplicate ingredient id '{id}'")));
            }
            items.push(item);
        }
        Ok(Self { items })
    }

    #[must_use]
    pub fn items(&self) -> &[Ingredient] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [Ingredient] {
        &mut self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Ingredient> {
        self.items.iter().find(|i| i.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Ingredient> {
        self.items.iter_mut().find(|i| i.id() == id)
    }

    pub fn push(&mut self, item: Ingredient) {
        self.items.push(item);
    }

    /// Case-insensitive name filter; an empty query matches everything.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Ingredient> {
        let needle = query.trim().to_lowercase();
        self.items
            .iter()
            .filter(|i| needle.is_empty() || i.name().to_lowercase().contains(&needle))
            .collect()
    }

    /// Sync state of every external ingredient, in catalog order.
    #[must_use]
    pub fn health(&self) -> Vec<HealthRow> {
        self.items
            .iter()
            .filter(|i| i.source() == Source::External)
            .map(|i| {
                let status = i.sync_status();
                HealthRow {
                    id: i.id().to_string(),
                    name: i.name().to_string(),
                    external_id: i.external_id().map(|e| e.to_string()),
                    status: status.as_ref().map(|s| s.status),
                    last_synced_at: status.as_ref().map(|s| s.last_synced_at.clone()),
                    scraped_price: status.as_ref().and_then(|s| s.scraped_price),
                    scraped_unit_price: status.as_ref().and_then(|s| s.scraped_unit_price),
                }
            })
            .collect()
    }
}

/// Persistent home of the catalog.
pub trait CatalogStore {
    fn load(&self) -> Result<Catalog, CatalogError>;
    fn save(&self, catalog: &Catalog) -> Result<(), CatalogError>;
}

/// Catalog kept as a pretty-printed JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogStore for JsonFileStore {
    fn load(&self) -> Result<Catalog, CatalogError> {
        let text = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CatalogError::NotFound(self.path.clone())
            } else {
                CatalogError::Unavailable {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        Catalog::parse(&text, &self.path)
    }

    /// Write to a temp file beside the target, then rename it into place.
    ///
    /// The temp file is deleted when dropped, so every failure path leaves the
    /// target as it was and nothing behind in the directory.
    fn save(&self, catalog: &Catalog) -> Result<(), CatalogError> {
        let write_failed = |source: io::Error| CatalogError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
        // The temp file is created owner-only; keep the catalog's own mode.
        if let Ok(existing) = fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(existing.permissions())
                .map_err(write_failed)?;
        }
        serde_json::to_writer_pretty(&mut tmp, catalog)
            .map_err(|e| write_failed(io::Error::from(e)))?;
        tmp.write_all(b"\n").map_err(write_failed)?;
        tmp.as_file().sync_all().map_err(write_failed)?;
        tmp.persist(&self.path).map_err(|e| write_failed(e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            items = catalog.len(),
            "catalog saved"
        );
        Ok(())
    }
}
