use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::catalog::{Catalog, CatalogStore, HealthRow, JsonFileStore};
use crate::costing::{Recipe, RecipeCost, cost_recipe};
use crate::error::{CatalogError, FetchError, IngredientError, SyncError};
use crate::models::{ExternalId, Ingredient, IngredientUpdate, NewIngredient, PriceMap, SyncSummary};
use crate::sync;

/// Remote price lookup.
///
/// The CLI implements this with reqwest. One call is one batched request:
/// it either returns prices for whatever ids the source knows, or fails as a
/// whole. Called synchronously; async callers should run the sync pass on a
/// blocking thread.
pub trait PriceSource: Send + Sync {
    fn fetch_prices(&self, ids: &BTreeSet<ExternalId>) -> Result<PriceMap, FetchError>;
}

pub struct CatalogService<S: CatalogStore = JsonFileStore> {
    store: S,
}

impl CatalogService<JsonFileStore> {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFileStore::new(path))
    }
}

impl<S: CatalogStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load(&self) -> Result<Catalog, CatalogError> {
        self.store.load()
    }

    /// Load the catalog, starting from an empty one if the file does not exist yet.
    pub fn load_or_default(&self) -> Result<Catalog, CatalogError> {
        match self.store.load() {
            Err(CatalogError::NotFound(_)) => Ok(Catalog::default()),
            other => other,
        }
    }

    pub fn list(&self, search: Option<&str>) -> Result<Vec<Ingredient>, CatalogError> {
        let catalog = self.store.load()?;
        Ok(catalog
            .search(search.unwrap_or_default())
            .into_iter()
            .cloned()
            .collect())
    }

    // --- Manual entry ---

    pub fn add_ingredient(&self, new: NewIngredient) -> Result<Ingredient> {
        let mut catalog = self.load_or_default()?;
        let item = new.into_ingredient(uuid::Uuid::new_v4().to_string())?;
        catalog.push(item.clone());
        self.store.save(&catalog)?;
        tracing::info!(id = item.id(), name = item.name(), "ingredient added");
        Ok(item)
    }

    pub fn update_ingredient(&self, id: &str, update: &IngredientUpdate) -> Result<Ingredient> {
        let mut catalog = self.store.load()?;
        let item = catalog
            .get_mut(id)
            .ok_or_else(|| IngredientError::NotFound(id.to_string()))?;
        item.apply_update(update)
            .with_context(|| format!("Failed to update ingredient '{id}'"))?;
        let updated = item.clone();
        self.store.save(&catalog)?;
        tracing::info!(id, "ingredient updated");
        Ok(updated)
    }

    // --- Sync ---

    pub fn sync_prices(
        &self,
        source: &dyn PriceSource,
        dry_run: bool,
    ) -> Result<SyncSummary, SyncError> {
        sync::run_sync(&self.store, source, dry_run)
    }

    pub fn health(&self) -> Result<Vec<HealthRow>, CatalogError> {
        Ok(self.store.load()?.health())
    }

    // --- Recipe costing ---

    pub fn cost_recipe(&self, recipe: &Recipe) -> Result<RecipeCost, CatalogError> {
        let catalog = self.store.load()?;
        Ok(cost_recipe(recipe, &catalog))
    }
}
