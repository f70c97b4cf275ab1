//! One price sync pass: select external items, fetch their prices in one
//! batch, merge, persist.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::catalog::{Catalog, CatalogStore};
use crate::error::SyncError;
use crate::models::{
    ExternalId, Ingredient, PriceMap, RemotePriceSnapshot, SyncState, SyncStatus, SyncSummary,
};
use crate::pricing::normalize;
use crate::service::PriceSource;

/// Ids of every external item that can be synced.
#[must_use]
pub fn select_syncable(catalog: &Catalog) -> BTreeSet<ExternalId> {
    catalog
        .items()
        .iter()
        .filter(|i| i.is_syncable())
        .filter_map(Ingredient::external_id)
        .collect()
}

/// Merge fetched prices into the catalog in memory.
///
/// Manual items are skipped before any of their fields are read beyond
/// `source`. A selected item absent from `prices` keeps its prices; its audit
/// record (if any) is flagged missing.
pub fn merge_prices(catalog: &mut Catalog, prices: &PriceMap, synced_at: &str) -> SyncSummary {
    let mut summary = SyncSummary::default();

    for item in catalog.items_mut() {
        if !item.is_syncable() {
            continue;
        }
        let Some(external_id) = item.external_id() else {
            continue;
        };
        summary.selected += 1;

        if let Some(snapshot) = prices.get(&external_id) {
            apply_snapshot(item, snapshot, synced_at);
            summary.updated += 1;
        } else if item.mark_missing(synced_at) {
            tracing::warn!(id = item.id(), %external_id, "item not found at price source");
            summary.missing += 1;
        } else {
            tracing::warn!(
                id = item.id(),
                %external_id,
                "item not found at price source and never synced"
            );
        }
    }

    summary
}

/// Write a found product into its item. Prices are only touched when the
/// source quoted a package price; the audit record is always refreshed.
fn apply_snapshot(item: &mut Ingredient, snapshot: &RemotePriceSnapshot, synced_at: &str) {
    if let Some(total_price) = snapshot.total_price {
        let package_size = item.package_size().unwrap_or_default();
        item.set_package_price(total_price);

        let unit = item.unit();
        match normalize(&unit, total_price, &package_size, snapshot.reference_unit_price) {
            Some(price_per_unit) => {
                tracing::debug!(id = item.id(), %unit, price_per_unit, "normalized");
                item.set_price_per_unit(price_per_unit);
            }
            None => tracing::debug!(id = item.id(), %unit, "no unit price to apply"),
        }
    } else {
        tracing::warn!(id = item.id(), "product found without a package price, prices kept");
    }

    item.set_sync_status(&SyncStatus {
        status: SyncState::Active,
        last_synced_at: synced_at.to_string(),
        scraped_price: snapshot.total_price,
        scraped_unit_price: snapshot.reference_unit_price,
    });
}

/// Run one sync pass against the store, stamped with the current time.
pub fn run_sync(
    store: &dyn CatalogStore,
    source: &dyn PriceSource,
    dry_run: bool,
) -> Result<SyncSummary, SyncError> {
    run_sync_at(store, source, dry_run, Utc::now())
}

/// Run one sync pass. Nothing is written unless the fetch succeeds.
pub fn run_sync_at(
    store: &dyn CatalogStore,
    source: &dyn PriceSource,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<SyncSummary, SyncError> {
    let mut catalog = store.load()?;

    let ids = select_syncable(&catalog);
    if ids.is_empty() {
        tracing::info!("no external items to sync");
        return Ok(SyncSummary::default());
    }

    tracing::info!(count = ids.len(), "fetching prices");
    let prices = source.fetch_prices(&ids)?;

    let summary = merge_prices(&mut catalog, &prices, &now.to_rfc3339());

    if dry_run {
        tracing::info!("dry run, catalog not written");
    } else {
        store.save(&catalog)?;
    }

    tracing::info!(
        selected = summary.selected,
        updated = summary.updated,
        missing = summary.missing,
        "sync finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::JsonFileStore;
    use crate::error::FetchError;
    use crate::models::Source;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct MockSource {
        prices: Vec<RemotePriceSnapshot>,
        requested: Mutex<Vec<BTreeSet<ExternalId>>>,
    }

    impl MockSource {
        fn new(prices: Vec<RemotePriceSnapshot>) -> Self {
            Self {
                prices,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requested.lock().unwrap().len()
        }
    }

    impl PriceSource for MockSource {
        fn fetch_prices(&self, ids: &BTreeSet<ExternalId>) -> Result<PriceMap, FetchError> {
            self.requested.lock().unwrap().push(ids.clone());
            Ok(self
                .prices
                .iter()
                .filter(|p| ids.contains(&p.external_id))
                .map(|p| (p.external_id.clone(), p.clone()))
                .collect())
        }
    }

    struct DownSource;

    impl PriceSource for DownSource {
        fn fetch_prices(&self, _ids: &BTreeSet<ExternalId>) -> Result<PriceMap, FetchError> {
            Err(FetchError::Unreachable("connection refused".to_string()))
        }
    }

    /// In-memory store that counts writes instead of performing them.
    struct ReadOnlyStore {
        catalog: Catalog,
        saves: RefCell<usize>,
    }

    impl CatalogStore for ReadOnlyStore {
        fn load(&self) -> Result<Catalog, crate::error::CatalogError> {
            Ok(self.catalog.clone())
        }

        fn save(&self, _catalog: &Catalog) -> Result<(), crate::error::CatalogError> {
            *self.saves.borrow_mut() += 1;
            Ok(())
        }
    }

    fn snapshot(id: &str, total: f64, per_unit: Option<f64>) -> RemotePriceSnapshot {
        RemotePriceSnapshot {
            external_id: ExternalId::new(id).unwrap(),
            total_price: Some(total),
            reference_unit_price: per_unit,
        }
    }

    fn sample_json() -> Value {
        json!([
            {
                "id": "1",
                "name": "Test Butter (Grams)",
                "source": "external",
                "external_id": 700,
                "unit": "g",
                "package_size": "250g",
                "package_price": 50.0,
                "price_per_unit": 0.2
            },
            {
                "id": "2",
                "name": "Test Eggs (Pieces)",
                "source": "external",
                "external_id": "800",
                "unit": "ks",
                "package_size": "10ks",
                "package_price": 50.0,
                "price_per_unit": 5.0
            },
            {
                "id": "3",
                "name": "Manual Box",
                "source": "manual",
                "external_id": null,
                "unit": "ks",
                "package_price": 20.0,
                "price_per_unit": 20.0
            }
        ])
    }

    fn sample_prices() -> MockSource {
        MockSource::new(vec![
            snapshot("700", 80.0, Some(320.0)),
            snapshot("800", 100.0, Some(10.0)),
        ])
    }

    fn catalog(value: &Value) -> Catalog {
        Catalog::parse(&value.to_string(), std::path::Path::new("mem")).unwrap()
    }

    fn write_store(dir: &TempDir, value: &Value) -> JsonFileStore {
        let path = dir.path().join("ingredients.json");
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        JsonFileStore::new(path)
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_gram_item_uses_reference_price() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        run_sync_at(&store, &sample_prices(), false, fixed_now()).unwrap();

        let catalog = store.load().unwrap();
        let butter = catalog.get("1").unwrap();
        assert_eq!(butter.package_price(), Some(80.0));
        assert!((butter.price_per_unit().unwrap() - 0.32).abs() < f64::EPSILON);
        let status = butter.sync_status().unwrap();
        assert_eq!(status.status, SyncState::Active);
        assert_eq!(status.last_synced_at, fixed_now().to_rfc3339());
        assert_eq!(status.scraped_price, Some(80.0));
        assert_eq!(status.scraped_unit_price, Some(320.0));
    }

    #[test]
    fn test_piece_item_divides_by_count() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        run_sync_at(&store, &sample_prices(), false, fixed_now()).unwrap();

        let catalog = store.load().unwrap();
        let eggs = catalog.get("2").unwrap();
        assert_eq!(eggs.package_price(), Some(100.0));
        assert!((eggs.price_per_unit().unwrap() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_manual_items_untouched() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        let summary = run_sync_at(&store, &sample_prices(), false, fixed_now()).unwrap();
        assert_eq!(summary.selected, 2);
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.missing, 0);

        let after: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(after[2], sample_json()[2]);
        let original = sample_json();
        let keys: Vec<&String> = after[2].as_object().unwrap().keys().collect();
        let expected: Vec<&String> = original[2].as_object().unwrap().keys().collect();
        assert_eq!(keys, expected);
        assert!(after[2].get("sync_status").is_none());
    }

    #[test]
    fn test_fetch_requests_only_external_ids() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        let source = sample_prices();
        run_sync_at(&store, &source, false, fixed_now()).unwrap();

        let requested = source.requested.lock().unwrap();
        assert_eq!(requested.len(), 1);
        let ids: Vec<&str> = requested[0].iter().map(ExternalId::as_str).collect();
        assert_eq!(ids, vec!["700", "800"]);
    }

    #[test]
    fn test_found_without_price_stays_active() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        run_sync_at(&store, &sample_prices(), false, fixed_now()).unwrap();

        let later = fixed_now() + chrono::Duration::days(1);
        let unpriced = MockSource::new(vec![
            RemotePriceSnapshot {
                external_id: ExternalId::new("700").unwrap(),
                total_price: None,
                reference_unit_price: Some(360.0),
            },
            snapshot("800", 100.0, Some(10.0)),
        ]);
        let summary = run_sync_at(&store, &unpriced, false, later).unwrap();
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.missing, 0);

        let catalog = store.load().unwrap();
        let butter = catalog.get("1").unwrap();
        assert_eq!(butter.package_price(), Some(80.0));
        assert!((butter.price_per_unit().unwrap() - 0.32).abs() < f64::EPSILON);
        let status = butter.sync_status().unwrap();
        assert_eq!(status.status, SyncState::Active);
        assert_eq!(status.last_synced_at, later.to_rfc3339());
        assert_eq!(status.scraped_price, None);
        assert_eq!(status.scraped_unit_price, Some(360.0));
    }

    #[test]
    fn test_merge_without_price_after_decode() {
        let mut catalog = catalog(&json!([
            { "id": "1", "name": "Butter", "source": "external", "external_id": 700,
              "unit": "g", "package_size": "250g", "package_price": 50.0, "price_per_unit": 0.2,
              "sync_status": { "status": "active", "last_synced_at": "2024-01-01T00:00:00+00:00",
                               "scraped_price": 50.0, "scraped_unit_price": 200.0 } }
        ]));
        let prices = crate::remote::decode_prices(
            r#"[{"productId": 700, "price": null, "pricePerUnit": {"amount": 320.0}}]"#,
        )
        .unwrap();

        let summary = merge_prices(&mut catalog, &prices, "2024-01-02T00:00:00+00:00");
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.missing, 0);
        let butter = catalog.get("1").unwrap();
        assert_eq!(butter.package_price(), Some(50.0));
        assert_eq!(butter.price_per_unit(), Some(0.2));
        assert_eq!(butter.sync_status().unwrap().status, SyncState::Active);
    }

    #[test]
    fn test_missing_item_with_history_is_flagged() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        run_sync_at(&store, &sample_prices(), false, fixed_now()).unwrap();

        // Next run the butter has vanished from the shop.
        let later = fixed_now() + chrono::Duration::days(1);
        let only_eggs = MockSource::new(vec![snapshot("800", 110.0, None)]);
        let summary = run_sync_at(&store, &only_eggs, false, later).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.missing, 1);

        let catalog = store.load().unwrap();
        let butter = catalog.get("1").unwrap();
        assert_eq!(butter.package_price(), Some(80.0));
        assert!((butter.price_per_unit().unwrap() - 0.32).abs() < f64::EPSILON);
        let status = butter.sync_status().unwrap();
        assert_eq!(status.status, SyncState::Missing);
        assert_eq!(status.last_synced_at, later.to_rfc3339());
        assert_eq!(status.scraped_price, Some(80.0));
    }

    #[test]
    fn test_still_missing_counts_again() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        run_sync_at(&store, &sample_prices(), false, fixed_now()).unwrap();

        let empty = MockSource::new(vec![]);
        assert_eq!(run_sync_at(&store, &empty, false, fixed_now()).unwrap().missing, 2);
        assert_eq!(run_sync_at(&store, &empty, false, fixed_now()).unwrap().missing, 2);
    }

    #[test]
    fn test_missing_item_without_history_gets_no_record() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        let only_eggs = MockSource::new(vec![snapshot("800", 100.0, None)]);
        let summary = run_sync_at(&store, &only_eggs, false, fixed_now()).unwrap();
        assert_eq!(summary.selected, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.missing, 0);

        let catalog = store.load().unwrap();
        let butter = catalog.get("1").unwrap();
        assert!(!butter.has_sync_status());
        assert_eq!(butter.package_price(), Some(50.0));
        assert_eq!(butter.price_per_unit(), Some(0.2));
    }

    #[test]
    fn test_gram_item_without_reference_keeps_unit_price() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        let source = MockSource::new(vec![snapshot("700", 80.0, None)]);
        run_sync_at(&store, &source, false, fixed_now()).unwrap();

        let catalog = store.load().unwrap();
        let butter = catalog.get("1").unwrap();
        assert_eq!(butter.package_price(), Some(80.0));
        assert_eq!(butter.price_per_unit(), Some(0.2));
        assert_eq!(butter.sync_status().unwrap().scraped_unit_price, None);
    }

    #[test]
    fn test_fetch_failure_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        let before = fs::read(store.path()).unwrap();

        let err = run_sync_at(&store, &DownSource, false, fixed_now()).unwrap_err();
        assert!(matches!(err, SyncError::Aborted(FetchError::Unreachable(_))));

        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_no_external_items_is_a_no_op() {
        let catalog = catalog(&json!([
            { "id": "3", "name": "Manual Box", "source": "manual", "unit": "ks" },
            { "id": "4", "name": "Linked but manual", "source": "manual", "external_id": 5 },
            { "id": "5", "name": "External without id", "source": "external" }
        ]));
        let store = ReadOnlyStore {
            catalog,
            saves: RefCell::new(0),
        };
        let source = sample_prices();

        let summary = run_sync_at(&store, &source, false, fixed_now()).unwrap();
        assert_eq!(summary, SyncSummary::default());
        assert_eq!(source.calls(), 0);
        assert_eq!(*store.saves.borrow(), 0);
    }

    #[test]
    fn test_no_op_round_trip() {
        let tmp = TempDir::new().unwrap();
        let manual_only = json!([sample_json()[2].clone()]);
        let store = write_store(&tmp, &manual_only);
        let loaded = store.load().unwrap();
        run_sync_at(&store, &sample_prices(), false, fixed_now()).unwrap();
        store.save(&store.load().unwrap()).unwrap();
        assert_eq!(store.load().unwrap(), loaded);
    }

    #[test]
    fn test_dry_run_does_not_write() {
        let tmp = TempDir::new().unwrap();
        let store = write_store(&tmp, &sample_json());
        let before = fs::read(store.path()).unwrap();

        let summary = run_sync_at(&store, &sample_prices(), true, fixed_now()).unwrap();
        assert_eq!(summary.updated, 2);
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_missing_catalog_is_reported() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::new(tmp.path().join("absent.json"));
        let err = run_sync_at(&store, &sample_prices(), false, fixed_now()).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Catalog(crate::error::CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_merge_prices_skips_manual_even_with_matching_id() {
        let mut catalog = catalog(&json!([
            { "id": "m", "name": "Manual", "source": "manual", "external_id": 700,
              "unit": "g", "package_price": 1.0, "price_per_unit": 0.5 }
        ]));
        let before = catalog.clone();
        let prices: PriceMap = [snapshot("700", 80.0, Some(320.0))]
            .into_iter()
            .map(|s| (s.external_id.clone(), s))
            .collect();

        let summary = merge_prices(&mut catalog, &prices, "2024-01-01T00:00:00+00:00");
        assert_eq!(summary, SyncSummary::default());
        assert_eq!(catalog, before);
        assert_eq!(catalog.items()[0].source(), Source::Manual);
    }

    #[test]
    fn test_unparseable_piece_size_does_not_abort() {
        let mut catalog = catalog(&json!([
            { "id": "p", "name": "Loose rolls", "source": "external", "external_id": 1,
              "unit": "ks", "package_size": "a few", "package_price": 3.0 },
            { "id": "q", "name": "Milk", "source": "external", "external_id": 2,
              "unit": "ml", "package_size": "1000ml", "package_price": 20.0 }
        ]));
        let prices: PriceMap = [snapshot("1", 4.5, None), snapshot("2", 22.9, Some(22.9))]
            .into_iter()
            .map(|s| (s.external_id.clone(), s))
            .collect();

        let summary = merge_prices(&mut catalog, &prices, "2024-01-01T00:00:00+00:00");
        assert_eq!(summary.updated, 2);
        assert!((catalog.get("p").unwrap().price_per_unit().unwrap() - 4.5).abs() < 1e-9);
        assert!((catalog.get("q").unwrap().price_per_unit().unwrap() - 0.0229).abs() < 1e-9);
    }
}
