use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::IngredientError;
use crate::pricing::{leading_number, manual_price_per_unit, parse_magnitude};

const ID: &str = "id";
const NAME: &str = "name";
const CATEGORY: &str = "category";
const UNIT: &str = "unit";
const SOURCE: &str = "source";
const EXTERNAL_ID: &str = "external_id";
const PACKAGE_PRICE: &str = "package_price";
const PACKAGE_SIZE: &str = "package_size";
const PRICE_PER_UNIT: &str = "price_per_unit";
const SYNC_STATUS: &str = "sync_status";

/// Largest magnitude below which every integral f64 is exact.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Category given to ingredients added by hand without one.
pub const DEFAULT_CATEGORY: &str = "Vlastní";

/// Unit an ingredient is measured and costed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unit {
    Gram,
    Millilitre,
    Piece,
    /// Anything else found in the catalog, kept verbatim.
    Other(String),
}

impl Unit {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "g" => Unit::Gram,
            "ml" => Unit::Millilitre,
            "ks" => Unit::Piece,
            other => Unit::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Unit::Gram => "g",
            Unit::Millilitre => "ml",
            Unit::Piece => "ks",
            Unit::Other(s) => s,
        }
    }

    /// Gram and millilitre are priced from per-kilogram/per-litre quotes.
    #[must_use]
    pub fn is_measured(&self) -> bool {
        matches!(self, Unit::Gram | Unit::Millilitre)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an ingredient's price comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Manual,
    External,
    Other(String),
}

impl Source {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "manual" => Source::Manual,
            "external" => Source::External,
            other => Source::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Source::Manual => "manual",
            Source::External => "external",
            Source::Other(s) => s,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a product at the remote price source, canonicalized to a string.
///
/// Catalog files and price responses disagree on whether ids are numbers or
/// strings; both sides go through this type so `700`, `"700"` and `700.0`
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::new(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self(i.to_string()))
                } else if let Some(u) = n.as_u64() {
                    Some(Self(u.to_string()))
                } else {
                    let f = n.as_f64()?;
                    if f.is_finite() && f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGER {
                        Some(Self((f as i64).to_string()))
                    } else {
                        Some(Self(n.to_string()))
                    }
                }
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Active,
    Missing,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Active => f.write_str("active"),
            SyncState::Missing => f.write_str("missing"),
        }
    }
}

/// Audit record left on an external ingredient by its first successful sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub status: SyncState,
    pub last_synced_at: String,
    #[serde(default)]
    pub scraped_price: Option<f64>,
    #[serde(default)]
    pub scraped_unit_price: Option<f64>,
}

/// One price as reported by the remote source.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePriceSnapshot {
    pub external_id: ExternalId,
    /// Price of one package. The source may echo a product without one.
    pub total_price: Option<f64>,
    /// Price per 1000 canonical units (per kg or per litre), when quoted.
    pub reference_unit_price: Option<f64>,
}

pub type PriceMap = HashMap<ExternalId, RemotePriceSnapshot>;

/// Counts reported back after a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub selected: usize,
    pub updated: usize,
    pub missing: usize,
}

/// A catalog record.
///
/// Stored as the raw JSON object so fields this crate does not know about,
/// and the key order of every record, survive a load/save round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ingredient {
    fields: Map<String, Value>,
}

impl Ingredient {
    #[must_use]
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.str_field(ID).unwrap_or_default()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.str_field(NAME).unwrap_or_default()
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.str_field(CATEGORY)
    }

    #[must_use]
    pub fn unit(&self) -> Unit {
        Unit::parse(self.str_field(UNIT).unwrap_or_default())
    }

    /// Records without a source were entered by hand.
    #[must_use]
    pub fn source(&self) -> Source {
        self.str_field(SOURCE).map_or(Source::Manual, Source::parse)
    }

    #[must_use]
    pub fn external_id(&self) -> Option<ExternalId> {
        self.fields.get(EXTERNAL_ID).and_then(ExternalId::from_value)
    }

    #[must_use]
    pub fn package_price(&self) -> Option<f64> {
        self.fields.get(PACKAGE_PRICE).and_then(lenient_f64)
    }

    #[must_use]
    pub fn package_size(&self) -> Option<String> {
        match self.fields.get(PACKAGE_SIZE)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn price_per_unit(&self) -> Option<f64> {
        self.fields.get(PRICE_PER_UNIT).and_then(lenient_f64)
    }

    /// The sync audit record, if present and readable.
    #[must_use]
    pub fn sync_status(&self) -> Option<SyncStatus> {
        let value = self.fields.get(SYNC_STATUS)?;
        serde_json::from_value(value.clone()).ok()
    }

    #[must_use]
    pub fn has_sync_status(&self) -> bool {
        matches!(self.fields.get(SYNC_STATUS), Some(Value::Object(_)))
    }

    /// External items with an id take part in price sync.
    #[must_use]
    pub fn is_syncable(&self) -> bool {
        self.source() == Source::External && self.external_id().is_some()
    }

    pub fn set_name(&mut self, name: &str) {
        self.fields.insert(NAME.into(), Value::from(name));
    }

    pub fn set_category(&mut self, category: &str) {
        self.fields.insert(CATEGORY.into(), Value::from(category));
    }

    pub fn set_unit(&mut self, unit: &Unit) {
        self.fields.insert(UNIT.into(), Value::from(unit.as_str()));
    }

    pub fn set_package_price(&mut self, price: f64) {
        self.fields.insert(PACKAGE_PRICE.into(), Value::from(price));
    }

    pub fn set_package_size(&mut self, size: &str) {
        self.fields.insert(PACKAGE_SIZE.into(), Value::from(size));
    }

    pub fn set_price_per_unit(&mut self, price: f64) {
        self.fields.insert(PRICE_PER_UNIT.into(), Value::from(price));
    }

    pub fn set_sync_status(&mut self, status: &SyncStatus) {
        let value = serde_json::to_value(status).unwrap_or(Value::Null);
        self.fields.insert(SYNC_STATUS.into(), value);
    }

    /// Flag an existing audit record as missing, keeping the rest of it.
    ///
    /// Returns false (and creates nothing) when the item never synced.
    pub fn mark_missing(&mut self, synced_at: &str) -> bool {
        let Some(Value::Object(status)) = self.fields.get_mut(SYNC_STATUS) else {
            return false;
        };
        status.insert("status".into(), Value::from(SyncState::Missing.to_string()));
        status.insert("last_synced_at".into(), Value::from(synced_at));
        true
    }

    /// Recompute `price_per_unit` after a hand edit of price, size or unit.
    pub fn reprice_manually(&mut self) {
        let price = self.package_price().unwrap_or(0.0);
        let size = self.package_size().unwrap_or_default();
        self.set_price_per_unit(price / parse_magnitude(&size));
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Numbers, or strings holding numbers (hand-edited files store both).
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Input for the manual entry path.
#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub category: Option<String>,
    pub unit: Unit,
    pub package_price: f64,
    /// Numeric part of the package size; the unit is appended on save.
    pub package_size: String,
    pub external_id: Option<ExternalId>,
}

impl NewIngredient {
    pub fn validate(&self) -> Result<(), IngredientError> {
        if self.name.trim().is_empty() {
            return Err(IngredientError::EmptyName);
        }
        if !self.package_price.is_finite() || self.package_price < 0.0 {
            return Err(IngredientError::InvalidPrice(self.package_price));
        }
        match self.package_size.trim().parse::<f64>() {
            Ok(size) if size > 0.0 && size.is_finite() => Ok(()),
            _ => Err(IngredientError::InvalidSize(self.package_size.clone())),
        }
    }

    /// Build the catalog record, in the key order the catalog file uses.
    pub fn into_ingredient(self, id: String) -> Result<Ingredient, IngredientError> {
        self.validate()?;
        let source = if self.external_id.is_some() {
            Source::External
        } else {
            Source::Manual
        };
        let package_size = format!("{}{}", self.package_size.trim(), self.unit);
        let price_per_unit = manual_price_per_unit(self.package_price, &package_size);

        let mut fields = Map::new();
        fields.insert(ID.into(), Value::from(id));
        fields.insert(
            CATEGORY.into(),
            Value::from(self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)),
        );
        fields.insert(NAME.into(), Value::from(self.name.trim()));
        fields.insert(UNIT.into(), Value::from(self.unit.as_str()));
        fields.insert(SOURCE.into(), Value::from(source.as_str()));
        if let Some(external_id) = &self.external_id {
            fields.insert(EXTERNAL_ID.into(), Value::from(external_id.as_str()));
        }
        fields.insert(PACKAGE_PRICE.into(), Value::from(self.package_price));
        fields.insert(PACKAGE_SIZE.into(), Value::from(package_size));
        fields.insert(PRICE_PER_UNIT.into(), Value::from(price_per_unit));
        Ok(Ingredient::from_fields(fields))
    }
}

/// A hand edit of one catalog record. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct IngredientUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub package_price: Option<f64>,
    /// New package magnitude; keeps the size's unit suffix.
    pub package_size: Option<f64>,
    /// New unit; rewrites the size's suffix.
    pub unit: Option<Unit>,
}

impl Ingredient {
    /// Apply a hand edit and recompute `price_per_unit`.
    ///
    /// Sync metadata is left as it is.
    pub fn apply_update(&mut self, update: &IngredientUpdate) -> Result<(), IngredientError> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(IngredientError::EmptyName);
            }
        }
        if let Some(price) = update.package_price {
            if !price.is_finite() || price < 0.0 {
                return Err(IngredientError::InvalidPrice(price));
            }
        }
        if let Some(size) = update.package_size {
            if !size.is_finite() || size <= 0.0 {
                return Err(IngredientError::InvalidSize(size.to_string()));
            }
        }

        if let Some(name) = &update.name {
            self.set_name(name.trim());
        }
        if let Some(category) = &update.category {
            self.set_category(category);
        }
        if let Some(price) = update.package_price {
            self.set_package_price(price);
        }
        if let Some(size) = update.package_size {
            let current = self.package_size().unwrap_or_default();
            let suffix = size_suffix(&current);
            let suffix = if suffix.is_empty() {
                self.unit().to_string()
            } else {
                suffix
            };
            self.set_package_size(&format!("{size}{suffix}"));
        }
        if let Some(unit) = &update.unit {
            let current = self.package_size().unwrap_or_default();
            let magnitude = leading_number(&current).unwrap_or(0.0);
            self.set_unit(unit);
            self.set_package_size(&format!("{magnitude}{unit}"));
        }

        self.reprice_manually();
        Ok(())
    }
}

/// The unit part of a package size: `"250g"` gives `"g"`.
fn size_suffix(package_size: &str) -> String {
    package_size
        .chars()
        .filter(|c| !c.is_ascii_digit() && *c != '.')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Pull a product id out of a pasted shop URL: the first run of six or more digits.
#[must_use]
pub fn external_id_from_url(url: &str) -> Option<ExternalId> {
    url.split(|c: char| !c.is_ascii_digit())
        .find(|run| run.len() >= 6)
        .and_then(ExternalId::new)
}
