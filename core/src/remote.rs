use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::models::{ExternalId, PriceMap, RemotePriceSnapshot};

/// Query parameter carrying the comma-joined product ids.
pub const PRODUCTS_PARAM: &str = "products";

#[derive(Debug, Deserialize)]
pub struct ProductPrice {
    #[serde(rename = "productId")]
    pub product_id: Value,
    pub price: Option<Amount>,
    #[serde(rename = "pricePerUnit")]
    pub price_per_unit: Option<Amount>,
}

#[derive(Debug, Deserialize)]
pub struct Amount {
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

/// Value of the `products` parameter for one batched request.
#[must_use]
pub fn batch_query(ids: &BTreeSet<ExternalId>) -> String {
    ids.iter()
        .map(ExternalId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// A product without a usable id cannot be matched to a catalog item.
///
/// A product echoed without a package price still counts as found.
#[must_use]
pub fn product_to_snapshot(p: ProductPrice) -> Option<RemotePriceSnapshot> {
    let external_id = ExternalId::from_value(&p.product_id)?;
    let total_price = p.price.and_then(|a| a.amount).filter(|v| v.is_finite());
    let reference_unit_price = p
        .price_per_unit
        .and_then(|a| a.amount)
        .filter(|v| v.is_finite());

    Some(RemotePriceSnapshot {
        external_id,
        total_price,
        reference_unit_price,
    })
}

/// Key snapshots by canonical id. A repeated id replaces the earlier entry.
#[must_use]
pub fn index_prices(products: Vec<ProductPrice>) -> PriceMap {
    let mut prices = PriceMap::with_capacity(products.len());
    for product in products {
        let raw_id = product.product_id.clone();
        let Some(snapshot) = product_to_snapshot(product) else {
            tracing::warn!(product_id = %raw_id, "skipping product without a usable id");
            continue;
        };
        if let Some(previous) = prices.insert(snapshot.external_id.clone(), snapshot) {
            tracing::warn!(
                external_id = %previous.external_id,
                "duplicate product in price response, keeping the last one"
            );
        }
    }
    prices
}

/// Decode a price response body.
pub fn decode_prices(body: &str) -> Result<PriceMap, FetchError> {
    let products: Vec<ProductPrice> =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidBody(e.to_string()))?;
    Ok(index_prices(products))
}
