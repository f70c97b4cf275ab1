//! Recipe costing against the catalog's unit prices. Reads the catalog,
//! never writes it.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;

/// One ingredient line of a saved recipe, in the ingredient's canonical unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeLine {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub quantity: f64,
    /// Unit price captured when the recipe was saved; refreshed from the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_unit: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default = "default_portions", alias = "portionCount")]
    pub portions: f64,
    #[serde(default)]
    pub items: Vec<RecipeLine>,
}

fn default_portions() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize)]
pub struct LineCost {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub price_per_unit: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeCost {
    pub name: String,
    pub portions: f64,
    pub lines: Vec<LineCost>,
    pub batch_cost: f64,
    pub cost_per_portion: f64,
    /// Lines whose ingredient is no longer in the catalog.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_ids: Vec<String>,
}

/// Copy the current unit price (and name) of every line's ingredient from the
/// catalog. Returns the ids that were not found; those lines keep what they had.
pub fn refresh_prices(recipe: &mut Recipe, catalog: &Catalog) -> Vec<String> {
    let mut unknown = Vec::new();
    for line in &mut recipe.items {
        match catalog.get(&line.id) {
            Some(item) => {
                line.price_per_unit = item.price_per_unit();
                line.name = Some(item.name().to_string());
            }
            None => unknown.push(line.id.clone()),
        }
    }
    unknown
}

#[must_use]
pub fn line_cost(line: &RecipeLine) -> f64 {
    line.quantity * line.price_per_unit.unwrap_or(0.0)
}

#[must_use]
pub fn batch_cost(lines: &[RecipeLine]) -> f64 {
    lines.iter().map(line_cost).sum()
}

#[must_use]
pub fn cost_per_portion(batch_cost: f64, portions: f64) -> f64 {
    if portions > 0.0 {
        batch_cost / portions
    } else {
        0.0
    }
}

/// Refresh a recipe against the catalog and break down its cost.
#[must_use]
pub fn cost_recipe(recipe: &Recipe, catalog: &Catalog) -> RecipeCost {
    let mut recipe = recipe.clone();
    let unknown_ids = refresh_prices(&mut recipe, catalog);

    let lines = recipe
        .items
        .iter()
        .map(|line| LineCost {
            id: line.id.clone(),
            name: line.name.clone().unwrap_or_else(|| line.id.clone()),
            quantity: line.quantity,
            price_per_unit: line.price_per_unit.unwrap_or(0.0),
            cost: line_cost(line),
        })
        .collect();
    let batch = batch_cost(&recipe.items);

    RecipeCost {
        name: recipe.name,
        portions: recipe.portions,
        lines,
        batch_cost: batch,
        cost_per_portion: cost_per_portion(batch, recipe.portions),
        unknown_ids,
    }
}
