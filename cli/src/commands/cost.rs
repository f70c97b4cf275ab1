use anyhow::{Context, Result, bail};
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bakecost_core::costing::{Recipe, RecipeCost};
use bakecost_core::service::CatalogService;

use super::helpers::{no_neg_zero, truncate};

pub(crate) fn read_recipe(path: &Path) -> Result<Recipe> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read recipe file: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse recipe file: {}", path.display()))
}

pub(crate) fn cmd_cost(
    service: &CatalogService,
    file: &Path,
    portions: Option<f64>,
    json: bool,
) -> Result<()> {
    let mut recipe = read_recipe(file)?;
    if let Some(p) = portions {
        if p <= 0.0 {
            bail!("Portions must be greater than 0");
        }
        recipe.portions = p;
    }

    let cost = service
        .cost_recipe(&recipe)
        .context("Failed to read catalog")?;

    for id in &cost.unknown_ids {
        eprintln!("Warning: ingredient '{id}' is no longer in the catalog, using its saved price");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&cost)?);
    } else {
        print_cost(&cost);
    }
    Ok(())
}

fn print_cost(cost: &RecipeCost) {
    #[derive(Tabled)]
    struct LineRow {
        #[tabled(rename = "Ingredient")]
        name: String,
        #[tabled(rename = "Qty")]
        quantity: String,
        #[tabled(rename = "Price/unit")]
        price_per_unit: String,
        #[tabled(rename = "Cost")]
        cost: String,
    }

    let rows: Vec<LineRow> = cost
        .lines
        .iter()
        .map(|l| LineRow {
            name: truncate(&l.name, 35),
            quantity: format!("{}", no_neg_zero(l.quantity)),
            price_per_unit: format!("{:.5}", l.price_per_unit),
            cost: format!("{:.2}", no_neg_zero(l.cost)),
        })
        .collect();

    println!("{}", cost.name);
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let batch = no_neg_zero(cost.batch_cost);
    let per_portion = no_neg_zero(cost.cost_per_portion);
    let portions = cost.portions;
    println!("Batch: {batch:.2}  |  {portions} portions  |  Per portion: {per_portion:.2}");
}
