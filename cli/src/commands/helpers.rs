use anyhow::{Result, bail};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bakecost_core::models::{Ingredient, Unit};
use bakecost_core::pricing::benchmark_price;

/// Parse a `--unit` value. Only the units the calculator prices are accepted.
pub(crate) fn parse_unit(s: &str) -> Result<Unit> {
    match Unit::parse(s) {
        Unit::Other(other) => bail!("Unknown unit '{other}'. Supported: g, ml, ks"),
        unit => Ok(unit),
    }
}

pub(crate) fn print_ingredient_table(items: &[Ingredient]) {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Unit")]
        unit: String,
        #[tabled(rename = "Package")]
        package: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Price/unit")]
        price_per_unit: String,
        #[tabled(rename = "Benchmark")]
        benchmark: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    let rows: Vec<IngredientRow> = items
        .iter()
        .map(|item| IngredientRow {
            id: truncate(item.id(), 12),
            name: truncate(item.name(), 35),
            category: item.category().map(|c| truncate(c, 20)).unwrap_or_default(),
            unit: item.unit().to_string(),
            package: item.package_size().unwrap_or_else(|| "-".into()),
            price: format_amount(item.package_price(), 2),
            price_per_unit: format_amount(item.price_per_unit(), 5),
            benchmark: benchmark_price(item).map_or("-".into(), |b| b.to_string()),
            source: match item.external_id() {
                Some(id) => format!("{} ({id})", item.source()),
                None => item.source().to_string(),
            },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(5..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn format_amount(value: Option<f64>, decimals: usize) -> String {
    value.map_or("-".into(), |v| format!("{:.*}", decimals, no_neg_zero(v)))
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
