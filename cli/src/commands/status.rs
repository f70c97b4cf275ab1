use anyhow::{Context, Result};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use bakecost_core::catalog::HealthRow;
use bakecost_core::models::SyncState;
use bakecost_core::service::CatalogService;

use super::helpers::{format_amount, truncate};

pub(crate) fn cmd_status(service: &CatalogService, json: bool) -> Result<()> {
    let rows = service.health().context("Failed to read catalog")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        eprintln!("No external ingredients in the catalog");
        return Ok(());
    }

    print_health_table(&rows);

    let never = rows.iter().filter(|r| r.status.is_none()).count();
    let missing = rows
        .iter()
        .filter(|r| r.status == Some(SyncState::Missing))
        .count();
    println!(
        "\n{} external, {missing} missing, {never} never synced",
        rows.len()
    );
    Ok(())
}

fn status_label(row: &HealthRow) -> String {
    row.status
        .map_or_else(|| "never synced".to_string(), |s| s.to_string())
}

fn print_health_table(rows: &[HealthRow]) {
    #[derive(Tabled)]
    struct StatusRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "External ID")]
        external_id: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Last synced")]
        last_synced_at: String,
        #[tabled(rename = "Scraped price")]
        scraped_price: String,
        #[tabled(rename = "Scraped /kg,l")]
        scraped_unit_price: String,
    }

    let table_rows: Vec<StatusRow> = rows
        .iter()
        .map(|r| StatusRow {
            id: truncate(&r.id, 12),
            name: truncate(&r.name, 35),
            external_id: r.external_id.clone().unwrap_or_else(|| "-".into()),
            status: status_label(r),
            last_synced_at: r.last_synced_at.clone().unwrap_or_else(|| "-".into()),
            scraped_price: format_amount(r.scraped_price, 2),
            scraped_unit_price: format_amount(r.scraped_unit_price, 2),
        })
        .collect();

    let table = Table::new(&table_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(5..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
