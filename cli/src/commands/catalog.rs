use anyhow::{Context, Result, bail};

use bakecost_core::models::{ExternalId, IngredientUpdate, NewIngredient, external_id_from_url};
use bakecost_core::service::CatalogService;

use super::helpers::{parse_unit, print_ingredient_table};

pub(crate) fn cmd_list(service: &CatalogService, search: Option<&str>, json: bool) -> Result<()> {
    let items = service.list(search).context("Failed to read catalog")?;

    if items.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No ingredients found");
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        print_ingredient_table(&items);
    }
    Ok(())
}

pub(crate) struct AddArgs {
    pub name: String,
    pub price: f64,
    pub size: String,
    pub unit: String,
    pub category: Option<String>,
    pub external_id: Option<String>,
    pub url: Option<String>,
}

/// Resolve the external id from `--external-id` or a pasted product URL.
fn resolve_external_id(external_id: Option<&str>, url: Option<&str>) -> Result<Option<ExternalId>> {
    match (external_id, url) {
        (Some(raw), _) => ExternalId::new(raw)
            .map(Some)
            .with_context(|| format!("Invalid external id '{raw}'")),
        (None, Some(url)) => external_id_from_url(url)
            .map(Some)
            .with_context(|| format!("No product id found in URL '{url}'")),
        (None, None) => Ok(None),
    }
}

pub(crate) fn cmd_add(service: &CatalogService, args: AddArgs, json: bool) -> Result<()> {
    let external_id = resolve_external_id(args.external_id.as_deref(), args.url.as_deref())?;
    let item = service.add_ingredient(NewIngredient {
        name: args.name,
        category: args.category,
        unit: parse_unit(&args.unit)?,
        package_price: args.price,
        package_size: args.size,
        external_id,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let name = item.name();
        let id = item.id();
        println!("Added ingredient: {name} (id: {id})");
    }
    Ok(())
}

pub(crate) struct EditArgs {
    pub price: Option<f64>,
    pub size: Option<f64>,
    pub unit: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
}

pub(crate) fn cmd_edit(service: &CatalogService, id: &str, args: EditArgs, json: bool) -> Result<()> {
    let update = IngredientUpdate {
        name: args.name,
        category: args.category,
        package_price: args.price,
        package_size: args.size,
        unit: args.unit.as_deref().map(parse_unit).transpose()?,
    };
    if is_empty_update(&update) {
        bail!("Nothing to change. Pass at least one of --price, --size, --unit, --name, --category");
    }

    let item = service.update_ingredient(id, &update)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let name = item.name();
        let price = item.price_per_unit().unwrap_or(0.0);
        let unit = item.unit();
        println!("Updated ingredient: {name} ({price:.5} per {unit})");
    }
    Ok(())
}

fn is_empty_update(update: &IngredientUpdate) -> bool {
    update.name.is_none()
        && update.category.is_none()
        && update.package_price.is_none()
        && update.package_size.is_none()
        && update.unit.is_none()
}
