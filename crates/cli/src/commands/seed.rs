//! Seed the product catalog from a YAML file.
//!
//! The file is a list of products. Every entry needs an `id` so that
//! re-running the same file updates rather than duplicates:
//!
//! ```yaml
//! - id: pineapple-tee
//!   name: Pineapple Tee
//!   price: { amount: "24.00", currencyCode: USD }
//!   imageUrl: https://cdn.example/tee.png
//! - id: "42"
//!   name: Sticker
//! ```

use std::path::Path;

use tracing::{error, info};

use cartline_server::config::CartlineConfig;
use cartline_server::db::{self, PgProductCatalog};
use cartline_server::models::NewProduct;

/// Parse and check a catalog file without touching the database.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or any entry lacks an id or a
/// name. All problems are reported, not just the first.
pub fn parse_catalog(content: &str) -> Result<Vec<NewProduct>, Box<dyn std::error::Error>> {
    let products: Vec<NewProduct> = serde_yaml::from_str(content)?;

    let problems: Vec<String> = products
        .iter()
        .enumerate()
        .filter_map(|(index, product)| {
            if product.id.is_none() {
                Some(format!("entry {index}: missing id"))
            } else if product.validated_name().is_none() {
                Some(format!("entry {index}: blank name"))
            } else {
                None
            }
        })
        .collect();

    if !problems.is_empty() {
        for problem in &problems {
            error!("  - {problem}");
        }
        return Err(format!("{} invalid catalog entries", problems.len()).into());
    }

    Ok(products)
}

/// Upsert every product in `file_path` into the catalog.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read
/// or parsed, or a database operation fails.
pub async fn products(file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = CartlineConfig::from_env()?;
    let database_url = config.require_database_url()?;

    info!(path = %file_path.display(), "Loading products from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(file_path).await?;
    let products = parse_catalog(&content)?;
    info!(products = products.len(), "Parsed catalog");

    let pool = db::create_pool(database_url).await?;
    info!("Connected to database");

    let catalog = PgProductCatalog::new(pool);
    let mut seeded = 0_usize;
    for product in products {
        let saved = catalog.upsert(product).await?;
        info!(product = %saved.id, name = %saved.name, "Upserted product");
        seeded += 1;
    }

    info!("Seeding complete! {seeded} products upserted");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let products = parse_catalog(
            r#"
- id: pineapple-tee
  name: Pineapple Tee
  price: { amount: "24.00", currencyCode: USD }
- id: 42
  name: Sticker
"#,
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id.as_ref().unwrap().as_str(), "pineapple-tee");
        assert_eq!(products[0].price.unwrap().display(), "$24.00");
        assert_eq!(products[1].id.as_ref().unwrap().as_str(), "42");
    }

    #[test]
    fn test_parse_catalog_rejects_missing_ids_and_names() {
        let err = parse_catalog(
            r#"
- name: No Id
- id: blank
  name: "  "
"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "2 invalid catalog entries");
    }
}
