//! The demo dataset shipped in `products/products.json`, embedded for tests
//! and local runs.

use crate::catalog::Catalog;
use crate::domain::product::Product;
use crate::errors::LoadError;

pub const DEMO_DATASET_JSON: &str = include_str!("../../../products/products.json");

#[derive(serde::Deserialize)]
struct DemoDataset {
    products: Vec<Product>,
}

pub fn demo_products() -> Result<Vec<Product>, serde_json::Error> {
    serde_json::from_str::<DemoDataset>(DEMO_DATASET_JSON).map(|dataset| dataset.products)
}

pub fn demo_catalog() -> Result<Catalog, LoadError> {
    let products = demo_products().map_err(|source| LoadError::Parse {
        path: "products/products.json".into(),
        source,
    })?;
    Catalog::new(products)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{demo_catalog, demo_products};

    #[test]
    fn demo_dataset_has_ten_unique_products() {
        let products = demo_products().expect("demo dataset should parse");
        let ids: HashSet<_> = products.iter().map(|p| p.id.clone()).collect();

        assert_eq!(products.len(), 10);
        assert_eq!(ids.len(), 10);
        assert!(demo_catalog().is_ok());
    }
}
