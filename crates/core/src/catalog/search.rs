use crate::catalog::store::Catalog;
use crate::domain::product::Product;

/// Case-insensitive substring search over product name and description.
///
/// An empty query matches nothing. Any other query, whitespace included, is
/// matched literally.
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchEngine;

impl SearchEngine {
    pub fn search(&self, catalog: &Catalog, query: &str) -> Vec<Product> {
        if query.is_empty() {
            return Vec::new();
        }

        let needle = query.to_lowercase();
        catalog.list_all().iter().filter(|product| matches(product, &needle)).cloned().collect()
    }
}

fn matches(product: &Product, needle: &str) -> bool {
    product.name.to_lowercase().contains(needle)
        || product.description.to_lowercase().contains(needle)
}
