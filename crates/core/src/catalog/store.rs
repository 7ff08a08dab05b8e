use std::collections::HashMap;

use crate::domain::product::{Product, ProductId};
use crate::errors::{CatalogError, LoadError};

/// Immutable product list in load order, indexed by id.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Builds the catalog, rejecting empty or repeated ids.
    pub fn new(products: Vec<Product>) -> Result<Self, LoadError> {
        let mut index = HashMap::with_capacity(products.len());
        for (position, product) in products.iter().enumerate() {
            if product.id.as_str().trim().is_empty() {
                return Err(LoadError::EmptyId { position });
            }
            if index.insert(product.id.clone(), position).is_some() {
                return Err(LoadError::DuplicateId(product.id.clone()));
            }
        }

        Ok(Self { products, index })
    }

    pub fn list_all(&self) -> &[Product] {
        &self.products
    }

    pub fn get_by_id(&self, id: &ProductId) -> Result<&Product, CatalogError> {
        self.index
            .get(id)
            .map(|&position| &self.products[position])
            .ok_or_else(|| CatalogError::NotFound { id: id.clone() })
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
