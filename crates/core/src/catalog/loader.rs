use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::catalog::store::Catalog;
use crate::domain::product::Product;
use crate::errors::LoadError;

pub trait CatalogLoader: Send + Sync {
    fn load(&self) -> Result<Vec<Product>, LoadError>;

    fn load_catalog(&self) -> Result<Catalog, LoadError> {
        Catalog::new(self.load()?)
    }
}

#[derive(Debug, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    products: Vec<Product>,
}

/// Reads `{"products": [...]}` documents from a single file, or from every
/// `*.json` file in a directory in filename order.
#[derive(Clone, Debug)]
pub struct JsonCatalogLoader {
    path: PathBuf,
}

impl JsonCatalogLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dataset_files(&self) -> Result<Vec<PathBuf>, LoadError> {
        if !self.path.is_dir() {
            return Ok(vec![self.path.clone()]);
        }

        let entries = fs::read_dir(&self.path)
            .map_err(|source| LoadError::Read { path: self.path.clone(), source })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|source| LoadError::Read { path: self.path.clone(), source })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(LoadError::Empty(self.path.clone()));
        }
        files.sort();
        Ok(files)
    }
}

impl CatalogLoader for JsonCatalogLoader {
    fn load(&self) -> Result<Vec<Product>, LoadError> {
        let mut products = Vec::new();

        for path in self.dataset_files()? {
            let raw = fs::read_to_string(&path)
                .map_err(|source| LoadError::Read { path: path.clone(), source })?;
            let file: DatasetFile = serde_json::from_str(&raw)
                .map_err(|source| LoadError::Parse { path: path.clone(), source })?;

            debug!(
                event_name = "catalog.loader.file_read",
                path = %path.display(),
                product_count = file.products.len(),
                "dataset file parsed"
            );
            products.extend(file.products);
        }

        info!(
            event_name = "catalog.loader.loaded",
            path = %self.path.display(),
            product_count = products.len(),
            "product dataset loaded"
        );
        Ok(products)
    }
}

/// Serves a fixed in-memory product list.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalogLoader {
    products: Vec<Product>,
}

impl StaticCatalogLoader {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

impl CatalogLoader for StaticCatalogLoader {
    fn load(&self) -> Result<Vec<Product>, LoadError> {
        Ok(self.products.clone())
    }
}
