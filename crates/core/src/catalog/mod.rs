pub mod loader;
pub mod search;
pub mod store;

pub use loader::{CatalogLoader, JsonCatalogLoader, StaticCatalogLoader};
pub use search::SearchEngine;
pub use store::Catalog;
