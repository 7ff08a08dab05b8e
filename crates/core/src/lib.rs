pub mod catalog;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod fixtures;
pub mod flags;
pub mod health;
pub mod service;

pub use catalog::{Catalog, CatalogLoader, JsonCatalogLoader, SearchEngine, StaticCatalogLoader};
pub use context::RequestContext;
pub use domain::product::{Money, Product, ProductId};
pub use errors::{CatalogError, InterfaceError, LifecycleError, LoadError};
pub use flags::{
    FaultInjectionPolicy, FaultSettings, FlagContext, FlagError, FlagResolver, FlagValue,
    NoopFlagResolver, Operation, StaticFlagResolver,
};
pub use health::{CatalogHealth, HealthReporter, ServingStatus};
pub use service::{CatalogService, LifecycleState};
