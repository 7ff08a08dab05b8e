use std::sync::Arc;

use axum::Router;
use catalog_core::catalog::{CatalogLoader, JsonCatalogLoader};
use catalog_core::config::{AppConfig, ConfigError, LoadOptions};
use catalog_core::flags::{FaultInjectionPolicy, FlagError};
use catalog_core::health::{CatalogHealth, HealthReporter};
use catalog_core::service::CatalogService;
use thiserror::Error;
use tracing::{error, info};

use crate::{flags, health, rpc};

pub struct Application {
    pub config: AppConfig,
    pub service: Arc<CatalogService>,
    pub health: Arc<dyn HealthReporter>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("feature flag provider setup failed: {0}")]
    Flags(#[source] FlagError),
}

impl Application {
    pub fn router(&self) -> Router {
        rpc::router(self.service.clone()).merge(health::router(self.health.clone()))
    }
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

/// Wires the service and loads the dataset. A dataset that cannot be loaded
/// leaves the service uninitialized rather than failing startup.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let resolver = flags::build_resolver(&config.flags).map_err(BootstrapError::Flags)?;
    let faults = FaultInjectionPolicy::new(resolver, config.flags.fault_settings());
    let service = Arc::new(CatalogService::new(faults));

    let loader = JsonCatalogLoader::new(&config.catalog.products_path);
    info!(
        event_name = "system.bootstrap.catalog_load",
        correlation_id = "bootstrap",
        products_path = %loader.path().display(),
        "loading product catalog"
    );
    load_into(&service, &loader);

    let health: Arc<dyn HealthReporter> = Arc::new(CatalogHealth::new(service.clone()));
    info!(
        event_name = "system.bootstrap.complete",
        correlation_id = "bootstrap",
        serving_status = health.check().as_str(),
        "application bootstrap complete"
    );

    Ok(Application { config, service, health })
}

fn load_into(service: &CatalogService, loader: &dyn CatalogLoader) {
    let catalog = match loader.load_catalog() {
        Ok(catalog) => catalog,
        Err(load_error) => {
            error!(
                event_name = "system.bootstrap.catalog_load_failed",
                correlation_id = "bootstrap",
                error = %load_error,
                "product catalog could not be loaded; service stays unavailable"
            );
            return;
        }
    };

    if let Err(lifecycle_error) = service.mark_ready(catalog) {
        error!(
            event_name = "system.bootstrap.catalog_ready_failed",
            correlation_id = "bootstrap",
            error = %lifecycle_error,
            "product catalog ready transition rejected"
        );
    }
}
