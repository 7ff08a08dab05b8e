use std::sync::OnceLock;

use tracing::{info, warn};

use crate::catalog::{Catalog, SearchEngine};
use crate::context::RequestContext;
use crate::domain::product::{Product, ProductId};
use crate::errors::{CatalogError, LifecycleError};
use crate::flags::{FaultInjectionPolicy, Operation};

pub const INJECTED_FAILURE_MESSAGE: &str = "Error: Product Catalog Fail Feature Flag Enabled";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Ready,
}

/// Request-handling facade over the catalog.
///
/// Starts `Uninitialized` unless built with a catalog; `mark_ready` moves it to
/// `Ready` exactly once. Reads after that are lock-free.
pub struct CatalogService {
    catalog: OnceLock<Catalog>,
    search: SearchEngine,
    faults: FaultInjectionPolicy,
}

impl CatalogService {
    pub fn new(faults: FaultInjectionPolicy) -> Self {
        Self { catalog: OnceLock::new(), search: SearchEngine, faults }
    }

    pub fn with_catalog(catalog: Catalog, faults: FaultInjectionPolicy) -> Self {
        let service = Self::new(faults);
        let _ = service.catalog.set(catalog);
        service
    }

    pub fn mark_ready(&self, catalog: Catalog) -> Result<(), LifecycleError> {
        let product_count = catalog.len();
        self.catalog.set(catalog).map_err(|_| LifecycleError::AlreadyReady)?;
        info!(
            event_name = "catalog.service.ready",
            correlation_id = "bootstrap",
            product_count,
            "product catalog ready"
        );
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        if self.catalog.get().is_some() {
            LifecycleState::Ready
        } else {
            LifecycleState::Uninitialized
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    pub async fn list_products(
        &self,
        request: &RequestContext,
    ) -> Result<Vec<Product>, CatalogError> {
        let catalog = self.ready_catalog(Operation::ListProducts, request)?;
        self.delay(Operation::ListProducts, request, None).await;

        let products = catalog.list_all().to_vec();
        info!(
            event_name = "catalog.list_products",
            correlation_id = %request.correlation_id,
            app.products.count = products.len(),
            "listed products"
        );
        Ok(products)
    }

    pub async fn get_product(
        &self,
        id: &ProductId,
        request: &RequestContext,
    ) -> Result<Product, CatalogError> {
        let catalog = self.ready_catalog(Operation::GetProduct, request)?;
        self.delay(Operation::GetProduct, request, Some(id)).await;

        if self.faults.should_fail(Operation::GetProduct, request, Some(id)).await {
            warn!(
                event_name = "catalog.get_product.injected_failure",
                correlation_id = %request.correlation_id,
                app.product.id = %id,
                "returning simulated failure"
            );
            return Err(CatalogError::Internal { message: INJECTED_FAILURE_MESSAGE.to_owned() });
        }

        match catalog.get_by_id(id) {
            Ok(product) => {
                info!(
                    event_name = "catalog.get_product",
                    correlation_id = %request.correlation_id,
                    app.product.id = %id,
                    app.product.name = %product.name,
                    "product found"
                );
                Ok(product.clone())
            }
            Err(error) => {
                info!(
                    event_name = "catalog.get_product.not_found",
                    correlation_id = %request.correlation_id,
                    app.product.id = %id,
                    "product not found"
                );
                Err(error)
            }
        }
    }

    pub async fn search_products(
        &self,
        query: &str,
        request: &RequestContext,
    ) -> Result<Vec<Product>, CatalogError> {
        let catalog = self.ready_catalog(Operation::SearchProducts, request)?;
        self.delay(Operation::SearchProducts, request, None).await;

        if self.faults.should_fail(Operation::SearchProducts, request, None).await {
            return Err(CatalogError::Internal { message: INJECTED_FAILURE_MESSAGE.to_owned() });
        }

        let results = self.search.search(catalog, query);
        info!(
            event_name = "catalog.search_products",
            correlation_id = %request.correlation_id,
            app.products_search.count = results.len(),
            query_len = query.len(),
            "searched products"
        );
        Ok(results)
    }

    fn ready_catalog(
        &self,
        operation: Operation,
        request: &RequestContext,
    ) -> Result<&Catalog, CatalogError> {
        self.catalog.get().ok_or_else(|| {
            warn!(
                event_name = "catalog.unavailable",
                correlation_id = %request.correlation_id,
                operation = operation.name(),
                "request rejected before catalog load"
            );
            CatalogError::Unavailable
        })
    }

    async fn delay(
        &self,
        operation: Operation,
        request: &RequestContext,
        target: Option<&ProductId>,
    ) {
        let latency = self.faults.injected_latency(operation, request, target).await;
        let latency = request.bound(latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}
