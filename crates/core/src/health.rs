use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::service::CatalogService;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServingStatus {
    Serving,
    NotServing,
}

impl ServingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Serving => "SERVING",
            Self::NotServing => "NOT_SERVING",
        }
    }
}

pub trait HealthReporter: Send + Sync {
    fn check(&self) -> ServingStatus;
}

/// Liveness derived from the catalog lifecycle only, never from query results.
#[derive(Clone)]
pub struct CatalogHealth {
    service: Arc<CatalogService>,
}

impl CatalogHealth {
    pub fn new(service: Arc<CatalogService>) -> Self {
        Self { service }
    }
}

impl HealthReporter for CatalogHealth {
    fn check(&self) -> ServingStatus {
        if self.service.is_ready() {
            ServingStatus::Serving
        } else {
            ServingStatus::NotServing
        }
    }
}
