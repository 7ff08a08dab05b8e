use std::path::PathBuf;

use thiserror::Error;

use crate::domain::product::ProductId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("product not found: {id}")]
    NotFound { id: ProductId },
    #[error("internal error: {message}")]
    Internal { message: String },
    #[error("catalog is not ready")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read dataset `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse dataset `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("dataset `{0}` contains no json files")]
    Empty(PathBuf),
    #[error("product at position {position} has an empty id")]
    EmptyId { position: usize },
    #[error("duplicate product id `{0}`")]
    DuplicateId(ProductId),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("catalog was already loaded; the ready transition happens once")]
    AlreadyReady,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    Unavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Internal { .. } => "internal",
            Self::Unavailable { .. } => "unavailable",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message, .. }
            | Self::Internal { message, .. }
            | Self::Unavailable { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. }
            | Self::Internal { correlation_id, .. }
            | Self::Unavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl CatalogError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. }
            | InterfaceError::Unavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<CatalogError> for InterfaceError {
    fn from(value: CatalogError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            CatalogError::NotFound { id } => {
                Self::NotFound { message: format!("Product Not Found: {id}"), correlation_id }
            }
            CatalogError::Internal { message } => Self::Internal { message, correlation_id },
            CatalogError::Unavailable => Self::Unavailable {
                message: "product catalog has not finished loading".to_owned(),
                correlation_id,
            },
        }
    }
}
