pub mod fault;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

pub use fault::{FaultInjectionPolicy, FaultSettings, Operation};

pub const PRODUCT_CATALOG_FAILURE_FLAG: &str = "productCatalogFailure";
pub const PRODUCT_CATALOG_LATENCY_FLAG: &str = "productCatalogLatencyMs";

/// Evaluation context passed to the flag provider.
///
/// `deadline` is the caller's request deadline; providers that do I/O should
/// not wait past it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlagContext {
    pub targeting_key: Option<String>,
    pub correlation_id: String,
    pub deadline: Option<Instant>,
}

impl FlagContext {
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlagError {
    #[error("flag provider failed: {0}")]
    Provider(String),
    #[error("flag `{key}` is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
}

/// Feature-flag provider. `Ok(None)` means the flag is not set.
#[async_trait]
pub trait FlagResolver: Send + Sync {
    async fn resolve_bool(
        &self,
        key: &str,
        context: &FlagContext,
    ) -> Result<Option<bool>, FlagError>;

    async fn resolve_int(
        &self,
        _key: &str,
        _context: &FlagContext,
    ) -> Result<Option<i64>, FlagError> {
        Ok(None)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopFlagResolver;

#[async_trait]
impl FlagResolver for NoopFlagResolver {
    async fn resolve_bool(
        &self,
        _key: &str,
        _context: &FlagContext,
    ) -> Result<Option<bool>, FlagError> {
        Ok(None)
    }
}

/// Fixed flag values, typically from the `[flags.values]` config table.
#[derive(Clone, Debug, Default)]
pub struct StaticFlagResolver {
    values: HashMap<String, FlagValue>,
}

impl StaticFlagResolver {
    pub fn new(values: HashMap<String, FlagValue>) -> Self {
        Self { values }
    }

    pub fn with(mut self, key: impl Into<String>, value: FlagValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

#[async_trait]
impl FlagResolver for StaticFlagResolver {
    async fn resolve_bool(
        &self,
        key: &str,
        _context: &FlagContext,
    ) -> Result<Option<bool>, FlagError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(FlagValue::Bool(value)) => Ok(Some(*value)),
            Some(FlagValue::Int(_)) => {
                Err(FlagError::TypeMismatch { key: key.to_owned(), expected: "boolean" })
            }
        }
    }

    async fn resolve_int(
        &self,
        key: &str,
        _context: &FlagContext,
    ) -> Result<Option<i64>, FlagError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(FlagValue::Int(value)) => Ok(Some(*value)),
            Some(FlagValue::Bool(_)) => {
                Err(FlagError::TypeMismatch { key: key.to_owned(), expected: "integer" })
            }
        }
    }
}
