use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::domain::product::ProductId;
use crate::flags::{
    FlagContext, FlagError, FlagResolver, PRODUCT_CATALOG_FAILURE_FLAG,
    PRODUCT_CATALOG_LATENCY_FLAG,
};

pub const DEMO_FAILURE_PRODUCT_ID: &str = "OLJCESPC7Z";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    ListProducts,
    GetProduct,
    SearchProducts,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Self::ListProducts => "ListProducts",
            Self::GetProduct => "GetProduct",
            Self::SearchProducts => "SearchProducts",
        }
    }

    fn failure_flag(self) -> Option<&'static str> {
        match self {
            Self::GetProduct => Some(PRODUCT_CATALOG_FAILURE_FLAG),
            Self::ListProducts | Self::SearchProducts => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaultSettings {
    pub failure_product_id: ProductId,
    pub flag_timeout: Duration,
    pub max_latency: Duration,
}

impl Default for FaultSettings {
    fn default() -> Self {
        Self {
            failure_product_id: ProductId::from(DEMO_FAILURE_PRODUCT_ID),
            flag_timeout: Duration::from_millis(500),
            max_latency: Duration::from_secs(5),
        }
    }
}

/// Decides whether a request gets a synthetic failure or delay.
///
/// Every provider outcome other than an explicit value (unset, error, or no
/// answer before the deadline) resolves to "no fault".
#[derive(Clone)]
pub struct FaultInjectionPolicy {
    resolver: Arc<dyn FlagResolver>,
    settings: FaultSettings,
}

impl FaultInjectionPolicy {
    pub fn new(resolver: Arc<dyn FlagResolver>, settings: FaultSettings) -> Self {
        Self { resolver, settings }
    }

    pub async fn should_fail(
        &self,
        operation: Operation,
        request: &RequestContext,
        target: Option<&ProductId>,
    ) -> bool {
        let Some(flag) = operation.failure_flag() else {
            return false;
        };
        if target != Some(&self.settings.failure_product_id) {
            return false;
        }

        let context = flag_context(request, target);
        let enabled = self
            .bounded(flag, request, self.resolver.resolve_bool(flag, &context))
            .await
            .unwrap_or(false);

        if enabled {
            debug!(
                event_name = "catalog.fault.failure_injected",
                correlation_id = %request.correlation_id,
                operation = operation.name(),
                flag,
                "fault injection flag enabled"
            );
        }
        enabled
    }

    pub async fn injected_latency(
        &self,
        operation: Operation,
        request: &RequestContext,
        target: Option<&ProductId>,
    ) -> Duration {
        let flag = PRODUCT_CATALOG_LATENCY_FLAG;
        let context = flag_context(request, target);
        let millis = self
            .bounded(flag, request, self.resolver.resolve_int(flag, &context))
            .await
            .unwrap_or(0);

        let latency = u64::try_from(millis)
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO)
            .min(self.settings.max_latency);

        if !latency.is_zero() {
            debug!(
                event_name = "catalog.fault.latency_injected",
                correlation_id = %request.correlation_id,
                operation = operation.name(),
                latency_ms = latency.as_millis() as u64,
                "fault injection latency enabled"
            );
        }
        latency
    }

    /// Runs one provider call within the flag timeout and the request deadline.
    async fn bounded<T, F>(&self, flag: &str, request: &RequestContext, call: F) -> Option<T>
    where
        F: Future<Output = Result<Option<T>, FlagError>>,
    {
        let budget = request.bound(self.settings.flag_timeout);
        if budget.is_zero() {
            warn!(
                event_name = "catalog.fault.flag_skipped",
                correlation_id = %request.correlation_id,
                flag,
                "request deadline exhausted before flag evaluation; using default"
            );
            return None;
        }

        match tokio::time::timeout(budget, call).await {
            Ok(Ok(value)) => value,
            Ok(Err(error)) => {
                warn!(
                    event_name = "catalog.fault.flag_error",
                    correlation_id = %request.correlation_id,
                    flag,
                    error = %error,
                    "flag evaluation failed; using default"
                );
                None
            }
            Err(_) => {
                warn!(
                    event_name = "catalog.fault.flag_timeout",
                    correlation_id = %request.correlation_id,
                    flag,
                    timeout_ms = budget.as_millis() as u64,
                    "flag evaluation timed out; using default"
                );
                None
            }
        }
    }
}

fn flag_context(request: &RequestContext, target: Option<&ProductId>) -> FlagContext {
    FlagContext {
        targeting_key: target.map(|id| id.as_str().to_owned()),
        correlation_id: request.correlation_id.clone(),
        deadline: request.deadline,
    }
}
