use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use catalog_core::config::{FlagProvider, FlagsConfig};
use catalog_core::flags::{
    FlagContext, FlagError, FlagResolver, NoopFlagResolver, StaticFlagResolver,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Client for the OpenFeature Remote Evaluation Protocol, as served by flagd
/// and compatible providers.
pub struct OfrepFlagResolver {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct EvaluationRequest<'a> {
    context: EvaluationContext<'a>,
}

#[derive(Debug, Serialize)]
struct EvaluationContext<'a> {
    #[serde(rename = "targetingKey", skip_serializing_if = "Option::is_none")]
    targeting_key: Option<&'a str>,
    #[serde(rename = "correlationId")]
    correlation_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct EvaluationResponse {
    #[serde(default)]
    value: Option<Value>,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
    #[serde(rename = "errorDetails", default)]
    error_details: Option<String>,
}

impl OfrepFlagResolver {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FlagError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| FlagError::Provider(error.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { client, base_url })
    }

    async fn evaluate(
        &self,
        key: &str,
        context: &FlagContext,
    ) -> Result<Option<Value>, FlagError> {
        let url = format!("{}/ofrep/v1/evaluate/flags/{key}", self.base_url);
        let body = EvaluationRequest {
            context: EvaluationContext {
                targeting_key: context.targeting_key.as_deref(),
                correlation_id: &context.correlation_id,
            },
        };

        let mut call = self.client.post(&url).json(&body);
        if let Some(remaining) = context.remaining() {
            call = call.timeout(remaining);
        }
        let response =
            call.send().await.map_err(|error| FlagError::Provider(error.to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let evaluation: EvaluationResponse = response
            .json()
            .await
            .map_err(|error| FlagError::Provider(format!("invalid ofrep response: {error}")))?;

        match evaluation.error_code.as_deref() {
            None => {}
            Some("FLAG_NOT_FOUND") => return Ok(None),
            Some(code) => {
                let details = evaluation.error_details.unwrap_or_default();
                return Err(FlagError::Provider(format!("{code}: {details}")));
            }
        }
        if !status.is_success() {
            return Err(FlagError::Provider(format!("ofrep returned {status}")));
        }

        Ok(evaluation.value)
    }
}

#[async_trait]
impl FlagResolver for OfrepFlagResolver {
    async fn resolve_bool(
        &self,
        key: &str,
        context: &FlagContext,
    ) -> Result<Option<bool>, FlagError> {
        match self.evaluate(key, context).await? {
            None => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(value)),
            Some(_) => Err(FlagError::TypeMismatch { key: key.to_owned(), expected: "boolean" }),
        }
    }

    async fn resolve_int(
        &self,
        key: &str,
        context: &FlagContext,
    ) -> Result<Option<i64>, FlagError> {
        match self.evaluate(key, context).await? {
            None => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| FlagError::TypeMismatch {
                key: key.to_owned(),
                expected: "integer",
            }),
        }
    }
}

pub fn build_resolver(config: &FlagsConfig) -> Result<Arc<dyn FlagResolver>, FlagError> {
    let resolver: Arc<dyn FlagResolver> = match config.provider {
        FlagProvider::None => Arc::new(NoopFlagResolver),
        FlagProvider::Static => Arc::new(StaticFlagResolver::new(config.values.clone())),
        FlagProvider::Ofrep => {
            let base_url = config.ofrep_url.clone().unwrap_or_default();
            Arc::new(OfrepFlagResolver::new(base_url, Duration::from_millis(config.timeout_ms))?)
        }
    };

    info!(
        event_name = "system.flags.provider_selected",
        correlation_id = "bootstrap",
        provider = ?config.provider,
        "feature flag provider configured"
    );
    Ok(resolver)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{extract::Path, http::StatusCode, routing::post, Json, Router};
    use catalog_core::flags::{FlagContext, FlagError, FlagResolver};
    use serde_json::{json, Value};
    use tokio::time::Instant;

    use super::OfrepFlagResolver;

    async fn evaluate(
        Path(key): Path<String>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let targeting_key = body["context"]["targetingKey"].as_str().unwrap_or_default();
        let enabled = targeting_key == "OLJCESPC7Z";
        match key.as_str() {
            "productCatalogFailure" => (
                StatusCode::OK,
                Json(json!({ "key": key, "value": enabled, "reason": "TARGETING_MATCH" })),
            ),
            "productCatalogLatencyMs" => {
                (StatusCode::OK, Json(json!({ "key": key, "value": 120, "reason": "STATIC" })))
            }
            "slowFlag" => {
                tokio::time::sleep(Duration::from_secs(3)).await;
                (StatusCode::OK, Json(json!({ "key": key, "value": true })))
            }
            "brokenFlag" => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "key": key, "errorCode": "PARSE_ERROR", "errorDetails": "bad rule" })),
            ),
            _ => (
                StatusCode::NOT_FOUND,
                Json(json!({ "key": key, "errorCode": "FLAG_NOT_FOUND" })),
            ),
        }
    }

    async fn spawn_provider() -> String {
        let app = Router::new().route("/ofrep/v1/evaluate/flags/{key}", post(evaluate));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{address}/")
    }

    fn context(targeting_key: Option<&str>) -> FlagContext {
        FlagContext {
            targeting_key: targeting_key.map(str::to_owned),
            correlation_id: "req-ofrep".to_owned(),
            deadline: None,
        }
    }

    #[tokio::test]
    async fn resolves_boolean_flags_with_targeting() {
        let resolver = OfrepFlagResolver::new(spawn_provider().await, Duration::from_secs(2))
            .expect("client");

        let flag = "productCatalogFailure";
        let demo = resolver.resolve_bool(flag, &context(Some("OLJCESPC7Z"))).await;
        let other = resolver.resolve_bool(flag, &context(Some("66VCHSJNUP"))).await;

        assert_eq!(demo, Ok(Some(true)));
        assert_eq!(other, Ok(Some(false)));
    }

    #[tokio::test]
    async fn resolves_integer_flags() {
        let resolver = OfrepFlagResolver::new(spawn_provider().await, Duration::from_secs(2))
            .expect("client");

        let latency = resolver.resolve_int("productCatalogLatencyMs", &context(None)).await;
        assert_eq!(latency, Ok(Some(120)));
    }

    #[tokio::test]
    async fn unknown_flags_are_unset() {
        let resolver = OfrepFlagResolver::new(spawn_provider().await, Duration::from_secs(2))
            .expect("client");

        assert_eq!(resolver.resolve_bool("missing", &context(None)).await, Ok(None));
    }

    #[tokio::test]
    async fn provider_errors_and_type_mismatches_surface_as_flag_errors() {
        let resolver = OfrepFlagResolver::new(spawn_provider().await, Duration::from_secs(2))
            .expect("client");

        let broken = resolver.resolve_bool("brokenFlag", &context(None)).await;
        assert!(matches!(
            broken,
            Err(FlagError::Provider(ref message)) if message.contains("PARSE_ERROR")
        ));

        let mismatch = resolver.resolve_bool("productCatalogLatencyMs", &context(None)).await;
        assert!(matches!(mismatch, Err(FlagError::TypeMismatch { .. })));
    }

    #[tokio::test]
    async fn request_deadline_cuts_a_slow_evaluation_short() {
        let resolver = OfrepFlagResolver::new(spawn_provider().await, Duration::from_secs(10))
            .expect("client");
        let context = FlagContext {
            deadline: Some(Instant::now() + Duration::from_millis(100)),
            ..context(None)
        };

        let started = std::time::Instant::now();
        let result = resolver.resolve_bool("slowFlag", &context).await;

        assert!(matches!(result, Err(FlagError::Provider(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_provider_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("local addr");
        drop(listener);

        let resolver =
            OfrepFlagResolver::new(format!("http://{address}"), Duration::from_millis(500))
                .expect("client");
        let result = resolver.resolve_bool("productCatalogFailure", &context(None)).await;

        assert!(matches!(result, Err(FlagError::Provider(_))));
    }
}
