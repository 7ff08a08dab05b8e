//! HTTP/JSON rendition of the ProductCatalogService RPC surface.
//!
//! - `GET /products` lists the catalog
//! - `GET /products/{id}` fetches one product (`/products/` is an empty id)
//! - `GET /products/search?query=...` searches names and descriptions

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use catalog_core::{
    CatalogError, CatalogService, InterfaceError, Product, ProductId, RequestContext,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

#[derive(Clone)]
pub struct RpcState {
    service: Arc<CatalogService>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductList {
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResults {
    pub results: Vec<Product>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub correlation_id: String,
}

pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            InterfaceError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = ErrorBody {
            error: self.0.kind().to_owned(),
            message: self.0.message().to_owned(),
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

fn api_error(error: CatalogError, request: &RequestContext) -> ApiError {
    ApiError(error.into_interface(request.correlation_id.clone()))
}

pub fn router(service: Arc<CatalogService>) -> Router {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/search", get(search_products))
        .route("/products/", get(get_product_without_id))
        .route("/products/{id}", get(get_product))
        .with_state(RpcState { service })
}

pub async fn list_products(
    State(state): State<RpcState>,
    headers: HeaderMap,
) -> Result<Json<ProductList>, ApiError> {
    let request = request_context(&headers);
    let products =
        state.service.list_products(&request).await.map_err(|e| api_error(e, &request))?;
    Ok(Json(ProductList { products }))
}

pub async fn get_product(
    State(state): State<RpcState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Product>, ApiError> {
    let request = request_context(&headers);
    let product = state
        .service
        .get_product(&ProductId::new(id), &request)
        .await
        .map_err(|e| api_error(e, &request))?;
    Ok(Json(product))
}

/// `/products/` never matches `{id}`; answer it as a lookup of the empty id.
pub async fn get_product_without_id(
    state: State<RpcState>,
    headers: HeaderMap,
) -> Result<Json<Product>, ApiError> {
    get_product(state, Path(String::new()), headers).await
}

pub async fn search_products(
    State(state): State<RpcState>,
    Query(query): Query<SearchQuery>,
    headers: HeaderMap,
) -> Result<Json<SearchResults>, ApiError> {
    let request = request_context(&headers);
    let results = state
        .service
        .search_products(&query.query, &request)
        .await
        .map_err(|e| api_error(e, &request))?;
    Ok(Json(SearchResults { results }))
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    let correlation_id = headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let request = RequestContext::new(correlation_id);

    let Some(raw) = headers.get(REQUEST_TIMEOUT_HEADER) else {
        return request;
    };
    match raw.to_str().ok().and_then(|value| value.trim().parse::<u64>().ok()) {
        Some(millis) => request.with_timeout(Duration::from_millis(millis)),
        None => {
            warn!(
                event_name = "catalog.rpc.invalid_timeout_header",
                correlation_id = %request.correlation_id,
                "ignoring unparseable request timeout header"
            );
            request
        }
    }
}
