//! Request handlers.

use applet::{OperationKind, OperationRequest, OperationResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use gateway::{ClientKey, GatewayError, ProxyRequest, ProxyResponse};
use serde_json::{json, Value};

use crate::{ApiError, AppState};

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

pub async fn operation(
    State(state): State<AppState>,
    body: Result<Json<OperationRequest>, JsonRejection>,
) -> ApiResult<OperationResponse> {
    run_operation(&state, None, body).await
}

pub async fn generate_app(
    State(state): State<AppState>,
    body: Result<Json<OperationRequest>, JsonRejection>,
) -> ApiResult<OperationResponse> {
    run_operation(&state, Some(OperationKind::Create), body).await
}

pub async fn enhance_app(
    State(state): State<AppState>,
    body: Result<Json<OperationRequest>, JsonRejection>,
) -> ApiResult<OperationResponse> {
    run_operation(&state, Some(OperationKind::Enhance), body).await
}

pub async fn fix_app(
    State(state): State<AppState>,
    body: Result<Json<OperationRequest>, JsonRejection>,
) -> ApiResult<OperationResponse> {
    run_operation(&state, Some(OperationKind::Fix), body).await
}

pub async fn custom_command(
    State(state): State<AppState>,
    body: Result<Json<OperationRequest>, JsonRejection>,
) -> ApiResult<OperationResponse> {
    run_operation(&state, Some(OperationKind::Customize), body).await
}

async fn run_operation(
    state: &AppState,
    implied_kind: Option<OperationKind>,
    body: Result<Json<OperationRequest>, JsonRejection>,
) -> ApiResult<OperationResponse> {
    let Json(body) = body.map_err(|rejection| ApiError::from_rejection(&rejection))?;
    let request = body.into_generation_request(implied_kind)?;
    let result = state.orchestrator.generate(&request).await?;
    Ok(Json(result.into()))
}

// ---------------------------------------------------------------------------
// App proxy
// ---------------------------------------------------------------------------

pub async fn app_proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> ApiResult<ProxyResponse> {
    let Json(request) = body.map_err(|rejection| GatewayError::InvalidRequest {
        message: rejection.body_text(),
    })?;
    let client = client_key(&headers);
    let response = state.gateway.proxy(request, &client).await?;
    Ok(Json(response))
}

/// Rate-limit identity of the caller.
pub fn client_key(headers: &HeaderMap) -> ClientKey {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    ClientKey::from_forwarded(header("x-forwarded-for"), header("x-real-ip"))
}
