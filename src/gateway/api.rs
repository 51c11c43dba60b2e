use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use docgate_common::{ApiResponse, Record};
use serde_json::{Value, json};

use super::context::RequestContext;
use super::db::{SqliteStore, StoreHandle};
use super::hooks::HookRegistry;
use super::params::{self, Params};
use super::service::{Gateway, GatewayOptions};
use crate::errors::{GatewayError, GatewayResult};

/// Header carrying the acting user. Authentication happens upstream.
pub const USER_HEADER: &str = "x-docgate-user";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub store: StoreHandle,
    pub options: Arc<GatewayOptions>,
    pub hooks: Arc<HookRegistry>,
    pub default_user: String,
}

pub type SharedState = Arc<AppState>;

// ── Responses and errors ──────────────────────────────────────────────

/// An [`ApiResponse`] sent with the HTTP status equal to its `status_code`.
pub struct Envelope(pub ApiResponse);

impl Envelope {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self(ApiResponse::ok(message, data))
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

pub struct ApiError(pub GatewayError);

impl<E> From<E> for ApiError
where
    E: Into<GatewayError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        Envelope(ApiResponse::error(self.0.status_code(), self.0.to_string())).into_response()
    }
}

// ── Extractors ────────────────────────────────────────────────────────

/// Query string merged with a JSON object (or form) body. Body keys win.
pub struct RequestParams(pub Params);

impl<S> FromRequest<S> for RequestParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let Query(query) = Query::<HashMap<String, String>>::from_request_parts(&mut parts, state)
            .await
            .map_err(|e| GatewayError::bad_request(e.body_text()))?;
        let mut params: Params = query
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();

        let is_form = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        let req = Request::from_parts(parts, body);

        if is_form {
            let Form(form) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| GatewayError::bad_request(e.body_text()))?;
            params.extend(form.into_iter().map(|(k, v)| (k, Value::String(v))));
        } else {
            let bytes = Bytes::from_request(req, state)
                .await
                .map_err(|e| GatewayError::bad_request(e.body_text()))?;
            if !bytes.iter().all(u8::is_ascii_whitespace) {
                params.extend(json_object(&bytes)?);
            }
        }
        Ok(Self(params))
    }
}

fn json_object(bytes: &[u8]) -> GatewayResult<Record> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Record::new()),
        Ok(_) => Err(GatewayError::bad_request("Request body must be a JSON object")),
        Err(_) => Err(GatewayError::bad_request("Request body is not valid JSON")),
    }
}

impl FromRequestParts<SharedState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(&state.default_user);
        Ok(RequestContext::new(user))
    }
}

/// Ids rendered the way the platform prints a list of names: `['A', 'B']`.
fn id_list_text(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("'{}'", id.replace('\\', "\\\\").replace('\'', "\\'")))
        .collect();
    format!("[{}]", quoted.join(", "))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/method/list_info", get(list_info).post(list_info))
        .route("/api/method/list_data", get(list_data).post(list_data))
        .route("/api/method/single_data", get(single_data).post(single_data))
        .route("/api/method/delete_data", post(delete_data))
        .route("/api/method/update_data", post(update_data))
        .route("/api/resource/{doctype}", post(insert_resource))
        .route("/api/resource/{doctype}/{id}", put(update_resource))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Run one gateway operation on the blocking pool and log its failure.
async fn run<T, F>(
    state: &SharedState,
    ctx: RequestContext,
    op: &'static str,
    record_type: String,
    f: F,
) -> Result<T, ApiError>
where
    F: FnOnce(&Gateway<'_, SqliteStore>, &RequestContext) -> GatewayResult<T> + Send + 'static,
    T: Send + 'static,
{
    let options = state.options.clone();
    let hooks = state.hooks.clone();
    let request_id = ctx.request_id;
    let user = ctx.user.clone();

    let result = state
        .store
        .call(move |store| {
            let gateway = Gateway::new(store, &options, &hooks);
            f(&gateway, &ctx)
        })
        .await;

    if let Err(err) = &result {
        let status = err.status_code();
        if status >= 500 {
            tracing::error!(%request_id, %user, op, %record_type, error = ?err, "gateway operation failed");
        } else {
            tracing::warn!(%request_id, %user, op, %record_type, status, error = %err, "gateway request rejected");
        }
    }
    result.map_err(ApiError)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_info(
    State(state): State<SharedState>,
    ctx: RequestContext,
    RequestParams(params): RequestParams,
) -> Result<Envelope, ApiError> {
    let req = params::list_info_request(&params)?;
    let message = format!("{} field info fetched!", req.record_type);
    let record_type = req.record_type.clone();
    let info = run(&state, ctx, "list_info", record_type, move |gw, ctx| {
        gw.list_info(ctx, &req)
    })
    .await?;
    Ok(Envelope::ok(message, serde_json::to_value(info)?))
}

async fn list_data(
    State(state): State<SharedState>,
    ctx: RequestContext,
    RequestParams(params): RequestParams,
) -> Result<Envelope, ApiError> {
    let req = params::list_data_request(&params)?;
    let message = format!("{} list successfully fetched!", req.record_type);
    let record_type = req.record_type.clone();
    let page = run(&state, ctx, "list_data", record_type, move |gw, ctx| {
        gw.list_data(ctx, &req)
    })
    .await?;
    Ok(Envelope::ok(message, serde_json::to_value(page)?))
}

async fn single_data(
    State(state): State<SharedState>,
    ctx: RequestContext,
    RequestParams(params): RequestParams,
) -> Result<Envelope, ApiError> {
    let record_type = params::record_type(&params)?;
    let id = params::get_str(&params, "id").unwrap_or_default();
    let message = format!("{} fetched successfully!", record_type);
    let rt = record_type.clone();
    let doc = run(&state, ctx, "single_data", record_type, move |gw, ctx| {
        gw.single_data(ctx, &rt, &id)
    })
    .await?;
    Ok(Envelope::ok(message, json!({ "data": doc })))
}

async fn delete_data(
    State(state): State<SharedState>,
    ctx: RequestContext,
    RequestParams(params): RequestParams,
) -> Result<Envelope, ApiError> {
    let record_type = params::record_type(&params)?;
    let ids = params::ids_param(&params);
    let message = format!("{} are deleted successfully!", id_list_text(&ids));
    let rt = record_type.clone();
    run(&state, ctx, "delete_data", record_type, move |gw, ctx| {
        gw.delete_data(ctx, &rt, &ids)
    })
    .await?;
    Ok(Envelope::ok(message, json!({ "success": true })))
}

async fn update_data(
    State(state): State<SharedState>,
    ctx: RequestContext,
    RequestParams(params): RequestParams,
) -> Result<Envelope, ApiError> {
    let record_type = params::record_type(&params)?;
    let fields = params::update_fields(&params)?;
    let name = params::get_str(&params, "name").unwrap_or_default();
    let message = format!("{} {} updated successfully", record_type, name);
    let rt = record_type.clone();
    let outcome = run(&state, ctx, "update_data", record_type, move |gw, ctx| {
        gw.update_raw(ctx, &rt, &name, fields)
    })
    .await?;
    Ok(Envelope::ok(message, serde_json::to_value(outcome)?))
}

async fn insert_resource(
    State(state): State<SharedState>,
    Path(doctype): Path<String>,
    ctx: RequestContext,
    body: Bytes,
) -> Result<Envelope, ApiError> {
    let doc = json_object(&body)?;
    let rt = doctype.clone();
    let saved = run(&state, ctx, "insert", doctype.clone(), move |gw, ctx| {
        gw.insert(ctx, &rt, &doc)
    })
    .await?;
    let name = saved.get("name").and_then(Value::as_str).unwrap_or_default();
    let message = format!("{} {} created successfully", doctype, name);
    Ok(Envelope::ok(message, json!({ "data": saved })))
}

async fn update_resource(
    State(state): State<SharedState>,
    Path((doctype, id)): Path<(String, String)>,
    ctx: RequestContext,
    body: Bytes,
) -> Result<Envelope, ApiError> {
    let doc = json_object(&body)?;
    let message = format!("{} {} updated successfully", doctype, id);
    let saved = run(&state, ctx, "update", doctype.clone(), move |gw, ctx| {
        gw.update_validated(ctx, &doctype, &id, &doc)
    })
    .await?;
    Ok(Envelope::ok(message, json!({ "data": saved })))
}

// ── Tests ─────────────────────────────────────────────────────────────
