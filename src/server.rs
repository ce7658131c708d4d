//!
//! timesheet HTTP server
//! ---------------------
//! Axum routes over the gateway. Handlers only extract input, call one gateway
//! operation and serialize the result; status codes come from `AppError`.
//!
//! Responsibilities:
//! - Bearer authentication through the `Authenticated` extractor.
//! - JSON, path and query rejections reported as `{"detail": ...}` 400s.
//! - Per-request timeout and request tracing layers; a timeout answers with
//!   the same `{"detail": ...}` body as every other error.
//! - Startup: open the store, create the bootstrap admin, bind and serve.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::gateway::Gateway;
use crate::identity::{Claims, SessionManager};
use crate::model::{
    CompanyQuery, IdentityUpdate, LoginRequest, NewIdentity, NewTimeEntry, TimeEntryView, TokenResponse, TotalHours,
    UserView,
};
use crate::security::CredentialHasher;
use crate::storage::{MemoryStore, SharedStore};

/// Shared server state injected into all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub gateway: Gateway,
}

impl From<JsonRejection> for AppError {
    fn from(r: JsonRejection) -> Self { AppError::bad_request(r.body_text()) }
}

impl From<PathRejection> for AppError {
    fn from(r: PathRejection) -> Self { AppError::bad_request(r.body_text()) }
}

impl From<QueryRejection> for AppError {
    fn from(r: QueryRejection) -> Self { AppError::bad_request(r.body_text()) }
}

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
struct Body<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
struct PathParam<T>(T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
struct QueryParam<T>(T);

/// Claims of the bearer token on the request. Rejects with 401.
pub struct Authenticated(pub Claims);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts.headers.get(header::AUTHORIZATION).map(|v| v.to_str()).transpose();
        let header = header.map_err(|_| AppError::Unauthenticated)?;
        state.gateway.authenticate(header).map(Authenticated)
    }
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/login", post(login))
        .route("/users", post(create_user).get(list_users))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/time-logs", post(log_time))
        .route("/time-logs/me", get(my_time_logs))
        .route("/time-logs/company", get(company_time_logs))
        .route("/time-logs/company/total", get(company_total))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(map_response(timeout_detail))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `TimeoutLayer` answers with an empty 408.
async fn timeout_detail(resp: Response) -> Response {
    if resp.status() == StatusCode::REQUEST_TIMEOUT {
        return AppError::Timeout.into_response();
    }
    resp
}

/// Wire store, hasher and token issuer into a gateway.
pub fn build_gateway(config: &Config) -> anyhow::Result<Gateway> {
    let store: SharedStore = match &config.data_file {
        Some(path) => Arc::new(
            MemoryStore::open(path).with_context(|| format!("opening data file {}", path.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };
    let hasher = CredentialHasher::new(config.hash_cost).context("configuring password hasher")?;
    let ttl_secs = i64::try_from(config.token_ttl.as_secs()).context("token ttl out of range")?;
    let sessions = SessionManager::new(config.secret.as_bytes(), ttl_secs).context("configuring token issuer")?;
    Ok(Gateway::new(store, hasher, sessions))
}

/// Start the timesheet HTTP server.
///
/// Opens the store, creates the bootstrap admin when configured and the store is
/// empty, then serves until the process is stopped.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let gateway = build_gateway(&config)?;
    if let Some(admin) = &config.bootstrap_admin {
        let created = gateway
            .ensure_bootstrap_admin(&admin.username, &admin.email, &admin.password)
            .await
            .context("creating bootstrap admin")?;
        if created {
            info!(target: "timesheet::server", email = %admin.email, "bootstrap admin created");
        }
    }
    info!(
        target: "timesheet::server",
        "store ready: identities={}, data_file={:?}",
        gateway.store().count_users()?,
        config.data_file
    );

    let app = router(AppState { gateway }, config.request_timeout);
    let addr = SocketAddr::new(config.bind, config.http_port);
    info!(target: "timesheet::server", "HTTP listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Hello World" }))
}

async fn login(State(state): State<AppState>, Body(req): Body<LoginRequest>) -> AppResult<Json<TokenResponse>> {
    state.gateway.login(req).await.map(Json)
}

async fn create_user(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Body(req): Body<NewIdentity>,
) -> AppResult<Json<UserView>> {
    state.gateway.create_identity(&claims, req).await.map(Json)
}

async fn list_users(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    QueryParam(q): QueryParam<CompanyQuery>,
) -> AppResult<Json<Vec<UserView>>> {
    state.gateway.list_identities(&claims, q.company.as_deref()).await.map(Json)
}

async fn get_user(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    PathParam(id): PathParam<u64>,
) -> AppResult<Json<UserView>> {
    state.gateway.get_identity(&claims, id).await.map(Json)
}

async fn update_user(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    PathParam(id): PathParam<u64>,
    Body(req): Body<IdentityUpdate>,
) -> AppResult<Json<UserView>> {
    state.gateway.update_identity(&claims, id, req).await.map(Json)
}

async fn delete_user(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    PathParam(id): PathParam<u64>,
) -> AppResult<StatusCode> {
    state.gateway.delete_identity(&claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn log_time(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Body(req): Body<NewTimeEntry>,
) -> AppResult<Json<TimeEntryView>> {
    state.gateway.log_time(&claims, req).await.map(Json)
}

async fn my_time_logs(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
) -> AppResult<Json<Vec<TimeEntryView>>> {
    state.gateway.my_entries(&claims).await.map(Json)
}

async fn company_time_logs(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    QueryParam(q): QueryParam<CompanyQuery>,
) -> AppResult<Json<Vec<TimeEntryView>>> {
    state.gateway.tenant_entries(&claims, q.company.as_deref()).await.map(Json)
}

async fn company_total(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    QueryParam(q): QueryParam<CompanyQuery>,
) -> AppResult<Json<TotalHours>> {
    state.gateway.total_hours(&claims, q.company.as_deref()).await.map(Json)
}
