use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use tracing::instrument;

use crate::{
    auth::{dto::PublicUser, jwt::AuthUser},
    entries::{dto::StatsQuery, repo_types::Entry},
    error::AppError,
    extract::{Json, Query},
    state::AppState,
    stats::DashboardStats,
    users::services,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:handle", get(profile))
        .route("/users/:handle/entries", get(portfolio_entries))
        .route("/users/:handle/stats", get(portfolio_stats))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    Ok(Json(services::list_users(&state).await?))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(handle): Path<String>,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(services::profile(&state, &handle).await?))
}

#[instrument(skip(state))]
pub async fn portfolio_entries(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(handle): Path<String>,
) -> Result<Json<Vec<Entry>>, AppError> {
    Ok(Json(services::portfolio_entries(&state, &handle).await?))
}

#[instrument(skip(state))]
pub async fn portfolio_stats(
    State(state): State<AppState>,
    AuthUser(viewer): AuthUser,
    Path(handle): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(services::portfolio_stats(&state, &handle, query).await?))
}
