use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{dto::MessageResponse, jwt::AuthUser},
    entries::{
        dto::{CreateEntryRequest, StatsQuery, UpdateEntryRequest, SUGGESTED_CATEGORIES},
        repo_types::Entry,
        services,
    },
    error::AppError,
    extract::{Json, Query},
    state::AppState,
    stats::DashboardStats,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/entries/stats", get(entry_stats))
        .route("/entries/categories", get(categories))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/entries", get(list_entries).post(create_entry))
        .route("/entries/:id", axum::routing::put(update_entry).delete(delete_entry))
}

#[instrument(skip(state))]
pub async fn list_entries(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Entry>>, AppError> {
    Ok(Json(services::list_entries(&state, user_id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateEntryRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Entry>), AppError> {
    let entry = services::create_entry(&state, user_id, body).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/entries/{}", entry.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(entry)))
}

#[instrument(skip(state, body))]
pub async fn update_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateEntryRequest>,
) -> Result<Json<Entry>, AppError> {
    Ok(Json(services::update_entry(&state, user_id, id, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_entry(&state, user_id, id).await?;
    Ok(Json(MessageResponse {
        message: "Entry deleted".into(),
    }))
}

#[instrument(skip(state))]
pub async fn entry_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<StatsQuery>,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(services::entry_stats(&state, user_id, query).await?))
}

pub async fn categories() -> Json<Vec<&'static str>> {
    Json(SUGGESTED_CATEGORIES.to_vec())
}
