use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use tracing::{error, instrument};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, PublicUser,
            RegisterRequest, VerifyEmailResponse,
        },
        jwt::AuthUser,
        services,
    },
    error::AppError,
    extract::Json,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/verify-email/:token", get(verify_email))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(get_me))
        .route("/auth/password", put(change_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let res = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(services::login(&state, payload).await?))
}

#[instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> (StatusCode, Json<VerifyEmailResponse>) {
    match services::verify_email(&state, &token).await {
        Ok(res) => (StatusCode::OK, Json(res)),
        Err(e) => {
            error!(error = %format!("{e:#}"), "email verification failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VerifyEmailResponse {
                    success: false,
                    message: "Server error".into(),
                }),
            )
        }
    }
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(services::me(&state, user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::change_password(&state, user_id, payload).await?;
    Ok(Json(MessageResponse {
        message: "Password updated".into(),
    }))
}
