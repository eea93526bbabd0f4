//! Read-only views of other users' portfolios. Changing entries stays
//! owner-only and goes through `entries::services`.

use tracing::instrument;
use uuid::Uuid;

use crate::auth::dto::PublicUser;
use crate::auth::repo_types::User;
use crate::entries::dto::StatsQuery;
use crate::entries::repo_types::Entry;
use crate::entries::services as entry_services;
use crate::error::AppError;
use crate::state::AppState;
use crate::stats::DashboardStats;

async fn user_by_handle(st: &AppState, handle: &str) -> Result<User, AppError> {
    st.users
        .find_by_handle(handle.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

#[instrument(skip(st))]
pub async fn list_users(st: &AppState) -> Result<Vec<PublicUser>, AppError> {
    let users = st.users.list_all().await?;
    Ok(users.into_iter().map(PublicUser::from).collect())
}

#[instrument(skip(st))]
pub async fn profile(st: &AppState, handle: &str) -> Result<PublicUser, AppError> {
    Ok(user_by_handle(st, handle).await?.into())
}

#[instrument(skip(st))]
pub async fn portfolio_entries(st: &AppState, handle: &str) -> Result<Vec<Entry>, AppError> {
    let owner = user_by_handle(st, handle).await?;
    entry_services::list_entries(st, owner.id).await
}

#[instrument(skip(st))]
pub async fn portfolio_stats(
    st: &AppState,
    handle: &str,
    query: StatsQuery,
) -> Result<DashboardStats, AppError> {
    let owner: Uuid = user_by_handle(st, handle).await?.id;
    entry_services::entry_stats(st, owner, query).await
}
