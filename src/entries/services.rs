use time::{Date, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entries::dto::{parse_date, CreateEntryRequest, StatsQuery, UpdateEntryRequest};
use crate::entries::repo_types::Entry;
use crate::error::AppError;
use crate::state::AppState;
use crate::stats::{self, DashboardStats, DEFAULT_CHART_DAYS};

const MAX_CHART_DAYS: u32 = 366;

/// Loads an entry and checks that `user_id` owns it.
async fn owned_entry(st: &AppState, user_id: Uuid, entry_id: Uuid) -> Result<Entry, AppError> {
    let entry = st
        .entries
        .find_by_id(entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".into()))?;
    if entry.user_id != user_id {
        warn!(%user_id, %entry_id, owner = %entry.user_id, "entry access by non-owner");
        return Err(AppError::Forbidden("Not authorized".into()));
    }
    Ok(entry)
}

#[instrument(skip(st))]
pub async fn list_entries(st: &AppState, user_id: Uuid) -> Result<Vec<Entry>, AppError> {
    Ok(st.entries.list_by_user(user_id).await?)
}

#[instrument(skip(st, req))]
pub async fn create_entry(
    st: &AppState,
    user_id: Uuid,
    req: CreateEntryRequest,
) -> Result<Entry, AppError> {
    let new = req.validate(user_id)?;
    let entry = st.entries.create(new).await?;
    info!(%user_id, entry_id = %entry.id, "entry created");
    Ok(entry)
}

#[instrument(skip(st, req))]
pub async fn update_entry(
    st: &AppState,
    user_id: Uuid,
    entry_id: Uuid,
    req: UpdateEntryRequest,
) -> Result<Entry, AppError> {
    let patch = req.validate()?;
    let entry = owned_entry(st, user_id, entry_id).await?;
    if patch.is_empty() {
        return Ok(entry);
    }

    let updated = st
        .entries
        .update(entry_id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".into()))?;
    info!(%user_id, %entry_id, "entry updated");
    Ok(updated)
}

#[instrument(skip(st))]
pub async fn delete_entry(st: &AppState, user_id: Uuid, entry_id: Uuid) -> Result<(), AppError> {
    owned_entry(st, user_id, entry_id).await?;
    if !st.entries.delete(entry_id).await? {
        return Err(AppError::NotFound("Entry not found".into()));
    }
    info!(%user_id, %entry_id, "entry deleted");
    Ok(())
}

#[instrument(skip(st))]
pub async fn entry_stats(
    st: &AppState,
    user_id: Uuid,
    query: StatsQuery,
) -> Result<DashboardStats, AppError> {
    let days = query.days.unwrap_or(DEFAULT_CHART_DAYS);
    if !(1..=MAX_CHART_DAYS).contains(&days) {
        return Err(AppError::validation("Days must be between 1 and 366"));
    }
    let today: Date = match query.today.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => OffsetDateTime::now_utc().date(),
    };

    let entries = st.entries.list_by_user(user_id).await?;
    Ok(stats::summarize(&entries, today, days))
}
