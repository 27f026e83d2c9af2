use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};

use super::dto::{CreateFoodEntry, FoodEntryOut, ListQuery};
use crate::{auth::extractors::CurrentUser, error::AppError, state::AppState};

pub fn food_routes() -> Router<AppState> {
    Router::new()
        .route("/food/", get(list_food_entries).post(create_food_entry))
        .route("/food", get(list_food_entries).post(create_food_entry))
}

#[instrument(skip(state, user, body))]
pub async fn create_food_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateFoodEntry>,
) -> Result<Json<FoodEntryOut>, AppError> {
    let entry = state
        .store
        .create_food_entry(&body.description, body.datetime, body.kind, user.id)
        .await?;

    info!(entry_id = entry.id, user_id = user.id, kind = ?entry.kind, "food entry created");
    Ok(Json(entry.into()))
}

#[instrument(skip(state))]
pub async fn list_food_entries(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<FoodEntryOut>>, AppError> {
    let Some(city) = q.city else {
        warn!("list food entries without city");
        return Err(AppError::MissingParameter("city"));
    };

    let window = Duration::hours(state.config.food_window_hours);
    let cutoff = OffsetDateTime::now_utc()
        .checked_sub(window)
        .ok_or_else(|| anyhow::anyhow!("food window {window:?} is out of range"))?;
    let entries = state.store.list_food_entries(&city, cutoff).await?;
    debug!(%city, %cutoff, count = entries.len(), "food entries listed");
    Ok(Json(entries.into_iter().map(FoodEntryOut::from).collect()))
}
