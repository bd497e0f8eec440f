//! services/api/src/web/reading.rs
//!
//! Reading progress, the daily goal and streak, and aggregate stats.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use bookflow_core::{HabitState, ProgressRecord, ReadingStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::HttpError;
use crate::web::state::AppState;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProgressUpdateRequest {
    pub current_page: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub current_page: i32,
    pub updated_at: DateTime<Utc>,
    pub progress_percentage: f64,
}

impl ProgressResponse {
    fn new(record: ProgressRecord, progress_percentage: f64) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            book_id: record.book_id,
            current_page: record.current_page,
            updated_at: record.updated_at,
            progress_percentage,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HabitResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub daily_goal_pages: i32,
    pub current_streak: i32,
    pub last_reading_date: Option<DateTime<Utc>>,
}

impl From<HabitState> for HabitResponse {
    fn from(habit: HabitState) -> Self {
        Self {
            id: habit.id,
            user_id: habit.user_id,
            daily_goal_pages: habit.daily_goal_pages,
            current_streak: habit.current_streak,
            last_reading_date: habit.last_reading_date,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HabitUpdateRequest {
    pub daily_goal_pages: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_books_read: i64,
    pub total_pages_read: i64,
    pub current_streak: i32,
    pub daily_goal_pages: i32,
}

impl From<ReadingStats> for StatsResponse {
    fn from(stats: ReadingStats) -> Self {
        Self {
            total_books_read: stats.total_books_read,
            total_pages_read: stats.total_pages_read,
            current_streak: stats.current_streak,
            daily_goal_pages: stats.daily_goal_pages,
        }
    }
}

//=========================================================================================
// Progress
//=========================================================================================

/// Set your current page in a book. Updates the streak as a side effect.
#[utoipa::path(
    put,
    path = "/reading/progress/{book_id}",
    tag = "reading",
    params(("book_id" = Uuid, Path, description = "Book id")),
    request_body = ProgressUpdateRequest,
    responses(
        (status = 200, description = "Progress saved", body = ProgressResponse),
        (status = 400, description = "Page outside 0..=pages"),
        (status = 403, description = "Book not in your library"),
        (status = 404, description = "No such book")
    )
)]
pub async fn update_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<ProgressUpdateRequest>,
) -> Result<Json<ProgressResponse>, HttpError> {
    let record = state
        .progress
        .update_progress(user_id, book_id, req.current_page)
        .await?;
    let percentage = state.progress.percentage(user_id, book_id).await?;
    Ok(Json(ProgressResponse::new(record, percentage)))
}

#[utoipa::path(
    get,
    path = "/reading/progress/{book_id}",
    tag = "reading",
    params(("book_id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Current progress", body = ProgressResponse),
        (status = 404, description = "Progress not found")
    )
)]
pub async fn get_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<ProgressResponse>, HttpError> {
    let record = state
        .progress
        .get_progress(user_id, book_id)
        .await?
        .ok_or_else(|| HttpError::not_found("Progress not found"))?;
    let percentage = state.progress.percentage(user_id, book_id).await?;
    Ok(Json(ProgressResponse::new(record, percentage)))
}

#[utoipa::path(
    get,
    path = "/reading/progress",
    tag = "reading",
    responses((status = 200, description = "All progress rows, most recent first", body = Vec<ProgressResponse>))
)]
pub async fn list_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<Vec<ProgressResponse>>, HttpError> {
    let records = state.progress.list_progress(user_id).await?;
    let mut response = Vec::with_capacity(records.len());
    for record in records {
        let percentage = state.progress.percentage(user_id, record.book_id).await?;
        response.push(ProgressResponse::new(record, percentage));
    }
    Ok(Json(response))
}

//=========================================================================================
// Habit & Stats
//=========================================================================================

#[utoipa::path(
    get,
    path = "/reading/habit",
    tag = "reading",
    responses((status = 200, description = "Daily goal and streak", body = HabitResponse))
)]
pub async fn get_habit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<HabitResponse>, HttpError> {
    let habit = state.habits.get_or_create(user_id).await?;
    Ok(Json(habit.into()))
}

#[utoipa::path(
    put,
    path = "/reading/habit",
    tag = "reading",
    request_body = HabitUpdateRequest,
    responses((status = 200, description = "Goal updated", body = HabitResponse))
)]
pub async fn update_habit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<HabitUpdateRequest>,
) -> Result<Json<HabitResponse>, HttpError> {
    let habit = state.habits.update_goal(user_id, req.daily_goal_pages).await?;
    Ok(Json(habit.into()))
}

#[utoipa::path(
    get,
    path = "/reading/stats",
    tag = "reading",
    responses((status = 200, description = "Reading totals", body = StatsResponse))
)]
pub async fn get_stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<StatsResponse>, HttpError> {
    let stats = state.progress.stats(user_id).await?;
    Ok(Json(stats.into()))
}
