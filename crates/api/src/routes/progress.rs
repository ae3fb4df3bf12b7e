//! Lecture progress endpoints. The caller only ever touches their own record.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{CourseId, LectureId};
use domain::ProgressReport;
use event_store::EventStore;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::identity::CurrentUser;
use crate::state::AppState;

/// POST /progress/{course}/lectures/{lecture}/view
#[tracing::instrument(skip(state))]
pub async fn lecture_viewed<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path((course, lecture)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let course_id = CourseId::parse(&course)?;
    let lecture_id = LectureId::parse(&lecture)?;
    state
        .progress
        .record_lecture_viewed(user_id, course_id, lecture_id)
        .await?;
    Ok(Json(json!({})))
}

/// GET /progress/{course}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(course): Path<String>,
) -> Result<Json<ProgressReport>, ApiError> {
    let course_id = CourseId::parse(&course)?;
    Ok(Json(state.progress.get_progress(user_id, course_id).await?))
}

/// POST /progress/{course}/complete
#[tracing::instrument(skip(state))]
pub async fn complete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(course): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let course_id = CourseId::parse(&course)?;
    state
        .progress
        .mark_course_completed(user_id, course_id)
        .await?;
    Ok(Json(json!({})))
}

/// POST /progress/{course}/incomplete
#[tracing::instrument(skip(state))]
pub async fn incomplete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(course): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let course_id = CourseId::parse(&course)?;
    state
        .progress
        .mark_course_incompleted(user_id, course_id)
        .await?;
    Ok(Json(json!({})))
}
