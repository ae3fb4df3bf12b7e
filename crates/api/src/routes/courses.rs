//! Course and lecture endpoints.
//!
//! Writes require the creator role, and edits require owning the course.
//! Listings are served from the catalog read model.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{CourseId, LectureId};
use domain::{Course, CourseDetails, Lecture, LectureDetails, NewCourse};
use event_store::EventStore;
use projections::{CourseListing, PriceSort, SearchQuery};
use serde::Deserialize;

use crate::error::ApiError;
use crate::identity::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateLectureRequest {
    pub title: String,
}

/// Query string of `GET /courses/search`; `categories` is comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub categories: Option<String>,
    pub sort: Option<PriceSort>,
}

impl From<SearchParams> for SearchQuery {
    fn from(params: SearchParams) -> Self {
        SearchQuery {
            query: params.query.unwrap_or_default(),
            categories: params
                .categories
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            sort: params.sort,
        }
    }
}

/// POST /courses
#[tracing::instrument(skip(state, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<NewCourse>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    state.require_creator(user_id).await?;
    let course = state.catalog.create_course(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// GET /courses/published
pub async fn published<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<CourseListing>>, ApiError> {
    state.projection_processor.run_catch_up().await?;
    Ok(Json(state.courses.published().await))
}

/// GET /courses/search
#[tracing::instrument(skip(state))]
pub async fn search<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<CourseListing>>, ApiError> {
    state.projection_processor.run_catch_up().await?;
    Ok(Json(state.courses.search(&params.into()).await))
}

/// GET /courses/mine
pub async fn mine<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<CourseListing>>, ApiError> {
    state.require_creator(user_id).await?;
    state.projection_processor.run_catch_up().await?;
    Ok(Json(state.courses.by_creator(user_id).await))
}

/// GET /courses/{id}
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Course>, ApiError> {
    let course_id = CourseId::parse(&id)?;
    Ok(Json(state.catalog.get_course(course_id).await?))
}

/// PATCH /courses/{id}
#[tracing::instrument(skip(state, req))]
pub async fn edit<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<CourseDetails>,
) -> Result<Json<Course>, ApiError> {
    let course_id = CourseId::parse(&id)?;
    state.owned_course(user_id, course_id).await?;
    Ok(Json(state.catalog.edit_course(course_id, req).await?))
}

/// POST /courses/{id}/publish
#[tracing::instrument(skip(state))]
pub async fn publish<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Course>, ApiError> {
    let course_id = CourseId::parse(&id)?;
    state.owned_course(user_id, course_id).await?;
    Ok(Json(state.catalog.publish_course(course_id).await?))
}

/// POST /courses/{id}/unpublish
#[tracing::instrument(skip(state))]
pub async fn unpublish<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Course>, ApiError> {
    let course_id = CourseId::parse(&id)?;
    state.owned_course(user_id, course_id).await?;
    Ok(Json(state.catalog.unpublish_course(course_id).await?))
}

/// POST /courses/{id}/lectures
#[tracing::instrument(skip(state, req))]
pub async fn create_lecture<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<CreateLectureRequest>,
) -> Result<(StatusCode, Json<Lecture>), ApiError> {
    let course_id = CourseId::parse(&id)?;
    state.owned_course(user_id, course_id).await?;
    let lecture = state.catalog.create_lecture(course_id, &req.title).await?;
    Ok((StatusCode::CREATED, Json(lecture)))
}

/// GET /courses/{id}/lectures
pub async fn lectures<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Lecture>>, ApiError> {
    let course_id = CourseId::parse(&id)?;
    Ok(Json(state.catalog.course_lectures(course_id).await?))
}

/// PATCH /courses/{id}/lectures/{lecture}
#[tracing::instrument(skip(state, req))]
pub async fn edit_lecture<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path((id, lecture)): Path<(String, String)>,
    Json(req): Json<LectureDetails>,
) -> Result<Json<Lecture>, ApiError> {
    let course_id = CourseId::parse(&id)?;
    let lecture_id = LectureId::parse(&lecture)?;
    state.owned_course(user_id, course_id).await?;
    Ok(Json(
        state
            .catalog
            .edit_lecture(course_id, lecture_id, req)
            .await?,
    ))
}

/// DELETE /courses/{id}/lectures/{lecture}
#[tracing::instrument(skip(state))]
pub async fn remove_lecture<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user_id): CurrentUser,
    Path((id, lecture)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let course_id = CourseId::parse(&id)?;
    let lecture_id = LectureId::parse(&lecture)?;
    state.owned_course(user_id, course_id).await?;
    state.catalog.remove_lecture(course_id, lecture_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
