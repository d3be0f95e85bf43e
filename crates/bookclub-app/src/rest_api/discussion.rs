use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::get,
    Json,
};
use crate::validate::Garde;
use bookclub_dal::discussion::{
    CreateDiscussion, DiscussionFilter, DiscussionRepository, ModerateDiscussion,
};
use http::StatusCode;
use tracing::info;

use crate::{auth::CurrentUser, error::ApiResult, repository_from_request, state::AppState};

repository_from_request!(DiscussionRepository);

pub async fn list(
    repository: DiscussionRepository,
    Garde(Query(filter)): Garde<Query<DiscussionFilter>>,
) -> ApiResult<impl IntoResponse> {
    let discussions = repository.list(&filter).await?;
    Ok((StatusCode::OK, Json(discussions)))
}

pub async fn get_discussion(
    Path(slug): Path<String>,
    repository: DiscussionRepository,
) -> ApiResult<impl IntoResponse> {
    let discussion = repository.get_by_slug(&slug).await?;
    Ok((StatusCode::OK, Json(discussion)))
}

pub async fn create(
    CurrentUser(user): CurrentUser,
    repository: DiscussionRepository,
    Garde(Json(payload)): Garde<Json<CreateDiscussion>>,
) -> ApiResult<impl IntoResponse> {
    let discussion = repository.create(&user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(discussion)))
}

/// Pins or locks discussion, admin only
pub async fn moderate(
    Path(id): Path<String>,
    CurrentUser(user): CurrentUser,
    repository: DiscussionRepository,
    Garde(Json(payload)): Garde<Json<ModerateDiscussion>>,
) -> ApiResult<impl IntoResponse> {
    info!("Admin {} moderates discussion {id}: {payload:?}", user.id);
    let discussion = repository.moderate(&id, payload).await?;
    Ok((StatusCode::OK, Json(discussion)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{slug}", get(get_discussion))
}
