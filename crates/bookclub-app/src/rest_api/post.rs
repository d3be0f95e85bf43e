use axum::{response::IntoResponse, routing::post, Json};
use crate::validate::Garde;
use bookclub_dal::post::{CreatePost, PostRepository};
use http::StatusCode;

use crate::{auth::CurrentUser, error::ApiResult, repository_from_request, state::AppState};

repository_from_request!(PostRepository);

pub async fn create(
    CurrentUser(user): CurrentUser,
    repository: PostRepository,
    Garde(Json(payload)): Garde<Json<CreatePost>>,
) -> ApiResult<impl IntoResponse> {
    let post = repository.create(&user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/", post(create))
}
