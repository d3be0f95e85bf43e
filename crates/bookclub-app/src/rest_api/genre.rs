use axum::{extract::Path, response::IntoResponse, routing::get, Json};
use crate::validate::Garde;
use bookclub_dal::genre::{CreateGenre, GenreRepository};
#[cfg(feature = "openapi")]
use bookclub_dal::genre::{Genre, GenreWithCounts};
use http::StatusCode;

use crate::{auth::CurrentUser, error::ApiResult, repository_from_request, state::AppState};

repository_from_request!(GenreRepository);

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "", tag = "Genre", operation_id = "listGenres",
    responses((status = StatusCode::OK, description = "All genres with counts", body = Vec<GenreWithCounts>))))]
pub async fn list(repository: GenreRepository) -> ApiResult<impl IntoResponse> {
    let genres = repository.list_with_counts().await?;
    Ok((StatusCode::OK, Json(genres)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "/{slug}", tag = "Genre", operation_id = "getGenre",
    responses((status = StatusCode::OK, description = "Genre", body = Genre))))]
pub async fn get_genre(
    Path(slug): Path<String>,
    repository: GenreRepository,
) -> ApiResult<impl IntoResponse> {
    let genre = repository.get_by_slug(&slug).await?;
    Ok((StatusCode::OK, Json(genre)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(post, path = "", tag = "Genre", operation_id = "createGenre",
    responses((status = StatusCode::CREATED, description = "Created genre", body = Genre))))]
pub async fn create(
    _user: CurrentUser,
    repository: GenreRepository,
    Garde(Json(payload)): Garde<Json<CreateGenre>>,
) -> ApiResult<impl IntoResponse> {
    let genre = repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(paths(list, get_genre, create))]
struct ApiDocs;

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;
    ApiDocs::openapi()
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{slug}", get(get_genre))
}
