use axum::{response::IntoResponse, routing::get, Json};
use bookclub_dal::stats::StatsRepository;
#[cfg(feature = "openapi")]
use bookclub_dal::stats::Stats;
use http::StatusCode;

use crate::{error::ApiResult, repository_from_request, state::AppState};

repository_from_request!(StatsRepository);

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "", tag = "Stats", operation_id = "getStats",
    responses((status = StatusCode::OK, description = "Community statistics", body = Stats))))]
pub async fn overview(repository: StatsRepository) -> ApiResult<impl IntoResponse> {
    let stats = repository.overview().await?;
    Ok((StatusCode::OK, Json(stats)))
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(paths(overview))]
struct ApiDocs;

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;
    ApiDocs::openapi()
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/", get(overview))
}
