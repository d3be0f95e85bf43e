use axum::{
    extract::{rejection::QueryRejection, Path, Query},
    response::{IntoResponse, Response},
    routing::get,
    Json,
};
use crate::validate::Garde;
use bookclub_dal::book::{BookPage, BookQuery, BookRepository, BookWithGenres, CreateBook};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{auth::CurrentUser, error::ApiResult, repository_from_request, state::AppState};

repository_from_request!(BookRepository);

/// Raw listing parameters, kept as strings so that any value is accepted
#[derive(Debug, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct BookListParams {
    pub page: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub genre: Option<String>,
}

impl BookListParams {
    fn to_query(&self) -> BookQuery {
        BookQuery::from_raw(
            self.page.as_deref(),
            self.search.as_deref(),
            self.sort.as_deref(),
            self.genre.as_deref(),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BookListResponse {
    pub books: Vec<BookWithGenres>,
    pub total_books: u64,
    pub total_pages: u32,
    pub current_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BookPage> for BookListResponse {
    fn from(page: BookPage) -> Self {
        BookListResponse {
            books: page.items,
            total_books: page.total_items,
            total_pages: page.total_pages,
            current_page: page.current_page,
            error: None,
        }
    }
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "", tag = "Book", operation_id = "listBooks",
    params(BookListParams),
    responses((status = StatusCode::OK, description = "One page of books", body = BookListResponse),
    (status = StatusCode::INTERNAL_SERVER_ERROR, description = "Empty page with error", body = BookListResponse))))]
pub async fn list(
    repository: BookRepository,
    params: Result<Query<BookListParams>, QueryRejection>,
) -> Response {
    let params = params.map(|q| q.0).unwrap_or_else(|e| {
        debug!("Unparsable listing parameters, using defaults: {e}");
        BookListParams::default()
    });
    let query = params.to_query();
    match repository.list_books(&query).await {
        Ok(page) => (StatusCode::OK, Json(BookListResponse::from(page))).into_response(),
        Err(e) => {
            error!("Failed to list books: {e}");
            let mut body = BookListResponse::from(BookPage::empty(query.page()));
            body.error = Some("Failed to load books".to_string());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

#[cfg_attr(feature = "openapi",  utoipa::path(get, path = "/{id}", tag = "Book", operation_id = "getBook",
    responses((status = StatusCode::OK, description = "Book detail", body = BookWithGenres))))]
pub async fn get_book(
    Path(id): Path<String>,
    repository: BookRepository,
) -> ApiResult<impl IntoResponse> {
    let book = repository.get(&id).await?;
    Ok((StatusCode::OK, Json(book)))
}

#[cfg_attr(feature = "openapi",  utoipa::path(post, path = "", tag = "Book", operation_id = "createBook",
    responses((status = StatusCode::CREATED, description = "Created book", body = BookWithGenres))))]
pub async fn create(
    CurrentUser(user): CurrentUser,
    repository: BookRepository,
    Garde(Json(payload)): Garde<Json<CreateBook>>,
) -> ApiResult<impl IntoResponse> {
    debug!("User {} adds book {:?}", user.id, payload.title);
    let book = repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Admin only, see [`crate::rest_api::admin_router`]
pub async fn delete(
    Path(id): Path<String>,
    repository: BookRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(&id).await?;
    Ok((StatusCode::NO_CONTENT, ()))
}

#[cfg(feature = "openapi")]
#[derive(utoipa::OpenApi)]
#[openapi(paths(list, get_book, create))]
struct ApiDocs;

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    use utoipa::OpenApi as _;
    ApiDocs::openapi()
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_book))
}
