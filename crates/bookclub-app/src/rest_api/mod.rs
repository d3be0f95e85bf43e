pub mod book;
pub mod discussion;
pub mod genre;
pub mod post;
pub mod stats;
pub mod wishlist;

use axum::routing::{delete, put};

use crate::{
    auth::{auth_router, require_admin},
    state::AppState,
};

/// Privileged routes, every one of them behind [`require_admin`]
pub fn admin_router(state: AppState) -> axum::Router<AppState> {
    axum::Router::new()
        .route("/books/{id}", delete(book::delete))
        .route("/discussions/{id}", put(discussion::moderate))
        .route_layer(axum::middleware::from_fn_with_state(state, require_admin))
}

/// Whole JSON API - must be nested on /api path!
pub fn api_router(state: AppState) -> axum::Router<AppState> {
    axum::Router::new()
        .nest("/auth", auth_router())
        .nest("/books", book::router())
        .nest("/genres", genre::router())
        .nest("/wishlist", wishlist::router())
        .nest("/discussions", discussion::router())
        .nest("/posts", post::router())
        .nest("/stats", stats::router())
        .nest("/admin", admin_router(state))
}

#[cfg(feature = "openapi")]
pub fn api_docs() -> utoipa::openapi::OpenApi {
    #[derive(utoipa::OpenApi)]
    #[openapi(info(title = "Bookclub API"))]
    struct OpenApi;

    use utoipa::OpenApi as _;
    OpenApi::openapi()
        .nest("/api/books", book::api_docs())
        .nest("/api/genres", genre::api_docs())
        .nest("/api/stats", stats::api_docs())
}
