use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, put},
    Json,
};
use crate::validate::Garde;
use bookclub_dal::wishlist::{AddToWishlist, UpdateWishlistEntry, WishlistRepository, WishlistStatus};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{
    auth::{CurrentUser, OptionalUser},
    error::ApiResult,
    repository_from_request,
    state::AppState,
};

repository_from_request!(WishlistRepository);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WishlistCheck {
    pub in_wishlist: bool,
    pub status: Option<WishlistStatus>,
}

pub async fn list(
    CurrentUser(user): CurrentUser,
    repository: WishlistRepository,
) -> ApiResult<impl IntoResponse> {
    let items = repository.list_for_user(&user.id).await?;
    Ok((StatusCode::OK, Json(items)))
}

pub async fn add(
    CurrentUser(user): CurrentUser,
    repository: WishlistRepository,
    Garde(Json(payload)): Garde<Json<AddToWishlist>>,
) -> ApiResult<impl IntoResponse> {
    let item = repository.add(&user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update(
    Path(book_id): Path<String>,
    CurrentUser(user): CurrentUser,
    repository: WishlistRepository,
    Garde(Json(payload)): Garde<Json<UpdateWishlistEntry>>,
) -> ApiResult<impl IntoResponse> {
    let item = repository.update(&user.id, &book_id, payload).await?;
    Ok((StatusCode::OK, Json(item)))
}

pub async fn remove(
    Path(book_id): Path<String>,
    CurrentUser(user): CurrentUser,
    repository: WishlistRepository,
) -> ApiResult<impl IntoResponse> {
    repository.remove(&user.id, &book_id).await?;
    Ok((StatusCode::OK, Json(json!({"success": true}))))
}

/// Anonymous callers simply do not have the book on wishlist
pub async fn check(
    Path(book_id): Path<String>,
    OptionalUser(user): OptionalUser,
    repository: WishlistRepository,
) -> ApiResult<impl IntoResponse> {
    let entry = match user {
        Some(user) => repository.find(&user.id, &book_id).await?,
        None => {
            debug!("Anonymous wishlist check of {book_id}");
            None
        }
    };
    Ok(Json(WishlistCheck {
        in_wishlist: entry.is_some(),
        status: entry.map(|e| e.status),
    }))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(add))
        .route("/{book_id}", put(update).delete(remove))
        .route("/check/{book_id}", get(check))
}
