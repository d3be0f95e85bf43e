use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool};
use tracing::debug;

use crate::{
    ChosenDB, Error, SQL_NOW,
    book::{BookWithGenres, books_by_ids},
    error::Result,
    new_id,
};

/// Reading state of a book on user's wishlist
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WishlistStatus {
    #[default]
    WantToRead,
    CurrentlyReading,
    Finished,
    OnHold,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub status: WishlistStatus,
    pub priority: i64,
    pub notes: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub created_at: time::PrimitiveDateTime,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub updated_at: time::PrimitiveDateTime,
}

/// Wishlist entry together with its book
#[derive(Debug, Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    #[serde(flatten)]
    pub entry: WishlistEntry,
    pub book: BookWithGenres,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddToWishlist {
    #[garde(length(min = 1, max = 64))]
    pub book_id: String,
    #[serde(default)]
    #[garde(skip)]
    pub status: WishlistStatus,
    #[garde(length(max = 5000))]
    pub notes: Option<String>,
    #[serde(default)]
    #[garde(skip)]
    pub priority: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWishlistEntry {
    #[garde(skip)]
    pub status: WishlistStatus,
    #[garde(length(max = 5000))]
    pub notes: Option<String>,
    #[garde(skip)]
    pub priority: Option<i64>,
}

const ENTRY_COLUMNS: &str =
    "id, user_id, book_id, status, priority, notes, created_at, updated_at";

pub type WishlistRepository = WishlistRepositoryImpl<Pool<ChosenDB>>;

pub struct WishlistRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> WishlistRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// User's wishlist, most recently added first
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<WishlistItem>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM wishlists WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        );
        let entries = sqlx::query_as::<_, WishlistEntry>(&sql)
            .bind(user_id)
            .fetch_all(&self.executor)
            .await?;
        let ids: Vec<String> = entries.iter().map(|e| e.book_id.clone()).collect();
        let mut books = books_by_ids(&self.executor, &ids).await?;

        let items = entries
            .into_iter()
            .filter_map(|entry| {
                let book = books.remove(&entry.book_id)?;
                Some(WishlistItem { entry, book })
            })
            .collect();
        Ok(items)
    }

    pub async fn count_for_user(&self, user_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM wishlists WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.executor)
            .await?;
        Ok(count as u64)
    }

    pub async fn find(&self, user_id: &str, book_id: &str) -> Result<Option<WishlistEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM wishlists WHERE user_id = ? AND book_id = ?");
        let entry = sqlx::query_as::<_, WishlistEntry>(&sql)
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(&self.executor)
            .await?;
        Ok(entry)
    }

    async fn get_item(&self, user_id: &str, book_id: &str) -> Result<WishlistItem> {
        let entry = self
            .find(user_id, book_id)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Wishlist entry".to_string()))?;
        let book = books_by_ids(&self.executor, &[entry.book_id.clone()])
            .await?
            .remove(&entry.book_id)
            .ok_or_else(|| Error::RecordNotFound("Book".to_string()))?;
        Ok(WishlistItem { entry, book })
    }

    pub async fn add(&self, user_id: &str, payload: AddToWishlist) -> Result<WishlistItem> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO wishlists (id, user_id, book_id, status, priority, notes) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(&payload.book_id)
        .bind(payload.status)
        .bind(payload.priority)
        .bind(&payload.notes)
        .execute(&self.executor)
        .await
        .map_err(|e| Error::from_write(e, "Wishlist entry", "Book"))?;

        self.get_item(user_id, &payload.book_id).await
    }

    pub async fn update(
        &self,
        user_id: &str,
        book_id: &str,
        payload: UpdateWishlistEntry,
    ) -> Result<WishlistItem> {
        let sql = format!(
            "UPDATE wishlists SET status = ?, notes = ?, priority = coalesce(?, priority), updated_at = {SQL_NOW}
            WHERE user_id = ? AND book_id = ?"
        );
        let res = sqlx::query(&sql)
            .bind(payload.status)
            .bind(&payload.notes)
            .bind(payload.priority)
            .bind(user_id)
            .bind(book_id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            debug!("No wishlist entry of book {book_id} for user {user_id}");
            return Err(Error::RecordNotFound("Wishlist entry".to_string()));
        }
        self.get_item(user_id, book_id).await
    }

    pub async fn remove(&self, user_id: &str, book_id: &str) -> Result<()> {
        let res = sqlx::query("DELETE FROM wishlists WHERE user_id = ? AND book_id = ?")
            .bind(user_id)
            .bind(book_id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Wishlist entry".to_string()))
        } else {
            Ok(())
        }
    }
}
