use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool, Row as _};
use tracing::debug;

use crate::{ChosenDB, ChosenRow, Error, error::Result, new_id, user::UserShort};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePost {
    #[garde(length(min = 1, max = 20000))]
    pub content: String,
    #[garde(length(min = 1, max = 64))]
    pub discussion_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub content: String,
    pub discussion_id: String,
    pub user: UserShort,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub created_at: time::PrimitiveDateTime,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub updated_at: time::PrimitiveDateTime,
}

impl sqlx::FromRow<'_, ChosenRow> for Post {
    fn from_row(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        Ok(Post {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            discussion_id: row.try_get("discussion_id")?,
            user: UserShort::from_row_prefixed(row)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const POST_QUERY: &str = "SELECT p.id, p.content, p.discussion_id, p.created_at, p.updated_at,
u.id AS user_id, u.name AS user_name, u.image AS user_image
FROM posts p JOIN users u ON u.id = p.user_id";

/// Posts of a discussion, oldest first
pub(crate) async fn list_for_discussion<'c, E>(
    executor: &E,
    discussion_id: &str,
) -> Result<Vec<Post>>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    let sql = format!("{POST_QUERY} WHERE p.discussion_id = ? ORDER BY p.created_at ASC, p.id ASC");
    let posts = sqlx::query_as::<_, Post>(&sql)
        .bind(discussion_id)
        .fetch_all(executor)
        .await?;
    Ok(posts)
}

pub type PostRepository = PostRepositoryImpl<Pool<ChosenDB>>;

pub struct PostRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> PostRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Adds post to discussion, which must exist and must not be locked
    pub async fn create(&self, user_id: &str, payload: CreatePost) -> Result<Post> {
        let id = new_id();
        let mut tx = self.executor.begin().await?;

        let locked: Option<bool> = sqlx::query_scalar("SELECT is_locked FROM discussions WHERE id = ?")
            .bind(&payload.discussion_id)
            .fetch_optional(&mut *tx)
            .await?;
        match locked {
            None => return Err(Error::RecordNotFound("Discussion".to_string())),
            Some(true) => {
                debug!("Discussion {} is locked", payload.discussion_id);
                return Err(Error::Locked("Discussion".to_string()));
            }
            Some(false) => {}
        }

        sqlx::query("INSERT INTO posts (id, content, user_id, discussion_id) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&payload.content)
            .bind(user_id)
            .bind(&payload.discussion_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::from_write(e, "Post", "User"))?;
        tx.commit().await?;

        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> Result<Post> {
        let sql = format!("{POST_QUERY} WHERE p.id = ?");
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Post".to_string()))
    }

    /// Posts written by user, newest first
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Post>> {
        let sql =
            format!("{POST_QUERY} WHERE p.user_id = ? ORDER BY p.created_at DESC, p.id DESC");
        let posts = sqlx::query_as::<_, Post>(&sql)
            .bind(user_id)
            .fetch_all(&self.executor)
            .await?;
        Ok(posts)
    }
}
