use bookclub_types::utils::slugify;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool, QueryBuilder, Row as _};
use tracing::debug;

use crate::{
    ChosenDB, ChosenRow, Error, SQL_NOW,
    error::Result,
    genre::GenreShort,
    new_id,
    post::{Post, list_for_discussion},
    user::UserShort,
};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscussion {
    #[garde(length(min = 3, max = 255))]
    pub title: String,
    #[garde(length(max = 5000))]
    pub description: Option<String>,
    #[garde(length(min = 1, max = 64))]
    pub genre_id: String,
}

/// Moderation flags, absent values are left unchanged
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModerateDiscussion {
    #[garde(skip)]
    pub is_pinned: Option<bool>,
    #[garde(skip)]
    pub is_locked: Option<bool>,
}

/// Filter for discussion listing, by genre id or genre slug
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionFilter {
    #[garde(length(max = 64))]
    pub genre_id: Option<String>,
    #[garde(length(max = 255))]
    pub genre: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Discussion {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub user: UserShort,
    pub genre: GenreShort,
    pub post_count: i64,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub created_at: time::PrimitiveDateTime,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub updated_at: time::PrimitiveDateTime,
}

impl sqlx::FromRow<'_, ChosenRow> for Discussion {
    fn from_row(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        Ok(Discussion {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            is_pinned: row.try_get("is_pinned")?,
            is_locked: row.try_get("is_locked")?,
            user: UserShort::from_row_prefixed(row)?,
            genre: GenreShort::from_row_prefixed(row)?,
            post_count: row.try_get("post_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Discussion with all its posts
#[derive(Debug, Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DiscussionDetail {
    #[serde(flatten)]
    pub discussion: Discussion,
    pub posts: Vec<Post>,
}

const DISCUSSION_QUERY: &str = "SELECT d.id, d.title, d.slug, d.description, d.is_pinned, d.is_locked,
d.created_at, d.updated_at,
u.id AS user_id, u.name AS user_name, u.image AS user_image,
g.id AS genre_id, g.name AS genre_name, g.slug AS genre_slug,
(SELECT count(*) FROM posts p WHERE p.discussion_id = d.id) AS post_count
FROM discussions d
JOIN users u ON u.id = d.user_id
JOIN genres g ON g.id = d.genre_id";

fn discussion_slug(title: &str) -> String {
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let base = slugify(title);
    if base.is_empty() {
        millis.to_string()
    } else {
        format!("{base}-{millis}")
    }
}

pub type DiscussionRepository = DiscussionRepositoryImpl<Pool<ChosenDB>>;

pub struct DiscussionRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> DiscussionRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Pinned discussions first, then newest
    pub async fn list(&self, filter: &DiscussionFilter) -> Result<Vec<Discussion>> {
        let mut builder = QueryBuilder::new(DISCUSSION_QUERY);
        let genre_id = filter.genre_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let genre_slug = filter.genre.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let mut has_condition = false;
        if let Some(genre_id) = genre_id {
            builder.push(" WHERE d.genre_id = ").push_bind(genre_id.to_string());
            has_condition = true;
        }
        if let Some(genre_slug) = genre_slug {
            builder
                .push(if has_condition { " AND " } else { " WHERE " })
                .push("g.slug = ")
                .push_bind(genre_slug.to_string());
        }
        builder.push(" ORDER BY d.is_pinned DESC, d.created_at DESC, d.id DESC");

        let discussions = builder
            .build_query_as::<Discussion>()
            .fetch_all(&self.executor)
            .await?;
        Ok(discussions)
    }

    pub async fn get(&self, id: &str) -> Result<Discussion> {
        let sql = format!("{DISCUSSION_QUERY} WHERE d.id = ?");
        sqlx::query_as::<_, Discussion>(&sql)
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Discussion".to_string()))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<DiscussionDetail> {
        let sql = format!("{DISCUSSION_QUERY} WHERE d.slug = ?");
        let discussion = sqlx::query_as::<_, Discussion>(&sql)
            .bind(slug)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Discussion".to_string()))?;
        let posts = list_for_discussion(&self.executor, &discussion.id).await?;
        Ok(DiscussionDetail { discussion, posts })
    }

    pub async fn create(&self, user_id: &str, payload: CreateDiscussion) -> Result<Discussion> {
        let id = new_id();
        let slug = discussion_slug(&payload.title);
        debug!("Creating discussion {slug}");
        sqlx::query(
            "INSERT INTO discussions (id, title, slug, description, user_id, genre_id) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(payload.title.trim())
        .bind(&slug)
        .bind(&payload.description)
        .bind(user_id)
        .bind(&payload.genre_id)
        .execute(&self.executor)
        .await
        .map_err(|e| Error::from_write(e, "Discussion", "Genre"))?;

        self.get(&id).await
    }

    pub async fn moderate(&self, id: &str, payload: ModerateDiscussion) -> Result<Discussion> {
        let sql = format!(
            "UPDATE discussions SET is_pinned = coalesce(?, is_pinned), is_locked = coalesce(?, is_locked),
            updated_at = {SQL_NOW} WHERE id = ?"
        );
        let res = sqlx::query(&sql)
            .bind(payload.is_pinned)
            .bind(payload.is_locked)
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound("Discussion".to_string()));
        }
        self.get(id).await
    }

    /// Discussions started by user, newest first
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Discussion>> {
        let sql = format!(
            "{DISCUSSION_QUERY} WHERE d.user_id = ? ORDER BY d.created_at DESC, d.id DESC"
        );
        let discussions = sqlx::query_as::<_, Discussion>(&sql)
            .bind(user_id)
            .fetch_all(&self.executor)
            .await?;
        Ok(discussions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discussion_slug() {
        let slug = discussion_slug("Nejlepší fantasy série");
        let (base, millis) = slug.rsplit_once('-').unwrap();
        assert_eq!(base, "nejlepsi-fantasy-serie");
        assert!(millis.parse::<u64>().unwrap() > 1_600_000_000_000);

        let slug = discussion_slug("???");
        assert!(slug.parse::<u64>().is_ok());
    }
}
