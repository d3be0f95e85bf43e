use bookclub_types::utils::slugify;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool, Row as _};
use tracing::debug;

use crate::{ChosenDB, ChosenRow, Error, error::Result, new_id};

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateGenre {
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[garde(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Genre {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub created_at: time::PrimitiveDateTime,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub updated_at: time::PrimitiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GenreShort {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct GenreWithCounts {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub genre: Genre,
    pub book_count: i64,
    pub discussion_count: i64,
}

impl GenreShort {
    /// Reads genre columns aliased as `genre_id`, `genre_name`, `genre_slug`
    pub(crate) fn from_row_prefixed(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        Ok(GenreShort {
            id: row.try_get("genre_id")?,
            name: row.try_get("genre_name")?,
            slug: row.try_get("genre_slug")?,
        })
    }
}

const GENRE_COLUMNS: &str = "g.id, g.name, g.slug, g.description, g.created_at, g.updated_at";

pub type GenreRepository = GenreRepositoryImpl<Pool<ChosenDB>>;

pub struct GenreRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> GenreRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateGenre) -> Result<Genre> {
        let id = new_id();
        let slug = slugify(&payload.name);
        if slug.is_empty() {
            debug!("Genre name {:?} gives empty slug", payload.name);
            return Err(Error::InvalidName(payload.name));
        }
        sqlx::query("INSERT INTO genres (id, name, slug, description) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(payload.name.trim())
            .bind(&slug)
            .bind(&payload.description)
            .execute(&self.executor)
            .await
            .map_err(|e| Error::from_write(e, "Genre", "Genre"))?;
        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> Result<Genre> {
        let sql = format!("SELECT {GENRE_COLUMNS} FROM genres g WHERE g.id = ?");
        sqlx::query_as::<_, Genre>(&sql)
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Genre".to_string()))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Genre> {
        let sql = format!("SELECT {GENRE_COLUMNS} FROM genres g WHERE g.slug = ?");
        sqlx::query_as::<_, Genre>(&sql)
            .bind(slug)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::RecordNotFound("Genre".to_string()))
    }

    /// All genres sorted by name, with number of books and discussions
    pub async fn list_with_counts(&self) -> Result<Vec<GenreWithCounts>> {
        let sql = format!(
            "SELECT {GENRE_COLUMNS},
            (SELECT count(*) FROM book_genres bg WHERE bg.genre_id = g.id) AS book_count,
            (SELECT count(*) FROM discussions d WHERE d.genre_id = g.id) AS discussion_count
            FROM genres g ORDER BY g.name"
        );
        let records = sqlx::query_as::<_, GenreWithCounts>(&sql)
            .fetch_all(&self.executor)
            .await?;
        Ok(records)
    }
}
