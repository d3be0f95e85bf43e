use serde::{Deserialize, Serialize};
use sqlx::{Executor, Pool};

use crate::{ChosenDB, error::Result};

/// Length of the rankings in statistics
pub const TOP_LIMIT: i64 = 10;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub users: u64,
    pub books: u64,
    pub discussions: u64,
    pub posts: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PopularBook {
    pub id: String,
    pub title: String,
    pub author: String,
    pub wishlist_count: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ActiveDiscussion {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub genre_slug: String,
    pub post_count: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct GenreStats {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub book_count: i64,
    pub discussion_count: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub totals: Totals,
    pub popular_books: Vec<PopularBook>,
    pub active_discussions: Vec<ActiveDiscussion>,
    pub genres: Vec<GenreStats>,
}

pub type StatsRepository = StatsRepositoryImpl<Pool<ChosenDB>>;

pub struct StatsRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> StatsRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    async fn count(&self, table: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM {table}"))
            .fetch_one(&self.executor)
            .await?;
        Ok(count as u64)
    }

    pub async fn totals(&self) -> Result<Totals> {
        Ok(Totals {
            users: self.count("users").await?,
            books: self.count("books").await?,
            discussions: self.count("discussions").await?,
            posts: self.count("posts").await?,
        })
    }

    /// Books on most wishlists
    pub async fn popular_books(&self) -> Result<Vec<PopularBook>> {
        let books = sqlx::query_as::<_, PopularBook>(
            "SELECT b.id, b.title, b.author, count(w.id) AS wishlist_count
            FROM books b LEFT JOIN wishlists w ON w.book_id = b.id
            GROUP BY b.id ORDER BY wishlist_count DESC, b.title ASC, b.id ASC LIMIT ?",
        )
        .bind(TOP_LIMIT)
        .fetch_all(&self.executor)
        .await?;
        Ok(books)
    }

    /// Discussions with most posts
    pub async fn active_discussions(&self) -> Result<Vec<ActiveDiscussion>> {
        let discussions = sqlx::query_as::<_, ActiveDiscussion>(
            "SELECT d.id, d.title, d.slug, g.slug AS genre_slug, count(p.id) AS post_count
            FROM discussions d JOIN genres g ON g.id = d.genre_id
            LEFT JOIN posts p ON p.discussion_id = d.id
            GROUP BY d.id ORDER BY post_count DESC, d.created_at DESC, d.id ASC LIMIT ?",
        )
        .bind(TOP_LIMIT)
        .fetch_all(&self.executor)
        .await?;
        Ok(discussions)
    }

    pub async fn genres(&self) -> Result<Vec<GenreStats>> {
        let genres = sqlx::query_as::<_, GenreStats>(
            "SELECT g.id, g.name, g.slug,
            (SELECT count(*) FROM book_genres bg WHERE bg.genre_id = g.id) AS book_count,
            (SELECT count(*) FROM discussions d WHERE d.genre_id = g.id) AS discussion_count
            FROM genres g ORDER BY book_count DESC, g.name ASC",
        )
        .fetch_all(&self.executor)
        .await?;
        Ok(genres)
    }

    pub async fn overview(&self) -> Result<Stats> {
        Ok(Stats {
            totals: self.totals().await?,
            popular_books: self.popular_books().await?,
            active_discussions: self.active_discussions().await?,
            genres: self.genres().await?,
        })
    }
}
