//! Book catalog and its listing engine.
//!
//! Listing runs two queries, one for the requested page and one for the total
//! count. Both get their WHERE clause from [`BookQuery::push_filter`], so the
//! total always matches the set the page is cut from.

use std::{collections::HashMap, str::FromStr};

use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool, QueryBuilder};
use tracing::debug;

use crate::{error::Result, genre::GenreShort, new_id, ChosenDB, Error};

/// Number of books on one listing page
pub const PAGE_SIZE: u32 = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum BookSort {
    #[default]
    Newest,
    Oldest,
    Title,
    Popular,
}

impl BookSort {
    pub const ALL: [BookSort; 4] = [
        BookSort::Newest,
        BookSort::Oldest,
        BookSort::Title,
        BookSort::Popular,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookSort::Newest => "newest",
            BookSort::Oldest => "oldest",
            BookSort::Title => "title",
            BookSort::Popular => "popular",
        }
    }

    // Every order ends with a unique key, otherwise rows with equal keys
    // could move between pages from one request to another.
    fn order_by(&self) -> &'static str {
        match self {
            BookSort::Newest => "b.created_at DESC, b.id DESC",
            BookSort::Oldest => "b.created_at ASC, b.id ASC",
            BookSort::Title => "b.title ASC, b.id ASC",
            BookSort::Popular => "wishlist_count DESC, b.title ASC, b.id ASC",
        }
    }
}

impl FromStr for BookSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "newest" => Ok(BookSort::Newest),
            "oldest" => Ok(BookSort::Oldest),
            "title" => Ok(BookSort::Title),
            "popular" => Ok(BookSort::Popular),
            other => Err(Error::UnknownSort(other.to_string())),
        }
    }
}

/// Normalized listing parameters.
///
/// Construction never fails, anything unusable falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookQuery {
    page: u32,
    search: Option<String>,
    genre: Option<String>,
    sort: BookSort,
}

impl Default for BookQuery {
    fn default() -> Self {
        Self {
            page: 1,
            search: None,
            genre: None,
            sort: BookSort::default(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Search term is kept verbatim, blank term means no search
fn search_term(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Page number from raw query string value.
///
/// Reads leading integer like `parseInt` would (`"3abc"` is 3), result is
/// at least 1. Overlong numbers saturate.
pub fn normalize_page(raw: Option<&str>) -> u32 {
    let Some(raw) = raw.map(str::trim) else {
        return 1;
    };
    let (negative, unsigned) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let digits_len = unsigned
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let digits = &unsigned[..digits_len];
    if negative || digits.is_empty() {
        return 1;
    }
    let page = digits.parse::<u32>().unwrap_or(u32::MAX);
    page.max(1)
}

/// `ceil(total / PAGE_SIZE)`, never less than 1
pub fn total_pages(total_items: u64) -> u32 {
    let pages = total_items.div_ceil(PAGE_SIZE as u64).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl BookQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds query from untrusted request parameters
    pub fn from_raw(
        page: Option<&str>,
        search: Option<&str>,
        sort: Option<&str>,
        genre: Option<&str>,
    ) -> Self {
        let sort = match sort.map(str::parse::<BookSort>) {
            Some(Ok(sort)) => sort,
            Some(Err(e)) => {
                debug!("{e}, using default");
                BookSort::default()
            }
            None => BookSort::default(),
        };
        BookQuery {
            page: normalize_page(page),
            search: search.and_then(search_term),
            genre: genre.and_then(non_empty),
            sort,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_search(mut self, search: &str) -> Self {
        self.search = search_term(search);
        self
    }

    pub fn with_genre(mut self, genre: &str) -> Self {
        self.genre = non_empty(genre);
        self
    }

    pub fn with_sort(mut self, sort: BookSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    pub fn sort(&self) -> BookSort {
        self.sort
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * PAGE_SIZE as i64
    }

    /// Appends WHERE clause selecting books matching this query.
    /// Expects books table aliased as `b`.
    fn push_filter(&self, builder: &mut QueryBuilder<'_, ChosenDB>) {
        let mut has_condition = false;
        if let Some(search) = self.search.as_deref() {
            let pattern = like_pattern(search);
            builder
                .push(" WHERE (b.title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR b.author LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
            has_condition = true;
        }
        if let Some(genre) = self.genre.as_deref() {
            builder
                .push(if has_condition { " AND " } else { " WHERE " })
                .push(
                    "EXISTS (SELECT 1 FROM book_genres bg JOIN genres g ON g.id = bg.genre_id \
                     WHERE bg.book_id = b.id AND g.slug = ",
                )
                .push_bind(genre.to_string())
                .push(")");
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub published_at: Option<String>,
    pub page_count: Option<i64>,
    pub language: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub created_at: time::PrimitiveDateTime,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub updated_at: time::PrimitiveDateTime,
}

/// Book as presented in listings and detail
#[derive(Debug, Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BookWithGenres {
    #[serde(flatten)]
    pub book: Book,
    pub wishlist_count: i64,
    pub genres: Vec<GenreShort>,
}

#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    #[sqlx(flatten)]
    book: Book,
    wishlist_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct BookGenreRow {
    book_id: String,
    #[sqlx(flatten)]
    genre: GenreShort,
}

/// One page of listing
#[derive(Debug, Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BookPage {
    pub items: Vec<BookWithGenres>,
    pub total_items: u64,
    pub total_pages: u32,
    pub current_page: u32,
}

impl BookPage {
    pub fn empty(current_page: u32) -> Self {
        BookPage {
            items: vec![],
            total_items: 0,
            total_pages: 1,
            current_page,
        }
    }
}

fn default_language() -> String {
    "cs".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[garde(length(min = 1, max = 511))]
    pub title: String,
    #[garde(length(min = 1, max = 255))]
    pub author: String,
    #[garde(length(min = 1, max = 32))]
    pub isbn: Option<String>,
    #[garde(length(max = 5000))]
    pub description: Option<String>,
    #[garde(url, length(max = 1023))]
    pub cover_image: Option<String>,
    #[garde(length(max = 32))]
    pub published_at: Option<String>,
    #[garde(range(min = 1))]
    pub page_count: Option<i64>,
    #[serde(default = "default_language")]
    #[garde(length(min = 2, max = 8))]
    pub language: String,
    #[serde(default)]
    #[garde(inner(length(min = 1, max = 64)))]
    pub genre_ids: Vec<String>,
}

const BOOK_COLUMNS: &str = "b.id, b.title, b.author, b.isbn, b.description, b.cover_image, \
b.published_at, b.page_count, b.language, b.created_at, b.updated_at, \
count(w.id) AS wishlist_count";

/// Genres of given books, in order in which they were assigned
pub(crate) async fn genres_by_book<'c, E>(
    executor: &E,
    ids: &[String],
) -> Result<HashMap<String, Vec<GenreShort>>>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    let mut genres: HashMap<String, Vec<GenreShort>> = HashMap::new();
    if ids.is_empty() {
        return Ok(genres);
    }
    let mut builder = QueryBuilder::new(
        "SELECT bg.book_id, g.id, g.name, g.slug FROM book_genres bg \
         JOIN genres g ON g.id = bg.genre_id WHERE bg.book_id IN (",
    );
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(") ORDER BY bg.rowid");

    let rows = builder
        .build_query_as::<BookGenreRow>()
        .fetch_all(executor)
        .await?;
    for row in rows {
        genres.entry(row.book_id).or_default().push(row.genre);
    }
    Ok(genres)
}

fn attach_genres(
    rows: Vec<BookRow>,
    mut genres: HashMap<String, Vec<GenreShort>>,
) -> Vec<BookWithGenres> {
    rows.into_iter()
        .map(|row| BookWithGenres {
            genres: genres.remove(&row.book.id).unwrap_or_default(),
            wishlist_count: row.wishlist_count,
            book: row.book,
        })
        .collect()
}

/// Books with given ids, keyed by id. Unknown ids are skipped.
pub(crate) async fn books_by_ids<'c, E>(
    executor: &E,
    ids: &[String],
) -> Result<HashMap<String, BookWithGenres>>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut builder = QueryBuilder::new(format!(
        "SELECT {BOOK_COLUMNS} FROM books b LEFT JOIN wishlists w ON w.book_id = b.id WHERE b.id IN ("
    ));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(") GROUP BY b.id");
    let rows = builder
        .build_query_as::<BookRow>()
        .fetch_all(executor)
        .await?;

    let found: Vec<String> = rows.iter().map(|r| r.book.id.clone()).collect();
    let genres = genres_by_book(executor, &found).await?;
    Ok(attach_genres(rows, genres)
        .into_iter()
        .map(|b| (b.book.id.clone(), b))
        .collect())
}

pub type BookRepository = BookRepositoryImpl<Pool<ChosenDB>>;

pub struct BookRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> BookRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// One page of books matching the query plus the total count of matches
    pub async fn list_books(&self, query: &BookQuery) -> Result<BookPage> {
        debug!("Listing books: {query:?}");

        let mut builder = QueryBuilder::new(format!(
            "SELECT {BOOK_COLUMNS} FROM books b LEFT JOIN wishlists w ON w.book_id = b.id"
        ));
        query.push_filter(&mut builder);
        builder
            .push(" GROUP BY b.id ORDER BY ")
            .push(query.sort().order_by())
            .push(" LIMIT ")
            .push_bind(PAGE_SIZE as i64)
            .push(" OFFSET ")
            .push_bind(query.offset());
        let rows = builder
            .build_query_as::<BookRow>()
            .fetch_all(&self.executor)
            .await?;

        let mut count_builder = QueryBuilder::new("SELECT count(*) FROM books b");
        query.push_filter(&mut count_builder);
        let total_items: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.executor)
            .await?;
        let total_items = total_items as u64;

        let ids: Vec<String> = rows.iter().map(|r| r.book.id.clone()).collect();
        let genres = genres_by_book(&self.executor, &ids).await?;

        Ok(BookPage {
            items: attach_genres(rows, genres),
            total_items,
            total_pages: total_pages(total_items),
            current_page: query.page(),
        })
    }

    pub async fn get(&self, id: &str) -> Result<BookWithGenres> {
        books_by_ids(&self.executor, &[id.to_string()])
            .await?
            .remove(id)
            .ok_or_else(|| Error::RecordNotFound("Book".to_string()))
    }

    pub async fn create(&self, payload: CreateBook) -> Result<BookWithGenres> {
        let id = new_id();
        let mut tx = self.executor.begin().await?;

        sqlx::query(
            "INSERT INTO books (id, title, author, isbn, description, cover_image, published_at, page_count, language)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(payload.title.trim())
        .bind(payload.author.trim())
        .bind(&payload.isbn)
        .bind(&payload.description)
        .bind(&payload.cover_image)
        .bind(&payload.published_at)
        .bind(payload.page_count)
        .bind(&payload.language)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::from_write(e, "Book", "Book"))?;

        for genre_id in &payload.genre_ids {
            sqlx::query("INSERT OR IGNORE INTO book_genres (book_id, genre_id) VALUES (?, ?)")
                .bind(&id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::from_write(e, "Book genre", "Genre"))?;
        }
        tx.commit().await?;

        self.get(&id).await
    }

    /// Removes book, its genre links and wishlist entries go with it
    pub async fn delete(&self, id: &str) -> Result<()> {
        let res = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("Book".to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_normalize_page() {
        assert_eq!(normalize_page(None), 1);
        assert_eq!(normalize_page(Some("")), 1);
        assert_eq!(normalize_page(Some("abc")), 1);
        assert_eq!(normalize_page(Some("0")), 1);
        assert_eq!(normalize_page(Some("-3")), 1);
        assert_eq!(normalize_page(Some("+")), 1);
        assert_eq!(normalize_page(Some("1")), 1);
        assert_eq!(normalize_page(Some(" 7 ")), 7);
        assert_eq!(normalize_page(Some("3abc")), 3);
        assert_eq!(normalize_page(Some("2.9")), 2);
        assert_eq!(normalize_page(Some("+4")), 4);
        assert_eq!(normalize_page(Some("99999999999999999999")), u32::MAX);
    }

    #[quickcheck]
    fn page_is_never_zero(raw: String) -> bool {
        normalize_page(Some(&raw)) >= 1
    }

    #[quickcheck]
    fn page_roundtrips_positive_numbers(page: u32) -> bool {
        normalize_page(Some(&page.to_string())) == page.max(1)
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0), 1);
        assert_eq!(total_pages(1), 1);
        assert_eq!(total_pages(12), 1);
        assert_eq!(total_pages(13), 2);
        assert_eq!(total_pages(25), 3);
    }

    #[quickcheck]
    fn total_pages_matches_formula(total: u32) -> bool {
        let total = total as u64;
        let expected = std::cmp::max(1, (total + PAGE_SIZE as u64 - 1) / PAGE_SIZE as u64);
        total_pages(total) as u64 == expected
    }

    #[quickcheck]
    fn pages_cover_all_items(total: u16) -> bool {
        let total = total as u64;
        let pages = total_pages(total) as u64;
        pages * PAGE_SIZE as u64 >= total && (total == 0 || (pages - 1) * (PAGE_SIZE as u64) < total)
    }

    #[test]
    fn test_sort_parsing() {
        for sort in BookSort::ALL {
            assert_eq!(sort.as_str().parse::<BookSort>().unwrap(), sort);
        }
        assert!(matches!(
            "rating".parse::<BookSort>(),
            Err(Error::UnknownSort(s)) if s == "rating"
        ));
    }

    #[test]
    fn test_query_from_raw() {
        let query = BookQuery::from_raw(None, None, None, None);
        assert_eq!(query, BookQuery::default());
        assert_eq!(query.page(), 1);
        assert_eq!(query.offset(), 0);

        let query = BookQuery::from_raw(Some("3"), Some("  "), Some("bogus"), Some(""));
        assert_eq!(query.page(), 3);
        assert_eq!(query.offset(), 24);
        assert_eq!(query.search(), None);
        assert_eq!(query.genre(), None);
        assert_eq!(query.sort(), BookSort::Newest);

        let query =
            BookQuery::from_raw(Some("x"), Some(" Tolkien "), Some("popular"), Some("fantasy"));
        assert_eq!(query.page(), 1);
        assert_eq!(query.search(), Some(" Tolkien "));
        assert_eq!(query.genre(), Some("fantasy"));
        assert_eq!(query.sort(), BookSort::Popular);
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("tolkien"), "%tolkien%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }

    #[test]
    fn test_filter_sql() {
        let query = BookQuery::new().with_search("x").with_genre("fantasy");
        let mut builder = QueryBuilder::new("SELECT count(*) FROM books b");
        query.push_filter(&mut builder);
        let sql = builder.sql();
        assert!(sql.contains(" WHERE (b.title LIKE ?"));
        assert!(sql.contains(" AND EXISTS ("));
        assert!(sql.contains("g.slug = ?"));

        let query = BookQuery::new().with_genre("fantasy");
        let mut builder = QueryBuilder::new("SELECT count(*) FROM books b");
        query.push_filter(&mut builder);
        assert!(builder.sql().starts_with("SELECT count(*) FROM books b WHERE EXISTS ("));

        let mut builder = QueryBuilder::new("SELECT count(*) FROM books b");
        BookQuery::new().push_filter(&mut builder);
        assert_eq!(builder.sql(), "SELECT count(*) FROM books b");
    }
}
