use std::collections::HashSet;

use bookclub_dal::{
    book::{BookQuery, BookRepositoryImpl, BookSort, CreateBook, PAGE_SIZE},
    stats::StatsRepositoryImpl,
};
use sqlx::Executor;

async fn init_db() -> sqlx::Pool<sqlx::Sqlite> {
    const DB_URL: &str = "sqlite::memory:";
    let conn = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect(DB_URL)
        .await
        .unwrap();
    conn.execute("PRAGMA foreign_keys = ON").await.unwrap();
    sqlx::migrate!("../../migrations").run(&conn).await.unwrap();
    conn
}

fn book_id(n: usize) -> String {
    format!("b{n:02}")
}

/// Inserts `count` books, book n is created n minutes after the first one
async fn insert_books(conn: &sqlx::Pool<sqlx::Sqlite>, count: usize) {
    for n in 1..=count {
        sqlx::query(
            "INSERT INTO books (id, title, author, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(book_id(n))
        .bind(format!("Book {n:02}"))
        .bind(format!("Author {}", n % 3))
        .bind(format!("2024-01-01 {:02}:{:02}:00.000", n / 60, n % 60))
        .bind("2024-01-01 00:00:00.000")
        .execute(conn)
        .await
        .unwrap();
    }
}

async fn insert_genre(conn: &sqlx::Pool<sqlx::Sqlite>, id: &str, name: &str, slug: &str) {
    sqlx::query("INSERT INTO genres (id, name, slug) VALUES (?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(slug)
        .execute(conn)
        .await
        .unwrap();
}

async fn link_genre(conn: &sqlx::Pool<sqlx::Sqlite>, book: &str, genre: &str) {
    sqlx::query("INSERT INTO book_genres (book_id, genre_id) VALUES (?, ?)")
        .bind(book)
        .bind(genre)
        .execute(conn)
        .await
        .unwrap();
}

async fn insert_user(conn: &sqlx::Pool<sqlx::Sqlite>, id: &str) {
    sqlx::query("INSERT INTO users (id, name, email, password) VALUES (?, ?, ?, 'x')")
        .bind(id)
        .bind(id)
        .bind(format!("{id}@example.com"))
        .execute(conn)
        .await
        .unwrap();
}

async fn wish(conn: &sqlx::Pool<sqlx::Sqlite>, user: &str, book: &str) {
    sqlx::query("INSERT INTO wishlists (id, user_id, book_id) VALUES (?, ?, ?)")
        .bind(format!("{user}-{book}"))
        .bind(user)
        .bind(book)
        .execute(conn)
        .await
        .unwrap();
}

async fn book_total(conn: &sqlx::Pool<sqlx::Sqlite>) -> u64 {
    StatsRepositoryImpl::new(conn.clone())
        .totals()
        .await
        .unwrap()
        .books
}

fn ids(page: &bookclub_dal::book::BookPage) -> Vec<String> {
    page.items.iter().map(|b| b.book.id.clone()).collect()
}

#[tokio::test]
async fn test_newest_second_page() {
    let conn = init_db().await;
    insert_books(&conn, 25).await;
    let repo = BookRepositoryImpl::new(conn);

    let page = repo
        .list_books(&BookQuery::new().with_page(2))
        .await
        .unwrap();
    assert_eq!(page.total_items, 25);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.current_page, 2);
    // newest first, so page 2 holds 13th to 24th newest
    let expected: Vec<String> = (2..=13).rev().map(book_id).collect();
    assert_eq!(ids(&page), expected);

    let last = repo
        .list_books(&BookQuery::new().with_page(3))
        .await
        .unwrap();
    assert_eq!(ids(&last), vec![book_id(1)]);
}

#[tokio::test]
async fn test_oldest_and_title_order() {
    let conn = init_db().await;
    insert_books(&conn, 5).await;
    sqlx::query("UPDATE books SET title = 'Aaa' WHERE id = 'b04'")
        .execute(&conn)
        .await
        .unwrap();
    let repo = BookRepositoryImpl::new(conn);

    let page = repo
        .list_books(&BookQuery::new().with_sort(BookSort::Oldest))
        .await
        .unwrap();
    assert_eq!(ids(&page), (1..=5).map(book_id).collect::<Vec<_>>());

    let page = repo
        .list_books(&BookQuery::new().with_sort(BookSort::Title))
        .await
        .unwrap();
    assert_eq!(ids(&page), vec!["b04", "b01", "b02", "b03", "b05"]);
}

#[tokio::test]
async fn test_genre_filter() {
    let conn = init_db().await;
    insert_books(&conn, 20).await;
    insert_genre(&conn, "g1", "Fantasy", "fantasy").await;
    insert_genre(&conn, "g2", "Poezie", "poezie").await;
    for n in 1..=8 {
        link_genre(&conn, &book_id(n), "g1").await;
    }
    let repo = BookRepositoryImpl::new(conn);

    let page = repo
        .list_books(&BookQuery::from_raw(Some("1"), None, None, Some("fantasy")))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 8);
    assert_eq!(page.total_items, 8);
    assert_eq!(page.total_pages, 1);
    assert!(page
        .items
        .iter()
        .all(|b| b.genres.iter().any(|g| g.slug == "fantasy")));

    // existing genre without books
    let page = repo
        .list_books(&BookQuery::new().with_genre("poezie"))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_items, 0);
    assert_eq!(page.total_pages, 1);

    // unknown genre
    let page = repo
        .list_books(&BookQuery::new().with_genre("no-such-genre"))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_items, 0);
    assert_eq!(page.total_pages, 1);
}

#[tokio::test]
async fn test_page_beyond_end() {
    let conn = init_db().await;
    insert_books(&conn, 14).await;
    let repo = BookRepositoryImpl::new(conn);

    let page = repo
        .list_books(&BookQuery::from_raw(Some("7"), None, None, None))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_items, 14);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.current_page, 7);

    let page = repo
        .list_books(&BookQuery::from_raw(Some("-2"), None, None, None))
        .await
        .unwrap();
    assert_eq!(page.current_page, 1);
    assert_eq!(page.items.len(), PAGE_SIZE as usize);
}

#[tokio::test]
async fn test_search() {
    let conn = init_db().await;
    insert_books(&conn, 6).await;
    sqlx::query("UPDATE books SET author = 'J. R. R. Tolkien' WHERE id IN ('b01', 'b02')")
        .execute(&conn)
        .await
        .unwrap();
    sqlx::query("UPDATE books SET title = 'Tolkien: A Biography' WHERE id = 'b05'")
        .execute(&conn)
        .await
        .unwrap();
    sqlx::query("UPDATE books SET title = '100% Fun' WHERE id = 'b06'")
        .execute(&conn)
        .await
        .unwrap();
    let repo = BookRepositoryImpl::new(conn);

    let page = repo
        .list_books(&BookQuery::new().with_search("tolkien"))
        .await
        .unwrap();
    assert_eq!(page.total_items, 3);
    let found: HashSet<String> = ids(&page).into_iter().collect();
    assert_eq!(
        found,
        HashSet::from(["b01".to_string(), "b02".to_string(), "b05".to_string()])
    );

    let page = repo
        .list_books(&BookQuery::new().with_search("TOLKIEN"))
        .await
        .unwrap();
    assert_eq!(page.total_items, 3);

    let all = repo.list_books(&BookQuery::new()).await.unwrap();
    let empty_search = repo
        .list_books(&BookQuery::from_raw(None, Some(""), None, None))
        .await
        .unwrap();
    assert_eq!(all.total_items, 6);
    assert_eq!(ids(&all), ids(&empty_search));

    // term is a substring as sent, surrounding spaces included
    let page = repo
        .list_books(&BookQuery::new().with_search(" tolkien"))
        .await
        .unwrap();
    assert_eq!(ids(&page), vec!["b02", "b01"]);
    let page = repo
        .list_books(&BookQuery::new().with_search("tolkien "))
        .await
        .unwrap();
    assert_eq!(page.total_items, 0);

    // wildcards are matched literally
    let page = repo
        .list_books(&BookQuery::new().with_search("%"))
        .await
        .unwrap();
    assert_eq!(ids(&page), vec!["b06"]);
    let page = repo
        .list_books(&BookQuery::new().with_search("_"))
        .await
        .unwrap();
    assert_eq!(page.total_items, 0);
}

#[tokio::test]
async fn test_popular_order() {
    let conn = init_db().await;
    insert_books(&conn, 6).await;
    for user in ["u1", "u2", "u3"] {
        insert_user(&conn, user).await;
    }
    // b03: 3, b05 and b02: 2, the rest 0
    for user in ["u1", "u2", "u3"] {
        wish(&conn, user, "b03").await;
    }
    for user in ["u1", "u2"] {
        wish(&conn, user, "b05").await;
        wish(&conn, user, "b02").await;
    }
    let repo = BookRepositoryImpl::new(conn);

    let page = repo
        .list_books(&BookQuery::from_raw(None, None, Some("popular"), None))
        .await
        .unwrap();
    assert_eq!(ids(&page), vec!["b03", "b02", "b05", "b01", "b04", "b06"]);
    let counts: Vec<i64> = page.items.iter().map(|b| b.wishlist_count).collect();
    assert_eq!(counts, vec![3, 2, 2, 0, 0, 0]);
    assert!(counts.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_genres_in_assignment_order() {
    let conn = init_db().await;
    insert_books(&conn, 2).await;
    insert_genre(&conn, "g1", "Fantasy", "fantasy").await;
    insert_genre(&conn, "g2", "Adventure", "adventure").await;
    insert_genre(&conn, "g3", "Classics", "classics").await;
    link_genre(&conn, "b01", "g3").await;
    link_genre(&conn, "b01", "g1").await;
    link_genre(&conn, "b01", "g2").await;
    link_genre(&conn, "b02", "g2").await;
    let repo = BookRepositoryImpl::new(conn);

    let book = repo.get("b01").await.unwrap();
    let slugs: Vec<&str> = book.genres.iter().map(|g| g.slug.as_str()).collect();
    assert_eq!(slugs, vec!["classics", "fantasy", "adventure"]);

    let page = repo
        .list_books(&BookQuery::new().with_genre("adventure"))
        .await
        .unwrap();
    assert_eq!(page.total_items, 2);
    let first = page.items.iter().find(|b| b.book.id == "b01").unwrap();
    assert_eq!(first.genres.len(), 3);
}

#[tokio::test]
async fn test_count_matches_pages() {
    let conn = init_db().await;
    insert_books(&conn, 30).await;
    insert_genre(&conn, "g1", "Fantasy", "fantasy").await;
    insert_genre(&conn, "g2", "Sci-Fi", "sci-fi").await;
    insert_user(&conn, "u1").await;
    for n in (1..=30).step_by(2) {
        link_genre(&conn, &book_id(n), "g1").await;
    }
    for n in (1..=30).step_by(3) {
        link_genre(&conn, &book_id(n), "g2").await;
        wish(&conn, "u1", &book_id(n)).await;
    }
    let repo = BookRepositoryImpl::new(conn);

    for search in [None, Some("Author 1"), Some("book 1"), Some("nothing")] {
        for genre in [None, Some("fantasy"), Some("sci-fi"), Some("unknown")] {
            for sort in BookSort::ALL {
                let mut query = BookQuery::new().with_sort(sort);
                if let Some(search) = search {
                    query = query.with_search(search);
                }
                if let Some(genre) = genre {
                    query = query.with_genre(genre);
                }
                let first = repo.list_books(&query).await.unwrap();
                let mut seen = Vec::new();
                for page in 1..=first.total_pages + 1 {
                    let result = repo
                        .list_books(&query.clone().with_page(page))
                        .await
                        .unwrap();
                    assert_eq!(result.total_items, first.total_items);
                    assert_eq!(result.total_pages, first.total_pages);
                    seen.extend(ids(&result));
                }
                let unique: HashSet<&String> = seen.iter().collect();
                assert_eq!(unique.len(), seen.len(), "pages overlap for {query:?}");
                assert_eq!(seen.len() as u64, first.total_items, "count differs for {query:?}");
                assert_eq!(
                    first.total_pages as u64,
                    std::cmp::max(1, first.total_items.div_ceil(PAGE_SIZE as u64))
                );
            }
        }
    }
}

#[tokio::test]
async fn test_create_and_delete() {
    let conn = init_db().await;
    insert_genre(&conn, "g1", "Fantasy", "fantasy").await;
    insert_genre(&conn, "g2", "Classics", "classics").await;
    insert_user(&conn, "u1").await;
    let repo = BookRepositoryImpl::new(conn.clone());

    let new_book = CreateBook {
        title: "The Hobbit".to_string(),
        author: "J. R. R. Tolkien".to_string(),
        isbn: Some("978-0261102217".to_string()),
        description: None,
        cover_image: None,
        published_at: Some("1937-09-21".to_string()),
        page_count: Some(310),
        language: "en".to_string(),
        genre_ids: vec!["g2".to_string(), "g1".to_string(), "g2".to_string()],
    };
    let book = repo.create(new_book.clone()).await.unwrap();
    assert_eq!(book.book.title, "The Hobbit");
    assert_eq!(book.wishlist_count, 0);
    let slugs: Vec<&str> = book.genres.iter().map(|g| g.slug.as_str()).collect();
    assert_eq!(slugs, vec!["classics", "fantasy"]);
    assert_eq!(book_total(&conn).await, 1);

    let duplicate = repo.create(new_book.clone()).await;
    assert!(matches!(duplicate, Err(bookclub_dal::Error::AlreadyExists(_))));

    let unknown_genre = repo
        .create(CreateBook {
            isbn: None,
            genre_ids: vec!["nope".to_string()],
            ..new_book
        })
        .await;
    assert!(matches!(unknown_genre, Err(bookclub_dal::Error::RecordNotFound(_))));
    assert_eq!(book_total(&conn).await, 1);

    wish(&conn, "u1", &book.book.id).await;
    let book = repo.get(&book.book.id).await.unwrap();
    assert_eq!(book.wishlist_count, 1);

    repo.delete(&book.book.id).await.unwrap();
    assert!(matches!(
        repo.get(&book.book.id).await,
        Err(bookclub_dal::Error::RecordNotFound(_))
    ));
    let links: i64 = sqlx::query_scalar("SELECT count(*) FROM book_genres")
        .fetch_one(&conn)
        .await
        .unwrap();
    assert_eq!(links, 0);
    let wishes: i64 = sqlx::query_scalar("SELECT count(*) FROM wishlists")
        .fetch_one(&conn)
        .await
        .unwrap();
    assert_eq!(wishes, 0);

    let missing = repo.delete(&book.book.id).await;
    assert!(matches!(missing, Err(bookclub_dal::Error::RecordNotFound(_))));
}
