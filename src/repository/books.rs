//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppResult, StorageContext},
    models::book::{Book, BookQuery, BookRow},
};

use super::{contains_pattern, BookStore};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn add_copies(&self, title: String, author: String, copies: i64) -> AppResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO books (title, author)
            SELECT $1, $2 FROM generate_series(1, $3::bigint)
            RETURNING id
            "#,
        )
        .bind(&title)
        .bind(&author)
        .bind(copies)
        .fetch_all(&self.pool)
        .await
        .context("failed to add books")
    }

    async fn list(&self, query: BookQuery) -> AppResult<Vec<Book>> {
        let title = (!query.title.is_empty()).then(|| contains_pattern(&query.title));
        let author = (!query.author.is_empty()).then(|| contains_pattern(&query.author));

        // The partial unique index guarantees at most one open loan per copy,
        // so the join yields one row per copy.
        let rows = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT b.id, b.title, b.author,
                   u.id AS holder_id, u.email AS holder_email
            FROM books b
            LEFT JOIN transactions t ON t.book_id = b.id AND t.returned_at IS NULL
            LEFT JOIN users u ON u.id = t.user_id
            WHERE ($1::text IS NULL OR b.title ILIKE $1)
              AND ($2::text IS NULL OR b.author ILIKE $2)
            ORDER BY b.title, b.author, b.id
            "#,
        )
        .bind(title)
        .bind(author)
        .fetch_all(&self.pool)
        .await
        .context("failed to list books")?;

        Ok(rows.into_iter().map(Book::from).collect())
    }
}
