//! Repository layer: storage interfaces and their implementations

pub mod books;
pub mod memory;
pub mod transactions;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppResult, StorageContext},
    models::{
        book::{Book, BookQuery},
        transaction::{NewTransaction, Transaction, TransactionFilter},
        user::{NewUser, User},
    },
};

/// Book copies and their current holders
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Insert `copies` independent rows and return their ids
    async fn add_copies(&self, title: String, author: String, copies: i64) -> AppResult<Vec<Uuid>>;

    /// Copies matching the (case-insensitive, substring) filters, with the
    /// holder of the open loan if any
    async fn list(&self, query: BookQuery) -> AppResult<Vec<Book>>;
}

/// Loan lifecycle
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Create the loan only if the copy has no open loan. The check and the
    /// insert are a single atomic write; losing a race is a `Conflict`.
    async fn issue(&self, loan: NewTransaction) -> AppResult<Uuid>;

    /// Close the caller's open loan on the copy. `Conflict` when there is none.
    async fn return_book(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn find(&self, filter: TransactionFilter) -> AppResult<Vec<Transaction>>;

    /// Overdue loans as of `now`, for one user or (with `None`) everyone
    async fn overdue(&self, user_id: Option<Uuid>, now: DateTime<Utc>) -> AppResult<Vec<Transaction>>;
}

/// Accounts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `Conflict` when the email is already registered
    async fn create(&self, user: NewUser) -> AppResult<Uuid>;

    /// Case-insensitive email lookup
    async fn get_by_email(&self, email: String) -> AppResult<Option<User>>;
}

/// Main repository struct holding the stores
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
    pub transactions: Arc<dyn TransactionStore>,
    pub users: Arc<dyn UserStore>,
    pool: Option<Pool<Postgres>>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            transactions: Arc::new(transactions::TransactionsRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Repository backed by the in-process store
    pub fn in_memory() -> Self {
        let store = memory::MemoryStore::new();
        Self::from_stores(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
        )
    }

    pub fn from_stores(
        books: Arc<dyn BookStore>,
        transactions: Arc<dyn TransactionStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            books,
            transactions,
            users,
            pool: None,
        }
    }

    /// Check that the database answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .context("database unreachable")?;
        }
        Ok(())
    }
}

/// ILIKE pattern matching `needle` anywhere, with wildcards escaped
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
