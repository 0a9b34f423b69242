//! In-process store, selected with a `memory://` database url and used by
//! the test suites. All state sits behind one async mutex; every operation
//! holds it for its whole duration, which makes issue check-and-insert atomic.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookHolder, BookQuery},
        transaction::{NewTransaction, Transaction, TransactionFilter},
        user::{NewUser, User},
    },
};

use super::{
    transactions::{BOOK_NOT_AVAILABLE, NOTHING_TO_RETURN},
    users::EMAIL_TAKEN,
    BookStore, TransactionStore, UserStore,
};

#[derive(Debug, Clone)]
struct BookRecord {
    id: Uuid,
    title: String,
    author: String,
}

#[derive(Debug, Clone)]
struct LoanRecord {
    id: Uuid,
    book_id: Uuid,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
    issued_till: DateTime<Utc>,
    returned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<User>,
    books: Vec<BookRecord>,
    loans: Vec<LoanRecord>,
}

impl MemoryState {
    fn open_loan(&self, book_id: Uuid) -> Option<&LoanRecord> {
        self.loans
            .iter()
            .find(|loan| loan.book_id == book_id && loan.returned_at.is_none())
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    fn book(&self, id: Uuid) -> Option<&BookRecord> {
        self.books.iter().find(|book| book.id == id)
    }

    fn to_transaction(&self, loan: &LoanRecord) -> Transaction {
        Transaction {
            id: loan.id,
            book_id: loan.book_id,
            book_title: self.book(loan.book_id).map(|b| b.title.clone()).unwrap_or_default(),
            user_id: loan.user_id,
            user_email: self.user(loan.user_id).map(|u| u.email.clone()).unwrap_or_default(),
            issued_at: loan.issued_at,
            issued_till: loan.issued_till,
            returned_at: loan.returned_at,
        }
    }
}

/// Unicode case folding, matching `LOWER(email)` in Postgres
fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn add_copies(&self, title: String, author: String, copies: i64) -> AppResult<Vec<Uuid>> {
        let mut state = self.state.lock().await;
        let ids: Vec<Uuid> = (0..copies).map(|_| Uuid::new_v4()).collect();
        state.books.extend(ids.iter().map(|&id| BookRecord {
            id,
            title: title.clone(),
            author: author.clone(),
        }));
        Ok(ids)
    }

    async fn list(&self, query: BookQuery) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        let mut books: Vec<Book> = state
            .books
            .iter()
            .filter(|book| {
                contains_ignore_case(&book.title, &query.title)
                    && contains_ignore_case(&book.author, &query.author)
            })
            .map(|book| Book {
                id: book.id,
                title: book.title.clone(),
                author: book.author.clone(),
                issued_to: state.open_loan(book.id).and_then(|loan| {
                    state.user(loan.user_id).map(|user| BookHolder {
                        user_id: user.id,
                        email: user.email.clone(),
                    })
                }),
            })
            .collect();
        books.sort_by(|a, b| (&a.title, &a.author, a.id).cmp(&(&b.title, &b.author, b.id)));
        Ok(books)
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn issue(&self, loan: NewTransaction) -> AppResult<Uuid> {
        let mut state = self.state.lock().await;
        if state.book(loan.book_id).is_none()
            || state.user(loan.user_id).is_none()
            || state.open_loan(loan.book_id).is_some()
        {
            return Err(AppError::Conflict(BOOK_NOT_AVAILABLE.to_string()));
        }

        let id = Uuid::new_v4();
        state.loans.push(LoanRecord {
            id,
            book_id: loan.book_id,
            user_id: loan.user_id,
            issued_at: loan.issued_at,
            issued_till: loan.issued_till,
            returned_at: None,
        });
        Ok(id)
    }

    async fn return_book(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let loan = state
            .loans
            .iter_mut()
            .find(|loan| {
                loan.book_id == book_id && loan.user_id == user_id && loan.returned_at.is_none()
            })
            .ok_or_else(|| AppError::Conflict(NOTHING_TO_RETURN.to_string()))?;
        loan.returned_at = Some(returned_at);
        Ok(())
    }

    async fn find(&self, filter: TransactionFilter) -> AppResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        let mut found: Vec<Transaction> = match filter {
            TransactionFilter::ById {
                transaction_id,
                user_id,
            } => state
                .loans
                .iter()
                .filter(|loan| loan.id == transaction_id && loan.user_id == user_id)
                .map(|loan| state.to_transaction(loan))
                .collect(),
            TransactionFilter::Search {
                user_id,
                issued_from,
                issued_until,
                returned,
                book_title,
            } => state
                .loans
                .iter()
                .filter(|loan| {
                    loan.user_id == user_id
                        && loan.issued_at >= issued_from
                        && loan.issued_at <= issued_until
                        && returned.map_or(true, |r| r == loan.returned_at.is_some())
                })
                .map(|loan| state.to_transaction(loan))
                .filter(|tx| {
                    book_title
                        .as_deref()
                        .map_or(true, |title| contains_ignore_case(&tx.book_title, title))
                })
                .collect(),
        };
        found.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(found)
    }

    async fn overdue(&self, user_id: Option<Uuid>, now: DateTime<Utc>) -> AppResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        let mut overdue: Vec<Transaction> = state
            .loans
            .iter()
            .filter(|loan| user_id.map_or(true, |id| loan.user_id == id))
            .map(|loan| state.to_transaction(loan))
            .filter(|tx| tx.is_overdue(now))
            .collect();
        overdue.sort_by_key(|tx| tx.issued_till);
        Ok(overdue)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> AppResult<Uuid> {
        let mut state = self.state.lock().await;
        if state
            .users
            .iter()
            .any(|existing| same_email(&existing.email, &user.email))
        {
            return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
        }

        let id = Uuid::new_v4();
        state.users.push(User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
        });
        Ok(id)
    }

    async fn get_by_email(&self, email: String) -> AppResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|user| same_email(&user.email, &email))
            .cloned())
    }
}
