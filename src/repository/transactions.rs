//! Transactions (loans) repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, StorageContext},
    models::transaction::{NewTransaction, Transaction, TransactionFilter},
};

use super::{contains_pattern, TransactionStore};

pub(crate) const BOOK_NOT_AVAILABLE: &str = "book not available";
pub(crate) const NOTHING_TO_RETURN: &str = "book already present nothing to return";

const SELECT_TRANSACTIONS: &str = r#"
    SELECT t.id, t.book_id, b.title AS book_title,
           t.user_id, u.email AS user_email,
           t.issued_at, t.issued_till, t.returned_at
    FROM transactions t
    JOIN books b ON b.id = t.book_id
    JOIN users u ON u.id = t.user_id
"#;

#[derive(Clone)]
pub struct TransactionsRepository {
    pool: Pool<Postgres>,
}

impl TransactionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for TransactionsRepository {
    async fn issue(&self, loan: NewTransaction) -> AppResult<Uuid> {
        // Conditional insert: the NOT EXISTS guard handles the common case and
        // the partial unique index on open loans settles concurrent inserts.
        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO transactions (book_id, user_id, issued_at, issued_till)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (
                SELECT 1 FROM transactions
                WHERE book_id = $1 AND returned_at IS NULL
            )
            RETURNING id
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.user_id)
        .bind(loan.issued_at)
        .bind(loan.issued_till)
        .fetch_optional(&self.pool)
        .await;

        match inserted {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(AppError::Conflict(BOOK_NOT_AVAILABLE.to_string())),
            Err(sqlx::Error::Database(e))
                if e.is_unique_violation() || e.is_foreign_key_violation() =>
            {
                tracing::debug!(book_id = %loan.book_id, "issue rejected by constraint: {}", e);
                Err(AppError::Conflict(BOOK_NOT_AVAILABLE.to_string()))
            }
            Err(e) => Err(e).context("failed to issue book"),
        }
    }

    async fn return_book(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE transactions SET returned_at = $1
            WHERE book_id = $2 AND user_id = $3 AND returned_at IS NULL
            "#,
        )
        .bind(returned_at)
        .bind(book_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("failed to return book")?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(NOTHING_TO_RETURN.to_string()));
        }
        Ok(())
    }

    async fn find(&self, filter: TransactionFilter) -> AppResult<Vec<Transaction>> {
        let query = match filter {
            TransactionFilter::ById {
                transaction_id,
                user_id,
            } => sqlx::query_as::<_, Transaction>(&format!(
                "{} WHERE t.id = $1 AND t.user_id = $2",
                SELECT_TRANSACTIONS
            ))
            .bind(transaction_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await,
            TransactionFilter::Search {
                user_id,
                issued_from,
                issued_until,
                returned,
                book_title,
            } => sqlx::query_as::<_, Transaction>(&format!(
                r#"{}
                WHERE t.user_id = $1
                  AND t.issued_at >= $2 AND t.issued_at <= $3
                  AND ($4::boolean IS NULL OR (t.returned_at IS NOT NULL) = $4)
                  AND ($5::text IS NULL OR b.title ILIKE $5)
                ORDER BY t.issued_at DESC
                "#,
                SELECT_TRANSACTIONS
            ))
            .bind(user_id)
            .bind(issued_from)
            .bind(issued_until)
            .bind(returned)
            .bind(book_title.as_deref().map(contains_pattern))
            .fetch_all(&self.pool)
            .await,
        };

        query.context("failed to get transactions")
    }

    async fn overdue(&self, user_id: Option<Uuid>, now: DateTime<Utc>) -> AppResult<Vec<Transaction>> {
        sqlx::query_as::<_, Transaction>(&format!(
            r#"{}
            WHERE ($1::uuid IS NULL OR t.user_id = $1)
              AND t.issued_till < $2
              AND (t.returned_at IS NULL OR t.returned_at > t.issued_till)
            ORDER BY t.issued_till
            "#,
            SELECT_TRANSACTIONS
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .context("failed to get overdue transactions")
    }
}
