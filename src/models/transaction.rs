//! Loan transactions, history filters and their views

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Placeholder for unreturned loans in the history listing.
pub const NOT_RETURNED_YET: &str = "not returned yet";
/// Placeholder for unreturned loans in the overdue listing.
pub const NOT_YET_RETURNED: &str = "not yet returned";

/// Loan of one copy to one user. Open while `returned_at` is unset.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub book_id: Uuid,
    pub book_title: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub issued_at: DateTime<Utc>,
    pub issued_till: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Past due and still out, or brought back after the due date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.issued_till < now && (self.is_open() || self.returned_at > Some(self.issued_till))
    }
}

/// Loan about to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub issued_till: DateTime<Utc>,
}

/// Result of a successful issue
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedLoan {
    pub transaction_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub issued_till: DateTime<Utc>,
}

/// Storage-level history filter. Always bound to one user.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionFilter {
    /// Exact lookup; other criteria are ignored.
    ById { transaction_id: Uuid, user_id: Uuid },
    Search {
        user_id: Uuid,
        issued_from: DateTime<Utc>,
        issued_until: DateTime<Utc>,
        returned: Option<bool>,
        book_title: Option<String>,
    },
}

/// Query string of `GET /transactions`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionQueryParams {
    /// Lower bound on issue time (RFC 3339 or YYYY-MM-DD), defaults to one month ago
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    /// Upper bound on issue time (RFC 3339 or YYYY-MM-DD), defaults to now
    #[serde(rename = "endTime")]
    pub end_time: Option<String>,
    /// `true` for returned loans only, `false` for open loans only
    pub returned: Option<String>,
    /// Case-insensitive book title substring
    pub title: Option<String>,
}

/// Typed history query handed to the service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionQuery {
    pub transaction_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub returned: Option<bool>,
    pub book_title: Option<String>,
}

impl TransactionQuery {
    pub fn by_id(transaction_id: Uuid) -> Self {
        Self {
            transaction_id: Some(transaction_id),
            ..Default::default()
        }
    }
}

impl TryFrom<TransactionQueryParams> for TransactionQuery {
    type Error = AppError;

    fn try_from(params: TransactionQueryParams) -> AppResult<Self> {
        Ok(Self {
            transaction_id: None,
            start_time: non_empty(params.start_time)
                .map(|s| parse_timestamp(&s, "startTime", DayBound::Start))
                .transpose()?,
            end_time: non_empty(params.end_time)
                .map(|s| parse_timestamp(&s, "endTime", DayBound::End))
                .transpose()?,
            returned: non_empty(params.returned)
                .map(|s| parse_flag(&s))
                .transpose()?,
            book_title: non_empty(params.title),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Which end of the day a bare `YYYY-MM-DD` bound stands for
#[derive(Clone, Copy)]
enum DayBound {
    Start,
    End,
}

fn parse_timestamp(value: &str, field: &str, bound: DayBound) -> AppResult<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| match bound {
            DayBound::Start => date.and_hms_opt(0, 0, 0),
            DayBound::End => date.and_hms_micro_opt(23, 59, 59, 999_999),
        })
        .map(|at| at.and_utc())
        .ok_or_else(|| AppError::InvalidInput(format!("invalid {}: {}", field, value)))
}

fn parse_flag(value: &str) -> AppResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "t" | "yes" | "1" => Ok(true),
        "false" | "f" | "no" | "0" => Ok(false),
        _ => Err(AppError::InvalidInput(format!("invalid returned: {}", value))),
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Issue request
#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueBookRequest {
    #[serde(default)]
    pub book_id: String,
    /// Loan period such as `"7 days"`; empty means one day
    #[serde(default)]
    pub issue_for: String,
}

/// Issue response
#[derive(Debug, Serialize, ToSchema)]
pub struct IssueBookResponse {
    pub transaction_id: String,
}

/// Return request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnBookRequest {
    #[serde(default)]
    pub book_id: String,
}

/// Loan as shown in the caller's history
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TransactionView {
    pub transaction_id: String,
    pub book_id: String,
    pub book_name: String,
    pub user_email: String,
    pub issued_at: String,
    pub issued_till: String,
    /// Return time or `"not returned yet"`
    pub returned_at: String,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            transaction_id: tx.id.to_string(),
            book_id: tx.book_id.to_string(),
            book_name: tx.book_title,
            user_email: tx.user_email,
            issued_at: format_timestamp(tx.issued_at),
            issued_till: format_timestamp(tx.issued_till),
            returned_at: tx
                .returned_at
                .map(format_timestamp)
                .unwrap_or_else(|| NOT_RETURNED_YET.to_string()),
        }
    }
}

/// Loan as shown in the overdue listing
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OverdueTransactionView {
    pub transaction_id: String,
    pub book_id: String,
    pub book_name: String,
    pub issued_at: String,
    pub issued_till: String,
    /// Return time or `"not yet returned"`
    pub returned_at: String,
}

impl From<Transaction> for OverdueTransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            transaction_id: tx.id.to_string(),
            book_id: tx.book_id.to_string(),
            book_name: tx.book_title,
            issued_at: format_timestamp(tx.issued_at),
            issued_till: format_timestamp(tx.issued_till),
            returned_at: tx
                .returned_at
                .map(format_timestamp)
                .unwrap_or_else(|| NOT_YET_RETURNED.to_string()),
        }
    }
}
