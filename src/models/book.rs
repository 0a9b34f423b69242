//! Book copies and their role-scoped listing views

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::user::Role;

/// Marker shown to staff for copies nobody holds.
pub const NOT_ISSUED: &str = "none";

/// Holder of the open loan on a copy
#[derive(Debug, Clone, PartialEq)]
pub struct BookHolder {
    pub user_id: Uuid,
    pub email: String,
}

/// One physical copy. `issued_to` is derived from the open loan, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub issued_to: Option<BookHolder>,
}

/// Internal row structure for the listing query
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub holder_id: Option<Uuid>,
    pub holder_email: Option<String>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        let issued_to = match (row.holder_id, row.holder_email) {
            (Some(user_id), Some(email)) => Some(BookHolder { user_id, email }),
            _ => None,
        };
        Self {
            id: row.id,
            title: row.title,
            author: row.author,
            issued_to,
        }
    }
}

/// Add copies request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddBooksRequest {
    #[validate(length(min = 1, message = "invalid input: title is required"))]
    #[serde(default)]
    pub title: String,
    #[validate(length(min = 1, message = "invalid input: author is required"))]
    #[serde(default)]
    pub author: String,
    /// Number of physical copies to add, 1 to 1000 per request
    #[validate(range(min = 1, max = 1000, message = "invalid input: copies must be between 1 and 1000"))]
    #[serde(default)]
    pub copies: i64,
}

/// Listing filters. Empty means no constraint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive title substring
    #[serde(default)]
    pub title: String,
    /// Case-insensitive author substring
    #[serde(default)]
    pub author: String,
}

/// Book as shown to a caller
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BookView {
    pub book_id: String,
    pub title: String,
    pub author: String,
    /// Holder email or `"none"`. Only present for staff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_to: Option<String>,
}

/// Staff see every copy with its holder; customers only see copies they
/// could borrow, without holder information.
pub fn project_books(role: Role, books: Vec<Book>) -> Vec<BookView> {
    match role {
        Role::Staff => books
            .into_iter()
            .map(|book| BookView {
                book_id: book.id.to_string(),
                title: book.title,
                author: book.author,
                issued_to: Some(
                    book.issued_to
                        .map(|holder| holder.email)
                        .unwrap_or_else(|| NOT_ISSUED.to_string()),
                ),
            })
            .collect(),
        Role::Customer => books
            .into_iter()
            .filter(|book| book.issued_to.is_none())
            .map(|book| BookView {
                book_id: book.id.to_string(),
                title: book.title,
                author: book.author,
                issued_to: None,
            })
            .collect(),
    }
}
