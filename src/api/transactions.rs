//! Issue/return and loan history endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::AppResult,
    models::transaction::{
        IssueBookRequest, IssueBookResponse, OverdueTransactionView, ReturnBookRequest,
        TransactionQuery, TransactionQueryParams, TransactionView,
    },
    AppState,
};

use super::{ApiJson, ApiQuery, AuthenticatedUser};

/// Borrow a copy
#[utoipa::path(
    post,
    path = "/transactions/issue",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = IssueBookRequest,
    responses(
        (status = 200, description = "Book issued", body = IssueBookResponse),
        (status = 400, description = "Invalid book id or loan period", body = crate::error::ErrorResponse),
        (status = 401, description = "Not a customer or bad token", body = crate::error::ErrorResponse),
        (status = 500, description = "Book not available", body = crate::error::ErrorResponse)
    )
)]
pub async fn issue_book(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ApiJson(request): ApiJson<IssueBookRequest>,
) -> AppResult<Json<IssueBookResponse>> {
    let loan = state
        .services
        .transactions
        .issue_book(&principal, &request.book_id, &request.issue_for)
        .await?;

    Ok(Json(IssueBookResponse {
        transaction_id: loan.transaction_id.to_string(),
    }))
}

/// Bring a borrowed copy back
#[utoipa::path(
    post,
    path = "/transactions/return",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = ReturnBookRequest,
    responses(
        (status = 200, description = "Book returned"),
        (status = 400, description = "Invalid book id", body = crate::error::ErrorResponse),
        (status = 401, description = "Not a customer or bad token", body = crate::error::ErrorResponse),
        (status = 500, description = "Nothing to return", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ApiJson(request): ApiJson<ReturnBookRequest>,
) -> AppResult<()> {
    state
        .services
        .transactions
        .return_book(&principal, &request.book_id)
        .await
}

/// The caller's loan history
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(TransactionQueryParams),
    responses(
        (status = 200, description = "Matching loans, newest first", body = Vec<TransactionView>),
        (status = 400, description = "Unparseable filter", body = crate::error::ErrorResponse),
        (status = 401, description = "Bad token", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ApiQuery(params): ApiQuery<TransactionQueryParams>,
) -> AppResult<Json<Vec<TransactionView>>> {
    let query = TransactionQuery::try_from(params)?;
    let transactions = state
        .services
        .transactions
        .list_transactions(&principal, query)
        .await?;
    Ok(Json(transactions))
}

/// One of the caller's loans by id
#[utoipa::path(
    get,
    path = "/transactions/{transaction_id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("transaction_id" = String, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Zero or one loan", body = Vec<TransactionView>),
        (status = 400, description = "Invalid transaction id", body = crate::error::ErrorResponse),
        (status = 401, description = "Bad token", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    Path(transaction_id): Path<String>,
) -> AppResult<Json<Vec<TransactionView>>> {
    let transactions = state
        .services
        .transactions
        .get_transaction(&principal, &transaction_id)
        .await?;
    Ok(Json(transactions))
}

/// Overdue loans: all of them for staff, the caller's own for customers
#[utoipa::path(
    get,
    path = "/transactions/overdue",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans, earliest due first", body = Vec<OverdueTransactionView>),
        (status = 401, description = "Bad token", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
) -> AppResult<Json<Vec<OverdueTransactionView>>> {
    let overdue = state.services.transactions.list_overdue(&principal).await?;
    Ok(Json(overdue))
}
