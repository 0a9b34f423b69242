//! Catalog endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::book::{AddBooksRequest, BookQuery, BookView},
    AppState,
};

use super::{ApiJson, ApiQuery, AuthenticatedUser};

/// Add copies of a title to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = AddBooksRequest,
    responses(
        (status = 201, description = "Copies added"),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 401, description = "Not staff or bad token", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_books(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ApiJson(request): ApiJson<AddBooksRequest>,
) -> AppResult<StatusCode> {
    state.services.catalog.add_books(&principal, request).await?;
    Ok(StatusCode::CREATED)
}

/// List copies matching title and author substrings
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "Matching copies", body = Vec<BookView>),
        (status = 401, description = "Bad token", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(principal): AuthenticatedUser,
    ApiQuery(query): ApiQuery<BookQuery>,
) -> AppResult<Json<Vec<BookView>>> {
    let books = state.services.catalog.list_books(&principal, query).await?;
    Ok(Json(books))
}
