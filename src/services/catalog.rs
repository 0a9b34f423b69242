//! Catalog management service

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        book::{project_books, AddBooksRequest, BookQuery, BookView},
        principal::Principal,
        user::Role,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Add `copies` independent copies of a title. Staff only.
    pub async fn add_books(&self, principal: &Principal, request: AddBooksRequest) -> AppResult<Vec<Uuid>> {
        principal.require_role(&[Role::Staff], "add books")?;

        let request = AddBooksRequest {
            title: request.title.trim().to_string(),
            author: request.author.trim().to_string(),
            copies: request.copies,
        };
        request.validate()?;

        let ids = self
            .repository
            .books
            .add_copies(request.title.clone(), request.author.clone(), request.copies)
            .await?;

        tracing::info!(
            title = %request.title,
            author = %request.author,
            copies = ids.len(),
            "Books added to catalog"
        );
        Ok(ids)
    }

    /// List copies, projected for the caller's role
    pub async fn list_books(&self, principal: &Principal, query: BookQuery) -> AppResult<Vec<BookView>> {
        principal.require_authenticated()?;

        let query = BookQuery {
            title: query.title.trim().to_string(),
            author: query.author.trim().to_string(),
        };
        let books = self.repository.books.list(query).await?;
        Ok(project_books(principal.role, books))
    }
}
