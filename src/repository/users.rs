//! Users repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, StorageContext},
    models::user::{NewUser, User},
};

use super::UserStore;

pub(crate) const EMAIL_TAKEN: &str = "email already registered";

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UsersRepository {
    async fn create(&self, user: NewUser) -> AppResult<Uuid> {
        let created = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await;

        match created {
            Ok(id) => Ok(id),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::Conflict(EMAIL_TAKEN.to_string()))
            }
            Err(e) => Err(e).context("failed to create user"),
        }
    }

    async fn get_by_email(&self, email: String) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role
            FROM users WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await
        .context("failed to get user")
    }
}
