//! User model, roles and JWT claims

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::principal::Principal;

/// The two account roles. Persisted as SMALLINT (staff = 0, customer = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum Role {
    Staff = 0,
    Customer = 1,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Customer => "customer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User model from database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// User about to be inserted (password already hashed)
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Signup request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "name, email or password cant be empty"))]
    #[serde(default)]
    pub name: String,
    #[validate(
        length(min = 1, message = "name, email or password cant be empty"),
        email(message = "invalid email address")
    )]
    #[serde(default)]
    pub email: String,
    #[validate(length(min = 1, message = "name, email or password cant be empty"))]
    #[serde(default)]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(
        length(min = 1, message = "email or password cant be empty"),
        email(message = "invalid email address")
    )]
    #[serde(default)]
    pub email: String,
    #[validate(length(min = 1, message = "email or password cant be empty"))]
    #[serde(default)]
    pub password: String,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn for_user(user: &User, issued_at: DateTime<Utc>, lifetime: chrono::Duration) -> Self {
        Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            exp: (issued_at + lifetime).timestamp(),
            iat: issued_at.timestamp(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and verify a JWT token. Expiry is checked without leeway.
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let mut validation = Validation::default();
        validation.leeway = 0;
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )?;
        Ok(token_data.claims)
    }

    pub fn into_principal(self) -> Option<Principal> {
        let user_id = Uuid::parse_str(&self.sub).ok()?;
        let expires_at = Utc.timestamp_opt(self.exp, 0).single()?;
        Some(Principal {
            user_id,
            email: self.email,
            role: self.role,
            expires_at,
        })
    }
}
