//! Authentication service: signup, login and token verification

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::{AuthConfig, StaffAccountConfig},
    error::{AppError, AppResult},
    models::{
        principal::Principal,
        user::{LoginRequest, NewUser, Role, SignupRequest, UserClaims},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a customer account
    pub async fn signup(&self, request: SignupRequest) -> AppResult<Uuid> {
        let request = SignupRequest {
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password,
        };
        request.validate()?;

        let id = self
            .register(request.name, request.email, &request.password, Role::Customer)
            .await?;
        tracing::info!(user_id = %id, "Customer account created");
        Ok(id)
    }

    /// Check credentials and mint a signed token
    pub async fn login(&self, request: LoginRequest) -> AppResult<String> {
        request.validate()?;

        let user = self
            .repository
            .users
            .get_by_email(request.email.trim().to_string())
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

        if !self.verify_password(&user.password_hash, &request.password)? {
            tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AppError::Unauthorized("invalid password".to_string()));
        }

        let lifetime = Duration::hours(self.config.jwt_expiration_hours as i64);
        let claims = UserClaims::for_user(&user, Utc::now(), lifetime);
        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Verify a bearer token and turn it into a principal
    pub fn verify_token(&self, token: &str) -> AppResult<Principal> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "token expired",
                _ => "invalid token",
            };
            AppError::Unauthorized(reason.to_string())
        })?;

        claims
            .into_principal()
            .ok_or_else(|| AppError::Unauthorized("invalid token".to_string()))
    }

    /// Create the configured staff account unless it already exists
    pub async fn ensure_staff_account(&self, account: &StaffAccountConfig) -> AppResult<()> {
        if let Some(existing) = self
            .repository
            .users
            .get_by_email(account.email.clone())
            .await?
        {
            if existing.role != Role::Staff {
                tracing::warn!(email = %account.email, "Configured staff email belongs to a customer account");
            }
            return Ok(());
        }

        let id = self
            .register(
                account.name.clone(),
                account.email.clone(),
                &account.password,
                Role::Staff,
            )
            .await?;
        tracing::info!(user_id = %id, email = %account.email, "Staff account created");
        Ok(())
    }

    async fn register(&self, name: String, email: String, password: &str, role: Role) -> AppResult<Uuid> {
        let password_hash = self.hash_password(password)?;
        self.repository
            .users
            .create(NewUser {
                name,
                email,
                password_hash,
                role,
            })
            .await
    }

    /// Verify user password
    fn verify_password(&self, hash: &str, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
