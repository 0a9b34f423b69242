//! Signup and login endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::user::{LoginRequest, SignupRequest},
    AppState,
};

use super::ApiJson;

/// Login response
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    /// Signed bearer token
    pub jwt: String,
}

/// Register a customer account
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created"),
        (status = 400, description = "Missing field or invalid email", body = crate::error::ErrorResponse),
        (status = 500, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignupRequest>,
) -> AppResult<()> {
    state.services.auth.signup(request).await?;
    Ok(())
}

/// Exchange credentials for a token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing field or invalid email", body = crate::error::ErrorResponse),
        (status = 401, description = "Wrong password", body = crate::error::ErrorResponse),
        (status = 500, description = "Unknown user", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let jwt = state.services.auth.login(request).await?;
    Ok(Json(LoginResponse { jwt }))
}
