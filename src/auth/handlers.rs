//! Authentication API handlers

use crate::api::handlers::AppState;
use crate::auth::jwt::generate_token;
use crate::auth::middleware::AuthUser;
use crate::auth::models::{LoginRequest, LoginResponse, MeResponse, MessageResponse, SignupRequest};
use crate::auth::password::{hash_password, verify_password};
use crate::core::error::{ApiError, Result};
use crate::db::models::User;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use uuid::Uuid;

/// Handler for POST /api/auth/signup - User registration
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse> {
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Validation("Email and password are required".to_string()))?;
    let password = req
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("Email and password are required".to_string()))?;

    tracing::info!(email = %email, "Signup attempt");

    let password_hash = hash_password(password)?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_hash,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    // Duplicate emails surface as Conflict from the unique constraint
    state.user_repo.create(&user).await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User created".to_string(),
        }),
    ))
}

/// Handler for POST /api/auth/login - User login
///
/// Unknown email and wrong password both yield the same generic error.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::Auth("Invalid credentials".to_string()))?;
    let password = req
        .password
        .as_deref()
        .ok_or_else(|| ApiError::Auth("Invalid credentials".to_string()))?;

    tracing::info!(email = %email, "Login attempt");

    let user = state
        .user_repo
        .find_by_email(email)
        .await?
        .ok_or_else(|| ApiError::Auth("Invalid credentials".to_string()))?;

    let is_valid = verify_password(password, &user.password_hash)?;
    if !is_valid {
        tracing::warn!(email = %email, "Invalid password");
        return Err(ApiError::Auth("Invalid credentials".to_string()));
    }

    let token = generate_token(&user.id, &state.jwt_secret, state.token_ttl_hours)?;

    tracing::info!(user_id = %user.id, "Login successful");

    Ok(Json(LoginResponse {
        user_id: user.id,
        token,
    }))
}

/// Handler for GET /api/me - Identity of the authenticated user
pub async fn get_me(user: AuthUser) -> Result<Json<MeResponse>> {
    Ok(Json(MeResponse {
        user_id: user.user_id,
    }))
}
