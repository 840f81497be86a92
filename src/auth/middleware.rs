//! Authentication middleware

use crate::auth::jwt::validate_token;
use crate::core::error::{ApiError, Result};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Typed identity attached to the request once the bearer token is verified
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
}

/// Authentication middleware
///
/// Extracts the bearer token from the Authorization header, validates it,
/// confirms the user still exists, and stores an [`AuthUser`] in the
/// request extensions for downstream handlers.
pub async fn authenticate(
    State(state): State<crate::api::handlers::AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    use axum::http::header;

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string());

    let token = match token {
        Some(t) => t,
        None => {
            let error = ApiError::Auth("Missing authentication token".to_string());
            return error.into_response();
        }
    };

    let claims = match validate_token(&token, &state.jwt_secret) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    let user = match state.user_repo.find_by_id(&claims.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            let error = ApiError::Auth("User not found".to_string());
            return error.into_response();
        }
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(AuthUser { user_id: user.id });

    next.run(request).await
}

// Implement FromRequestParts for AuthUser to enable extraction in handlers
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Auth("User not authenticated".to_string()))
    }
}
