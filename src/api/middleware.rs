use crate::api::AppState;
use crate::error::AppError;
use crate::services::auth::verify_jwt;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

#[derive(Debug)]
pub struct AuthUser {
    pub user_id: i64,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::AuthError)?;

        let auth_str = auth_header.to_str().map_err(|_| AppError::AuthError)?;
        let token = auth_str.strip_prefix("Bearer ").ok_or(AppError::AuthError)?;

        let claims = verify_jwt(token, &state.config.auth.jwt_secret)?;

        Ok(Self { user_id: claims.sub })
    }
}
