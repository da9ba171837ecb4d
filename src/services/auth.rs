use crate::error::{AppError, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: i64,
}

/// Issues a short-lived HS256 access token for a user.
///
/// # Errors
/// Returns `AppError::Internal` if signing fails.
pub fn issue_jwt(user_id: i64, secret: &str, ttl_secs: u64) -> Result<String> {
    let exp = (OffsetDateTime::now_utc() + Duration::seconds(ttl_secs.try_into().unwrap_or(i64::MAX)))
        .unix_timestamp();
    let claims = Claims { sub: user_id, exp };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(|e| {
        tracing::error!(error = %e, "Failed to sign JWT");
        AppError::Internal
    })
}

/// Verifies a token and returns its claims.
///
/// # Errors
/// Returns `AppError::AuthError` if the token is invalid or expired.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    // No expiry leeway: a token past its exp is rejected immediately.
    validation.leeway = 0;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|_| AppError::AuthError)?;

    Ok(data.claims)
}
