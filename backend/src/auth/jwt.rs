use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use garageinn_shared::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user id
    pub sid: Uuid, // auth_sessions row
    pub email: String,
    pub name: String,
    pub role: String,
    /// Admin who opened this session on the user's behalf
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imp: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub fn create_jwt(
    user: &User,
    session_id: Uuid,
    impersonator_id: Option<Uuid>,
    ttl: Duration,
    secret: &str,
) -> Result<TokenResponse, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expires_at = now + ttl;

    let claims = Claims {
        sub: user.id,
        sid: session_id,
        email: user.email.clone(),
        name: user.full_name(),
        role: user.role.clone(),
        imp: impersonator_id,
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(TokenResponse { token, expires_at })
}

pub fn verify_jwt(
    token: &str,
    secret: &str,
) -> Result<TokenData<Claims>, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
}
