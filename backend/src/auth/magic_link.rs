//! Single-use sign-in links.
//!
//! A link carries 32 random bytes encoded as URL-safe base64. Only the SHA-256
//! digest of that token is stored; the plaintext exists once, in the response
//! to the admin who requested it.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

pub const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MagicLink {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Admin who requested the link
    pub issued_by: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Returns `(token, token_hash)`.
pub fn generate_token() -> (String, String) {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let token = general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_token(&token);
    (token, hash)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cheap shape check before touching the database.
pub fn is_well_formed(token: &str) -> bool {
    general_purpose::URL_SAFE_NO_PAD
        .decode(token)
        .map(|bytes| bytes.len() == TOKEN_BYTES)
        .unwrap_or(false)
}

/// Stores a new link for `user_id` and returns its plaintext token.
pub async fn issue(
    pool: &PgPool,
    user_id: Uuid,
    issued_by: Uuid,
    ttl: Duration,
) -> Result<(String, MagicLink), sqlx::Error> {
    let (token, token_hash) = generate_token();

    let link = sqlx::query_as::<_, MagicLink>(
        r#"
        INSERT INTO magic_links (id, user_id, issued_by, token_hash, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, issued_by, token_hash, created_at, expires_at, used_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(issued_by)
    .bind(&token_hash)
    .bind(Utc::now() + ttl)
    .fetch_one(pool)
    .await?;

    Ok((token, link))
}

/// Marks the link for `token` used. `None` when it does not exist, has
/// expired, or was already consumed; a link is consumed at most once.
pub async fn consume(pool: &PgPool, token: &str) -> Result<Option<MagicLink>, sqlx::Error> {
    if !is_well_formed(token) {
        return Ok(None);
    }

    sqlx::query_as::<_, MagicLink>(
        r#"
        UPDATE magic_links
        SET used_at = NOW()
        WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
        RETURNING id, user_id, issued_by, token_hash, created_at, expires_at, used_at
        "#,
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_shape() {
        let (token, hash) = generate_token();
        assert_eq!(token.len(), 43);
        assert!(is_well_formed(&token));
        assert!(!token.contains('=') && !token.contains('+') && !token.contains('/'));
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token(&token));
    }

    #[test]
    fn test_tokens_are_unique() {
        let (a, _) = generate_token();
        let (b, _) = generate_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("not base64 !"));
        assert!(!is_well_formed("c2hvcnQ"));
    }
}
