use base64::engine::general_purpose::URL_SAFE_NO_PAD as b64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub const TOKEN_SIGNING_KEY_SIZE: usize = 64;

/// Key used to sign and verify access tokens. Cloned into actix app data;
/// never logged or serialized.
#[derive(Clone)]
pub struct TokenSigningKey([u8; TOKEN_SIGNING_KEY_SIZE]);

impl TokenSigningKey {
    pub fn new(key: [u8; TOKEN_SIGNING_KEY_SIZE]) -> Self {
        Self(key)
    }

    fn bytes(&self) -> &[u8; TOKEN_SIGNING_KEY_SIZE] {
        &self.0
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum TokenError {
    TokenInvalid,
    TokenExpired,
}

impl std::error::Error for TokenError {}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::TokenInvalid => write!(f, "Token is invalid"),
            TokenError::TokenExpired => write!(f, "Token is expired"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthTokenClaims {
    pub user_id: Uuid,
    pub expiration: u64,
}

/// Access token envelope: JSON claims, a `|` separator, and a hex-encoded
/// HMAC-SHA256 signature over the claims, all wrapped in URL-safe unpadded
/// base64.
pub struct AuthToken;

impl AuthToken {
    pub fn sign_new(user_id: Uuid, expiration: SystemTime, key: &TokenSigningKey) -> String {
        let claims = AuthTokenClaims {
            user_id,
            expiration: expiration
                .duration_since(UNIX_EPOCH)
                .expect("Unix timestamp could not be computed from expiration")
                .as_secs(),
        };

        let mut claims_json =
            serde_json::to_vec(&claims).expect("Failed to transform claims into JSON");

        let mut mac = Hmac::<Sha256>::new(key.bytes().into());
        mac.update(&claims_json);
        let signature = hex::encode(mac.finalize().into_bytes());

        claims_json.push(b'|');
        claims_json.extend_from_slice(signature.as_bytes());

        b64.encode(claims_json)
    }

    pub fn verify(token: &str, key: &TokenSigningKey) -> Result<AuthTokenClaims, TokenError> {
        Self::verify_at(token, key, SystemTime::now())
    }

    fn verify_at(
        token: &str,
        key: &TokenSigningKey,
        now: SystemTime,
    ) -> Result<AuthTokenClaims, TokenError> {
        let decoded = b64.decode(token).map_err(|_| TokenError::TokenInvalid)?;

        let separator = decoded
            .iter()
            .rposition(|byte| *byte == b'|')
            .ok_or(TokenError::TokenInvalid)?;
        let claims_json = &decoded[..separator];
        let signature =
            hex::decode(&decoded[separator + 1..]).map_err(|_| TokenError::TokenInvalid)?;

        let mut mac = Hmac::<Sha256>::new(key.bytes().into());
        mac.update(claims_json);
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::TokenInvalid)?;

        let claims: AuthTokenClaims =
            serde_json::from_slice(claims_json).map_err(|_| TokenError::TokenInvalid)?;

        let now = now
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TokenError::TokenInvalid)?
            .as_secs();

        if claims.expiration <= now {
            return Err(TokenError::TokenExpired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_key() -> TokenSigningKey {
        TokenSigningKey::new([9; TOKEN_SIGNING_KEY_SIZE])
    }

    #[test]
    fn round_trips_claims() {
        let user_id = Uuid::now_v7();
        let expiration = SystemTime::now() + Duration::from_secs(600);

        let token = AuthToken::sign_new(user_id, expiration, &test_key());
        let claims = AuthToken::verify(&token, &test_key()).unwrap();

        assert_eq!(claims.user_id, user_id);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let expiration = SystemTime::now() + Duration::from_secs(600);
        let token = AuthToken::sign_new(Uuid::now_v7(), expiration, &test_key());

        let mut tampered = b64.decode(&token).unwrap();
        let last = tampered.pop().unwrap();
        tampered.push(if last == b'a' { b'b' } else { b'a' });
        let tampered = b64.encode(tampered);

        assert_eq!(
            AuthToken::verify(&tampered, &test_key()).unwrap_err(),
            TokenError::TokenInvalid
        );
    }

    #[test]
    fn wrong_key_is_rejected() {
        let expiration = SystemTime::now() + Duration::from_secs(600);
        let token = AuthToken::sign_new(Uuid::now_v7(), expiration, &test_key());

        let other_key = TokenSigningKey::new([3; TOKEN_SIGNING_KEY_SIZE]);

        assert_eq!(
            AuthToken::verify(&token, &other_key).unwrap_err(),
            TokenError::TokenInvalid
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let expiration = SystemTime::now() + Duration::from_secs(10);
        let token = AuthToken::sign_new(Uuid::now_v7(), expiration, &test_key());

        let after_expiry = SystemTime::now() + Duration::from_secs(60);

        assert_eq!(
            AuthToken::verify_at(&token, &test_key(), after_expiry).unwrap_err(),
            TokenError::TokenExpired
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(
            AuthToken::verify("not-a-token", &test_key()).unwrap_err(),
            TokenError::TokenInvalid
        );
    }
}
