//! services/api/src/auth/token.rs
//!
//! Stateless session tokens: HS256-signed JWTs whose `sub` claim is the user id.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID). The only claim identity is derived from.
    pub sub: Uuid,
    /// Email at issue time, informational only.
    pub email: String,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
    /// Token id, unique per issue
    pub jti: String,
}

/// Why a token was refused. Clients see a single 401 for all of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Token is malformed")]
    Malformed,
    #[error("Token signature does not match")]
    BadSignature,
    #[error("Token has expired")]
    Expired,
    #[error("Token signing failed: {0}")]
    Signing(String),
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    leeway_secs: u64,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration, leeway_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            leeway_secs,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, AuthError> {
        self.issue_with_ttl(user_id, email, self.ttl)
    }

    /// Issues a token living `ttl` from now. A negative `ttl` yields a token that
    /// is already expired.
    pub fn issue_with_ttl(&self, user_id: Uuid, email: &str, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Signing("token lifetime is out of range".to_string()))?;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Returns the user id carried by a valid token.
    pub fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        self.decode(token).map(|claims| claims.sub)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        // Header and payload must be readable before the signature is judged, so
        // that any failure left over from `decode` belongs to the signature.
        let mut segments = token.split('.');
        let (Some(_), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::Malformed);
        };
        if signature.is_empty() {
            return Err(AuthError::Malformed);
        }
        decode_header(token).map_err(|_| AuthError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::Malformed)?;
        serde_json::from_slice::<Claims>(&payload).map_err(|_| AuthError::Malformed)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::Base64(_) => {
                    AuthError::BadSignature
                }
                _ => AuthError::Malformed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-chars!";

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::hours(24), 0)
    }

    #[test]
    fn issued_token_verifies_to_its_user() {
        let tokens = service();
        let user_id = Uuid::new_v4();

        let token = tokens.issue(user_id, "a@x.com").unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(tokens.verify(&token), Ok(user_id));

        let claims = tokens.decode(&token).unwrap();
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.exp - claims.iat, Duration::hours(24).num_seconds());
    }

    #[test]
    fn two_issues_differ() {
        let tokens = service();
        let user_id = Uuid::new_v4();
        let first = tokens.issue(user_id, "a@x.com").unwrap();
        let second = tokens.issue(user_id, "a@x.com").unwrap();

        assert_ne!(first, second);
        assert_eq!(tokens.verify(&first), Ok(user_id));
        assert_eq!(tokens.verify(&second), Ok(user_id));
    }

    #[test]
    fn past_expiry_is_expired() {
        let tokens = service();
        let token = tokens
            .issue_with_ttl(Uuid::new_v4(), "a@x.com", Duration::hours(-1))
            .unwrap();
        assert_eq!(tokens.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn out_of_range_lifetime_is_a_signing_error() {
        let result = service().issue_with_ttl(Uuid::new_v4(), "a@x.com", Duration::hours(3_000_000_000));
        assert!(matches!(result, Err(AuthError::Signing(_))));
    }

    #[test]
    fn tampered_signature_is_bad_signature() {
        let tokens = service();
        let token = tokens.issue(Uuid::new_v4(), "a@x.com").unwrap();
        let (unsigned, signature) = token.rsplit_once('.').unwrap();

        // Every position of the signature segment, swapped for another base64url character.
        for i in 0..signature.len() {
            let mut bytes = signature.as_bytes().to_vec();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let forged = format!("{}.{}", unsigned, String::from_utf8(bytes).unwrap());
            if forged == token {
                continue;
            }
            assert_eq!(tokens.verify(&forged), Err(AuthError::BadSignature), "position {}", i);
        }
    }

    #[test]
    fn token_from_another_secret_is_bad_signature() {
        let other = TokenService::new("another-secret-key-at-least-32-chars", Duration::hours(1), 0);
        let token = other.issue(Uuid::new_v4(), "a@x.com").unwrap();
        assert_eq!(service().verify(&token), Err(AuthError::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = service();
        for token in ["", "not-a-jwt-token", "invalid.token.here", "a.b", "a.b.c.d"] {
            assert_eq!(tokens.verify(token), Err(AuthError::Malformed), "{:?}", token);
        }
    }

    #[test]
    fn unreadable_payload_is_malformed() {
        let tokens = service();
        let token = tokens.issue(Uuid::new_v4(), "a@x.com").unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"not-a-uuid","exp":1}"#);
        parts[1] = &payload;
        assert_eq!(tokens.verify(&parts.join(".")), Err(AuthError::Malformed));
    }
}
