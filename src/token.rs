//! Token Service (spec.md §4.8).
//!
//! Adapted from the teacher's `auth::jwt::JwtManager` key-rotation scheme
//! down to the single HS256 secret IndieAuth access tokens call for, and
//! from `TokenPair`'s bundling pattern for pairing an access token with an
//! opaque refresh token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token signature or structure invalid")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("token issuer or audience does not match this server")]
    WrongIssuerOrAudience,

    #[error("secret key must be at least 32 bytes")]
    SecretTooShort,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    aud: String,
    sub: String,
    me: String,
    client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    iat: i64,
    exp: i64,
}

/// Outcome of validating an access token (spec.md §4.8
/// `validateAccessToken`).
#[derive(Debug, Clone)]
pub struct ValidatedAccessToken {
    pub profile_url: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

const CLOCK_SKEW_SECONDS: u64 = 60;

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_token_ttl: ChronoDuration,
}

impl TokenService {
    pub fn new(secret: &[u8], issuer: String, access_token_ttl: std::time::Duration) -> Result<Self, TokenError> {
        if secret.len() < 32 {
            return Err(TokenError::SecretTooShort);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.trim_end_matches('/').to_string(),
            access_token_ttl: ChronoDuration::from_std(access_token_ttl)
                .unwrap_or_else(|_| ChronoDuration::minutes(15)),
        })
    }

    /// `generateAccessToken` (spec.md §4.8).
    pub fn generate_access_token(
        &self,
        profile_url: &str,
        client_id: &str,
        scopes: &[String],
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            iss: self.issuer.clone(),
            aud: self.issuer.clone(),
            sub: profile_url.to_string(),
            me: profile_url.to_string(),
            client_id: client_id.to_string(),
            scope: (!scopes.is_empty()).then(|| scopes.join(" ")),
            iat: now.timestamp(),
            exp: (now + self.access_token_ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|_| TokenError::Invalid)
    }

    /// `validateAccessToken` (spec.md §4.8).
    pub fn validate_access_token(&self, jwt: &str) -> Result<ValidatedAccessToken, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.issuer]);
        validation.leeway = CLOCK_SKEW_SECONDS;
        validation.validate_exp = true;

        let data = decode::<Claims>(jwt, &self.decoding_key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => TokenError::WrongIssuerOrAudience,
                _ => TokenError::Invalid,
            }
        })?;

        let scopes = data
            .claims
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(ValidatedAccessToken {
            profile_url: data.claims.sub,
            client_id: data.claims.client_id,
            scopes,
            issued_at: data.claims.iat,
            expires_at: data.claims.exp,
        })
    }

    /// `generateRefreshToken` (spec.md §4.8): 32 random bytes, base64url
    /// without padding. Opaque by design — unlike the access token, it
    /// carries no claims and is only ever meaningful as a lookup key into
    /// the refresh token repository.
    pub fn generate_refresh_token(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(
            b"01234567890123456789012345678901",
            "https://auth.example.com".to_string(),
            std::time::Duration::from_secs(900),
        )
        .unwrap()
    }

    #[test]
    fn rejects_short_secret() {
        let result = TokenService::new(b"too-short", "https://auth.example.com".to_string(), std::time::Duration::from_secs(900));
        assert!(matches!(result, Err(TokenError::SecretTooShort)));
    }

    #[test]
    fn round_trip_with_scopes() {
        let svc = service();
        let jwt = svc
            .generate_access_token("https://jane.example.com/", "https://app.example.com/", &["profile".to_string(), "email".to_string()])
            .unwrap();
        let validated = svc.validate_access_token(&jwt).unwrap();
        assert_eq!(validated.profile_url, "https://jane.example.com/");
        assert_eq!(validated.client_id, "https://app.example.com/");
        assert_eq!(validated.scopes, vec!["profile".to_string(), "email".to_string()]);
    }

    #[test]
    fn round_trip_with_no_scopes_omits_claim() {
        let svc = service();
        let jwt = svc.generate_access_token("https://jane.example.com/", "https://app.example.com/", &[]).unwrap();
        let validated = svc.validate_access_token(&jwt).unwrap();
        assert!(validated.scopes.is_empty());
    }

    #[test]
    fn rejects_token_from_different_issuer() {
        let svc = service();
        let other = TokenService::new(
            b"01234567890123456789012345678901",
            "https://different.example.com".to_string(),
            std::time::Duration::from_secs(900),
        )
        .unwrap();
        let jwt = other.generate_access_token("https://jane.example.com/", "https://app.example.com/", &[]).unwrap();
        assert!(matches!(svc.validate_access_token(&jwt), Err(TokenError::WrongIssuerOrAudience)));
    }

    #[test]
    fn refresh_tokens_are_url_safe_and_unique() {
        let svc = service();
        let a = svc.generate_refresh_token();
        let b = svc.generate_refresh_token();
        assert_ne!(a, b);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }
}
