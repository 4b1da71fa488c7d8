//! Token endpoint grants and introspection/revocation (spec.md §4.9.5
//! through §4.9.10).

use super::AuthorizationEngine;
use crate::error::{IndieAuthError, IndieAuthErrorCode};
use crate::pkce;
use crate::repository::RefreshToken;
use chrono::{Duration, Utc};
use subtle::ConstantTimeEq;

/// Successful shape of either token grant (spec.md §6 "Token success").
/// `scope` is only ever populated by the authorization_code grant; the
/// authentication-only POST /auth exchange returns just `me`.
#[derive(Debug, Clone)]
pub struct TokenGrantOutcome {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_token: String,
    pub scope: Option<String>,
    pub me: String,
}

#[derive(Debug, Clone)]
pub struct IntrospectionResult {
    pub active: bool,
    pub me: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<String>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
}

impl AuthorizationEngine {
    /// `redeemCode` (spec.md §4.9.5). The single-use mark-as-used happens
    /// atomically in `consume_if_redeemable`, under the repository's
    /// per-code lock, so a concurrent second redemption of the same code
    /// always loses regardless of how the remaining checks land.
    pub async fn redeem_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Option<crate::repository::AuthorizationCode> {
        let record = self.code_repo.consume_if_redeemable(code).await?;

        if record.client_id != client_id || record.redirect_uri != redirect_uri {
            return None;
        }
        if !pkce::verify(code_verifier, &record.code_challenge, &record.code_challenge_method) {
            return None;
        }

        Some(record)
    }

    /// Token endpoint `grant_type=authorization_code` (spec.md §4.9.6).
    pub async fn grant_authorization_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenGrantOutcome, IndieAuthError> {
        let Some(record) = self.redeem_code(code, client_id, redirect_uri, code_verifier).await else {
            return Err(IndieAuthError::new(IndieAuthErrorCode::InvalidGrant, "the authorization code is invalid, expired, or already used".to_string()));
        };

        if record.scopes.is_empty() {
            return Err(IndieAuthError::new(
                IndieAuthErrorCode::InvalidGrant,
                "an authentication-only code must be exchanged at the authorization endpoint".to_string(),
            ));
        }

        self.issue_token_pair(record).await
    }

    /// Authorization endpoint `POST` (spec.md §4.9.7): identical
    /// redemption, but the caller only ever sees `{me}`.
    pub async fn redeem_code_for_authentication(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<String, IndieAuthError> {
        let Some(record) = self.redeem_code(code, client_id, redirect_uri, code_verifier).await else {
            return Err(IndieAuthError::new(IndieAuthErrorCode::InvalidGrant, "the authorization code is invalid, expired, or already used".to_string()));
        };
        Ok(record.profile_url)
    }

    async fn issue_token_pair(
        &self,
        record: crate::repository::AuthorizationCode,
    ) -> Result<TokenGrantOutcome, IndieAuthError> {
        let access_token = self
            .token_service
            .generate_access_token(&record.profile_url, &record.client_id, &record.scopes)
            .map_err(|_| IndieAuthError::new(IndieAuthErrorCode::ServerError, "failed to sign access token".to_string()))?;
        let refresh_token = self.token_service.generate_refresh_token();

        let now = Utc::now();
        self.refresh_repo
            .create(RefreshToken {
                token: refresh_token.clone(),
                profile_url: record.profile_url.clone(),
                client_id: record.client_id.clone(),
                scopes: record.scopes.clone(),
                created_at: now,
                expires_at: now + Duration::days(self.config.refresh_token_ttl_days),
                is_revoked: false,
                revoked_at: None,
            })
            .await;

        Ok(TokenGrantOutcome {
            access_token,
            token_type: "Bearer",
            expires_in: self.config.jwt.access_token_ttl_minutes * 60,
            refresh_token,
            scope: (!record.scopes.is_empty()).then(|| record.scopes.join(" ")),
            me: record.profile_url,
        })
    }

    /// Token endpoint `grant_type=refresh_token` (spec.md §4.9.8). Scopes
    /// are carried over unchanged — no downscoping in v1.
    pub async fn grant_refresh_token(
        &self,
        client_id: &str,
        refresh_token: &str,
    ) -> Result<TokenGrantOutcome, IndieAuthError> {
        let Some(record) = self.refresh_repo.read(refresh_token).await else {
            return Err(IndieAuthError::new(IndieAuthErrorCode::InvalidGrant, "refresh_token is invalid, expired, or revoked".to_string()));
        };
        if record.is_revoked {
            return Err(IndieAuthError::new(IndieAuthErrorCode::InvalidGrant, "refresh_token is invalid, expired, or revoked".to_string()));
        }
        if record.client_id != client_id {
            return Err(IndieAuthError::new(IndieAuthErrorCode::InvalidGrant, "refresh_token was not issued to this client".to_string()));
        }

        let access_token = self
            .token_service
            .generate_access_token(&record.profile_url, &record.client_id, &record.scopes)
            .map_err(|_| IndieAuthError::new(IndieAuthErrorCode::ServerError, "failed to sign access token".to_string()))?;
        let new_refresh_token = self.token_service.generate_refresh_token();

        let now = Utc::now();
        let rotated = self
            .refresh_repo
            .rotate(
                refresh_token,
                RefreshToken {
                    token: new_refresh_token.clone(),
                    profile_url: record.profile_url.clone(),
                    client_id: record.client_id.clone(),
                    scopes: record.scopes.clone(),
                    created_at: now,
                    expires_at: now + Duration::days(self.config.refresh_token_ttl_days),
                    is_revoked: false,
                    revoked_at: None,
                },
            )
            .await;
        if !rotated {
            return Err(IndieAuthError::new(IndieAuthErrorCode::InvalidGrant, "refresh_token is invalid, expired, or revoked".to_string()));
        }

        Ok(TokenGrantOutcome {
            access_token,
            token_type: "Bearer",
            expires_in: self.config.jwt.access_token_ttl_minutes * 60,
            refresh_token: new_refresh_token,
            scope: (!record.scopes.is_empty()).then(|| record.scopes.join(" ")),
            me: record.profile_url,
        })
    }

    /// Revocation (spec.md §4.9.9). Always succeeds from the caller's
    /// perspective, per RFC 7009.
    pub async fn revoke_token(&self, token: &str) {
        if let Some(mut record) = self.refresh_repo.read(token).await {
            if !record.is_revoked {
                record.is_revoked = true;
                record.revoked_at = Some(Utc::now());
                self.refresh_repo.update(record).await;
            }
        }
    }

    /// Introspection (spec.md §4.9.10). `bearer_header` is the raw
    /// `Authorization` header value, already stripped of nothing — the
    /// `Bearer ` prefix check happens here.
    pub fn authorize_introspection(&self, bearer_header: Option<&str>) -> bool {
        let Some(configured_secret) = &self.config.introspection_secret else { return false };
        let Some(header) = bearer_header else { return false };
        let Some(presented) = header.strip_prefix("Bearer ") else { return false };
        presented.as_bytes().ct_eq(configured_secret.as_bytes()).into()
    }

    pub fn introspect_access_token(&self, jwt: &str) -> IntrospectionResult {
        match self.token_service.validate_access_token(jwt) {
            Ok(validated) => IntrospectionResult {
                active: true,
                me: Some(validated.profile_url),
                client_id: Some(validated.client_id),
                scope: (!validated.scopes.is_empty()).then(|| validated.scopes.join(" ")),
                exp: Some(validated.expires_at),
                iat: Some(validated.issued_at),
            },
            Err(_) => IntrospectionResult { active: false, me: None, client_id: None, scope: None, exp: None, iat: None },
        }
    }
}
