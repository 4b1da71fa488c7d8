//! In-memory repository implementations (spec.md §4.11), the only
//! backend this server ships (§1 Non-goals excludes durable storage).
//! `DashMap` gives the linearizable single-key updates the contracts
//! require without a surrounding lock, the same tool the teacher reaches
//! for in `auth::jwt::JwtManager`'s revocation set.

use super::{
    AuthorizationCode, AuthorizationCodeRepository, PendingAuthentication, PendingAuthenticationRepository,
    RefreshToken, RefreshTokenRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryPendingAuthenticationRepository {
    sessions: DashMap<String, PendingAuthentication>,
}

#[async_trait]
impl PendingAuthenticationRepository for InMemoryPendingAuthenticationRepository {
    async fn create(&self, record: PendingAuthentication) {
        self.sessions.insert(record.session_id.clone(), record);
    }

    async fn read(&self, session_id: &str) -> Option<PendingAuthentication> {
        self.sessions.get(session_id).filter(|r| r.expires_at > Utc::now()).map(|r| r.clone())
    }

    async fn update(&self, record: PendingAuthentication) {
        self.sessions.insert(record.session_id.clone(), record);
    }

    async fn delete(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> =
            self.sessions.iter().filter(|r| r.expires_at <= now).map(|r| r.session_id.clone()).collect();
        let count = expired.len();
        for key in expired {
            self.sessions.remove(&key);
        }
        count
    }

    async fn find_by_provider_state(&self, provider_state: &str) -> Option<PendingAuthentication> {
        let now = Utc::now();
        self.sessions
            .iter()
            .find(|r| r.expires_at > now && r.provider_state.as_deref() == Some(provider_state))
            .map(|r| r.clone())
    }
}

#[derive(Default)]
pub struct InMemoryAuthorizationCodeRepository {
    codes: DashMap<String, AuthorizationCode>,
}

#[async_trait]
impl AuthorizationCodeRepository for InMemoryAuthorizationCodeRepository {
    async fn create(&self, record: AuthorizationCode) {
        self.codes.insert(record.code.clone(), record);
    }

    async fn read(&self, code: &str) -> Option<AuthorizationCode> {
        self.codes.get(code).filter(|r| r.expires_at > Utc::now()).map(|r| r.clone())
    }

    async fn update(&self, record: AuthorizationCode) {
        self.codes.insert(record.code.clone(), record);
    }

    async fn delete(&self, code: &str) {
        self.codes.remove(code);
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self.codes.iter().filter(|r| r.expires_at <= now).map(|r| r.code.clone()).collect();
        let count = expired.len();
        for key in expired {
            self.codes.remove(&key);
        }
        count
    }

    async fn consume_if_redeemable(&self, code: &str) -> Option<AuthorizationCode> {
        let mut entry = self.codes.get_mut(code)?;
        if entry.is_used || entry.expires_at <= Utc::now() {
            return None;
        }
        entry.is_used = true;
        Some(entry.clone())
    }
}

#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    tokens: DashMap<String, RefreshToken>,
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn create(&self, record: RefreshToken) {
        self.tokens.insert(record.token.clone(), record);
    }

    async fn read(&self, token: &str) -> Option<RefreshToken> {
        self.tokens.get(token).filter(|r| r.expires_at > Utc::now()).map(|r| r.clone())
    }

    async fn update(&self, record: RefreshToken) {
        self.tokens.insert(record.token.clone(), record);
    }

    async fn delete(&self, token: &str) {
        self.tokens.remove(token);
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> =
            self.tokens.iter().filter(|r| r.expires_at <= now).map(|r| r.token.clone()).collect();
        let count = expired.len();
        for key in expired {
            self.tokens.remove(&key);
        }
        count
    }

    async fn rotate(&self, old_token: &str, new_token: RefreshToken) -> bool {
        {
            let mut entry = match self.tokens.get_mut(old_token) {
                Some(entry) => entry,
                None => return false,
            };
            if entry.is_revoked || entry.expires_at <= Utc::now() {
                return false;
            }
            entry.is_revoked = true;
            entry.revoked_at = Some(Utc::now());
        }
        self.tokens.insert(new_token.token.clone(), new_token);
        true
    }

    async fn revoke_all_for_profile(&self, profile_url: &str) {
        let now = Utc::now();
        for mut entry in self.tokens.iter_mut() {
            if entry.profile_url == profile_url && !entry.is_revoked {
                entry.is_revoked = true;
                entry.revoked_at = Some(now);
            }
        }
    }
}
