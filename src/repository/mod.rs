//! Repository contracts (spec.md §4.11 / §3 Data Model).
//!
//! Three records — `PendingAuthentication`, `AuthorizationCode`,
//! `RefreshToken` — each behind a narrow trait exposing exactly the
//! operations the Authorization Engine uses. Persistence is in-memory
//! only (a durable backend is out of scope, spec.md §1); the trait
//! boundary exists so the engine is written against a contract, not a
//! concrete `DashMap`, matching the teacher's separation between
//! `auth::oauth` session logic and its underlying stores.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A discovered provider account surfaced during Profile Discovery,
/// snapshotted onto the pending session (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProviderRecord {
    pub provider_type: String,
    pub profile_url: String,
    pub username: String,
    pub display_name: String,
    pub icon_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthentication {
    pub session_id: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub scopes: Vec<String>,
    pub profile_url: String,
    pub discovered_providers: Vec<DiscoveredProviderRecord>,
    pub selected_provider_type: Option<String>,
    pub provider_state: Option<String>,
    pub client_name: Option<String>,
    pub client_logo_uri: Option<String>,
    pub is_authenticated: bool,
    pub is_consent_given: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub profile_url: String,
    pub scopes: Vec<String>,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub token: String,
    pub profile_url: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PendingAuthenticationRepository: Send + Sync {
    async fn create(&self, record: PendingAuthentication);
    async fn read(&self, session_id: &str) -> Option<PendingAuthentication>;
    async fn update(&self, record: PendingAuthentication);
    async fn delete(&self, session_id: &str);
    async fn delete_expired(&self, now: DateTime<Utc>) -> usize;

    /// Looks up a non-expired session by its (session-bound, single-use)
    /// provider state value, used to resolve an identity provider's OAuth
    /// callback back to the session that initiated it (spec.md §4.9.3).
    async fn find_by_provider_state(&self, provider_state: &str) -> Option<PendingAuthentication>;
}

#[async_trait]
pub trait AuthorizationCodeRepository: Send + Sync {
    async fn create(&self, record: AuthorizationCode);
    async fn read(&self, code: &str) -> Option<AuthorizationCode>;
    async fn update(&self, record: AuthorizationCode);
    async fn delete(&self, code: &str);
    async fn delete_expired(&self, now: DateTime<Utc>) -> usize;

    /// Atomic check-and-set: marks the code used and returns the
    /// pre-use record in one step, or `None` if it doesn't exist, is
    /// expired, or was already used. The single-key lock this runs
    /// under (spec.md §5 "one repository transaction") is what makes a
    /// concurrent second redemption of the same code always lose,
    /// unlike a separate `read` followed by `update`.
    async fn consume_if_redeemable(&self, code: &str) -> Option<AuthorizationCode>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, record: RefreshToken);
    async fn read(&self, token: &str) -> Option<RefreshToken>;
    async fn update(&self, record: RefreshToken);
    async fn delete(&self, token: &str);
    async fn delete_expired(&self, now: DateTime<Utc>) -> usize;

    /// Atomically marks `old_token` revoked and inserts `new_token`,
    /// under the single-key lock on `old_token` (spec.md §4.9.8
    /// rotation, §4.11 linearizability requirement). Fails (returns
    /// `false`, inserts nothing) if `old_token` doesn't exist, is
    /// expired, or is already revoked, so two concurrent rotations of
    /// the same token can't both succeed.
    async fn rotate(&self, old_token: &str, new_token: RefreshToken) -> bool;

    /// spec.md §4.11 "revoke-all-for-profile".
    async fn revoke_all_for_profile(&self, profile_url: &str);
}
