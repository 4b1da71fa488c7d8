//! Authorization Engine (spec.md §4.9) — the protocol state machine.
//!
//! One struct wired up explicitly at startup from concrete repository and
//! service instances (spec.md §9: no DI container, no service locator),
//! mirroring how the teacher constructs its proxy pipeline directly in
//! `main.rs` rather than through a registry.

mod authorize;
mod provider_flow;
mod token_grants;

pub use authorize::{AuthorizationRequest, CreateAuthorizationOutcome};
pub use token_grants::{IntrospectionResult, TokenGrantOutcome};

use crate::config::Config;
use crate::discovery;
use crate::providers::ProviderRegistry;
use crate::repository::{AuthorizationCodeRepository, PendingAuthenticationRepository, RefreshTokenRepository};
use crate::token::TokenService;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use std::sync::Arc;

pub struct AuthorizationEngine {
    pub(crate) config: Arc<Config>,
    pub(crate) token_service: TokenService,
    pub(crate) provider_registry: ProviderRegistry,
    pub(crate) http_client: reqwest::Client,
    pub(crate) pending_repo: Arc<dyn PendingAuthenticationRepository>,
    pub(crate) code_repo: Arc<dyn AuthorizationCodeRepository>,
    pub(crate) refresh_repo: Arc<dyn RefreshTokenRepository>,
}

impl AuthorizationEngine {
    pub fn new(
        config: Arc<Config>,
        token_service: TokenService,
        provider_registry: ProviderRegistry,
        http_client: reqwest::Client,
        pending_repo: Arc<dyn PendingAuthenticationRepository>,
        code_repo: Arc<dyn AuthorizationCodeRepository>,
        refresh_repo: Arc<dyn RefreshTokenRepository>,
    ) -> Self {
        Self { config, token_service, provider_registry, http_client, pending_repo, code_repo, refresh_repo }
    }

    /// `deleteExpired` across all three repositories (spec.md §4.9.11).
    pub async fn cleanup_expired(&self) -> (usize, usize, usize) {
        let now = chrono::Utc::now();
        let sessions = self.pending_repo.delete_expired(now).await;
        let codes = self.code_repo.delete_expired(now).await;
        let tokens = self.refresh_repo.delete_expired(now).await;
        (sessions, codes, tokens)
    }
}

/// `n` cryptographically random bytes, base64url without padding — the
/// opaque-identifier pattern spec.md §3 calls for on session ids,
/// authorization codes, and provider state values.
pub(crate) fn random_opaque_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) async fn fetch_client_info(client: &reqwest::Client, client_id: &str) -> discovery::ClientInfo {
    discovery::discover_client(client, client_id).await
}
