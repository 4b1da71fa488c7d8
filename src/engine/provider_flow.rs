//! `handleProviderCallback` (spec.md §4.9.3).

use super::AuthorizationEngine;
use crate::error::{IndieAuthError, IndieAuthErrorCode};

/// Outcome of a provider OAuth callback. Both variants carry the
/// `sessionId` the frontend consent page is keyed by; `warning` surfaces
/// the "reciprocal link missing" case, which does not abort the flow.
#[derive(Debug, Clone)]
pub struct ProviderCallbackResult {
    pub session_id: String,
    pub warning: Option<String>,
}

impl AuthorizationEngine {
    pub async fn handle_provider_callback(
        &self,
        provider_type: &str,
        provider_code: &str,
        provider_state: &str,
    ) -> Result<ProviderCallbackResult, IndieAuthError> {
        // 1. locate session by providerState
        let Some(mut pending) = self.find_by_provider_state(provider_state).await else {
            return Err(IndieAuthError::new(
                IndieAuthErrorCode::AccessDenied,
                "no pending authentication matches this callback".to_string(),
            ));
        };
        if pending.selected_provider_type.as_deref() != Some(provider_type) {
            return Err(IndieAuthError::new(
                IndieAuthErrorCode::AccessDenied,
                "callback provider does not match the session's selected provider".to_string(),
            ));
        }

        let Some(provider) = self.provider_registry.get_provider(provider_type) else {
            return Err(IndieAuthError::new(IndieAuthErrorCode::ServerError, "provider is not configured".to_string()));
        };

        let redirect_uri = format!("{}/callback/{}", self.config.issuer(), provider.provider_type());

        // 2. exchange code
        let exchanged = provider.exchange_code(&self.http_client, provider_code, &redirect_uri).await.map_err(|e| {
            IndieAuthError::new(IndieAuthErrorCode::AccessDenied, format!("failed to complete sign-in: {e}"))
        })?;

        // 3. verify identity
        let Some(matched) = pending.discovered_providers.iter().find(|p| p.provider_type == provider_type) else {
            return Err(IndieAuthError::new(
                IndieAuthErrorCode::ServerError,
                "selected provider has no matching discovered account".to_string(),
            ));
        };
        let expected_username = matched.username.clone();

        let verified = provider
            .verify(&self.http_client, &exchanged.access_token, &expected_username, &pending.profile_url)
            .await
            .map_err(|_| IndieAuthError::new(IndieAuthErrorCode::AccessDenied, "verification_failed".to_string()))?;

        if !verified.username.eq_ignore_ascii_case(&expected_username) {
            return Err(IndieAuthError::new(IndieAuthErrorCode::AccessDenied, "verification_failed".to_string()));
        }

        let warning = (!verified.reciprocal_verified)
            .then(|| "the provider account does not link back to this profile".to_string());

        // 4. mark authenticated, single-use providerState
        pending.is_authenticated = true;
        pending.provider_state = None;
        self.pending_repo.update(pending.clone()).await;

        Ok(ProviderCallbackResult { session_id: pending.session_id, warning })
    }

    async fn find_by_provider_state(&self, provider_state: &str) -> Option<crate::repository::PendingAuthentication> {
        self.pending_repo.find_by_provider_state(provider_state).await
    }
}
