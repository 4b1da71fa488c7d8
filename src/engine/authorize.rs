//! `createAuthorization` (spec.md §4.9.1) and `grantConsent` (spec.md
//! §4.9.4) — the two halves of the authorization-request side of the
//! protocol.

use super::{fetch_client_info, random_opaque_token, AuthorizationEngine};
use crate::discovery;
use crate::error::{IndieAuthError, IndieAuthErrorCode};
use crate::repository::{DiscoveredProviderRecord, PendingAuthentication};
use crate::validation;
use chrono::{Duration, Utc};

const SESSION_ID_BYTES: usize = 16; // 128 bits
const PROVIDER_STATE_BYTES: usize = 16;

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub scope: Option<String>,
    pub me: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CreateAuthorizationOutcome {
    /// `redirect_target` is `Some((redirect_uri, state))` whenever
    /// `error.redirect_uri_untrusted` is false — the caller MUST redirect
    /// there with the error appended as query parameters rather than
    /// rendering an error page (spec.md §6 "Authorization error response").
    Error { error: IndieAuthError, redirect_target: Option<(String, String)> },
    /// `me` was omitted; the caller should render the enter-profile form.
    EnterProfile {
        request: AuthorizationRequest,
        client_name: Option<String>,
        client_logo_uri: Option<String>,
    },
    /// Exactly one provider matched; redirect straight into its OAuth flow.
    RedirectToProvider { session_id: String, authorization_url: String },
    /// More than one provider matched; let the user pick.
    RedirectToProviderSelection { session_id: String },
}

impl AuthorizationEngine {
    pub async fn create_authorization(&self, request: AuthorizationRequest) -> CreateAuthorizationOutcome {
        use CreateAuthorizationOutcome::*;

        // 1. response_type
        if request.response_type != "code" {
            return Error {
                error: IndieAuthError::untrusted_redirect(
                    IndieAuthErrorCode::UnsupportedResponseType,
                    "response_type must be \"code\"".to_string(),
                ),
                redirect_target: None,
            };
        }

        // 2. client_id
        if request.client_id.is_empty() || !validation::is_valid_client_id(&request.client_id) {
            return Error {
                error: IndieAuthError::untrusted_redirect(
                    IndieAuthErrorCode::InvalidRequest,
                    "client_id is missing or invalid".to_string(),
                ),
                redirect_target: None,
            };
        }

        // 3. redirect_uri
        if request.redirect_uri.is_empty() {
            return Error {
                error: IndieAuthError::untrusted_redirect(
                    IndieAuthErrorCode::InvalidRequest,
                    "redirect_uri is missing".to_string(),
                ),
                redirect_target: None,
            };
        }
        if validation::has_dangerous_scheme(&request.redirect_uri) {
            return Error {
                error: IndieAuthError::untrusted_redirect(
                    IndieAuthErrorCode::InvalidRequest,
                    "redirect_uri has a disallowed scheme".to_string(),
                ),
                redirect_target: None,
            };
        }
        let mut client_info = None;
        if !validation::is_valid_redirect_uri(&request.redirect_uri, &request.client_id) {
            let info = fetch_client_info(&self.http_client, &request.client_id).await;
            let accepted = info.was_fetched
                && validation::is_redirect_uri_in_published_list(&request.redirect_uri, &info.redirect_uris);
            if !accepted {
                return Error {
                    error: IndieAuthError::untrusted_redirect(
                        IndieAuthErrorCode::InvalidRequest,
                        "redirect_uri is not valid for this client_id".to_string(),
                    ),
                    redirect_target: None,
                };
            }
            client_info = Some(info);
        }

        // from here on, redirect_uri is trusted: later errors redirect there.
        let redirect_target = Some((request.redirect_uri.clone(), request.state.clone()));

        // 4. state (non-empty; >=8 chars is advisory only, not enforced)
        if request.state.is_empty() {
            return Error {
                error: IndieAuthError::new(IndieAuthErrorCode::InvalidRequest, "state is missing".to_string()),
                redirect_target,
            };
        }

        // 5. PKCE parameters
        if request.code_challenge.is_empty() || request.code_challenge_method != "S256" {
            return Error {
                error: IndieAuthError::new(
                    IndieAuthErrorCode::InvalidRequest,
                    "code_challenge is missing or code_challenge_method is not S256".to_string(),
                ),
                redirect_target,
            };
        }

        // 6. me omitted -> enter-profile
        let me = match &request.me {
            Some(me) if !me.is_empty() => me.clone(),
            _ => {
                if client_info.is_none() {
                    client_info = Some(fetch_client_info(&self.http_client, &request.client_id).await);
                }
                let info = client_info.unwrap_or_else(|| discovery::ClientInfo {
                    client_id: request.client_id.clone(),
                    client_name: None,
                    client_uri: None,
                    logo_uri: None,
                    redirect_uris: Vec::new(),
                    was_fetched: false,
                });
                return EnterProfile {
                    client_name: info.client_name,
                    client_logo_uri: info.logo_uri,
                    request,
                };
            }
        };

        // 7. isValidProfileUrl
        if !validation::is_valid_profile_url(&me) {
            return Error {
                error: IndieAuthError::new(IndieAuthErrorCode::InvalidRequest, "me is not a valid profile URL".to_string()),
                redirect_target,
            };
        }

        // 8. allowedProfileHosts
        if !self.config.allowed_profile_hosts.is_empty() {
            let host = url::Url::parse(&me).ok().and_then(|u| u.host_str().map(str::to_string));
            let allowed = host.is_some_and(|h| {
                self.config.allowed_profile_hosts.iter().any(|allowed_host| allowed_host.eq_ignore_ascii_case(&h))
            });
            if !allowed {
                return Error {
                    error: IndieAuthError::new(
                        IndieAuthErrorCode::AccessDenied,
                        "this profile is not permitted to authenticate here".to_string(),
                    ),
                    redirect_target,
                };
            }
        }

        // 9. Profile Discovery
        let discovery_result =
            match discovery::discover_profile(&self.http_client, &self.provider_registry, &me).await {
                Ok(result) => result,
                Err(err) => {
                    return Error {
                        error: IndieAuthError::new(IndieAuthErrorCode::InvalidRequest, err.to_string()),
                        redirect_target,
                    };
                }
            };

        // 10. client metadata, if not already fetched above
        if client_info.is_none() {
            client_info = Some(fetch_client_info(&self.http_client, &request.client_id).await);
        }
        let client_info = client_info.expect("fetched above");

        let scopes: Vec<String> =
            request.scope.as_deref().map(|s| s.split_whitespace().map(str::to_string).collect()).unwrap_or_default();

        // 11. persist PendingAuthentication
        let session_id = random_opaque_token(SESSION_ID_BYTES);
        let now = Utc::now();
        let providers: Vec<DiscoveredProviderRecord> = discovery_result
            .providers
            .iter()
            .map(|p| DiscoveredProviderRecord {
                provider_type: p.provider_type.clone(),
                profile_url: p.profile_url.clone(),
                username: p.username.clone(),
                display_name: p.display_name.clone(),
                icon_url: p.icon_url.clone(),
            })
            .collect();

        let mut pending = PendingAuthentication {
            session_id: session_id.clone(),
            client_id: request.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
            state: request.state.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
            scopes,
            profile_url: discovery_result.profile_url.clone(),
            discovered_providers: providers.clone(),
            selected_provider_type: None,
            provider_state: None,
            client_name: client_info.client_name.clone(),
            client_logo_uri: client_info.logo_uri.clone(),
            is_authenticated: false,
            is_consent_given: false,
            created_at: now,
            expires_at: now + Duration::minutes(self.config.pending_auth_ttl_minutes),
        };

        // 12. decide next hop
        if providers.len() == 1 {
            let provider_type = providers[0].provider_type.clone();
            let Some(provider) = self.provider_registry.get_provider(&provider_type) else {
                return Error {
                    error: IndieAuthError::new(
                        IndieAuthErrorCode::ServerError,
                        "selected provider is no longer configured".to_string(),
                    ),
                    redirect_target,
                };
            };
            let provider_state = random_opaque_token(PROVIDER_STATE_BYTES);
            pending.selected_provider_type = Some(provider_type);
            pending.provider_state = Some(provider_state.clone());
            self.pending_repo.create(pending).await;

            let callback_uri = format!("{}/callback/{}", self.config.issuer(), provider.provider_type());
            let authorization_url = provider.build_authorization_url(&provider_state, &callback_uri);
            RedirectToProvider { session_id, authorization_url }
        } else {
            self.pending_repo.create(pending).await;
            RedirectToProviderSelection { session_id }
        }
    }

    /// `selectProvider` (spec.md §4.9.2).
    pub async fn select_provider(&self, session_id: &str, provider_type: &str) -> Result<String, IndieAuthError> {
        let Some(mut pending) = self.pending_repo.read(session_id).await else {
            return Err(IndieAuthError::new(IndieAuthErrorCode::InvalidRequest, "session not found or expired".to_string()));
        };
        if !pending.discovered_providers.iter().any(|p| p.provider_type == provider_type) {
            return Err(IndieAuthError::new(
                IndieAuthErrorCode::InvalidRequest,
                "providerType was not discovered for this profile".to_string(),
            ));
        }
        let Some(provider) = self.provider_registry.get_provider(provider_type) else {
            return Err(IndieAuthError::new(IndieAuthErrorCode::ServerError, "provider is not configured".to_string()));
        };

        let provider_state = random_opaque_token(PROVIDER_STATE_BYTES);
        pending.selected_provider_type = Some(provider_type.to_string());
        pending.provider_state = Some(provider_state.clone());
        self.pending_repo.update(pending.clone()).await;

        let callback_uri = format!("{}/callback/{}", self.config.issuer(), provider.provider_type());
        Ok(provider.build_authorization_url(&provider_state, &callback_uri))
    }

    /// `grantConsent` (spec.md §4.9.4).
    pub async fn grant_consent(&self, session_id: &str, approved: bool) -> Result<String, IndieAuthError> {
        let Some(pending) = self.pending_repo.read(session_id).await else {
            return Err(IndieAuthError::new(IndieAuthErrorCode::InvalidRequest, "session not found or expired".to_string()));
        };
        if !pending.is_authenticated {
            return Err(IndieAuthError::new(
                IndieAuthErrorCode::AccessDenied,
                "identity has not been verified yet".to_string(),
            ));
        }

        let issuer = self.config.issuer();

        if !approved {
            self.pending_repo.delete(session_id).await;
            let mut redirect = url::Url::parse(&pending.redirect_uri)
                .map_err(|_| IndieAuthError::new(IndieAuthErrorCode::ServerError, "stored redirect_uri is invalid".to_string()))?;
            redirect
                .query_pairs_mut()
                .append_pair("error", "access_denied")
                .append_pair("state", &pending.state)
                .append_pair("iss", &issuer);
            return Ok(redirect.to_string());
        }

        use crate::repository::AuthorizationCode;
        let now = Utc::now();
        let code = random_opaque_token(24); // 192 bits
        let record = AuthorizationCode {
            code: code.clone(),
            client_id: pending.client_id.clone(),
            redirect_uri: pending.redirect_uri.clone(),
            profile_url: pending.profile_url.clone(),
            scopes: pending.scopes.clone(),
            code_challenge: pending.code_challenge.clone(),
            code_challenge_method: pending.code_challenge_method.clone(),
            created_at: now,
            expires_at: now + Duration::minutes(self.config.auth_code_ttl_minutes),
            is_used: false,
        };
        self.code_repo.create(record).await;
        self.pending_repo.delete(session_id).await;

        let mut redirect = url::Url::parse(&pending.redirect_uri)
            .map_err(|_| IndieAuthError::new(IndieAuthErrorCode::ServerError, "stored redirect_uri is invalid".to_string()))?;
        redirect
            .query_pairs_mut()
            .append_pair("code", &code)
            .append_pair("state", &pending.state)
            .append_pair("iss", &issuer);
        Ok(redirect.to_string())
    }
}
