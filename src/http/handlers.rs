//! Axum handlers for the endpoints in spec.md §6. Each one is a thin
//! translation layer: decode the request, call into the engine, shape
//! the response. No protocol logic lives here.

use crate::engine::{AuthorizationRequest, CreateAuthorizationOutcome};
use crate::error::{unauthorized_response, IndieAuthError, IndieAuthErrorCode};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: Option<String>,
    pub me: Option<String>,
}

impl From<AuthQuery> for AuthorizationRequest {
    fn from(q: AuthQuery) -> Self {
        AuthorizationRequest {
            response_type: q.response_type.unwrap_or_default(),
            client_id: q.client_id.unwrap_or_default(),
            redirect_uri: q.redirect_uri.unwrap_or_default(),
            state: q.state.unwrap_or_default(),
            code_challenge: q.code_challenge.unwrap_or_default(),
            code_challenge_method: q.code_challenge_method.unwrap_or_default(),
            scope: q.scope,
            me: q.me,
        }
    }
}

/// `GET /auth` (spec.md §4.9.1).
pub async fn get_auth(State(state): State<AppState>, Query(query): Query<AuthQuery>) -> Response {
    let outcome = state.engine.create_authorization(query.into()).await;

    match outcome {
        CreateAuthorizationOutcome::Error { error, redirect_target: Some((redirect_uri, request_state)) } => {
            redirect_with_error(&redirect_uri, &request_state, &error)
        }
        CreateAuthorizationOutcome::Error { error, redirect_target: None } => error.into_response(),
        CreateAuthorizationOutcome::EnterProfile { request, client_name, client_logo_uri } => {
            let mut url = format!("{}/enter-profile?client_id={}", state.frontend_base_url(), encode(&request.client_id));
            url.push_str(&format!(
                "&redirect_uri={}&state={}&code_challenge={}&code_challenge_method={}",
                encode(&request.redirect_uri),
                encode(&request.state),
                encode(&request.code_challenge),
                encode(&request.code_challenge_method),
            ));
            if let Some(scope) = &request.scope {
                url.push_str(&format!("&scope={}", encode(scope)));
            }
            if let Some(name) = &client_name {
                url.push_str(&format!("&client_name={}", encode(name)));
            }
            if let Some(logo) = &client_logo_uri {
                url.push_str(&format!("&client_logo_uri={}", encode(logo)));
            }
            Redirect::to(&url).into_response()
        }
        CreateAuthorizationOutcome::RedirectToProvider { authorization_url, .. } => {
            Redirect::to(&authorization_url).into_response()
        }
        CreateAuthorizationOutcome::RedirectToProviderSelection { session_id } => {
            Redirect::to(&format!("{}/select-provider?session_id={}", state.frontend_base_url(), session_id))
                .into_response()
        }
    }
}

fn redirect_with_error(redirect_uri: &str, request_state: &str, error: &IndieAuthError) -> Response {
    let Ok(mut url) = url::Url::parse(redirect_uri) else {
        return error.clone().into_response();
    };
    url.query_pairs_mut()
        .append_pair("error", error.code.as_str())
        .append_pair("error_description", &error.description)
        .append_pair("state", request_state);
    Redirect::to(url.as_str()).into_response()
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[derive(Debug, Deserialize)]
pub struct SelectProviderForm {
    pub session_id: String,
    pub provider_type: String,
}

/// `POST /select-provider` — frontend-facing; not listed in spec.md §6's
/// endpoint table because the front-end SPA itself is out of scope, but
/// the SPA needs some API surface to drive `selectProvider` (§4.9.2).
pub async fn post_select_provider(State(state): State<AppState>, Json(form): Json<SelectProviderForm>) -> Response {
    match state.engine.select_provider(&form.session_id, &form.provider_type).await {
        Ok(authorization_url) => Json(json!({ "authorization_url": authorization_url })).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ConsentForm {
    pub session_id: String,
    pub approved: bool,
}

/// `POST /consent` — frontend-facing counterpart to `grantConsent` (§4.9.4).
pub async fn post_consent(State(state): State<AppState>, Json(form): Json<ConsentForm>) -> Response {
    match state.engine.grant_consent(&form.session_id, form.approved).await {
        Ok(redirect_url) => Json(json!({ "redirect_url": redirect_url })).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthCodeExchangeForm {
    pub grant_type: String,
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub code_verifier: String,
}

#[derive(Serialize)]
struct MeResponse {
    me: String,
}

/// `POST /auth` (spec.md §4.9.7): authentication-only code exchange.
pub async fn post_auth(State(state): State<AppState>, axum::Form(form): axum::Form<AuthCodeExchangeForm>) -> Response {
    if form.grant_type != "authorization_code" {
        return IndieAuthError::new(IndieAuthErrorCode::UnsupportedGrantType, "grant_type must be authorization_code")
            .into_response();
    }

    match state
        .engine
        .redeem_code_for_authentication(&form.code, &form.client_id, &form.redirect_uri, &form.code_verifier)
        .await
    {
        Ok(me) => Json(MeResponse { me }).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenGrantForm {
    pub grant_type: String,
    pub code: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
struct TokenSuccessBody {
    access_token: String,
    token_type: &'static str,
    expires_in: i64,
    refresh_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    me: String,
}

/// `POST /token` (spec.md §4.9.6, §4.9.8).
pub async fn post_token(State(state): State<AppState>, axum::Form(form): axum::Form<TokenGrantForm>) -> Response {
    let outcome = match form.grant_type.as_str() {
        "authorization_code" => {
            let (Some(code), Some(client_id), Some(redirect_uri), Some(code_verifier)) =
                (form.code, form.client_id, form.redirect_uri, form.code_verifier)
            else {
                return IndieAuthError::new(IndieAuthErrorCode::InvalidRequest, "missing required parameters")
                    .into_response();
            };
            state.engine.grant_authorization_code(&code, &client_id, &redirect_uri, &code_verifier).await
        }
        "refresh_token" => {
            let (Some(client_id), Some(refresh_token)) = (form.client_id, form.refresh_token) else {
                return IndieAuthError::new(IndieAuthErrorCode::InvalidRequest, "missing required parameters")
                    .into_response();
            };
            state.engine.grant_refresh_token(&client_id, &refresh_token).await
        }
        other => {
            return IndieAuthError::new(
                IndieAuthErrorCode::UnsupportedGrantType,
                format!("unsupported grant_type: {other}"),
            )
            .into_response();
        }
    };

    match outcome {
        Ok(grant) => Json(TokenSuccessBody {
            access_token: grant.access_token,
            token_type: grant.token_type,
            expires_in: grant.expires_in,
            refresh_token: grant.refresh_token,
            scope: grant.scope,
            me: grant.me,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RevokeForm {
    pub token: String,
}

/// `POST /token/revoke` (spec.md §4.9.9). Always 200.
pub async fn post_revoke(State(state): State<AppState>, axum::Form(form): axum::Form<RevokeForm>) -> Response {
    state.engine.revoke_token(&form.token).await;
    StatusCode::OK.into_response()
}

#[derive(Debug, Deserialize)]
pub struct IntrospectForm {
    pub token: String,
}

#[derive(Serialize)]
struct IntrospectionBody {
    active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    me: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
}

/// `POST /token/introspect` (spec.md §4.9.10). Never logs the bearer
/// secret or the token under introspection (spec.md §7).
pub async fn post_introspect(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Form(form): axum::Form<IntrospectForm>,
) -> Response {
    let bearer = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !state.engine.authorize_introspection(bearer) {
        return unauthorized_response();
    }

    let result = state.engine.introspect_access_token(&form.token);
    Json(IntrospectionBody {
        active: result.active,
        me: result.me,
        client_id: result.client_id,
        scope: result.scope,
        exp: result.exp,
        iat: result.iat,
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// `GET /callback/{providerType}` (spec.md §4.9.3).
pub async fn get_provider_callback(
    State(state): State<AppState>,
    Path(provider_type): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    match state.engine.handle_provider_callback(&provider_type, &query.code, &query.state).await {
        Ok(result) => {
            let mut url = format!("{}/consent?session_id={}", state.frontend_base_url(), result.session_id);
            if let Some(warning) = result.warning {
                url.push_str(&format!("&warning={}", encode(&warning)));
            }
            Redirect::to(&url).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// `GET /.well-known/oauth-authorization-server` (spec.md §6).
pub async fn get_metadata(State(state): State<AppState>) -> Response {
    let issuer = state.config.issuer();
    Json(json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/auth"),
        "token_endpoint": format!("{issuer}/token"),
        "introspection_endpoint": format!("{issuer}/token/introspect"),
        "revocation_endpoint": format!("{issuer}/token/revoke"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256"],
        "scopes_supported": ["profile", "email"],
        "authorization_response_iss_parameter_supported": true,
        "introspection_endpoint_auth_methods_supported": ["Bearer"],
    }))
    .into_response()
}

pub async fn get_healthz() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}
