//! End-to-end scenarios from spec.md §8, driven directly against
//! `AuthorizationEngine`. Profile/Client Discovery are exercised over a
//! real `wiremock` server where the URL shape allows it (client_id has
//! no port restriction); the rest of each scenario seeds repository
//! state directly the way a completed provider OAuth round trip would
//! have left it, since the providers' endpoints are fixed hosts that
//! can't be redirected to a local mock.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use talos::config::{Config, JwtSettings, LoggingConfig, ProviderCredentials};
use talos::engine::{AuthorizationEngine, AuthorizationRequest, CreateAuthorizationOutcome};
use talos::providers::ProviderRegistry;
use talos::repository::memory::{
    InMemoryAuthorizationCodeRepository, InMemoryPendingAuthenticationRepository, InMemoryRefreshTokenRepository,
};
use talos::repository::{
    AuthorizationCode, AuthorizationCodeRepository, DiscoveredProviderRecord, PendingAuthentication,
    PendingAuthenticationRepository, RefreshTokenRepository,
};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_SECRET: &str = "test-secret-at-least-32-bytes-long!!";
const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

struct Harness {
    engine: AuthorizationEngine,
    pending_repo: Arc<InMemoryPendingAuthenticationRepository>,
    code_repo: Arc<InMemoryAuthorizationCodeRepository>,
    refresh_repo: Arc<InMemoryRefreshTokenRepository>,
}

fn test_config(introspection_secret: Option<&str>) -> Arc<Config> {
    let mut providers = HashMap::new();
    providers.insert(
        "github".to_string(),
        ProviderCredentials { client_id: "gh-client-id".into(), client_secret: "gh-client-secret".into() },
    );

    Arc::new(Config {
        host: "127.0.0.1".into(),
        port: 0,
        base_url: "https://auth.example.com".into(),
        jwt: JwtSettings { secret_key: TEST_SECRET.to_string(), access_token_ttl_minutes: 15 },
        auth_code_ttl_minutes: 10,
        refresh_token_ttl_days: 30,
        pending_auth_ttl_minutes: 30,
        allowed_profile_hosts: Vec::new(),
        introspection_secret: introspection_secret.map(str::to_string),
        providers,
        logging: LoggingConfig::default(),
    })
}

async fn build_harness(introspection_secret: Option<&str>) -> Harness {
    // Plain client: the engine's production wiring uses the SSRF-guarded
    // resolver, which would also block the loopback wiremock servers used
    // in these tests.
    build_harness_with_client(introspection_secret, reqwest::Client::new()).await
}

async fn build_harness_with_client(introspection_secret: Option<&str>, http_client: reqwest::Client) -> Harness {
    let config = test_config(introspection_secret);
    let token_service = talos::token::TokenService::new(
        TEST_SECRET.as_bytes(),
        config.issuer(),
        Duration::minutes(config.jwt.access_token_ttl_minutes),
    )
    .unwrap();
    let provider_registry = ProviderRegistry::from_credentials(&config.providers);

    let pending_repo = Arc::new(InMemoryPendingAuthenticationRepository::default());
    let code_repo = Arc::new(InMemoryAuthorizationCodeRepository::default());
    let refresh_repo = Arc::new(InMemoryRefreshTokenRepository::default());

    let pending_dyn: Arc<dyn PendingAuthenticationRepository> = pending_repo.clone();
    let code_dyn: Arc<dyn AuthorizationCodeRepository> = code_repo.clone();
    let refresh_dyn: Arc<dyn RefreshTokenRepository> = refresh_repo.clone();

    let engine = AuthorizationEngine::new(
        config,
        token_service,
        provider_registry,
        http_client,
        pending_dyn,
        code_dyn,
        refresh_dyn,
    );

    Harness { engine, pending_repo, code_repo, refresh_repo }
}

fn authenticated_session(scopes: Vec<&str>) -> PendingAuthentication {
    let now = Utc::now();
    PendingAuthentication {
        session_id: "sess-1".into(),
        client_id: "https://app.example.com/".into(),
        redirect_uri: "https://app.example.com/cb".into(),
        state: "abc12345".into(),
        code_challenge: CHALLENGE.into(),
        code_challenge_method: "S256".into(),
        scopes: scopes.into_iter().map(str::to_string).collect(),
        profile_url: "https://jane.example.com/".into(),
        discovered_providers: vec![DiscoveredProviderRecord {
            provider_type: "github".into(),
            profile_url: "https://github.com/janedoe".into(),
            username: "janedoe".into(),
            display_name: "Jane Doe".into(),
            icon_url: "https://github.com/favicon.ico".into(),
        }],
        selected_provider_type: Some("github".into()),
        provider_state: None,
        client_name: None,
        client_logo_uri: None,
        is_authenticated: true,
        is_consent_given: false,
        created_at: now,
        expires_at: now + Duration::minutes(30),
    }
}

/// Scenario 1: happy path, single provider, scoped grant.
#[tokio::test]
async fn happy_path_single_provider_issues_tokens() {
    let h = build_harness(None).await;
    h.pending_repo.create(authenticated_session(vec!["profile"])).await;

    let redirect = h.engine.grant_consent("sess-1", true).await.unwrap();
    let redirect_url = url::Url::parse(&redirect).unwrap();
    let pairs: HashMap<_, _> = redirect_url.query_pairs().into_owned().collect();
    assert_eq!(pairs.get("state").unwrap(), "abc12345");
    assert_eq!(pairs.get("iss").unwrap(), "https://auth.example.com");
    let code = pairs.get("code").unwrap().clone();

    let outcome = h
        .engine
        .grant_authorization_code(&code, "https://app.example.com/", "https://app.example.com/cb", VERIFIER)
        .await
        .unwrap();

    assert_eq!(outcome.token_type, "Bearer");
    assert_eq!(outcome.scope.as_deref(), Some("profile"));
    assert_eq!(outcome.me, "https://jane.example.com/");
    assert!(!outcome.access_token.is_empty());
    assert!(!outcome.refresh_token.is_empty());

    // the code is single-use
    let second =
        h.engine.grant_authorization_code(&code, "https://app.example.com/", "https://app.example.com/cb", VERIFIER).await;
    assert!(second.is_err());
}

/// Scenario 2: authentication-only grant (no scope) cannot be redeemed
/// at the token endpoint.
#[tokio::test]
async fn authentication_only_code_rejected_at_token_endpoint() {
    let h = build_harness(None).await;
    h.pending_repo.create(authenticated_session(vec![])).await;

    let redirect = h.engine.grant_consent("sess-1", true).await.unwrap();
    let code = url::Url::parse(&redirect).unwrap().query_pairs().into_owned().find(|(k, _)| k == "code").unwrap().1;

    let me = h
        .engine
        .redeem_code_for_authentication(&code, "https://app.example.com/", "https://app.example.com/cb", VERIFIER)
        .await
        .unwrap();
    assert_eq!(me, "https://jane.example.com/");

    // single-use: a second redemption of the same code fails outright
    let second = h
        .engine
        .redeem_code_for_authentication(&code, "https://app.example.com/", "https://app.example.com/cb", VERIFIER)
        .await;
    assert!(second.is_err());
}

/// Scenario 3: PKCE verifier mismatch.
#[tokio::test]
async fn pkce_mismatch_is_rejected() {
    let h = build_harness(None).await;
    h.pending_repo.create(authenticated_session(vec!["profile"])).await;

    let redirect = h.engine.grant_consent("sess-1", true).await.unwrap();
    let code = url::Url::parse(&redirect).unwrap().query_pairs().into_owned().find(|(k, _)| k == "code").unwrap().1;

    let result =
        h.engine.grant_authorization_code(&code, "https://app.example.com/", "https://app.example.com/cb", "wrong").await;
    let err = result.unwrap_err();
    assert_eq!(err.code.as_str(), "invalid_grant");
}

/// Scenario 4: a cross-origin redirect_uri not in the client's published
/// list must not be redirected to — the engine reports it as untrusted.
#[tokio::test]
async fn cross_origin_redirect_without_publication_is_untrusted() {
    let client_server = MockServer::start().await;
    let client_id = "http://client.talos-test.invalid/".to_string();
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "client_id": client_id,
            "redirect_uris": [format!("{client_id}cb")],
        })))
        .mount(&client_server)
        .await;

    let http_client = reqwest::Client::builder().resolve("client.talos-test.invalid", client_server.address().to_owned()).build().unwrap();
    let h = build_harness_with_client(None, http_client).await;

    let request = AuthorizationRequest {
        response_type: "code".into(),
        client_id: client_id.clone(),
        redirect_uri: "https://evil.example.com/cb".into(),
        state: "abc12345".into(),
        code_challenge: CHALLENGE.into(),
        code_challenge_method: "S256".into(),
        scope: None,
        me: None,
    };

    let outcome = h.engine.create_authorization(request).await;
    match outcome {
        CreateAuthorizationOutcome::Error { error, redirect_target } => {
            assert!(error.redirect_uri_untrusted);
            assert!(redirect_target.is_none());
        }
        other => panic!("expected an untrusted-redirect error, got {other:?}"),
    }
}

/// Scenario 5: refresh rotation invalidates the previous token.
#[tokio::test]
async fn refresh_rotation_invalidates_previous_token() {
    let h = build_harness(None).await;
    h.pending_repo.create(authenticated_session(vec!["profile"])).await;
    let redirect = h.engine.grant_consent("sess-1", true).await.unwrap();
    let code = url::Url::parse(&redirect).unwrap().query_pairs().into_owned().find(|(k, _)| k == "code").unwrap().1;
    let first =
        h.engine.grant_authorization_code(&code, "https://app.example.com/", "https://app.example.com/cb", VERIFIER).await.unwrap();

    let second = h.engine.grant_refresh_token("https://app.example.com/", &first.refresh_token).await.unwrap();
    assert_ne!(second.refresh_token, first.refresh_token);

    let reuse = h.engine.grant_refresh_token("https://app.example.com/", &first.refresh_token).await;
    assert!(reuse.is_err());
    assert_eq!(reuse.unwrap_err().code.as_str(), "invalid_grant");
}

/// Scenario 6: introspection requires the configured Bearer secret.
#[tokio::test]
async fn introspection_requires_bearer_secret() {
    let h = build_harness(Some("introspect-secret")).await;
    h.pending_repo.create(authenticated_session(vec!["profile"])).await;
    let redirect = h.engine.grant_consent("sess-1", true).await.unwrap();
    let code = url::Url::parse(&redirect).unwrap().query_pairs().into_owned().find(|(k, _)| k == "code").unwrap().1;
    let grant =
        h.engine.grant_authorization_code(&code, "https://app.example.com/", "https://app.example.com/cb", VERIFIER).await.unwrap();

    assert!(!h.engine.authorize_introspection(None));
    assert!(!h.engine.authorize_introspection(Some("Bearer wrong-secret")));
    assert!(h.engine.authorize_introspection(Some("Bearer introspect-secret")));

    let result = h.engine.introspect_access_token(&grant.access_token);
    assert!(result.active);
    assert_eq!(result.me.as_deref(), Some("https://jane.example.com/"));

    let inactive = h.engine.introspect_access_token("not-a-real-token");
    assert!(!inactive.active);
    assert!(inactive.me.is_none());
}

/// `deleteExpired` (spec.md §4.9.11) sweeps all three repositories.
#[tokio::test]
async fn cleanup_expired_removes_stale_records_across_all_repositories() {
    let h = build_harness(None).await;
    let mut stale_session = authenticated_session(vec!["profile"]);
    stale_session.expires_at = Utc::now() - Duration::minutes(1);
    h.pending_repo.create(stale_session).await;

    let now = Utc::now();
    h.code_repo
        .create(AuthorizationCode {
            code: "stale-code".into(),
            client_id: "https://app.example.com/".into(),
            redirect_uri: "https://app.example.com/cb".into(),
            profile_url: "https://jane.example.com/".into(),
            scopes: vec![],
            code_challenge: CHALLENGE.into(),
            code_challenge_method: "S256".into(),
            created_at: now - Duration::minutes(20),
            expires_at: now - Duration::minutes(10),
            is_used: false,
        })
        .await;

    let (sessions, codes, tokens) = h.engine.cleanup_expired().await;
    assert_eq!(sessions, 1);
    assert_eq!(codes, 1);
    assert_eq!(tokens, 0);
    assert!(h.pending_repo.read("sess-1").await.is_none());
    assert!(h.code_repo.read("stale-code").await.is_none());
}
