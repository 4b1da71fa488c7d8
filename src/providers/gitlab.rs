//! GitLab identity provider (spec.md §4.7). Targets gitlab.com only — a
//! self-hosted GitLab instance is indistinguishable from an arbitrary
//! site to the URL matcher alone, so it is out of scope here.

use super::{ExchangedToken, MatchedProfile, ProviderError, VerifiedIdentity};
use serde::Deserialize;
use url::Url;

const AUTHORIZE_URL: &str = "https://gitlab.com/oauth/authorize";
const TOKEN_URL: &str = "https://gitlab.com/oauth/token";
const USER_API_URL: &str = "https://gitlab.com/api/v4/user";

const RESERVED_PATHS: &[&str] = &["dashboard", "explore", "help", "groups", "projects", "-", "users"];

#[derive(Debug, Clone)]
pub struct GitLabProvider {
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserResponse {
    username: String,
    name: Option<String>,
    avatar_url: Option<String>,
    website_url: Option<String>,
    bio: Option<String>,
}

impl GitLabProvider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self { client_id, client_secret }
    }

    pub fn match_profile_url(&self, url: &str) -> Option<MatchedProfile> {
        let parsed = Url::parse(url).ok()?;
        if parsed.host_str() != Some("gitlab.com") {
            return None;
        }
        let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());
        let username = segments.next()?;
        if segments.next().is_some() {
            return None;
        }
        if RESERVED_PATHS.contains(&username) {
            return None;
        }
        Some(MatchedProfile { username: username.to_string() })
    }

    pub fn build_authorization_url(&self, state: &str, redirect_uri: &str) -> String {
        let mut url = Url::parse(AUTHORIZE_URL).expect("static URL");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "read_user")
            .append_pair("state", state);
        url.to_string()
    }

    pub async fn exchange_code(
        &self,
        client: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ExchangedToken, ProviderError> {
        let response = client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Upstream(format!("gitlab token endpoint returned {}", response.status())));
        }

        let body: TokenResponse =
            response.json().await.map_err(|e| ProviderError::Shape(e.to_string()))?;
        Ok(ExchangedToken { access_token: body.access_token })
    }

    pub async fn verify(
        &self,
        client: &reqwest::Client,
        access_token: &str,
        expected_username: &str,
        user_website_url: &str,
    ) -> Result<VerifiedIdentity, ProviderError> {
        let response = client.get(USER_API_URL).bearer_auth(access_token).send().await?;

        if !response.status().is_success() {
            return Err(ProviderError::Upstream(format!("gitlab user endpoint returned {}", response.status())));
        }

        let user: UserResponse = response.json().await.map_err(|e| ProviderError::Shape(e.to_string()))?;

        if !user.username.eq_ignore_ascii_case(expected_username) {
            return Err(ProviderError::Upstream("authenticated GitLab user does not match claimed username".into()));
        }

        let reciprocal_verified = super::text_mentions_website(
            &[user.website_url.as_deref(), user.bio.as_deref()],
            user_website_url,
        );

        Ok(VerifiedIdentity {
            username: user.username.clone(),
            profile_url: format!("https://gitlab.com/{}", user.username),
            display_name: user.name,
            avatar_url: user.avatar_url,
            reciprocal_verified,
        })
    }
}
