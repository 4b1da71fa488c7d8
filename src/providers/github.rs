//! GitHub identity provider (spec.md §4.7).

use super::{ExchangedToken, MatchedProfile, ProviderError, VerifiedIdentity};
use serde::Deserialize;
use url::Url;

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_API_URL: &str = "https://api.github.com/user";

/// Reserved top-level paths that are never usernames (spec.md §4.7
/// `matchProfileUrl` edge cases).
const RESERVED_PATHS: &[&str] =
    &["login", "settings", "explore", "marketplace", "notifications", "issues", "pulls", "orgs", "sponsors"];

#[derive(Debug, Clone)]
pub struct GitHubProvider {
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
    name: Option<String>,
    avatar_url: Option<String>,
    blog: Option<String>,
    bio: Option<String>,
}

impl GitHubProvider {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self { client_id, client_secret }
    }

    /// Recognizes `https://github.com/{username}` with no further path
    /// segments and a username that isn't a reserved GitHub route.
    pub fn match_profile_url(&self, url: &str) -> Option<MatchedProfile> {
        let parsed = Url::parse(url).ok()?;
        if parsed.host_str() != Some("github.com") {
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
            .append_pair("scope", "read:user")
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
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Upstream(format!("github token endpoint returned {}", response.status())));
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
        let response = client
            .get(USER_API_URL)
            .bearer_auth(access_token)
            .header("User-Agent", "talos-indieauth")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Upstream(format!("github user endpoint returned {}", response.status())));
        }

        let user: UserResponse = response.json().await.map_err(|e| ProviderError::Shape(e.to_string()))?;

        if !user.login.eq_ignore_ascii_case(expected_username) {
            return Err(ProviderError::Upstream("authenticated GitHub user does not match claimed username".into()));
        }

        let reciprocal_verified = super::text_mentions_website(
            &[user.blog.as_deref(), user.bio.as_deref()],
            user_website_url,
        );

        Ok(VerifiedIdentity {
            username: user.login.clone(),
            profile_url: format!("https://github.com/{}", user.login),
            display_name: user.name,
            avatar_url: user.avatar_url,
            reciprocal_verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GitHubProvider {
        GitHubProvider::new("id".into(), "secret".into())
    }

    #[test]
    fn matches_plain_profile_url() {
        let matched = provider().match_profile_url("https://github.com/janedoe").unwrap();
        assert_eq!(matched.username, "janedoe");
    }

    #[test]
    fn rejects_reserved_paths() {
        assert!(provider().match_profile_url("https://github.com/settings").is_none());
        assert!(provider().match_profile_url("https://github.com/login").is_none());
    }

    #[test]
    fn rejects_nested_paths() {
        assert!(provider().match_profile_url("https://github.com/janedoe/repo").is_none());
    }

    #[test]
    fn rejects_other_hosts() {
        assert!(provider().match_profile_url("https://gitlab.com/janedoe").is_none());
    }
}
