//! Identity Provider Registry (spec.md §4.7).
//!
//! Re-architected away from the source's interface-dispatch providers
//! (spec.md §9): `Provider` is a closed, tagged sum of concrete provider
//! variants rather than a `dyn Trait` object. Adding a provider means
//! adding a variant, not registering a trait object at runtime — the set
//! is closed at compile time, matching "Registration is at startup; the
//! set is closed at runtime" (spec.md §4.7) in the stricter, compiler-
//! enforced sense.

pub mod github;
pub mod gitlab;

use crate::config::ProviderCredentials;
use std::collections::HashMap;
use thiserror::Error;

pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("upstream HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned an error: {0}")]
    Upstream(String),

    #[error("unexpected upstream response shape: {0}")]
    Shape(String),
}

/// A matched `rel="me"` link: the provider recognized the URL's shape and
/// extracted a username from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedProfile {
    pub username: String,
}

/// Result of trading an upstream authorization code for an access token
/// (spec.md §4.7 `exchangeCode`).
#[derive(Debug, Clone)]
pub struct ExchangedToken {
    pub access_token: String,
}

/// Result of verifying an upstream access token against the claimed
/// username and website (spec.md §4.7 `verify`).
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub username: String,
    pub profile_url: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub reciprocal_verified: bool,
}

/// A discovered candidate provider account for display in provider
/// selection UI (spec.md §3 `discoveredProviders`).
#[derive(Debug, Clone)]
pub struct DiscoveredProvider {
    pub provider_type: String,
    pub profile_url: String,
    pub username: String,
    pub display_name: String,
    pub icon_url: String,
}

/// Normalizes a URL's host+path for reciprocal-link comparison:
/// lowercase host, scheme stripped, trailing slash stripped — so
/// `HTTPS://Jane.Example.COM/` and `jane.example.com` compare equal.
pub fn normalize_for_reciprocal_match(url: &str) -> Option<String> {
    let with_scheme = if url.contains("://") { url.to_string() } else { format!("https://{url}") };
    let parsed = url::Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let path = parsed.path().trim_end_matches('/');
    Some(format!("{host}{path}"))
}

/// Scans free-text fields (an upstream profile's "website"/"bio" fields)
/// for a mention of the user's own website, tolerant of scheme and
/// trailing-slash differences (spec.md §4.7 `reciprocalVerified`).
pub fn text_mentions_website(fields: &[Option<&str>], website: &str) -> bool {
    let Some(target) = normalize_for_reciprocal_match(website) else { return false };
    fields.iter().flatten().any(|field| field.to_ascii_lowercase().contains(&target))
}

/// Tagged sum of the identity providers Talos knows how to delegate to.
#[derive(Debug, Clone)]
pub enum Provider {
    GitHub(GitHubProvider),
    GitLab(GitLabProvider),
}

impl Provider {
    pub fn provider_type(&self) -> &'static str {
        match self {
            Provider::GitHub(_) => "github",
            Provider::GitLab(_) => "gitlab",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::GitHub(_) => "GitHub",
            Provider::GitLab(_) => "GitLab",
        }
    }

    pub fn icon_url(&self) -> &'static str {
        match self {
            Provider::GitHub(_) => "https://github.com/favicon.ico",
            Provider::GitLab(_) => "https://gitlab.com/favicon.ico",
        }
    }

    pub fn match_profile_url(&self, url: &str) -> Option<MatchedProfile> {
        match self {
            Provider::GitHub(p) => p.match_profile_url(url),
            Provider::GitLab(p) => p.match_profile_url(url),
        }
    }

    pub fn build_authorization_url(&self, state: &str, redirect_uri: &str) -> String {
        match self {
            Provider::GitHub(p) => p.build_authorization_url(state, redirect_uri),
            Provider::GitLab(p) => p.build_authorization_url(state, redirect_uri),
        }
    }

    pub async fn exchange_code(
        &self,
        client: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ExchangedToken, ProviderError> {
        match self {
            Provider::GitHub(p) => p.exchange_code(client, code, redirect_uri).await,
            Provider::GitLab(p) => p.exchange_code(client, code, redirect_uri).await,
        }
    }

    pub async fn verify(
        &self,
        client: &reqwest::Client,
        access_token: &str,
        expected_username: &str,
        user_website_url: &str,
    ) -> Result<VerifiedIdentity, ProviderError> {
        match self {
            Provider::GitHub(p) => p.verify(client, access_token, expected_username, user_website_url).await,
            Provider::GitLab(p) => p.verify(client, access_token, expected_username, user_website_url).await,
        }
    }
}

/// The closed set of configured providers, keyed by `providerType`.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Provider>,
}

impl ProviderRegistry {
    pub fn from_credentials(credentials: &HashMap<String, ProviderCredentials>) -> Self {
        let mut providers = HashMap::new();
        if let Some(creds) = credentials.get("github") {
            providers.insert(
                "github",
                Provider::GitHub(GitHubProvider::new(creds.client_id.clone(), creds.client_secret.clone())),
            );
        }
        if let Some(creds) = credentials.get("gitlab") {
            providers.insert(
                "gitlab",
                Provider::GitLab(GitLabProvider::new(creds.client_id.clone(), creds.client_secret.clone())),
            );
        }
        Self { providers }
    }

    pub fn get_provider(&self, provider_type: &str) -> Option<&Provider> {
        self.providers.get(provider_type)
    }

    /// Returns the first registered provider whose URL pattern matches
    /// `url`, along with the extracted username.
    pub fn get_provider_for_url(&self, url: &str) -> Option<(&Provider, MatchedProfile)> {
        // Iteration order over a HashMap isn't significant here: at most
        // one provider's URL pattern should ever match a given host.
        self.providers.values().find_map(|p| p.match_profile_url(url).map(|m| (p, m)))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_scheme_and_trailing_slash() {
        assert_eq!(
            normalize_for_reciprocal_match("https://Jane.Example.com/"),
            normalize_for_reciprocal_match("jane.example.com")
        );
    }

    #[test]
    fn text_mentions_website_is_case_insensitive() {
        let fields = vec![Some("Check out HTTPS://JANE.EXAMPLE.COM/ for more")];
        assert!(text_mentions_website(&fields, "https://jane.example.com/"));
    }
}
