//! Profile Discovery (spec.md §4.5).

use crate::microformats;
use crate::providers::{DiscoveredProvider, ProviderRegistry};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileDiscoveryError {
    #[error("network error fetching profile")]
    Network,
    #[error("profile server returned a non-2xx status")]
    NonSuccessStatus,
    #[error("no rel=\"me\" links found on profile")]
    NoRelMeLinks,
    #[error("no configured identity provider recognized any rel=\"me\" link")]
    NoProviderMatch,
}

#[derive(Debug, Clone)]
pub struct ProfileDiscoveryResult {
    pub profile_url: String,
    pub providers: Vec<DiscoveredProvider>,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
}

/// Adds `https://` when the scheme is missing, and strips a trailing
/// slash from a non-root path (spec.md §4.5 step 1). Host lowercasing is
/// handled by `url::Url` itself.
fn normalize(raw: &str) -> Option<Url> {
    let with_scheme = if raw.contains("://") { raw.to_string() } else { format!("https://{raw}") };
    let mut url = Url::parse(&with_scheme).ok()?;
    if url.path().len() > 1 && url.path().ends_with('/') {
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }
    Some(url)
}

/// Parses the `Link` response header for `rel="authorization_endpoint"`
/// and `rel="token_endpoint"` entries, which take precedence over
/// in-HTML rel links (spec.md §4.5 step 3).
fn parse_link_header(header_value: &str) -> (Option<String>, Option<String>) {
    let mut authorization_endpoint = None;
    let mut token_endpoint = None;

    for entry in header_value.split(',') {
        let mut url_part = None;
        let mut rel_part = None;
        for segment in entry.split(';').map(str::trim) {
            if segment.starts_with('<') && segment.ends_with('>') {
                url_part = Some(segment.trim_start_matches('<').trim_end_matches('>').to_string());
            } else if let Some(rel) = segment.strip_prefix("rel=") {
                rel_part = Some(rel.trim_matches('"').to_string());
            }
        }
        if let (Some(url), Some(rel)) = (url_part, rel_part) {
            match rel.as_str() {
                "authorization_endpoint" => authorization_endpoint.get_or_insert(url),
                "token_endpoint" => token_endpoint.get_or_insert(url),
                _ => continue,
            };
        }
    }

    (authorization_endpoint, token_endpoint)
}

pub async fn discover_profile(
    client: &reqwest::Client,
    registry: &ProviderRegistry,
    raw_profile_url: &str,
) -> Result<ProfileDiscoveryResult, ProfileDiscoveryError> {
    let normalized = normalize(raw_profile_url).ok_or(ProfileDiscoveryError::Network)?;
    let profile_url = normalized.to_string();

    let response = client
        .get(normalized)
        .header("Accept", "text/html")
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|_| ProfileDiscoveryError::Network)?;

    if !response.status().is_success() {
        return Err(ProfileDiscoveryError::NonSuccessStatus);
    }

    let (header_authorization_endpoint, header_token_endpoint) = response
        .headers()
        .get("Link")
        .and_then(|v| v.to_str().ok())
        .map(parse_link_header)
        .unwrap_or((None, None));

    let body = response.text().await.map_err(|_| ProfileDiscoveryError::Network)?;
    let parsed = microformats::parse(&body, &profile_url);

    if parsed.rel_me_links.is_empty() {
        return Err(ProfileDiscoveryError::NoRelMeLinks);
    }

    let mut providers = Vec::new();
    for rel_me_link in &parsed.rel_me_links {
        if let Some((provider, matched)) = registry.get_provider_for_url(rel_me_link) {
            providers.push(DiscoveredProvider {
                provider_type: provider.provider_type().to_string(),
                profile_url: rel_me_link.clone(),
                username: matched.username,
                display_name: provider.display_name().to_string(),
                icon_url: provider.icon_url().to_string(),
            });
        }
    }

    if providers.is_empty() {
        return Err(ProfileDiscoveryError::NoProviderMatch);
    }

    Ok(ProfileDiscoveryResult {
        profile_url,
        providers,
        authorization_endpoint: header_authorization_endpoint.or(parsed.authorization_endpoint),
        token_endpoint: header_token_endpoint.or(parsed.token_endpoint),
    })
}
