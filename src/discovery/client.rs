//! Client Discovery (spec.md §4.6).

use crate::microformats;
use serde::Deserialize;
use std::time::Duration;
use url::{Host, Url};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub client_id: String,
    pub client_name: Option<String>,
    pub client_uri: Option<String>,
    pub logo_uri: Option<String>,
    pub redirect_uris: Vec<String>,
    pub was_fetched: bool,
}

impl ClientInfo {
    fn unfetched(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_name: None,
            client_uri: None,
            logo_uri: None,
            redirect_uris: Vec::new(),
            was_fetched: false,
        }
    }
}

#[derive(Deserialize)]
struct ClientJsonDocument {
    client_id: String,
    client_name: Option<String>,
    client_uri: Option<String>,
    logo_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(d)) => d.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

pub async fn discover_client(client: &reqwest::Client, client_id: &str) -> ClientInfo {
    let Ok(parsed) = Url::parse(client_id) else { return ClientInfo::unfetched(client_id) };

    if is_loopback(&parsed) {
        return ClientInfo::unfetched(client_id);
    }

    let response = match client
        .get(parsed)
        .header("Accept", "application/json, text/html")
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => r,
        _ => return ClientInfo::unfetched(client_id),
    };

    let is_json = response
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let Ok(body) = response.text().await else { return ClientInfo::unfetched(client_id) };

    if is_json {
        parse_json_client_document(client_id, &body).unwrap_or_else(|| ClientInfo::unfetched(client_id))
    } else {
        let parsed_html = microformats::parse(&body, client_id);
        ClientInfo {
            client_id: client_id.to_string(),
            client_name: parsed_html.app_name,
            client_uri: parsed_html.app_url,
            logo_uri: parsed_html.app_logo_url,
            redirect_uris: Vec::new(),
            was_fetched: true,
        }
    }
}

fn parse_json_client_document(client_id: &str, body: &str) -> Option<ClientInfo> {
    let doc: ClientJsonDocument = serde_json::from_str(body).ok()?;

    if doc.client_id != client_id {
        return None;
    }
    if let Some(client_uri) = &doc.client_uri {
        if !client_id.starts_with(client_uri.as_str()) {
            return None;
        }
    }

    Some(ClientInfo {
        client_id: doc.client_id,
        client_name: doc.client_name,
        client_uri: doc.client_uri,
        logo_uri: doc.logo_uri,
        redirect_uris: doc.redirect_uris,
        was_fetched: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_document_requires_exact_client_id_match() {
        let body = r#"{"client_id":"https://wrong.example.com/","redirect_uris":[]}"#;
        assert!(parse_json_client_document("https://app.example.com/", body).is_none());
    }

    #[test]
    fn json_document_requires_client_uri_prefix() {
        let body = r#"{"client_id":"https://app.example.com/","client_uri":"https://other.example.com/","redirect_uris":[]}"#;
        assert!(parse_json_client_document("https://app.example.com/", body).is_none());
    }

    #[test]
    fn json_document_accepts_valid_prefix() {
        let body = r#"{"client_id":"https://app.example.com/","client_uri":"https://app.example.com","redirect_uris":["https://app.example.com/cb"]}"#;
        let info = parse_json_client_document("https://app.example.com/", body).unwrap();
        assert_eq!(info.redirect_uris, vec!["https://app.example.com/cb".to_string()]);
    }

    #[test]
    fn loopback_client_id_is_not_fetched() {
        assert!(is_loopback(&Url::parse("http://localhost:8080/").unwrap()));
        assert!(is_loopback(&Url::parse("http://127.0.0.1:8080/").unwrap()));
        assert!(!is_loopback(&Url::parse("https://app.example.com/").unwrap()));
    }
}
