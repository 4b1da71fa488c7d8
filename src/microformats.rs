//! Microformats Adapter (spec.md §4.4).
//!
//! Given `(html, base_url)`, extracts `rel="me"` links, the IndieAuth
//! endpoint rels, and the first `h-app` item's display properties. All
//! URLs are resolved against `base_url`; anything that doesn't resolve to
//! an `http`/`https` URL is dropped.

use scraper::{Html, Selector};
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Microformats {
    pub rel_me_links: Vec<String>,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub indieauth_metadata: Option<String>,
    pub micropub: Option<String>,
    pub microsub: Option<String>,
    pub app_name: Option<String>,
    pub app_logo_url: Option<String>,
    pub app_url: Option<String>,
}

fn resolve(base: &Url, candidate: &str) -> Option<String> {
    let resolved = base.join(candidate).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn rel_values(rel_attr: &str) -> Vec<String> {
    rel_attr.split_whitespace().map(|s| s.to_ascii_lowercase()).collect()
}

/// Parses `html` and returns everything the rest of the crate needs from
/// it, resolved against `base_url`.
pub fn parse(html: &str, base_url: &str) -> Microformats {
    let base = match Url::parse(base_url) {
        Ok(u) => u,
        Err(_) => return Microformats::default(),
    };
    let document = Html::parse_document(html);

    let mut result = Microformats::default();
    let mut seen_me = std::collections::HashSet::new();

    // `<link rel="...">` and `<a rel="...">`, both carry meaningful rels
    // in practice (rel="me" is most common on `<a>`, endpoint rels on
    // `<link>`, but IndieAuth does not mandate which element carries
    // which, so both are scanned uniformly).
    let link_selector = Selector::parse("link[rel]").unwrap();
    let anchor_selector = Selector::parse("a[rel]").unwrap();

    for el in document.select(&link_selector).chain(document.select(&anchor_selector)) {
        let Some(rel_attr) = el.value().attr("rel") else { continue };
        let Some(href) = el.value().attr("href") else { continue };
        let Some(resolved) = resolve(&base, href) else { continue };

        for rel in rel_values(rel_attr) {
            match rel.as_str() {
                "me" => {
                    if seen_me.insert(resolved.clone()) {
                        result.rel_me_links.push(resolved.clone());
                    }
                }
                "authorization_endpoint" => {
                    result.authorization_endpoint.get_or_insert(resolved.clone());
                }
                "token_endpoint" => {
                    result.token_endpoint.get_or_insert(resolved.clone());
                }
                "indieauth-metadata" => {
                    result.indieauth_metadata.get_or_insert(resolved.clone());
                }
                "micropub" => {
                    result.micropub.get_or_insert(resolved.clone());
                }
                "microsub" => {
                    result.microsub.get_or_insert(resolved.clone());
                }
                _ => {}
            }
        }
    }

    apply_h_app(&document, &base, &mut result);

    result
}

fn apply_h_app(document: &Html, base: &Url, result: &mut Microformats) {
    let Ok(h_app_selector) = Selector::parse(".h-app") else { return };
    let Some(h_app) = document.select(&h_app_selector).next() else { return };

    if let Ok(name_selector) = Selector::parse(".p-name") {
        if let Some(name_el) = h_app.select(&name_selector).next() {
            let text: String = name_el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                result.app_name = Some(text);
            }
        }
    }

    if let Ok(logo_selector) = Selector::parse(".u-logo") {
        if let Some(logo_el) = h_app.select(&logo_selector).next() {
            let href = logo_el.value().attr("src").or_else(|| logo_el.value().attr("href"));
            if let Some(href) = href {
                result.app_logo_url = resolve(base, href);
            }
        }
    }

    if let Ok(url_selector) = Selector::parse(".u-url") {
        if let Some(url_el) = h_app.select(&url_selector).next() {
            let href = url_el.value().attr("href");
            if let Some(href) = href {
                result.app_url = resolve(base, href);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rel_me_links_case_insensitively_and_dedupes() {
        let html = r#"
            <html><head></head><body>
                <a href="https://github.com/jane" rel="ME">GitHub</a>
                <a href="https://github.com/jane" rel="me">GitHub again</a>
                <link rel="authorization_endpoint" href="/auth">
                <link rel="token_endpoint" href="https://example.com/token">
            </body></html>
        "#;
        let mf = parse(html, "https://jane.example.com/");
        assert_eq!(mf.rel_me_links, vec!["https://github.com/jane".to_string()]);
        assert_eq!(mf.authorization_endpoint, Some("https://jane.example.com/auth".to_string()));
        assert_eq!(mf.token_endpoint, Some("https://example.com/token".to_string()));
    }

    #[test]
    fn multi_value_rel_is_split_on_whitespace() {
        let html = r#"<a href="https://github.com/jane" rel="me authn">GH</a>"#;
        let mf = parse(html, "https://jane.example.com/");
        assert_eq!(mf.rel_me_links, vec!["https://github.com/jane".to_string()]);
    }

    #[test]
    fn relative_non_http_hrefs_are_dropped() {
        let html = r#"<a href="mailto:jane@example.com" rel="me">Mail</a>"#;
        let mf = parse(html, "https://jane.example.com/");
        assert!(mf.rel_me_links.is_empty());
    }

    #[test]
    fn h_app_extracts_first_item() {
        let html = r#"
            <div class="h-app">
                <img class="u-logo" src="/logo.png">
                <a class="u-url p-name" href="/">My App</a>
            </div>
        "#;
        let mf = parse(html, "https://app.example.com/");
        assert_eq!(mf.app_name.as_deref(), Some("My App"));
        assert_eq!(mf.app_logo_url.as_deref(), Some("https://app.example.com/logo.png"));
        assert_eq!(mf.app_url.as_deref(), Some("https://app.example.com/"));
    }
}
