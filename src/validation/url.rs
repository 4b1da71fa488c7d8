//! URL Validator (spec.md §4.1).
//!
//! All functions fail closed: anything ambiguous, malformed, or not
//! explicitly allowed is rejected.

use url::{Host, Url};

/// Operates on the raw string, not a parsed URL, to defeat host-side
/// normalization that might otherwise hide a `.`/`..` segment (spec.md
/// §4.1 `hasDotSegments`).
pub fn has_dot_segments(raw: &str) -> bool {
    raw.split('/').any(|segment| segment == "." || segment == "..")
}

fn is_loopback_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(d) => d.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(ip) => ip.is_loopback(),
        Host::Ipv6(ip) => ip.is_loopback(),
    }
}

/// Shared structural checks between profile URLs and client IDs: absolute
/// `http`/`https` URL, no fragment, no userinfo, no dot-segments.
fn basic_checks(raw: &str, parsed: &Url) -> bool {
    if has_dot_segments(raw) {
        return false;
    }
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    if parsed.fragment().is_some() {
        return false;
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return false;
    }
    true
}

/// `isValidProfileUrl` (spec.md §4.1): `http`/`https`, has a path, no
/// dot-segments/fragment/userinfo/non-default port, host is a domain name
/// (IPv4/IPv6 including loopback rejected).
pub fn is_valid_profile_url(raw: &str) -> bool {
    let parsed = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => return false,
    };

    if !basic_checks(raw, &parsed) {
        return false;
    }

    if parsed.path().is_empty() {
        return false;
    }

    if parsed.port().is_some() {
        return false;
    }

    matches!(parsed.host(), Some(Host::Domain(_)))
}

/// `isValidClientId` (spec.md §4.1): like a profile URL, but an explicit
/// port is allowed and loopback hosts (`localhost`, `127.0.0.1`, `[::1]`)
/// are allowed in addition to domain names. Other raw IP hosts are
/// rejected.
pub fn is_valid_client_id(raw: &str) -> bool {
    let parsed = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => return false,
    };

    if !basic_checks(raw, &parsed) {
        return false;
    }

    if parsed.path().is_empty() {
        return false;
    }

    match parsed.host() {
        Some(Host::Domain(_)) => true,
        Some(host @ (Host::Ipv4(_) | Host::Ipv6(_))) => is_loopback_host(&host),
        None => false,
    }
}

/// `hasDangerousScheme` (spec.md §4.1, gated before the Client-Discovery
/// published-list rescue in §4.9.1 step 3): true for anything that isn't
/// an absolute `http`/`https` URL — `javascript:`, `data:`, `vbscript:`,
/// `file:`, and the like. The published-list rescue only ever applies to
/// cross-origin `http`/`https` redirect URIs, never to these.
pub fn has_dangerous_scheme(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(parsed) => !matches!(parsed.scheme(), "http" | "https"),
        Err(_) => true,
    }
}

fn origin_of(u: &Url) -> (String, String, Option<u16>) {
    (u.scheme().to_string(), u.host_str().unwrap_or_default().to_ascii_lowercase(), u.port())
}

/// `isValidRedirectUri` (spec.md §4.1). `redirect_uri` must be an absolute
/// URL with scheme `https` (or `http` only when both `redirect_uri` and
/// `client_id` share the same loopback origin), no fragment/userinfo/
/// dot-segments, and same scheme+host+port as `client_id`. Cross-origin
/// redirect URIs are rejected here; they may only be accepted later, after
/// Client Discovery confirms membership in the client's published list
/// (spec.md §4.6).
pub fn is_valid_redirect_uri(redirect_uri: &str, client_id: &str) -> bool {
    let redirect = match Url::parse(redirect_uri) {
        Ok(u) => u,
        Err(_) => return false,
    };
    let client = match Url::parse(client_id) {
        Ok(u) => u,
        Err(_) => return false,
    };

    if has_dot_segments(redirect_uri) {
        return false;
    }
    if redirect.fragment().is_some() {
        return false;
    }
    if !redirect.username().is_empty() || redirect.password().is_some() {
        return false;
    }

    let same_loopback = matches!(redirect.host(), Some(h) if is_loopback_host(&h))
        && matches!(client.host(), Some(h) if is_loopback_host(&h));

    match redirect.scheme() {
        "https" => {}
        "http" if same_loopback => {}
        _ => return false,
    }

    origin_of(&redirect) == origin_of(&client)
}

/// `isRedirectUriInPublishedList` (spec.md §4.1): byte-exact string match,
/// no normalization.
pub fn is_redirect_uri_in_published_list(uri: &str, list: &[String]) -> bool {
    list.iter().any(|candidate| candidate == uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_url_boundaries() {
        assert!(is_valid_profile_url("https://jane.example.com/"));
        assert!(!is_valid_profile_url("https://192.168.1.1/"));
        assert!(!is_valid_profile_url("https://127.0.0.1/"));
        assert!(!is_valid_profile_url("https://example.com:8443/"));
        assert!(!is_valid_profile_url("https://example.com/#x"));
        assert!(!is_valid_profile_url("https://user:p@example.com/"));
        assert!(!is_valid_profile_url("https://example.com/a/../b"));
    }

    #[test]
    fn client_id_boundaries() {
        assert!(is_valid_client_id("http://localhost:8080/"));
        assert!(is_valid_client_id("https://app.example.com:8443/"));
        assert!(!is_valid_client_id("https://10.0.0.1/"));
        assert!(!is_valid_client_id("https://app.example.com/foo/../bar"));
    }

    #[test]
    fn dot_segments_detected_in_raw_string() {
        assert!(has_dot_segments("https://example.com/a/../b"));
        assert!(has_dot_segments("https://example.com/./b"));
        assert!(!has_dot_segments("https://example.com/a.b/c.."));
    }

    #[test]
    fn redirect_uri_same_origin_required() {
        assert!(is_valid_redirect_uri(
            "https://app.example.com/cb",
            "https://app.example.com/"
        ));
        assert!(!is_valid_redirect_uri(
            "https://evil.com/cb",
            "https://app.example.com/"
        ));
        assert!(is_valid_redirect_uri(
            "http://localhost:8080/cb",
            "http://localhost:8080/"
        ));
        assert!(!is_valid_redirect_uri(
            "http://app.example.com/cb",
            "https://app.example.com/"
        ));
    }

    #[test]
    fn dangerous_schemes_detected() {
        assert!(has_dangerous_scheme("javascript:alert(1)"));
        assert!(has_dangerous_scheme("data:text/html,<script>1</script>"));
        assert!(has_dangerous_scheme("vbscript:msgbox(1)"));
        assert!(has_dangerous_scheme("file:///etc/passwd"));
        assert!(has_dangerous_scheme("not a url"));
        assert!(!has_dangerous_scheme("https://app.example.com/cb"));
        assert!(!has_dangerous_scheme("http://localhost:8080/cb"));
    }

    #[test]
    fn published_list_is_byte_exact() {
        let list = vec!["https://app.example.com/cb".to_string()];
        assert!(is_redirect_uri_in_published_list("https://app.example.com/cb", &list));
        assert!(!is_redirect_uri_in_published_list("https://app.example.com/cb/", &list));
    }
}
