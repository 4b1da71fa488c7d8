//! Structural validation of the URLs that flow through the IndieAuth
//! protocol: profile URLs, client IDs, and redirect URIs (spec.md §4.1).
//!
//! Every function here is a pure, fail-closed predicate over a string —
//! no network access, no side effects.

pub mod url;

pub use self::url::{
    has_dangerous_scheme, has_dot_segments, is_redirect_uri_in_published_list, is_valid_client_id,
    is_valid_profile_url, is_valid_redirect_uri,
};
