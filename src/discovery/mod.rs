//! Discovery: Profile Discovery (spec.md §4.5) and Client Discovery
//! (spec.md §4.6). Both fetch untrusted third-party URLs through the
//! SSRF-guarded client and degrade to an explicit failure value rather
//! than propagating a transport error, matching spec.md's "non-fatal for
//! display purposes" framing for client discovery and the explicit
//! discovery-error-as-value framing for profile discovery.

pub mod client;
pub mod profile;

pub use client::{discover_client, ClientInfo};
pub use profile::{discover_profile, ProfileDiscoveryError, ProfileDiscoveryResult};
