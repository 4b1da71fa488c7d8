//! HTTP Surface (spec.md §4.10, §6).

pub mod handlers;
pub mod rate_limit;
pub mod routes;

pub use routes::{build_router, AppState};
