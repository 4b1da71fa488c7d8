//! Talos
//!
//! A personal-scale IndieAuth authorization server: validates IndieAuth
//! requests, discovers identity providers from a website's `rel="me"`
//! links, runs the nested OAuth delegation flow, and issues and redeems
//! authorization codes and bearer tokens.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod http;
pub mod microformats;
pub mod pkce;
pub mod providers;
pub mod repository;
pub mod ssrf;
pub mod token;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};
