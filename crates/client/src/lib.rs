//! Network origin for the wikioffline agent.
//!
//! This crate provides the reqwest-backed [`FetchClient`], the concrete
//! [`wikioffline_core::Fetcher`] the server hands to the agent, plus URL
//! resolution against the configured origin.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, resolve};
