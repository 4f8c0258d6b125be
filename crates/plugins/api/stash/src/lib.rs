//! Bitbucket Server (Stash) driver for forgekit.
//!
//! Covers pull requests and repository contents through the REST API 1.0.
//! Bitbucket Server cannot update or delete files through the API, so those
//! operations are gated off and fail with `Error::Unsupported` without any
//! request.

mod client;
mod types;

pub use client::StashClient;
