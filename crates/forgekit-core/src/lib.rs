//! Core traits, types, and error handling for forgekit.
//!
//! This crate provides the provider-neutral pieces every driver builds on:
//! the canonical model, the error taxonomy, capability tables, pagination
//! normalization, the HTTP transport with its server probe, and the patch
//! parser.

pub mod capability;
pub mod config;
pub mod diff;
pub mod error;
pub mod pagination;
pub mod provider;
pub mod transport;
pub mod types;

pub use capability::{Capabilities, Operation, ProviderKind};
pub use config::{Config, HttpConfig, ProviderConfig};
pub use error::{Error, ErrorKind, Result};
pub use pagination::{PageSource, PaginationResult};
pub use provider::{ContentService, Provider, PullRequestService};
pub use transport::{encode_path, Auth, Context, RawRequest, RawResponse, ServerVersion, Transport};
pub use types::*;
