//! Client for the build service source API.
//!
//! The build service exposes packages over a small HTTP/XML surface:
//! directory listings, revision histories, raw file content, person
//! records, and the `commitfilelist` commit entry point. This crate
//! types those queries behind the [`BuildService`] trait, with
//! [`ApiClient`] as the HTTP implementation. The trait exists so the
//! synchronization engine can be exercised against an in-memory
//! service in tests.

mod client;
mod error;
mod types;
mod url;
pub mod xml;

pub use client::{ApiClient, BuildService};
pub use error::ApiError;
pub use types::{
    FileEntry, LinkInfo, PackageStatus, RevisionEntry, StatusOptions, UserRecord,
};
pub use url::ApiUrl;

pub type Result<T> = std::result::Result<T, ApiError>;
