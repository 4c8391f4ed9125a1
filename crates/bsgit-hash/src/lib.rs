//! Content hashes for the bsgit build service bridge.
//!
//! The build service addresses file content by MD5 and whole directory
//! listings by `srcmd5`; the local git side addresses objects by their
//! 40-hex object id. This crate provides the two value types, hex
//! encoding/decoding, and the srcmd5 construction.

mod error;
pub mod hex;
mod md5;
mod oid;

pub use error::HashError;
pub use md5::{compute_srcmd5, Md5, Md5Hasher};
pub use oid::GitOid;
