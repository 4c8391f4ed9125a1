//! The mapping cache.
//!
//! Synchronization is incremental because bsgit remembers every object
//! translation it has performed: MD5 of a file to blob id, srcmd5 of a
//! directory listing to tree id, build service revision to commit id,
//! and login/email pairs. The store is byte-keyed and namespaced by a
//! short ASCII prefix per entry kind; see [`keys`].

mod error;
pub mod keys;
mod reindex;
mod store;

pub use error::CacheError;
pub use store::BsCache;

pub type Result<T> = std::result::Result<T, CacheError>;
