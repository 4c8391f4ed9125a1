//! The synchronization engine.
//!
//! Translates build service revision history into git commits and
//! back. Fetching walks a package's revision chain newest to oldest,
//! materializes each revision's tree through the object importer, and
//! emits commits oldest to newest, reconciling source links into
//! two-parent merges. Pushing replays a chain of local commits as new
//! build service revisions.
//!
//! All state flows through [`Fetcher`]: the build service connection,
//! the git repository, the mapping cache, and the run options. Nothing
//! here touches process-global state.

mod context;
mod error;
mod expand;
mod history;
mod import;
mod push;
mod users;

pub use context::{Fetcher, Options};
pub use error::SyncError;
pub use push::{push_package, PushOutcome};

pub type Result<T> = std::result::Result<T, SyncError>;
