//! Driver for the local git repository.
//!
//! bsgit treats git as a black box reached through its plumbing
//! commands (`hash-object`, `mktree`, `commit-tree`, `ls-tree`,
//! `cat-file`, `rev-parse`, ...). This crate wraps those invocations
//! behind a typed API: every non-zero exit becomes a [`GitError`]
//! carrying the command line and captured stderr.

mod command;
mod error;
pub mod refs;
mod repo;

pub use command::{GitCommand, GitCommandResult, StdioMode};
pub use error::GitError;
pub use repo::{CommitInfo, GitRepo, HashObjectWriter, Ident, Signature, TreeEntry, STREAM_CHUNK};

pub type Result<T> = std::result::Result<T, GitError>;
