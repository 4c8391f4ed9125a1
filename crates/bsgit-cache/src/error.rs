use bsgit_hash::GitOid;

/// Error types for mapping cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("commit {commit}: {detail}")]
    CorruptCommit { commit: GitOid, detail: String },

    #[error("cache entry '{key}' holds an invalid value")]
    BadValue { key: String },

    #[error(transparent)]
    Store(#[from] sled::Error),

    #[error(transparent)]
    Git(#[from] bsgit_git::GitError),

    #[error(transparent)]
    Hash(#[from] bsgit_hash::HashError),
}
