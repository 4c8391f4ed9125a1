use bsgit_hash::{GitOid, Md5};

/// Error types of the synchronization engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("checksum mismatch for '{file}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: Md5,
        actual: Md5,
    },

    #[error("commit {commit}: {detail}")]
    CorruptCommit { commit: GitOid, detail: String },

    #[error("no login known for '{email}'; run `bsgit usermap <login> {email}` first")]
    UnmappedEmail { email: String },

    #[error("branch '{branch}' is already up to date with the build service")]
    NothingToPush { branch: String },

    #[error("branch '{branch}' does not descend from the remote revision; rebase first")]
    NotAChild { branch: String },

    #[error("uncommitted changes in the index or worktree; commit or stash them first")]
    DirtyIndex,

    #[error("merge commit {commit} does not match the package's link base")]
    BadMerge { commit: GitOid },

    #[error("commit {commit} has more than two parents; cannot push n-way merges")]
    NWayMerge { commit: GitOid },

    #[error("history below commit {commit} never reaches the remote revision")]
    BrokenHistory { commit: GitOid },

    #[error("build service created revision {actual}, expected {expected}")]
    UnexpectedRev { expected: u64, actual: String },

    #[error("no local branch '{branch}'")]
    MissingBranch { branch: String },

    #[error("unusable source link: {detail}")]
    BadLink { detail: String },

    #[error(transparent)]
    Api(#[from] bsgit_api::ApiError),

    #[error(transparent)]
    Git(#[from] bsgit_git::GitError),

    #[error(transparent)]
    Cache(#[from] bsgit_cache::CacheError),
}
