use std::path::PathBuf;

/// Error types for git subprocess operations.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with status {status}{}", stderr_suffix(.stderr))]
    Exit {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("not a git repository (or any parent up to {0})")]
    NotARepository(PathBuf),

    #[error("unexpected output from {command}: {detail}")]
    Parse { command: String, detail: String },

    #[error("invalid object id: {0}")]
    BadOid(#[from] bsgit_hash::HashError),

    #[error("I/O error on {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}
