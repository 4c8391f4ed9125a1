use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::error::GitError;
use crate::Result;

/// Stdio mode for subprocess streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// Inherit the parent process's stream.
    Inherit,
    /// Pipe the stream (capture it).
    Pipe,
    /// Redirect to /dev/null.
    Null,
}

impl From<StdioMode> for Stdio {
    fn from(mode: StdioMode) -> Self {
        match mode {
            StdioMode::Inherit => Stdio::inherit(),
            StdioMode::Pipe => Stdio::piped(),
            StdioMode::Null => Stdio::null(),
        }
    }
}

/// Result of running a git subprocess to completion.
#[derive(Debug)]
pub struct GitCommandResult {
    /// Exit code (-1 if terminated by a signal).
    pub status: i32,
    /// Captured stdout (empty if not piped).
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
}

impl GitCommandResult {
    /// Returns true if the process exited successfully.
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout as a string with trailing whitespace removed.
    pub fn stdout_line(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim_end().to_string()
    }
}

/// Builder for a single git invocation.
///
/// Differences from a bare `std::process::Command`: stderr is always
/// piped so failures can carry the child's diagnostics, stdout is
/// captured by default, stdin is closed by default, and environment
/// variables are scoped to the child.
pub struct GitCommand {
    program: OsString,
    args: Vec<OsString>,
    envs: Vec<(String, String)>,
    stdin_mode: StdioMode,
    stdout_mode: StdioMode,
    working_dir: Option<PathBuf>,
}

impl GitCommand {
    /// Create a command builder for the given git binary.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            envs: Vec::new(),
            stdin_mode: StdioMode::Null,
            stdout_mode: StdioMode::Pipe,
            working_dir: None,
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Self {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable for the child only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set stdin mode.
    pub fn stdin(mut self, mode: StdioMode) -> Self {
        self.stdin_mode = mode;
        self
    }

    /// Set stdout mode.
    pub fn stdout(mut self, mode: StdioMode) -> Self {
        self.stdout_mode = mode;
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// The command line, for error messages and logging.
    pub fn command_string(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Spawn the command without waiting for it to complete.
    pub fn spawn(&self) -> Result<Child> {
        tracing::debug!(command = %self.command_string(), "spawning git");
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::from(self.stdin_mode))
            .stdout(Stdio::from(self.stdout_mode))
            .stderr(Stdio::piped());
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command.spawn().map_err(|source| GitError::Spawn {
            command: self.command_string(),
            source,
        })
    }

    /// Run the command to completion, capturing output.
    pub fn run(&self) -> Result<GitCommandResult> {
        let child = self.spawn()?;
        let output = child
            .wait_with_output()
            .map_err(|source| GitError::Spawn {
                command: self.command_string(),
                source,
            })?;
        Ok(GitCommandResult {
            status: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Run the command and fail unless it exits zero.
    pub fn run_checked(&self) -> Result<GitCommandResult> {
        let result = self.run()?;
        if result.success() {
            Ok(result)
        } else {
            Err(GitError::Exit {
                command: self.command_string(),
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            })
        }
    }
}

/// Check a child that has already been waited on.
pub(crate) fn check_output(command: String, output: std::process::Output) -> Result<Vec<u8>> {
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(GitError::Exit {
            command,
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_captures_stdout() {
        let result = GitCommand::new("echo").arg("hello").run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout_line(), "hello");
    }

    #[test]
    fn run_checked_reports_stderr() {
        let err = GitCommand::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .run_checked()
            .unwrap_err();
        match err {
            GitError::Exit { status, stderr, .. } => {
                assert_eq!(status, 3);
                assert_eq!(stderr.trim(), "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn env_reaches_child_only() {
        let result = GitCommand::new("sh")
            .args(["-c", "echo $BSGIT_COMMAND_TEST"])
            .env("BSGIT_COMMAND_TEST", "scoped")
            .run()
            .unwrap();
        assert_eq!(result.stdout_line(), "scoped");
        assert!(std::env::var("BSGIT_COMMAND_TEST").is_err());
    }

    #[test]
    fn stdin_is_closed_by_default() {
        // cat with a closed stdin terminates immediately
        let result = GitCommand::new("cat").run().unwrap();
        assert!(result.success());
        assert!(result.stdout.is_empty());
    }
}
