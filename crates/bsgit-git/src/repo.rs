use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Child;

use bsgit_hash::GitOid;
use bstr::ByteSlice;

use crate::command::{check_output, GitCommand, StdioMode};
use crate::error::GitError;
use crate::Result;

/// Chunk size for streaming object content through the plumbing.
pub const STREAM_CHUNK: usize = 16 * 1024;

/// A `name <email>` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub email: String,
}

/// Author or committer identity with timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub ident: Ident,
    /// Seconds since the epoch.
    pub time: i64,
    /// Timezone offset in git's `±HHMM` notation.
    pub tz: String,
}

impl Signature {
    /// A signature pinned to UTC.
    pub fn utc(name: impl Into<String>, email: impl Into<String>, time: i64) -> Self {
        Self {
            ident: Ident {
                name: name.into(),
                email: email.into(),
            },
            time,
            tz: "+0000".to_string(),
        }
    }
}

/// A parsed commit object.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub tree: GitOid,
    pub parents: Vec<GitOid>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

/// One line of `ls-tree` output.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub mode: String,
    pub kind: String,
    pub oid: GitOid,
    pub name: String,
}

/// Handle to a local git repository, addressed through a git binary.
#[derive(Debug, Clone)]
pub struct GitRepo {
    git: PathBuf,
    git_dir: PathBuf,
    root: PathBuf,
}

impl GitRepo {
    /// Discover the repository containing `dir`.
    pub fn discover(git: impl Into<PathBuf>, dir: impl AsRef<Path>) -> Result<Self> {
        let git = git.into();
        let dir = dir.as_ref();
        let result = GitCommand::new(&git)
            .args(["rev-parse", "--git-dir"])
            .working_dir(dir)
            .run()?;
        if !result.success() {
            return Err(GitError::NotARepository(dir.to_path_buf()));
        }
        let mut git_dir = PathBuf::from(result.stdout_line());
        if git_dir.is_relative() {
            git_dir = dir.join(git_dir);
        }
        Ok(Self {
            git,
            git_dir,
            root: dir.to_path_buf(),
        })
    }

    /// Path of the repository's meta directory (`.git`).
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Path to the git binary in use.
    pub fn git_binary(&self) -> &Path {
        &self.git
    }

    /// Start building a git invocation rooted in this repository.
    pub fn command(&self, args: &[&str]) -> GitCommand {
        GitCommand::new(&self.git).args(args).working_dir(&self.root)
    }

    /// Resolve a revision expression to an object id, `None` if it does
    /// not name anything.
    pub fn rev_parse(&self, spec: &str) -> Result<Option<GitOid>> {
        let result = self
            .command(&["rev-parse", "--verify", "--quiet"])
            .arg(spec)
            .run()?;
        if !result.success() {
            return Ok(None);
        }
        Ok(Some(GitOid::from_hex(&result.stdout_line())?))
    }

    /// Object type of `oid` (`blob`, `tree`, `commit`, `tag`).
    pub fn object_type(&self, oid: &GitOid) -> Result<String> {
        let result = self
            .command(&["cat-file", "-t"])
            .arg(oid.to_hex())
            .run_checked()?;
        Ok(result.stdout_line())
    }

    /// Read a blob's content into memory.
    pub fn read_blob(&self, oid: &GitOid) -> Result<Vec<u8>> {
        let result = self
            .command(&["cat-file", "blob"])
            .arg(oid.to_hex())
            .run_checked()?;
        Ok(result.stdout)
    }

    /// Stream a blob's content through `sink` in fixed-size chunks.
    pub fn stream_blob(&self, oid: &GitOid, mut sink: impl FnMut(&[u8])) -> Result<()> {
        let cmd = self.command(&["cat-file", "blob"]).arg(oid.to_hex());
        let cmd_str = cmd.command_string();
        let mut child = cmd.spawn()?;
        let mut stdout = child.stdout.take().ok_or_else(|| GitError::Parse {
            command: cmd_str.clone(),
            detail: "stdout not captured".into(),
        })?;
        let mut buf = [0u8; STREAM_CHUNK];
        loop {
            let n = stdout.read(&mut buf)?;
            if n == 0 {
                break;
            }
            sink(&buf[..n]);
        }
        drop(stdout);
        let output = child.wait_with_output()?;
        check_output(cmd_str, output)?;
        Ok(())
    }

    /// Parse a commit object.
    pub fn read_commit(&self, oid: &GitOid) -> Result<CommitInfo> {
        let cmd = self.command(&["cat-file", "commit"]).arg(oid.to_hex());
        let cmd_str = cmd.command_string();
        let result = cmd.run_checked()?;
        parse_commit(&cmd_str, &result.stdout)
    }

    /// List the entries of a tree (non-recursive).
    pub fn ls_tree(&self, treeish: &str) -> Result<Vec<TreeEntry>> {
        let cmd = self.command(&["ls-tree", treeish]);
        let cmd_str = cmd.command_string();
        let result = cmd.run_checked()?;
        let mut entries = Vec::new();
        for line in result.stdout.lines() {
            let (meta, name) =
                line.split_once_str("\t")
                    .ok_or_else(|| GitError::Parse {
                        command: cmd_str.clone(),
                        detail: format!("no tab in ls-tree line: {}", line.as_bstr()),
                    })?;
            let mut fields = meta.fields();
            let (mode, kind, hex) = match (fields.next(), fields.next(), fields.next()) {
                (Some(m), Some(k), Some(h)) => (m, k, h),
                _ => {
                    return Err(GitError::Parse {
                        command: cmd_str.clone(),
                        detail: format!("short ls-tree line: {}", line.as_bstr()),
                    })
                }
            };
            let name = name.to_str().map_err(|_| GitError::Parse {
                command: cmd_str.clone(),
                detail: "non-UTF-8 file name in tree".into(),
            })?;
            entries.push(TreeEntry {
                mode: String::from_utf8_lossy(mode).into_owned(),
                kind: String::from_utf8_lossy(kind).into_owned(),
                oid: GitOid::from_hex(&String::from_utf8_lossy(hex))?,
                name: name.to_string(),
            });
        }
        Ok(entries)
    }

    /// Start writing a new blob via `hash-object -w --stdin`.
    pub fn hash_object_writer(&self) -> Result<HashObjectWriter> {
        let cmd = self.command(&["hash-object", "-w", "--stdin"]).stdin(StdioMode::Pipe);
        let cmd_str = cmd.command_string();
        let child = cmd.spawn()?;
        Ok(HashObjectWriter {
            command: cmd_str,
            child,
        })
    }

    /// Write a blob from a complete buffer.
    pub fn hash_object(&self, content: &[u8]) -> Result<GitOid> {
        let mut writer = self.hash_object_writer()?;
        writer.write(content)?;
        writer.finish()
    }

    /// Build a tree of plain files via `mktree`.
    ///
    /// Entries are `(name, blob)`; every entry is written with mode
    /// `100644`. Names are sorted bytewise as git requires.
    pub fn mktree(&self, entries: &[(String, GitOid)]) -> Result<GitOid> {
        let mut sorted: Vec<&(String, GitOid)> = entries.iter().collect();
        sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        let mut input = Vec::new();
        for (name, oid) in sorted {
            input.extend_from_slice(b"100644 blob ");
            input.extend_from_slice(oid.to_hex().as_bytes());
            input.push(b'\t');
            input.extend_from_slice(name.as_bytes());
            input.push(b'\n');
        }

        let cmd = self.command(&["mktree"]).stdin(StdioMode::Pipe);
        let cmd_str = cmd.command_string();
        let mut child = cmd.spawn()?;
        {
            let stdin = child.stdin.as_mut().ok_or_else(|| GitError::Parse {
                command: cmd_str.clone(),
                detail: "stdin not captured".into(),
            })?;
            stdin.write_all(&input)?;
        }
        drop(child.stdin.take());
        let output = child.wait_with_output()?;
        let stdout = check_output(cmd_str, output)?;
        Ok(GitOid::from_hex(
            String::from_utf8_lossy(&stdout).trim_end(),
        )?)
    }

    /// Create a commit object via `commit-tree`.
    ///
    /// Author and committer identities travel to the child through its
    /// environment and never touch this process's own environment.
    pub fn commit_tree(
        &self,
        tree: &GitOid,
        parents: &[GitOid],
        author: &Signature,
        committer: &Signature,
        message: &str,
    ) -> Result<GitOid> {
        let mut cmd = self
            .command(&["commit-tree"])
            .arg(tree.to_hex())
            .stdin(StdioMode::Pipe)
            .env("GIT_AUTHOR_NAME", author.ident.name.as_str())
            .env("GIT_AUTHOR_EMAIL", author.ident.email.as_str())
            .env(
                "GIT_AUTHOR_DATE",
                format!("@{} {}", author.time, author.tz),
            )
            .env("GIT_COMMITTER_NAME", committer.ident.name.as_str())
            .env("GIT_COMMITTER_EMAIL", committer.ident.email.as_str())
            .env(
                "GIT_COMMITTER_DATE",
                format!("@{} {}", committer.time, committer.tz),
            );
        for parent in parents {
            cmd = cmd.arg("-p").arg(parent.to_hex());
        }
        let cmd_str = cmd.command_string();
        let mut child = cmd.spawn()?;
        {
            let stdin = child.stdin.as_mut().ok_or_else(|| GitError::Parse {
                command: cmd_str.clone(),
                detail: "stdin not captured".into(),
            })?;
            stdin.write_all(message.as_bytes())?;
        }
        drop(child.stdin.take());
        let output = child.wait_with_output()?;
        let stdout = check_output(cmd_str, output)?;
        Ok(GitOid::from_hex(
            String::from_utf8_lossy(&stdout).trim_end(),
        )?)
    }

    /// Whether `ancestor` is reachable from `descendant`.
    pub fn is_ancestor(&self, ancestor: &GitOid, descendant: &GitOid) -> Result<bool> {
        let result = self
            .command(&["merge-base", "--is-ancestor"])
            .arg(ancestor.to_hex())
            .arg(descendant.to_hex())
            .run()?;
        match result.status {
            0 => Ok(true),
            1 => Ok(false),
            status => Err(GitError::Exit {
                command: format!(
                    "{} merge-base --is-ancestor {} {}",
                    self.git.display(),
                    ancestor,
                    descendant
                ),
                status,
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            }),
        }
    }

    /// Whether the index and worktree match HEAD. An unborn HEAD has
    /// nothing to be dirty against and counts as clean.
    pub fn index_clean(&self) -> Result<bool> {
        if self.rev_parse("HEAD")?.is_none() {
            return Ok(true);
        }
        // refresh stat information first; a nonzero exit here already
        // means something needs updating
        let refresh = self.command(&["update-index", "--refresh", "-q"]).run()?;
        if !refresh.success() {
            return Ok(false);
        }
        let diff = self.command(&["diff-index", "--quiet", "HEAD", "--"]).run()?;
        Ok(diff.success())
    }

    /// The branch HEAD points at, `None` when detached.
    pub fn head_branch(&self) -> Result<Option<String>> {
        let result = self.command(&["symbolic-ref", "--quiet", "HEAD"]).run()?;
        if !result.success() {
            return Ok(None);
        }
        let name = result.stdout_line();
        Ok(name.strip_prefix("refs/heads/").map(str::to_string).or(Some(name)))
    }

    /// Whether HEAD names a branch with no commits yet.
    pub fn head_is_unborn(&self) -> Result<bool> {
        Ok(self.rev_parse("HEAD")?.is_none())
    }

    /// Look up a local branch tip.
    pub fn branch_tip(&self, branch: &str) -> Result<Option<GitOid>> {
        self.rev_parse(&format!("refs/heads/{branch}"))
    }

    /// Create a local branch pointing at `target`.
    pub fn create_branch(&self, branch: &str, target: &str) -> Result<()> {
        self.command(&["branch", branch, target]).run_checked()?;
        Ok(())
    }

    /// Check a branch out into the worktree.
    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.command(&["checkout", branch])
            .stdout(StdioMode::Inherit)
            .run_checked()?;
        Ok(())
    }

    /// Rebase `branch` onto `onto`.
    pub fn rebase(&self, onto: &str, branch: &str) -> Result<()> {
        self.command(&["rebase", onto, branch])
            .stdout(StdioMode::Inherit)
            .run_checked()?;
        Ok(())
    }

    /// Hard-reset the current branch to `target`.
    pub fn reset_hard(&self, target: &GitOid) -> Result<()> {
        self.command(&["reset", "--hard"])
            .arg(target.to_hex())
            .run_checked()?;
        Ok(())
    }

    /// Read a config value, `None` when unset.
    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        let result = self.command(&["config", "--get", key]).run()?;
        if !result.success() {
            return Ok(None);
        }
        Ok(Some(result.stdout_line()))
    }

    /// Set a config value.
    pub fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.command(&["config", key, value]).run_checked()?;
        Ok(())
    }
}

/// In-flight `hash-object -w --stdin` invocation.
///
/// The writer can be aborted mid-stream, which kills the child so a
/// partially written object is never adopted.
pub struct HashObjectWriter {
    command: String,
    child: Child,
}

impl HashObjectWriter {
    /// Feed a chunk of blob content.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let stdin = self.child.stdin.as_mut().ok_or_else(|| GitError::Parse {
            command: self.command.clone(),
            detail: "stdin not captured".into(),
        })?;
        stdin.write_all(data)?;
        Ok(())
    }

    /// Close the stream and return the new blob's id.
    pub fn finish(mut self) -> Result<GitOid> {
        drop(self.child.stdin.take());
        let output = self.child.wait_with_output()?;
        let stdout = check_output(self.command, output)?;
        Ok(GitOid::from_hex(
            String::from_utf8_lossy(&stdout).trim_end(),
        )?)
    }

    /// Kill the writer, discarding the partial object.
    pub fn abort(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn parse_ident(command: &str, line: &str) -> Result<Signature> {
    // "Name Surname <email> 1234567890 +0000"
    let parse_error = |detail: String| GitError::Parse {
        command: command.to_string(),
        detail,
    };
    let open = line
        .rfind('<')
        .ok_or_else(|| parse_error(format!("no '<' in ident: {line}")))?;
    let close = line
        .rfind('>')
        .ok_or_else(|| parse_error(format!("no '>' in ident: {line}")))?;
    let name = line[..open].trim_end().to_string();
    let email = line[open + 1..close].to_string();
    let rest = line[close + 1..].trim();
    let mut parts = rest.split_whitespace();
    let time: i64 = parts
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| parse_error(format!("bad timestamp in ident: {line}")))?;
    let tz = parts.next().unwrap_or("+0000").to_string();
    Ok(Signature {
        ident: Ident { name, email },
        time,
        tz,
    })
}

fn parse_commit(command: &str, raw: &[u8]) -> Result<CommitInfo> {
    let text = String::from_utf8_lossy(raw);
    let mut tree = None;
    let mut parents = Vec::new();
    let mut author = None;
    let mut committer = None;
    let mut lines = text.lines();

    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        if let Some(hex) = line.strip_prefix("tree ") {
            tree = Some(GitOid::from_hex(hex)?);
        } else if let Some(hex) = line.strip_prefix("parent ") {
            parents.push(GitOid::from_hex(hex)?);
        } else if let Some(ident) = line.strip_prefix("author ") {
            author = Some(parse_ident(command, ident)?);
        } else if let Some(ident) = line.strip_prefix("committer ") {
            committer = Some(parse_ident(command, ident)?);
        }
        // other headers (encoding, gpgsig, ...) are irrelevant here
    }

    let message = lines.collect::<Vec<_>>().join("\n");
    let missing = |what: &str| GitError::Parse {
        command: command.to_string(),
        detail: format!("commit without {what} header"),
    };
    Ok(CommitInfo {
        tree: tree.ok_or_else(|| missing("tree"))?,
        parents,
        author: author.ok_or_else(|| missing("author"))?,
        committer: committer.ok_or_else(|| missing("committer"))?,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ident_line() {
        let sig = parse_ident("t", "Jane Doe <jane@example.com> 1234567890 +0100").unwrap();
        assert_eq!(sig.ident.name, "Jane Doe");
        assert_eq!(sig.ident.email, "jane@example.com");
        assert_eq!(sig.time, 1234567890);
        assert_eq!(sig.tz, "+0100");
    }

    #[test]
    fn parse_commit_object() {
        let raw = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
parent da39a3ee5e6b4b0d3255bfef95601890afd80709\n\
author A <a@x> 100 +0000\n\
committer B <b@x> 200 +0000\n\
\n\
first line\n\
second line";
        let commit = parse_commit("t", raw).unwrap();
        assert_eq!(
            commit.tree.to_hex(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
        assert_eq!(commit.parents.len(), 1);
        assert_eq!(commit.author.ident.email, "a@x");
        assert_eq!(commit.committer.time, 200);
        assert_eq!(commit.message, "first line\nsecond line");
    }

    #[test]
    fn parse_commit_without_parents() {
        let raw = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
author A <a@x> 100 +0000\n\
committer A <a@x> 100 +0000\n\
\n\
msg";
        let commit = parse_commit("t", raw).unwrap();
        assert!(commit.parents.is_empty());
    }
}
