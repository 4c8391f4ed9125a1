//! In-memory build service and scratch repositories for the scenario
//! tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::io::Read;

use bsgit_api::{
    ApiError, ApiUrl, BuildService, FileEntry, LinkInfo, PackageStatus, RevisionEntry,
    StatusOptions, UserRecord,
};
use bsgit_cache::BsCache;
use bsgit_git::GitRepo;
use bsgit_hash::{compute_srcmd5, Md5, Md5Hasher};

/// One revision of a fake package, oldest first in the package list.
#[derive(Clone)]
pub struct FakeRevision {
    pub rev: String,
    pub time: i64,
    pub user: String,
    pub comment: String,
    pub files: Vec<(String, Vec<u8>)>,
    pub link: Option<LinkInfo>,
}

impl FakeRevision {
    pub fn srcmd5(&self) -> Md5 {
        compute_srcmd5(
            self.files
                .iter()
                .map(|(name, content)| (name.as_str(), Md5Hasher::digest(content))),
        )
    }

    fn entries(&self) -> Vec<FileEntry> {
        self.files
            .iter()
            .map(|(name, content)| FileEntry {
                name: name.clone(),
                md5: Md5Hasher::digest(content),
            })
            .collect()
    }
}

/// An in-memory stand-in for the build service.
pub struct FakeService {
    api: ApiUrl,
    pub packages: BTreeMap<(String, String), Vec<FakeRevision>>,
    pub users: BTreeMap<String, UserRecord>,
    /// Revisions whose `linkrev=base` expansion answers 404.
    pub expand_404: HashSet<(String, String, String)>,
    /// Expanded revisions addressable by srcmd5 only, the way a
    /// server materializes a link-of-link; never listed in history.
    pub expanded: BTreeMap<(String, String, String), FakeRevision>,
    /// Every list_dir query, for asserting on fallback behavior.
    pub queries: Vec<String>,
    /// File names uploaded via put_file, in order.
    pub uploads: Vec<String>,
    /// `(user, comment, linkrev, keeplink)` per commit_filelist call.
    pub commit_calls: Vec<(String, String, Option<String>, bool)>,
    staged: BTreeMap<(String, String, String), Vec<u8>>,
    clock: i64,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            api: ApiUrl::parse("https://api.fake.example").unwrap(),
            packages: BTreeMap::new(),
            users: BTreeMap::new(),
            expand_404: HashSet::new(),
            expanded: BTreeMap::new(),
            queries: Vec::new(),
            uploads: Vec::new(),
            commit_calls: Vec::new(),
            staged: BTreeMap::new(),
            clock: 10_000,
        }
    }

    pub fn add_user(&mut self, login: &str, email: &str, realname: &str) {
        self.users.insert(
            login.to_string(),
            UserRecord {
                email: Some(email.to_string()),
                realname: Some(realname.to_string()),
            },
        );
    }

    /// Append a revision; its rev number is its position.
    pub fn add_revision(
        &mut self,
        project: &str,
        package: &str,
        time: i64,
        user: &str,
        comment: &str,
        files: &[(&str, &[u8])],
        link: Option<LinkInfo>,
    ) -> Md5 {
        let revisions = self
            .packages
            .entry((project.to_string(), package.to_string()))
            .or_default();
        let revision = FakeRevision {
            rev: (revisions.len() + 1).to_string(),
            time,
            user: user.to_string(),
            comment: comment.to_string(),
            files: files
                .iter()
                .map(|(name, content)| (name.to_string(), content.to_vec()))
                .collect(),
            link,
        };
        let srcmd5 = revision.srcmd5();
        revisions.push(revision);
        srcmd5
    }

    /// Register an expanded revision reachable only by its srcmd5,
    /// which (as on a real server) is the hash of its file list.
    pub fn add_expanded(
        &mut self,
        project: &str,
        package: &str,
        files: &[(&str, &[u8])],
        link: LinkInfo,
    ) -> Md5 {
        let revision = FakeRevision {
            rev: String::new(),
            time: 0,
            user: "unknown".to_string(),
            comment: String::new(),
            files: files
                .iter()
                .map(|(name, content)| (name.to_string(), content.to_vec()))
                .collect(),
            link: Some(link),
        };
        let srcmd5 = revision.srcmd5();
        self.expanded.insert(
            (
                project.to_string(),
                package.to_string(),
                srcmd5.to_hex(),
            ),
            revision,
        );
        srcmd5
    }

    fn revisions(&self, project: &str, package: &str) -> Result<&Vec<FakeRevision>, ApiError> {
        self.packages
            .get(&(project.to_string(), package.to_string()))
            .ok_or_else(|| ApiError::NotFound {
                url: format!("/source/{project}/{package}"),
            })
    }

    fn find_revision<'a>(
        revisions: &'a [FakeRevision],
        rev: &str,
    ) -> Result<&'a FakeRevision, ApiError> {
        if rev == "latest" {
            return revisions.last().ok_or_else(|| ApiError::NotFound {
                url: "empty package".to_string(),
            });
        }
        revisions
            .iter()
            .find(|r| r.rev == rev || r.srcmd5().to_hex() == rev)
            .ok_or_else(|| ApiError::NotFound {
                url: format!("rev {rev}"),
            })
    }

    fn status_for(package: &str, revision: &FakeRevision) -> PackageStatus {
        PackageStatus {
            name: Some(package.to_string()),
            rev: Some(revision.rev.clone()),
            srcmd5: revision.srcmd5(),
            xsrcmd5: None,
            link: revision.link.clone(),
            files: {
                let mut files = revision.entries();
                files.sort_by(|a, b| a.name.cmp(&b.name));
                files
            },
        }
    }
}

impl BuildService for FakeService {
    fn api(&self) -> &ApiUrl {
        &self.api
    }

    fn list_dir(
        &mut self,
        project: &str,
        package: &str,
        opts: &StatusOptions,
    ) -> Result<PackageStatus, ApiError> {
        let rev = opts.rev.clone().unwrap_or_else(|| "latest".to_string());
        self.queries.push(format!(
            "{project}/{package} rev={rev} linkrev={} expand={}",
            opts.linkrev.as_deref().unwrap_or("-"),
            opts.expand as u8
        ));
        let expanded_key = (project.to_string(), package.to_string(), rev.clone());
        if let Some(revision) = self.expanded.get(&expanded_key) {
            return Ok(Self::status_for(package, revision));
        }
        let revisions = self.revisions(project, package)?;
        let revision = Self::find_revision(revisions, &rev)?;
        if opts.expand
            && opts.linkrev.as_deref() == Some("base")
            && self.expand_404.contains(&(
                project.to_string(),
                package.to_string(),
                revision.rev.clone(),
            ))
        {
            return Err(ApiError::NotFound {
                url: format!("expanded {project}/{package} rev {rev}"),
            });
        }
        Ok(Self::status_for(package, revision))
    }

    fn history(&mut self, project: &str, package: &str) -> Result<Vec<RevisionEntry>, ApiError> {
        let revisions = self.revisions(project, package)?;
        Ok(revisions
            .iter()
            .rev()
            .map(|r| RevisionEntry {
                rev: r.rev.clone(),
                srcmd5: r.srcmd5(),
                version: None,
                time: r.time,
                user: r.user.clone(),
                comment: r.comment.clone(),
            })
            .collect())
    }

    fn get_file(
        &mut self,
        project: &str,
        package: &str,
        name: &str,
        rev: &str,
    ) -> Result<Box<dyn Read>, ApiError> {
        let expanded_key = (project.to_string(), package.to_string(), rev.to_string());
        let revision = match self.expanded.get(&expanded_key) {
            Some(revision) => revision,
            None => Self::find_revision(self.revisions(project, package)?, rev)?,
        };
        let content = revision
            .files
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| ApiError::NotFound {
                url: format!("{project}/{package}/{name}"),
            })?;
        Ok(Box::new(std::io::Cursor::new(content)))
    }

    fn get_user(&mut self, login: &str) -> Result<UserRecord, ApiError> {
        self.users
            .get(login)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                url: format!("/person/{login}"),
            })
    }

    fn put_file(
        &mut self,
        project: &str,
        package: &str,
        name: &str,
        body: Vec<u8>,
    ) -> Result<(), ApiError> {
        self.uploads.push(name.to_string());
        self.staged.insert(
            (project.to_string(), package.to_string(), name.to_string()),
            body,
        );
        Ok(())
    }

    fn commit_filelist(
        &mut self,
        project: &str,
        package: &str,
        files: &[FileEntry],
        user: &str,
        comment: &str,
        linkrev: Option<&str>,
        keeplink: bool,
    ) -> Result<PackageStatus, ApiError> {
        self.commit_calls.push((
            user.to_string(),
            comment.to_string(),
            linkrev.map(str::to_string),
            keeplink,
        ));

        let key = (project.to_string(), package.to_string());
        let mut contents = Vec::new();
        for file in files {
            let staged_key = (project.to_string(), package.to_string(), file.name.clone());
            let content = match self.staged.remove(&staged_key) {
                Some(content) => content,
                None => {
                    // the store is content-addressed; any known blob
                    // with this md5 satisfies the entry
                    let revisions = self.packages.get(&key).ok_or_else(|| ApiError::NotFound {
                        url: format!("/source/{project}/{package}"),
                    })?;
                    revisions
                        .iter()
                        .flat_map(|r| r.files.iter())
                        .find(|(_, content)| Md5Hasher::digest(content) == file.md5)
                        .map(|(_, content)| content.clone())
                        .ok_or_else(|| ApiError::Remote {
                            status: 400,
                            summary: format!("missing file '{}'", file.name),
                        })?
                }
            };
            contents.push((file.name.clone(), content));
        }

        self.clock += 1;
        let time = self.clock;
        let revisions = self.packages.entry(key).or_default();
        let link = if keeplink {
            revisions.last().and_then(|r| r.link.clone()).map(|mut l| {
                if let Some(linkrev) = linkrev {
                    l.baserev = Some(linkrev.to_string());
                }
                l
            })
        } else {
            None
        };
        let revision = FakeRevision {
            rev: (revisions.len() + 1).to_string(),
            time,
            user: user.to_string(),
            comment: comment.to_string(),
            files: contents,
            link,
        };
        let status = Self::status_for(package, &revision);
        revisions.push(revision);
        Ok(status)
    }

    fn invalidate_latest(&mut self, _project: &str, _package: &str) {
        // nothing memoized here; live data is always current
    }
}

/// A scratch git repository plus cache, initialized with real git.
pub struct Scratch {
    pub dir: tempfile::TempDir,
    pub repo: GitRepo,
    pub cache: BsCache,
}

pub fn scratch() -> Scratch {
    let dir = tempfile::tempdir().unwrap();
    let status = std::process::Command::new("git")
        .args(["init", "-q"])
        .current_dir(dir.path())
        .status()
        .unwrap();
    assert!(status.success());
    let repo = GitRepo::discover("git", dir.path()).unwrap();
    let cache = BsCache::open(repo.git_dir().join("bsgit-cache")).unwrap();
    Scratch { dir, repo, cache }
}

/// Count the commits reachable from `oid` along all parents.
pub fn commit_count(repo: &GitRepo, oid: bsgit_hash::GitOid) -> usize {
    let mut seen = HashSet::new();
    let mut pending = vec![oid];
    while let Some(oid) = pending.pop() {
        if !seen.insert(oid) {
            continue;
        }
        pending.extend(repo.read_commit(&oid).unwrap().parents);
    }
    seen.len()
}
