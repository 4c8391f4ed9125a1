//! Replaying local commits as new build service revisions.
//!
//! A push walks the first-parent chain from the local branch tip down
//! to the remote tip, classifies each commit (linear, link merge, or
//! unsupported), uploads the files the server does not already have,
//! and issues one `commitfilelist` per commit in chronological order.
//! The server rewrites what it stores, so the local branch is finally
//! hard-reset to the freshly fetched remote state.

use bsgit_api::{FileEntry, PackageStatus};
use bsgit_cache::keys;
use bsgit_git::CommitInfo;
use bsgit_hash::{GitOid, Md5, Md5Hasher};

use crate::context::Fetcher;
use crate::error::SyncError;
use crate::Result;

/// What a completed push did.
#[derive(Debug)]
pub struct PushOutcome {
    /// Revisions created on the build service.
    pub pushed: usize,
    /// The refreshed remote tip the local branch now points at.
    pub new_tip: GitOid,
}

struct PushRecord {
    commit: GitOid,
    info: CommitInfo,
    /// Link base to preserve; revisions of a linked package keep
    /// their predecessor's base when no merge names a new one.
    baserev: Option<Md5>,
}

/// Push the commits on `branch` that the build service does not have.
pub fn push_package(
    fetcher: &mut Fetcher<'_>,
    project: &str,
    package: &str,
    branch: &str,
) -> Result<PushOutcome> {
    let remote_tip = fetcher.fetch_package(project, package)?;
    let local_tip = fetcher
        .repo
        .branch_tip(branch)?
        .ok_or_else(|| SyncError::MissingBranch {
            branch: branch.to_string(),
        })?;

    if Some(local_tip) == remote_tip {
        return Err(SyncError::NothingToPush {
            branch: branch.to_string(),
        });
    }
    if let Some(remote) = &remote_tip {
        if !fetcher.repo.is_ancestor(remote, &local_tip)? {
            return Err(SyncError::NotAChild {
                branch: branch.to_string(),
            });
        }
    }
    if !fetcher.repo.index_clean()? {
        return Err(SyncError::DirtyIndex);
    }

    let mut records = collect_records(fetcher, project, package, remote_tip, local_tip)?;

    // revisions without an explicit base inherit their predecessor's,
    // seeded from what the remote currently records
    let mut base = fetcher
        .uptodate_info(project, package)?
        .map(|(srcmd5, _)| srcmd5);
    for record in &mut records {
        match record.baserev {
            Some(srcmd5) => base = Some(srcmd5),
            None => record.baserev = base,
        }
    }

    let mut old = match remote_tip {
        Some(_) => Some(fetcher.tip_status(project, package)?),
        None => None,
    };
    let mut prev_rev: u64 = old
        .as_ref()
        .and_then(|status| status.rev.as_deref())
        .and_then(|rev| rev.parse().ok())
        .unwrap_or(0);

    for record in &records {
        let status = push_commit(fetcher, project, package, record, old.as_ref())?;
        let expected = prev_rev + 1;
        let actual = status.rev.clone().unwrap_or_default();
        if actual.parse::<u64>().ok() != Some(expected) {
            return Err(SyncError::UnexpectedRev { expected, actual });
        }
        prev_rev = expected;
        old = Some(status);
    }

    // conform local history to what the server actually recorded
    fetcher.service.invalidate_latest(project, package);
    fetcher.forget_package(project, package);
    let new_tip = fetcher
        .fetch_package(project, package)?
        .ok_or_else(|| SyncError::BadLink {
            detail: format!("{project}/{package} has no revisions after push"),
        })?;

    if fetcher.repo.head_branch()?.as_deref() == Some(branch) {
        fetcher.repo.reset_hard(&new_tip)?;
    } else {
        fetcher
            .repo
            .command(&["branch", "-f", branch])
            .arg(new_tip.to_hex())
            .run_checked()?;
    }

    Ok(PushOutcome {
        pushed: records.len(),
        new_tip,
    })
}

/// Walk first-parent from the local tip to the remote tip and classify
/// every commit on the way. Returns the chain in chronological order.
fn collect_records(
    fetcher: &mut Fetcher<'_>,
    project: &str,
    package: &str,
    remote_tip: Option<GitOid>,
    local_tip: GitOid,
) -> Result<Vec<PushRecord>> {
    let mut records = Vec::new();
    let mut cursor = local_tip;
    loop {
        if Some(cursor) == remote_tip {
            break;
        }
        let info = fetcher.repo.read_commit(&cursor)?;
        let parents = info.parents.clone();
        match parents[..] {
            [] => {
                if remote_tip.is_some() {
                    return Err(SyncError::BrokenHistory { commit: cursor });
                }
                records.push(PushRecord {
                    commit: cursor,
                    info,
                    baserev: None,
                });
                break;
            }
            [parent] => {
                records.push(PushRecord {
                    commit: cursor,
                    info,
                    baserev: None,
                });
                cursor = parent;
            }
            [first, second] => {
                let Some((base_srcmd5, base_commit)) = fetcher.uptodate_info(project, package)?
                else {
                    return Err(SyncError::BadMerge { commit: cursor });
                };
                let previous = if first == base_commit {
                    second
                } else if second == base_commit {
                    first
                } else {
                    return Err(SyncError::BadMerge { commit: cursor });
                };
                records.push(PushRecord {
                    commit: cursor,
                    info,
                    baserev: Some(base_srcmd5),
                });
                cursor = previous;
            }
            _ => return Err(SyncError::NWayMerge { commit: cursor }),
        }
    }
    records.reverse();
    Ok(records)
}

/// Upload one commit's tree and commit it as the next revision.
fn push_commit(
    fetcher: &mut Fetcher<'_>,
    project: &str,
    package: &str,
    record: &PushRecord,
    old: Option<&PackageStatus>,
) -> Result<PackageStatus> {
    let mut files = Vec::new();
    for entry in fetcher.repo.ls_tree(&record.info.tree.to_hex())? {
        if entry.kind != "blob" {
            let what = if entry.kind == "tree" {
                "subdirectory"
            } else {
                "unsupported object"
            };
            return Err(SyncError::CorruptCommit {
                commit: record.commit,
                detail: format!("{what} '{}' cannot be pushed", entry.name),
            });
        }
        if entry.mode == "120000" {
            return Err(SyncError::CorruptCommit {
                commit: record.commit,
                detail: format!("symbolic link '{}' cannot be pushed", entry.name),
            });
        }
        if entry.mode != "100644" {
            tracing::warn!(
                "file '{}' has mode {}; the build service stores it as 0644",
                entry.name,
                entry.mode
            );
        }

        // a file whose blob matches the remote revision keeps its MD5
        // and is not uploaded again
        let mut md5 = None;
        if let Some(old_file) = old.and_then(|status| status.file(&entry.name)) {
            if let Some(known) = fetcher.cache.get_oid(&keys::blob(&old_file.md5))? {
                if known == entry.oid {
                    md5 = Some(old_file.md5);
                }
            }
        }
        let md5 = match md5 {
            Some(md5) => md5,
            None => {
                tracing::info!("uploading {project}/{package}/{}", entry.name);
                let content = fetcher.repo.read_blob(&entry.oid)?;
                let md5 = Md5Hasher::digest(&content);
                fetcher
                    .service
                    .put_file(project, package, &entry.name, content)?;
                fetcher.cache.put_oid(&keys::blob(&md5), &entry.oid)?;
                md5
            }
        };
        files.push(FileEntry {
            name: entry.name,
            md5,
        });
    }

    let committer = fetcher.login_for_email(&record.info.committer.ident.email)?;
    if let Some(author) = fetcher.try_login_for_email(&record.info.author.ident.email)? {
        if author != committer {
            tracing::warn!(
                "commit {} was authored by '{author}' but the build service will \
                 attribute it to '{committer}'",
                record.commit
            );
        }
    }

    let linkrev = record.baserev.map(|srcmd5| srcmd5.to_hex());
    let status = fetcher.service.commit_filelist(
        project,
        package,
        &files,
        &committer,
        &record.info.message,
        linkrev.as_deref(),
        linkrev.is_some(),
    )?;
    Ok(status)
}
