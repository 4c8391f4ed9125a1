//! The object importer: build service content into git blobs and trees.

use std::io::Read;

use bsgit_api::FileEntry;
use bsgit_cache::keys;
use bsgit_git::STREAM_CHUNK;
use bsgit_hash::{compute_srcmd5, GitOid, Md5, Md5Hasher};

use crate::context::Fetcher;
use crate::error::SyncError;
use crate::Result;

impl Fetcher<'_> {
    /// Derive the blob for one package file.
    ///
    /// A cached `blob <md5>` entry short-circuits the download.
    /// Otherwise the file is streamed simultaneously into an MD5
    /// hasher and `hash-object -w --stdin`; a checksum mismatch kills
    /// the writer so the partial object is discarded.
    pub(crate) fn derive_blob(
        &mut self,
        project: &str,
        package: &str,
        fetch_rev: &str,
        name: &str,
        md5: &Md5,
    ) -> Result<GitOid> {
        if let Some(oid) = self.cache.get_oid(&keys::blob(md5))? {
            return Ok(oid);
        }

        tracing::info!("fetching {project}/{package}/{name}");
        let mut reader = self.service.get_file(project, package, name, fetch_rev)?;
        let mut writer = self.repo.hash_object_writer()?;
        let mut hasher = Md5Hasher::new();
        let mut buf = [0u8; STREAM_CHUNK];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(n) => n,
                Err(err) => {
                    writer.abort();
                    return Err(SyncError::Api(err.into()));
                }
            };
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            if let Err(err) = writer.write(&buf[..n]) {
                writer.abort();
                return Err(err.into());
            }
        }

        let actual = hasher.finalize();
        if actual != *md5 {
            writer.abort();
            return Err(SyncError::ChecksumMismatch {
                file: format!("{project}/{package}/{name}"),
                expected: *md5,
                actual,
            });
        }

        let oid = writer.finish()?;
        self.cache.put_oid(&keys::blob(md5), &oid)?;
        Ok(oid)
    }

    /// Derive the tree for a revision's file list.
    ///
    /// The listing's srcmd5 keys the `tree` cache entry; a hit means
    /// none of the blobs need to be looked at either.
    pub(crate) fn derive_tree(
        &mut self,
        project: &str,
        package: &str,
        fetch_rev: &str,
        files: &[FileEntry],
    ) -> Result<GitOid> {
        let srcmd5 = compute_srcmd5(files.iter().map(|f| (f.name.as_str(), f.md5)));
        if let Some(oid) = self.cache.get_oid(&keys::tree(&srcmd5))? {
            return Ok(oid);
        }

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let blob = self.derive_blob(project, package, fetch_rev, &file.name, &file.md5)?;
            entries.push((file.name.clone(), blob));
        }
        let tree = self.repo.mktree(&entries)?;
        self.cache.put_oid(&keys::tree(&srcmd5), &tree)?;
        Ok(tree)
    }
}
