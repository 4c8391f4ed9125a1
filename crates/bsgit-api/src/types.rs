use bsgit_hash::Md5;

/// One file of a package revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub md5: Md5,
}

/// Link metadata attached to a linked package's listing.
///
/// Which fields are present depends on the server and the revision's
/// age; `baserev` in particular is missing on legacy revisions and
/// must then be guessed from history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInfo {
    /// Target project of the link.
    pub project: Option<String>,
    /// Target package of the link.
    pub package: Option<String>,
    /// The link carrier's own content hash (patches and metadata).
    pub lsrcmd5: Option<Md5>,
    /// Target content hash the link was expanded against.
    pub srcmd5: Option<Md5>,
    /// Target revision (by srcmd5) the link was authored against.
    pub baserev: Option<String>,
    /// Target revision number, when the server reports one.
    pub rev: Option<String>,
    /// Content hash of the expanded tree.
    pub xsrcmd5: Option<Md5>,
}

/// A package directory listing at some revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageStatus {
    pub name: Option<String>,
    pub rev: Option<String>,
    pub srcmd5: Md5,
    pub xsrcmd5: Option<Md5>,
    pub link: Option<LinkInfo>,
    /// Sorted by name; duplicates rejected at parse time.
    pub files: Vec<FileEntry>,
}

impl PackageStatus {
    /// Look a file up by name.
    pub fn file(&self, name: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.name == name)
    }
}

/// One entry of a package's revision history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionEntry {
    pub rev: String,
    pub srcmd5: Md5,
    pub version: Option<String>,
    /// Seconds since the epoch.
    pub time: i64,
    pub user: String,
    pub comment: String,
}

/// A build service person record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub email: Option<String>,
    pub realname: Option<String>,
}

/// Query options for a directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusOptions {
    /// Revision to list; the client requests `latest` when unset.
    pub rev: Option<String>,
    /// Revision of the link target to expand against.
    pub linkrev: Option<String>,
    /// Ask the server for the expanded (link-applied) listing.
    pub expand: bool,
    /// Tolerate a broken or empty link.
    pub emptylink: bool,
}

impl StatusOptions {
    /// Listing at a concrete revision, unexpanded.
    pub fn at(rev: impl Into<String>) -> Self {
        Self {
            rev: Some(rev.into()),
            ..Self::default()
        }
    }

    /// Canonical query-string form; doubles as the memoization key.
    pub(crate) fn query(&self, effective_rev: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![("rev", effective_rev.to_string())];
        if let Some(linkrev) = &self.linkrev {
            query.push(("linkrev", linkrev.clone()));
        }
        if self.expand {
            query.push(("expand", "1".to_string()));
        }
        if self.emptylink {
            query.push(("emptylink", "1".to_string()));
        }
        query
    }
}
