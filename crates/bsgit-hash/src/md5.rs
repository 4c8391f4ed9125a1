use std::fmt;
use std::str::FromStr;

use digest::Digest;

use crate::hex;
use crate::HashError;

/// An MD5 content hash as used by the build service.
///
/// Identifies both single files (`md5` attribute of a directory entry)
/// and whole directory listings (`srcmd5`, see [`compute_srcmd5`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Md5([u8; 16]);

impl Md5 {
    /// Parse from a 32-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let mut bytes = [0u8; 16];
        hex::decode(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Md5 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Md5 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Md5({})", self.to_hex())
    }
}

impl FromStr for Md5 {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Streaming MD5 computation.
///
/// Data is fed incrementally with [`update`](Md5Hasher::update); used to
/// verify downloads against their advertised checksum while they are
/// being written elsewhere.
#[derive(Default)]
pub struct Md5Hasher {
    inner: md5::Md5,
}

impl Md5Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Md5 {
        let result = self.inner.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&result);
        Md5(bytes)
    }

    /// Convenience: hash a complete buffer in one call.
    pub fn digest(data: &[u8]) -> Md5 {
        let mut h = Self::new();
        h.update(data);
        h.finalize()
    }
}

/// Compute the srcmd5 of a directory listing.
///
/// The build service hashes the concatenation of `"<md5>  <name>\n"`
/// lines, sorted bytewise by file name. The input order does not
/// matter; names are assumed distinct.
pub fn compute_srcmd5<'a, I>(files: I) -> Md5
where
    I: IntoIterator<Item = (&'a str, Md5)>,
{
    let mut entries: Vec<(&str, Md5)> = files.into_iter().collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut hasher = Md5Hasher::new();
    for (name, md5) in entries {
        hasher.update(md5.to_hex().as_bytes());
        hasher.update(b"  ");
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize()
}
