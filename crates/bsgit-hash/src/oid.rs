use std::fmt;
use std::str::FromStr;

use crate::hex;
use crate::HashError;

/// A git object identifier (SHA-1, 40 hex characters).
///
/// bsgit never computes these itself; they come back from the git
/// plumbing and are carried around as opaque identities.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitOid([u8; 20]);

impl GitOid {
    /// Parse from a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let mut bytes = [0u8; 20];
        hex::decode(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// The raw bytes of the hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GitOid({})", self.to_hex())
    }
}

impl FromStr for GitOid {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let hex = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
        let oid = GitOid::from_hex(hex).unwrap();
        assert_eq!(oid.to_string(), hex);
    }

    #[test]
    fn rejects_md5_length() {
        assert!(GitOid::from_hex("d41d8cd98f00b204e9800998ecf8427e").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(GitOid::from_hex("zz39a3ee5e6b4b0d3255bfef95601890afd80709").is_err());
    }
}
