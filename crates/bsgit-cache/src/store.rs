use std::path::Path;

use bsgit_hash::GitOid;

use crate::error::CacheError;
use crate::Result;

/// The on-disk mapping cache.
///
/// Opened once per run and flushed when dropped. Values are raw bytes;
/// the typed accessors below cover the common case of storing an
/// object id or a short string.
pub struct BsCache {
    db: sled::Db,
}

impl BsCache {
    /// Open (or create) the cache at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Look a key up.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    /// Store a key/value pair, replacing any previous value.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    /// Remove a key. Removing an absent key is not an error.
    pub fn del(&self, key: &[u8]) -> Result<()> {
        self.db.remove(key)?;
        Ok(())
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.db.contains_key(key)?)
    }

    /// All keys, sorted, for `bsgit dump`.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        for entry in self.db.iter() {
            let (key, _) = entry?;
            keys.push(key.to_vec());
        }
        keys.sort();
        Ok(keys)
    }

    /// Look up a value that must be an object id.
    pub fn get_oid(&self, key: &[u8]) -> Result<Option<GitOid>> {
        match self.get(key)? {
            None => Ok(None),
            Some(value) => {
                let hex = std::str::from_utf8(&value).map_err(|_| CacheError::BadValue {
                    key: String::from_utf8_lossy(key).into_owned(),
                })?;
                Ok(Some(GitOid::from_hex(hex.trim())?))
            }
        }
    }

    /// Store an object id value.
    pub fn put_oid(&self, key: &[u8], oid: &GitOid) -> Result<()> {
        self.put(key, oid.to_hex().as_bytes())
    }

    /// Look up a UTF-8 string value.
    pub fn get_str(&self, key: &[u8]) -> Result<Option<String>> {
        match self.get(key)? {
            None => Ok(None),
            Some(value) => String::from_utf8(value)
                .map(Some)
                .map_err(|_| CacheError::BadValue {
                    key: String::from_utf8_lossy(key).into_owned(),
                }),
        }
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Drop for BsCache {
    fn drop(&mut self) {
        // release path for every exit; errors here have nowhere to go
        if let Err(err) = self.db.flush() {
            tracing::warn!("failed to flush mapping cache: {err}");
        }
    }
}
