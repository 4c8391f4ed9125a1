//! Cache key construction.
//!
//! Every entry kind has its own namespace prefix. Keys are plain ASCII
//! so `bsgit dump` output stays readable.

use bsgit_hash::{GitOid, Md5};

/// `blob <md5>` → blob object id.
pub fn blob(md5: &Md5) -> Vec<u8> {
    format!("blob {md5}").into_bytes()
}

/// `tree <srcmd5>` → tree object id.
pub fn tree(srcmd5: &Md5) -> Vec<u8> {
    format!("tree {srcmd5}").into_bytes()
}

/// `revision <server>/<project>/<package>/<rev>` → commit object id.
///
/// `rev` may be a revision number or a srcmd5; both spellings are
/// stored when a revision is translated.
pub fn revision(server: &str, project: &str, package: &str, rev: &str) -> Vec<u8> {
    format!("revision {server}/{project}/{package}/{rev}").into_bytes()
}

/// `commit <oid>` → tree object id. Sentinel: the commit's component
/// hashes are already indexed.
pub fn commit(oid: &GitOid) -> Vec<u8> {
    format!("commit {oid}").into_bytes()
}

/// `email <login>` → email address.
pub fn email(login: &str) -> Vec<u8> {
    format!("email {login}").into_bytes()
}

/// `realname <login>` → display name.
pub fn realname(login: &str) -> Vec<u8> {
    format!("realname {login}").into_bytes()
}

/// `login <email>` → login.
pub fn login(email: &str) -> Vec<u8> {
    format!("login {email}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        let md5 = Md5::from_hex("d41d8cd98f00b204e9800998ecf8427e").unwrap();
        assert_eq!(blob(&md5), b"blob d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            revision("api.example.com", "devel:tools", "pkg", "7"),
            b"revision api.example.com/devel:tools/pkg/7"
        );
        assert_eq!(login("jane@example.com"), b"login jane@example.com");
    }
}
