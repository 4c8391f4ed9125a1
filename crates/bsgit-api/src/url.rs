use std::fmt;

use crate::error::ApiError;

/// An API base URL: `http://host[:port]` or `https://host[:port]`.
///
/// The authority part doubles as the server name in cache keys and
/// remote-tracking refs, so it is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiUrl {
    https: bool,
    authority: String,
}

impl ApiUrl {
    /// Parse an API base URL. A trailing slash or path is rejected;
    /// the API mounts at the root.
    pub fn parse(url: &str) -> Result<Self, ApiError> {
        let url = url.trim().trim_end_matches('/');
        let (https, rest) = if let Some(rest) = url.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (false, rest)
        } else {
            return Err(ApiError::BadUrl(url.to_string()));
        };
        if rest.is_empty() || rest.contains('/') || rest.contains('@') {
            return Err(ApiError::BadUrl(url.to_string()));
        }
        Ok(Self {
            https,
            authority: rest.to_string(),
        })
    }

    /// The `host[:port]` part; used as the `<server>` in cache keys
    /// and ref names.
    pub fn host(&self) -> &str {
        &self.authority
    }
}

impl fmt::Display for ApiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.https { "https" } else { "http" };
        write!(f, "{}://{}", scheme, self.authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let api = ApiUrl::parse("https://api.opensuse.org").unwrap();
        assert_eq!(api.host(), "api.opensuse.org");
        assert_eq!(api.to_string(), "https://api.opensuse.org");

        let api = ApiUrl::parse("http://localhost:3000/").unwrap();
        assert_eq!(api.host(), "localhost:3000");
        assert_eq!(api.to_string(), "http://localhost:3000");
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(ApiUrl::parse("ftp://api.example.com").is_err());
        assert!(ApiUrl::parse("api.example.com").is_err());
        assert!(ApiUrl::parse("https://api.example.com/obs").is_err());
        assert!(ApiUrl::parse("https://user@api.example.com").is_err());
        assert!(ApiUrl::parse("https://").is_err());
    }
}
