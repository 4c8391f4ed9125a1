use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use crate::error::ApiError;
use crate::types::{FileEntry, PackageStatus, RevisionEntry, StatusOptions, UserRecord};
use crate::url::ApiUrl;
use crate::xml;
use crate::Result;

/// The queries bsgit issues against a build service.
///
/// Object-safe so the synchronization engine can run against an
/// in-memory service in tests. Implementations may memoize; the
/// engine is single-threaded and holds one instance per API host.
pub trait BuildService {
    /// The API base this service answers for.
    fn api(&self) -> &ApiUrl;

    /// Directory listing of a package. Without an explicit rev the
    /// latest revision is listed (never an in-progress upload).
    fn list_dir(
        &mut self,
        project: &str,
        package: &str,
        opts: &StatusOptions,
    ) -> Result<PackageStatus>;

    /// Revision history, newest first.
    fn history(&mut self, project: &str, package: &str) -> Result<Vec<RevisionEntry>>;

    /// Raw file content at a revision.
    fn get_file(
        &mut self,
        project: &str,
        package: &str,
        name: &str,
        rev: &str,
    ) -> Result<Box<dyn Read>>;

    /// Person record for a login.
    fn get_user(&mut self, login: &str) -> Result<UserRecord>;

    /// Upload one file into the package's staging area.
    fn put_file(&mut self, project: &str, package: &str, name: &str, body: Vec<u8>) -> Result<()>;

    /// Commit a staged file list as a new revision; returns the new
    /// revision's listing.
    #[allow(clippy::too_many_arguments)]
    fn commit_filelist(
        &mut self,
        project: &str,
        package: &str,
        files: &[FileEntry],
        user: &str,
        comment: &str,
        linkrev: Option<&str>,
        keeplink: bool,
    ) -> Result<PackageStatus>;

    /// Forget everything memoized about the package's latest state.
    /// Called before re-observing a package that was just pushed to.
    fn invalidate_latest(&mut self, project: &str, package: &str);
}

/// HTTP implementation of [`BuildService`].
pub struct ApiClient {
    api: ApiUrl,
    credentials: Option<(String, String)>,
    http: reqwest::blocking::Client,
    status_cache: HashMap<String, PackageStatus>,
    history_cache: HashMap<(String, String), Vec<RevisionEntry>>,
    user_cache: HashMap<String, UserRecord>,
    /// `latest` pinned to the concrete revision it resolved to, per
    /// package, so repeated lookups see one consistent state.
    latest_alias: HashMap<(String, String), String>,
}

impl ApiClient {
    pub fn new(api: ApiUrl, credentials: Option<(String, String)>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            api,
            credentials,
            http,
            status_cache: HashMap::new(),
            history_cache: HashMap::new(),
            user_cache: HashMap::new(),
            latest_alias: HashMap::new(),
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
    ) -> reqwest::blocking::RequestBuilder {
        let url = format!("{}{}", self.api, path);
        let mut request = self.http.request(method, url).query(query);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }
        request
    }

    /// Issue a request; non-2xx becomes a typed error with the
    /// server's summary text when it sends one.
    fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::blocking::Response> {
        tracing::debug!(%path, ?query, "build service request");
        let mut request = self.request(method, path, query);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                url: response.url().to_string(),
            });
        }
        let code = status.as_u16();
        let text = response.text().unwrap_or_default();
        let summary = xml::parse_status_summary(&text)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        Err(ApiError::Remote {
            status: code,
            summary,
        })
    }

    fn send_text(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<String> {
        Ok(self.send(method, path, query, body)?.text()?)
    }

    fn status_key(project: &str, package: &str, query: &[(&str, String)]) -> String {
        let mut key = format!("{project}/{package}");
        for (name, value) in query {
            key.push_str(&format!(" {name}={value}"));
        }
        key
    }
}

impl BuildService for ApiClient {
    fn api(&self) -> &ApiUrl {
        &self.api
    }

    fn list_dir(
        &mut self,
        project: &str,
        package: &str,
        opts: &StatusOptions,
    ) -> Result<PackageStatus> {
        // "latest" is pinned to the first concrete revision it
        // resolves to; an explicit rev is passed through
        let pkg_key = (project.to_string(), package.to_string());
        let mut effective_rev = opts.rev.clone().unwrap_or_else(|| "latest".to_string());
        if effective_rev == "latest" {
            if let Some(concrete) = self.latest_alias.get(&pkg_key) {
                effective_rev = concrete.clone();
            }
        }
        let asked_latest = effective_rev == "latest";

        let query = opts.query(&effective_rev);
        let key = Self::status_key(project, package, &query);
        if let Some(status) = self.status_cache.get(&key) {
            return Ok(status.clone());
        }

        let text = self.send_text(
            reqwest::Method::GET,
            &format!("/source/{project}/{package}"),
            &query,
            None,
        )?;
        let status = xml::parse_directory(&text)?;

        if asked_latest {
            if let Some(rev) = &status.rev {
                if rev != "latest" {
                    self.latest_alias.insert(pkg_key, rev.clone());
                    let concrete_query = opts.query(rev);
                    let concrete_key = Self::status_key(project, package, &concrete_query);
                    self.status_cache.insert(concrete_key, status.clone());
                }
            }
        }
        self.status_cache.insert(key, status.clone());
        Ok(status)
    }

    fn history(&mut self, project: &str, package: &str) -> Result<Vec<RevisionEntry>> {
        let key = (project.to_string(), package.to_string());
        if let Some(history) = self.history_cache.get(&key) {
            return Ok(history.clone());
        }
        let text = self.send_text(
            reqwest::Method::GET,
            &format!("/source/{project}/{package}/_history"),
            &[],
            None,
        )?;
        let history = xml::parse_revision_list(&text)?;
        self.history_cache.insert(key, history.clone());
        Ok(history)
    }

    fn get_file(
        &mut self,
        project: &str,
        package: &str,
        name: &str,
        rev: &str,
    ) -> Result<Box<dyn Read>> {
        let response = self.send(
            reqwest::Method::GET,
            &format!("/source/{project}/{package}/{name}"),
            &[("rev", rev.to_string())],
            None,
        )?;
        Ok(Box::new(response))
    }

    fn get_user(&mut self, login: &str) -> Result<UserRecord> {
        if let Some(record) = self.user_cache.get(login) {
            return Ok(record.clone());
        }
        let text = self.send_text(
            reqwest::Method::GET,
            &format!("/person/{login}"),
            &[],
            None,
        )?;
        let record = xml::parse_person(&text)?;
        self.user_cache.insert(login.to_string(), record.clone());
        Ok(record)
    }

    fn put_file(&mut self, project: &str, package: &str, name: &str, body: Vec<u8>) -> Result<()> {
        self.send(
            reqwest::Method::PUT,
            &format!("/source/{project}/{package}/{name}"),
            &[("rev", "repository".to_string())],
            Some(body),
        )?;
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
    ) -> Result<PackageStatus> {
        let mut query = vec![
            ("cmd", "commitfilelist".to_string()),
            ("rev", "repository".to_string()),
            ("user", user.to_string()),
            ("comment", comment.to_string()),
        ];
        if let Some(linkrev) = linkrev {
            query.push(("linkrev", linkrev.to_string()));
        }
        if keeplink {
            query.push(("keeplink", "1".to_string()));
        }
        let body = xml::filelist_body(files)?;
        let text = self.send_text(
            reqwest::Method::POST,
            &format!("/source/{project}/{package}"),
            &query,
            Some(body.into_bytes()),
        )?;
        xml::parse_directory(&text)
    }

    fn invalidate_latest(&mut self, project: &str, package: &str) {
        let pkg_key = (project.to_string(), package.to_string());
        self.latest_alias.remove(&pkg_key);
        self.history_cache.remove(&pkg_key);
        let prefix = format!("{project}/{package} ");
        self.status_cache.retain(|key, _| !key.starts_with(&prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_key_includes_every_parameter() {
        let opts = StatusOptions {
            rev: Some("7".to_string()),
            linkrev: Some("base".to_string()),
            expand: true,
            emptylink: false,
        };
        let key = ApiClient::status_key("prj", "pkg", &opts.query("7"));
        assert_eq!(key, "prj/pkg rev=7 linkrev=base expand=1");
    }
}
