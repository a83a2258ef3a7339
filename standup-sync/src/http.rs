//! [`ObjectStore`] over a git-hosting content API.
//!
//! | op     | request                                                            |
//! |--------|--------------------------------------------------------------------|
//! | read   | `GET <base>/<path>?ref=<branch>` + `If-None-Match: <etag>`         |
//! | write  | `PUT <base>/<path>` `{message, content, branch, committer, sha?}`  |
//! | delete | `DELETE <base>/<path>` `{message, sha, branch}`                    |
//! | list   | `GET <base>/<dir>?ref=<branch>` → `[{name, path, type, sha}]`      |
//!
//! Bodies travel base64-encoded. Timeouts are left to the transport defaults.
//! The blob `sha` is the CAS version; the response `ETag` header is the read
//! validator. The API never answers 304 to a bare sha.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use url::Url;

use standup_core::StandupConfig;

use crate::error::{classify_status, SyncError};
use crate::store::{ListedObject, ObjectStore, ReadOutcome, RemoteObject};

const USER_AGENT: &str = concat!("standup/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
/// Longest error body carried into an error message.
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`HttpObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStoreConfig {
    pub base_url: String,
    pub branch: String,
    pub token: Option<String>,
    pub committer_name: String,
    pub committer_email: String,
}

impl HttpStoreConfig {
    pub fn from_config(config: &StandupConfig) -> Self {
        Self {
            base_url: config.store_url.clone(),
            branch: config.branch.clone(),
            token: config.resolved_token(),
            committer_name: config.writer.0.clone(),
            committer_email: config
                .committer_email
                .clone()
                .unwrap_or_else(|| "standup@users.noreply.github.com".to_string()),
        }
    }
}

pub struct HttpObjectStore {
    agent: ureq::Agent,
    config: HttpStoreConfig,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: WrittenContent,
}

#[derive(Debug, Deserialize)]
struct WrittenContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct Committer<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    committer: Committer<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

// ---------------------------------------------------------------------------
// HttpObjectStore
// ---------------------------------------------------------------------------

impl HttpObjectStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, SyncError> {
        Url::parse(&config.base_url)?;
        Ok(Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
            config,
        })
    }

    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    /// `<base>/<path>`, with every path segment percent-encoded.
    pub fn object_url(&self, path: &str, with_ref: bool) -> Result<Url, SyncError> {
        let mut url = Url::parse(&self.config.base_url)?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                SyncError::Malformed(format!(
                    "store URL cannot take a path: {}",
                    self.config.base_url
                ))
            })?;
            segments.pop_if_empty();
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }
        if with_ref {
            url.query_pairs_mut().append_pair("ref", &self.config.branch);
        }
        Ok(url)
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let request = self
            .agent
            .request_url(method, url)
            .set("Accept", ACCEPT);
        match &self.config.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn require_token(&self) -> Result<(), SyncError> {
        if self.config.token.is_some() {
            Ok(())
        } else {
            Err(SyncError::AuthFailure {
                message: "no store token configured (set `token` or $STANDUP_TOKEN)".to_string(),
            })
        }
    }
}

impl ObjectStore for HttpObjectStore {
    fn read(&self, path: &str, known_etag: Option<&str>) -> Result<ReadOutcome, SyncError> {
        let url = self.object_url(path, true)?;
        let mut request = self.request("GET", &url);
        if let Some(etag) = known_etag {
            request = request.set("If-None-Match", etag);
        }
        tracing::debug!("GET {path} (etag: {known_etag:?})");

        match request.call() {
            Ok(response) if response.status() == 304 => Ok(ReadOutcome::Unchanged),
            Ok(response) => {
                let etag = response_etag(&response);
                let content: ContentResponse = response
                    .into_json()
                    .map_err(|e| SyncError::Malformed(format!("{path}: {e}")))?;
                let body = decode_content(path, &content.content)?;
                Ok(ReadOutcome::Found(RemoteObject {
                    path: content.path.unwrap_or_else(|| path.to_string()),
                    version: content.sha,
                    etag,
                    size: content.size,
                    body,
                }))
            }
            Err(ureq::Error::Status(404, _)) => Ok(ReadOutcome::Absent),
            Err(err) => Err(map_ureq_error(path, err)),
        }
    }

    fn write(
        &self,
        path: &str,
        body: &str,
        expected_version: Option<&str>,
        message: &str,
    ) -> Result<String, SyncError> {
        self.require_token()?;
        let url = self.object_url(path, false)?;
        let payload = WriteRequest {
            message,
            content: STANDARD.encode(body.as_bytes()),
            branch: &self.config.branch,
            committer: Committer {
                name: &self.config.committer_name,
                email: &self.config.committer_email,
            },
            sha: expected_version,
        };
        tracing::debug!("PUT {path} (expected version: {expected_version:?})");

        let response = self
            .request("PUT", &url)
            .send_json(serde_json::to_value(&payload)?)
            .map_err(|err| map_ureq_error(path, err))?;
        let written: WriteResponse = response
            .into_json()
            .map_err(|e| SyncError::Malformed(format!("{path}: {e}")))?;
        Ok(written.content.sha)
    }

    fn delete(&self, path: &str, version: &str, message: &str) -> Result<(), SyncError> {
        self.require_token()?;
        let url = self.object_url(path, false)?;
        let payload = DeleteRequest {
            message,
            sha: version,
            branch: &self.config.branch,
        };
        tracing::debug!("DELETE {path} (version: {version})");

        self.request("DELETE", &url)
            .send_json(serde_json::to_value(&payload)?)
            .map_err(|err| map_ureq_error(path, err))?;
        Ok(())
    }

    fn list(&self, dir: &str, suffix: &str) -> Result<Vec<ListedObject>, SyncError> {
        self.require_token()?;
        let url = self.object_url(dir, true)?;
        tracing::debug!("GET {dir}/ (listing *{suffix})");

        let entries: Vec<DirectoryEntry> = match self.request("GET", &url).call() {
            Ok(response) => response
                .into_json()
                .map_err(|e| SyncError::Malformed(format!("{dir}: {e}")))?,
            Err(ureq::Error::Status(404, _)) => return Ok(Vec::new()),
            Err(err) => return Err(map_ureq_error(dir, err)),
        };
        Ok(filter_listing(entries, suffix))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn filter_listing(entries: Vec<DirectoryEntry>, suffix: &str) -> Vec<ListedObject> {
    entries
        .into_iter()
        .filter(|e| e.kind == "file" && e.name.ends_with(suffix))
        .map(|e| ListedObject {
            path: e.path,
            name: e.name,
            version: e.sha,
        })
        .collect()
}

/// The read validator, passed back verbatim (weak prefix and quotes included).
fn response_etag(response: &ureq::Response) -> Option<String> {
    response
        .header("ETag")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// The API wraps base64 at 60 columns; strip whitespace before decoding.
fn decode_content(path: &str, raw: &str) -> Result<String, SyncError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| SyncError::Malformed(format!("{path}: bad base64 content: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| SyncError::Malformed(format!("{path}: content is not UTF-8: {e}")))
}

fn map_ureq_error(path: &str, err: ureq::Error) -> SyncError {
    match err {
        ureq::Error::Status(status, response) => {
            let retry_after = response
                .header("Retry-After")
                .and_then(|v| v.trim().parse::<u64>().ok());
            let mut message = response
                .into_string()
                .unwrap_or_else(|_| format!("HTTP {status}"));
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            tracing::warn!("{path}: store answered HTTP {status}");
            classify_status(status, path, message, retry_after)
        }
        ureq::Error::Transport(transport) => SyncError::Transport(transport.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> HttpObjectStore {
        HttpObjectStore::new(HttpStoreConfig {
            base_url: "https://api.example.test/repos/acme/standups/contents/".to_string(),
            branch: "main".to_string(),
            token: None,
            committer_name: "Ada".to_string(),
            committer_email: "ada@example.test".to_string(),
        })
        .expect("store")
    }

    #[test]
    fn object_url_encodes_segments() {
        let url = store()
            .object_url("standups/core -- Ada -- 2024-05-01.txt", true)
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.example.test/repos/acme/standups/contents/standups/core%20--%20Ada%20--%202024-05-01.txt?ref=main"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = HttpObjectStore::new(HttpStoreConfig {
            base_url: "not a url".to_string(),
            branch: "main".to_string(),
            token: None,
            committer_name: String::new(),
            committer_email: String::new(),
        })
        .err()
        .expect("error");
        assert!(matches!(err, SyncError::Url(_)));
    }

    #[test]
    fn mutations_require_a_token() {
        let store = store();
        let err = store.write("standups/a.txt", "x", None, "m").unwrap_err();
        assert!(matches!(err, SyncError::AuthFailure { .. }));
        let err = store.list("standups", ".txt").unwrap_err();
        assert!(matches!(err, SyncError::AuthFailure { .. }));
    }

    #[test]
    fn etag_header_is_kept_verbatim() {
        let response: ureq::Response =
            "HTTP/1.1 200 OK\r\nETag: W/\"0f3c\"\r\nContent-Length: 2\r\n\r\n{}"
                .parse()
                .expect("response");
        assert_eq!(response_etag(&response).as_deref(), Some("W/\"0f3c\""));

        let bare: ureq::Response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n{}"
            .parse()
            .expect("response");
        assert_eq!(response_etag(&bare), None);
    }

    #[test]
    fn wrapped_base64_decodes() {
        let body = decode_content("p", "VEVB\nTT0i\nY29y\nZSIK\n").expect("decode");
        assert_eq!(body, "TEAM=\"core\"\n");
    }

    #[test]
    fn listing_keeps_matching_files_only() {
        let raw = r#"[
            {"name": "core -- Ada -- s1.txt", "path": "standups/core -- Ada -- s1.txt", "type": "file", "sha": "a1"},
            {"name": "teams", "path": "standups/teams", "type": "dir", "sha": "b2"},
            {"name": "README.md", "path": "standups/README.md", "type": "file", "sha": "c3"}
        ]"#;
        let entries: Vec<DirectoryEntry> = serde_json::from_str(raw).expect("parse");
        let listed = filter_listing(entries, ".txt");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].version, "a1");
    }

    #[test]
    fn write_request_omits_sha_on_create() {
        let payload = WriteRequest {
            message: "m",
            content: STANDARD.encode("x"),
            branch: "main",
            committer: Committer {
                name: "Ada",
                email: "ada@example.test",
            },
            sha: None,
        };
        let json = serde_json::to_value(&payload).expect("json");
        assert!(json.get("sha").is_none());
        assert_eq!(json["content"], "eA==");
    }
}
