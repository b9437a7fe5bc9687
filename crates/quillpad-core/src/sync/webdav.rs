use super::{RemoteStat, RemoteStore, SyncError, WebDavConfig};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::DateTime;
use std::borrow::Cow;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:getlastmodified/></d:prop></d:propfind>"#;

/// `RemoteStore` over WebDAV using blocking HTTP requests.
pub struct WebDavClient {
    agent: ureq::Agent,
    base_url: String,
    authorization: Option<String>,
}

impl WebDavClient {
    pub fn new(config: &WebDavConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        let authorization = if config.username.is_empty() && config.password.is_empty() {
            None
        } else {
            Some(basic_auth(&config.username, &config.password))
        };
        Self {
            agent,
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            authorization,
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, encode_path(path.trim_start_matches('/')))
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let request = self.agent.request(method, &self.url_for(path));
        match &self.authorization {
            Some(value) => request.set("Authorization", value),
            None => request,
        }
    }

    /// Depth-0 PROPFIND; `None` when the server reports 404.
    fn propfind(&self, path: &str) -> Result<Option<String>, SyncError> {
        let result = self
            .request("PROPFIND", path)
            .set("Depth", "0")
            .set("Content-Type", "application/xml; charset=utf-8")
            .send_string(PROPFIND_BODY);
        match result {
            Ok(response) => Ok(Some(response.into_string()?)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(err) => Err(map_error(err, path)),
        }
    }
}

impl RemoteStore for WebDavClient {
    fn exists(&self, path: &str) -> Result<bool, SyncError> {
        Ok(self.propfind(path)?.is_some())
    }

    fn create_directory(&mut self, path: &str) -> Result<(), SyncError> {
        match self.request("MKCOL", path).call() {
            Ok(_) => Ok(()),
            // Collection already exists.
            Err(ureq::Error::Status(405, _)) => Ok(()),
            Err(err) => Err(map_error(err, path)),
        }
    }

    fn put_file_contents(&mut self, path: &str, contents: &str) -> Result<(), SyncError> {
        self.request("PUT", path)
            .set("Content-Type", "text/plain; charset=utf-8")
            .send_string(contents)
            .map_err(|err| map_error(err, path))?;
        tracing::debug!(path, bytes = contents.len(), "uploaded remote file");
        Ok(())
    }

    fn get_file_contents(&self, path: &str) -> Result<String, SyncError> {
        let response = self
            .request("GET", path)
            .call()
            .map_err(|err| map_error(err, path))?;
        Ok(response.into_string()?)
    }

    fn stat(&self, path: &str) -> Result<Option<RemoteStat>, SyncError> {
        let Some(body) = self.propfind(path)? else {
            return Ok(None);
        };
        let last_modified_ms = parse_last_modified(&body).unwrap_or_else(|| {
            tracing::warn!(path, "remote file has no readable modification time");
            0
        });
        Ok(Some(RemoteStat { last_modified_ms }))
    }
}

fn map_error(err: ureq::Error, path: &str) -> SyncError {
    match err {
        ureq::Error::Status(status, _) => SyncError::Http {
            status,
            path: path.to_string(),
        },
        ureq::Error::Transport(transport) => SyncError::Network(transport.to_string()),
    }
}

fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Percent-encodes each path segment, keeping `/`. Segments that are
/// already encoded are decoded first so `%` is never escaped twice.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment));
            urlencoding::encode(&decoded).into_owned()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Pulls the first parseable `getlastmodified` value (RFC 2822) out of a
/// multistatus body, whatever namespace prefix the server uses.
fn parse_last_modified(body: &str) -> Option<i64> {
    let lower = body.to_ascii_lowercase();
    for (start, _) in lower.match_indices("getlastmodified") {
        let Some(gt) = body[start..].find('>').map(|offset| start + offset) else {
            continue;
        };
        if body[..gt].ends_with('/') {
            continue;
        }
        let value_start = gt + 1;
        let value_end = body[value_start..]
            .find('<')
            .map_or(body.len(), |offset| value_start + offset);
        let raw = body[value_start..value_end].trim();
        if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
            return Some(parsed.timestamp_millis());
        }
    }
    None
}
