use super::SyncError;
use crate::storage::{Storage, WEBDAV_CONFIG_KEY};
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_REMOTE_PATH: &str = "/quillpad";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDavConfig {
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_remote_path")]
    pub remote_path: String,
}

fn default_remote_path() -> String {
    DEFAULT_REMOTE_PATH.to_string()
}

impl fmt::Debug for WebDavConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDavConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remote_path", &self.remote_path)
            .finish()
    }
}

impl WebDavConfig {
    pub fn new(url: &str, username: &str, password: &str, remote_path: Option<&str>) -> Self {
        Self {
            url: url.trim().to_string(),
            username: username.to_string(),
            password: password.to_string(),
            remote_path: remote_path
                .map(str::to_string)
                .unwrap_or_else(default_remote_path),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.url.trim().is_empty()
    }

    pub fn load<S: Storage + ?Sized>(storage: &S) -> Result<Option<Self>, SyncError> {
        let Some(raw) = storage.get(WEBDAV_CONFIG_KEY)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn save<S: Storage + ?Sized>(&self, storage: &mut S) -> Result<(), SyncError> {
        let data = serde_json::to_string(self)?;
        storage.set(WEBDAV_CONFIG_KEY, &data)?;
        Ok(())
    }

    pub fn clear<S: Storage + ?Sized>(storage: &mut S) -> Result<(), SyncError> {
        storage.remove(WEBDAV_CONFIG_KEY)?;
        Ok(())
    }
}
