use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One image repository registered with the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRecord {
    /// Repo name
    pub name: String,
    /// The host may send `null` or leave it out; either way it goes back out absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Host-side location of the repo JSON file. Unique within a snapshot.
    pub path: String,
    /// Where the repo JSON can be re-fetched from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
    /// Usually an RFC 3339 timestamp, but the host may send any display string.
    pub last_updated: String,
}

impl RepositoryRecord {
    /// Records without an update URL cannot be refreshed.
    pub fn can_update(&self) -> bool {
        self.update_url.is_some()
    }

    pub fn last_updated_display(&self) -> String {
        match DateTime::parse_from_rfc3339(&self.last_updated) {
            Ok(timestamp) => timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            Err(_) => self.last_updated.clone(),
        }
    }
}
