//! Diagnostic tag assembly
//!
//! Every report carries the same five base tags. A registered server adds
//! its identifier and two counters, so the tag count only depends on
//! whether a server identity exists.

use serde::{Deserialize, Deserializer, Serialize};

use crate::context::ContextSnapshot;
use crate::os_info;

/// Number of tags present on every report.
pub const BASE_TAG_COUNT: usize = 5;

/// Number of tags added once a server identity is registered.
pub const SERVER_TAG_COUNT: usize = 3;

/// A single key/value tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Ordered tag list with unique keys. Insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tags(Vec<Tag>);

/// Goes through [`Tags::insert`], so a repeated key keeps its first
/// position and takes the last value.
impl<'de> Deserialize<'de> for Tags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut tags = Tags::new();
        for tag in Vec::<Tag>::deserialize(deserializer)? {
            tags.insert(tag.key, tag.value);
        }
        Ok(tags)
    }
}

impl Tags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a tag, or overwrites the value in place if `key` exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|tag| tag.key == key) {
            Some(tag) => tag.value = value,
            None => self.0.push(Tag { key, value }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }
}

/// Builds the tag set for a report from a context snapshot.
pub fn assemble(snapshot: &ContextSnapshot) -> Tags {
    let mut tags = Tags::new();
    tags.insert("cmd", snapshot.process_tag.as_str());
    tags.insert("platform", os_info::platform());
    tags.insert("version", env!("CARGO_PKG_VERSION"));
    tags.insert("kernel", os_info::kernel_release());
    tags.insert("uptime", snapshot.uptime.as_secs().to_string());

    if let Some(server) = &snapshot.server {
        tags.insert("server_id", server.server_id.as_str());
        tags.insert("stores", server.stores.to_string());
        tags.insert("connections", server.connections.to_string());
    }

    tags
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::context::ServerFacts;

    #[test]
    fn test_base_tags_without_server() {
        let snapshot = ContextSnapshot {
            process_tag: "server".to_string(),
            server: None,
            uptime: Duration::from_secs(42),
        };
        let tags = assemble(&snapshot);

        assert_eq!(tags.len(), BASE_TAG_COUNT);
        assert_eq!(tags.get("cmd"), Some("server"));
        assert_eq!(tags.get("uptime"), Some("42"));
        assert_eq!(tags.get("version"), Some(env!("CARGO_PKG_VERSION")));
        assert!(tags.get("server_id").is_none());

        let keys: Vec<_> = tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["cmd", "platform", "version", "kernel", "uptime"]);
    }

    #[test]
    fn test_server_tags_appended_in_order() {
        let snapshot = ContextSnapshot {
            process_tag: String::new(),
            server: Some(ServerFacts {
                server_id: "0a1b2c3d-1".to_string(),
                stores: 2,
                connections: 0,
            }),
            uptime: Duration::ZERO,
        };
        let tags = assemble(&snapshot);

        assert_eq!(tags.len(), BASE_TAG_COUNT + SERVER_TAG_COUNT);
        let keys: Vec<_> = tags.iter().skip(BASE_TAG_COUNT).map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["server_id", "stores", "connections"]);
        assert_eq!(tags.get("server_id"), Some("0a1b2c3d-1"));
        assert_eq!(tags.get("stores"), Some("2"));
        assert_eq!(tags.get("connections"), Some("0"));
    }

    #[test]
    fn test_insert_overwrites_existing_key() {
        let mut tags = Tags::new();
        tags.insert("a", "1");
        tags.insert("b", "2");
        tags.insert("a", "3");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("a"), Some("3"));
        assert_eq!(tags.iter().next().map(|t| t.key.as_str()), Some("a"));
    }

    #[test]
    fn test_serializes_as_key_value_list() {
        let mut tags = Tags::new();
        tags.insert("cmd", "server");
        let json = serde_json::to_value(&tags).unwrap();
        assert_eq!(json, serde_json::json!([{"key": "cmd", "value": "server"}]));
    }

    #[test]
    fn test_deserialize_keeps_keys_unique() {
        let json = serde_json::json!([
            {"key": "cmd", "value": "server"},
            {"key": "uptime", "value": "1"},
            {"key": "cmd", "value": "test"},
        ]);
        let tags: Tags = serde_json::from_value(json).unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get("cmd"), Some("test"));
        let keys: Vec<_> = tags.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["cmd", "uptime"]);
    }
}
