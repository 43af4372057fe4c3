//! Long-lived state of published pages and the live remote view

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{PageKey, page_content_hash};

/// Last-known state of a page this system published
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemotePageRecord {
    pub page_key: PageKey,
    /// Platform-assigned identifier
    pub remote_id: String,
    pub parent_key: Option<PageKey>,
    pub title: String,
    pub last_published_hash: String,
    pub last_published_at: DateTime<Utc>,
    /// Live content diverged from `last_published_hash` without a publish
    pub manual_edit_flag: bool,
    pub archived_at: Option<DateTime<Utc>>,
}

impl RemotePageRecord {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Records keyed by page key
pub type RecordMap = BTreeMap<PageKey, RemotePageRecord>;

/// One page as currently seen on the platform.
///
/// Everything but `remote_id` is optional: platforms may return partial
/// records, and a page with missing fields is treated as malformed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LivePage {
    pub remote_id: String,
    /// Key the page claims (stored by the platform as page metadata)
    #[serde(default)]
    pub page_key: Option<PageKey>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl LivePage {
    /// Hash comparable with `last_published_hash`; `None` when malformed
    pub fn content_hash(&self) -> Option<String> {
        match (&self.title, &self.body) {
            (Some(title), Some(body)) => Some(page_content_hash(title, body)),
            _ => None,
        }
    }
}

/// Frozen view of the remote tree taken before planning
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiveRemoteSnapshot {
    pages: BTreeMap<String, LivePage>,
    /// Keys claimed by listed entries that carry no usable remote id
    #[serde(default)]
    unidentified: BTreeSet<PageKey>,
}

impl LiveRemoteSnapshot {
    pub fn new(pages: Vec<LivePage>) -> Self {
        let mut map = BTreeMap::new();
        for page in pages {
            map.entry(page.remote_id.clone()).or_insert(page);
        }
        Self {
            pages: map,
            unidentified: BTreeSet::new(),
        }
    }

    /// Record keys the platform listed without an id. Reconciliation
    /// treats them as malformed pages instead of absent ones.
    pub fn with_unidentified(mut self, keys: impl IntoIterator<Item = PageKey>) -> Self {
        self.unidentified.extend(keys);
        self
    }

    pub fn has_unidentified(&self, key: &PageKey) -> bool {
        self.unidentified.contains(key)
    }

    pub fn get(&self, remote_id: &str) -> Option<&LivePage> {
        self.pages.get(remote_id)
    }

    /// First live page (by remote id) claiming `key`
    pub fn claimed(&self, key: &PageKey) -> Option<&LivePage> {
        self.pages
            .values()
            .find(|p| p.page_key.as_ref() == Some(key))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> impl Iterator<Item = &LivePage> {
        self.pages.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: &str, key: Option<&str>, body: Option<&str>) -> LivePage {
        LivePage {
            remote_id: id.to_string(),
            page_key: key.map(PageKey::from),
            title: Some("T".into()),
            body: body.map(str::to_string),
            archived: false,
        }
    }

    #[test]
    fn test_malformed_page_has_no_hash() {
        assert!(page("1", Some("A"), None).content_hash().is_none());
        assert_eq!(
            page("1", Some("A"), Some("body")).content_hash(),
            Some(page_content_hash("T", "body"))
        );
    }

    #[test]
    fn test_claimed_lookup() {
        let snapshot = LiveRemoteSnapshot::new(vec![
            page("2", Some("API"), Some("x")),
            page("1", None, Some("y")),
        ]);
        assert_eq!(snapshot.claimed(&PageKey::from("API")).unwrap().remote_id, "2");
        assert!(snapshot.claimed(&PageKey::from("Other")).is_none());
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_unidentified_keys_are_tracked_apart_from_pages() {
        let snapshot = LiveRemoteSnapshot::new(vec![page("1", Some("A"), Some("x"))])
            .with_unidentified([PageKey::from("B")]);

        assert!(snapshot.has_unidentified(&PageKey::from("B")));
        assert!(!snapshot.has_unidentified(&PageKey::from("A")));
        assert!(snapshot.claimed(&PageKey::from("B")).is_none());
        assert_eq!(snapshot.len(), 1);
    }
}
