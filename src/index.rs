//! Domain-grouped message index with a JSON snapshot on disk.
//!
//! The index is an explicitly owned store: screens and the bulk executor
//! receive it by reference. Every mutation writes the snapshot back; a
//! failed write is logged and the in-memory state stays authoritative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::email::MessageRecord;
use crate::gateway::{self, GatewayError, MailGateway};

/// Key for transient "most recent messages" result sets
pub const RECENT_VIEW_KEY: &str = "recent-view";
/// Key for transient search result sets
pub const SEARCH_VIEW_KEY: &str = "search-view";

/// Returns true for keys that name live result sets rather than cached buckets
pub fn is_reserved_key(key: &str) -> bool {
    key == RECENT_VIEW_KEY || key == SEARCH_VIEW_KEY
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cache file at {}", .0.display())]
    Missing(PathBuf),
    #[error("cache file {} could not be accessed: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache file {} is unusable: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("failed to encode index: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("index has no backing file")]
    NoBackingFile,
}

/// Result of a removal against the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Messages were removed and the bucket still holds `remaining`
    Removed { remaining: usize },
    /// The bucket emptied (or was dropped outright) and no longer exists
    BucketRemoved,
    /// The key or id was not indexed; nothing changed
    Missing,
    /// The key names a transient view; nothing changed
    Reserved,
}

/// Summary of a completed rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSummary {
    pub messages: usize,
    pub domains: usize,
}

/// All indexed messages from one sender domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainBucket {
    #[serde(rename = "Name")]
    key: String,
    #[serde(rename = "Count")]
    count: usize,
    #[serde(rename = "Messages")]
    messages: Vec<MessageRecord>,
}

impl DomainBucket {
    fn new(key: String) -> Self {
        Self {
            key,
            count: 0,
            messages: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Messages ordered newest first
    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Receive time of the newest message, if any message has one
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.messages.iter().filter_map(|m| m.received_at).max()
    }

    fn push(&mut self, record: MessageRecord) {
        self.messages.push(record);
        self.count = self.messages.len();
    }

    /// Removes the first message with `id`; returns whether one was found
    fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.messages.iter().position(|m| m.id == id) else {
            return false;
        };
        self.messages.remove(pos);
        self.count = self.messages.len();
        true
    }

    fn sort_newest_first(&mut self) {
        self.messages
            .sort_by_key(|m| Reverse(m.received_at.unwrap_or(DateTime::<Utc>::MIN_UTC)));
    }
}

/// The sender index for one mailbox
#[derive(Debug, Default)]
pub struct SenderIndex {
    buckets: BTreeMap<String, DomainBucket>,
    path: Option<PathBuf>,
}

impl SenderIndex {
    /// Creates an empty index that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates an empty index backed by the snapshot file at `path`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            buckets: BTreeMap::new(),
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn domain_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn total_messages(&self) -> usize {
        self.buckets.values().map(DomainBucket::count).sum()
    }

    /// Buckets ordered by message count (descending), then key
    pub fn domains(&self) -> Vec<&DomainBucket> {
        let mut domains: Vec<&DomainBucket> = self.buckets.values().collect();
        domains.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        domains
    }

    pub fn bucket(&self, key: &str) -> Option<&DomainBucket> {
        self.buckets.get(&key.to_lowercase())
    }

    /// Discards the current index and regroups the mailbox by sender domain.
    /// A failed fetch leaves the previous index in place.
    pub fn rebuild(
        &mut self,
        gateway: &mut dyn MailGateway,
        max_count: Option<usize>,
    ) -> Result<RebuildSummary, GatewayError> {
        let records = gateway::fetch_records(gateway, None, max_count)?;

        let mut buckets: BTreeMap<String, DomainBucket> = BTreeMap::new();
        for record in records {
            let key = record.domain_key();
            buckets
                .entry(key.clone())
                .or_insert_with(|| DomainBucket::new(key))
                .push(record);
        }
        for bucket in buckets.values_mut() {
            bucket.sort_newest_first();
        }

        self.buckets = buckets;
        self.persist();

        let summary = RebuildSummary {
            messages: self.total_messages(),
            domains: self.domain_count(),
        };
        info!(
            messages = summary.messages,
            domains = summary.domains,
            "rebuilt sender index"
        );
        Ok(summary)
    }

    /// Replaces the in-memory index with the snapshot on disk.
    ///
    /// The index is cleared first; any unreadable or inconsistent snapshot
    /// leaves it empty so a rebuild starts from a clean slate.
    pub fn load(&mut self) -> Result<usize, CacheError> {
        self.buckets.clear();
        let path = self.path.clone().ok_or(CacheError::NoBackingFile)?;

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::Missing(path));
            }
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let snapshot: BTreeMap<String, DomainBucket> =
            serde_json::from_str(&content).map_err(|e| CacheError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if let Err(reason) = validate_snapshot(&snapshot) {
            return Err(CacheError::Corrupt { path, reason });
        }

        self.buckets = snapshot;
        debug!(
            messages = self.total_messages(),
            domains = self.domain_count(),
            "loaded sender index"
        );
        Ok(self.total_messages())
    }

    /// Writes the whole index to its snapshot file
    pub fn save(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(&self.buckets)?;
        fs::write(path, json).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })
    }

    /// Saves, downgrading failure to a warning
    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to save sender index; in-memory index is still current");
        }
    }

    /// Removes one message from a domain bucket, dropping the bucket when
    /// it empties.
    pub fn remove_message(&mut self, domain_key: &str, message_id: &str) -> RemoveOutcome {
        self.remove_messages(domain_key, &[message_id])
    }

    /// Removes several messages from one bucket with a single save
    pub fn remove_messages<S: AsRef<str>>(&mut self, domain_key: &str, ids: &[S]) -> RemoveOutcome {
        if is_reserved_key(domain_key) {
            debug!(key = domain_key, "ignoring removal against transient view");
            return RemoveOutcome::Reserved;
        }

        let key = domain_key.to_lowercase();
        let Some(bucket) = self.buckets.get_mut(&key) else {
            warn!(domain = %key, "domain not in index; skipping removal");
            return RemoveOutcome::Missing;
        };

        let mut removed = 0;
        for id in ids {
            if bucket.remove(id.as_ref()) {
                removed += 1;
            } else {
                warn!(domain = %key, id = id.as_ref(), "message not in index; skipping removal");
            }
        }

        if removed == 0 {
            return RemoveOutcome::Missing;
        }

        let outcome = if bucket.is_empty() {
            self.buckets.remove(&key);
            RemoveOutcome::BucketRemoved
        } else {
            RemoveOutcome::Removed {
                remaining: bucket.count(),
            }
        };
        self.persist();
        outcome
    }

    /// Drops a whole domain bucket
    pub fn remove_domain(&mut self, domain_key: &str) -> RemoveOutcome {
        if is_reserved_key(domain_key) {
            debug!(key = domain_key, "ignoring removal against transient view");
            return RemoveOutcome::Reserved;
        }

        let key = domain_key.to_lowercase();
        if self.buckets.remove(&key).is_none() {
            warn!(domain = %key, "domain not in index; skipping removal");
            return RemoveOutcome::Missing;
        }
        self.persist();
        RemoveOutcome::BucketRemoved
    }
}

/// Checks the structural invariants a snapshot must satisfy to be used
fn validate_snapshot(snapshot: &BTreeMap<String, DomainBucket>) -> Result<(), String> {
    for (key, bucket) in snapshot {
        if key != &key.to_lowercase() {
            return Err(format!("domain key {key:?} is not normalized"));
        }
        if is_reserved_key(key) {
            return Err(format!("domain key {key:?} is reserved"));
        }
        if bucket.key != *key {
            return Err(format!("bucket {key:?} is named {:?}", bucket.key));
        }
        if bucket.messages.is_empty() {
            return Err(format!("bucket {key:?} has no messages"));
        }
        if bucket.count != bucket.messages.len() {
            return Err(format!(
                "bucket {key:?} claims {} messages but holds {}",
                bucket.count,
                bucket.messages.len()
            ));
        }
        // Reconciliation looks messages up under their own domain key
        if let Some(stray) = bucket.messages.iter().find(|m| m.domain_key() != *key) {
            return Err(format!(
                "message {:?} from {:?} is filed under {key:?}",
                stray.id,
                stray.domain_key()
            ));
        }
    }
    Ok(())
}

/// Path of the snapshot file for a mailbox inside `dir`.
/// Every non-alphanumeric character of the address becomes `_`.
pub fn snapshot_path(dir: &Path, mailbox: &str) -> PathBuf {
    let safe: String = mailbox
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    dir.join(format!("{safe}.json"))
}
