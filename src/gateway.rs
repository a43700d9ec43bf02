use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::email::{MessageRecord, resolve_identifier};

/// Failure of a single remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("message {0} not found")]
    MessageNotFound(String),
    #[error("folder {0} not found")]
    FolderNotFound(String),
    #[error("property {0} is not available on this mailbox")]
    PropertyUnavailable(String),
    #[error("remote call failed: {0}")]
    Remote(String),
}

/// Optional properties requested alongside the always-present metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySet {
    pub size: bool,
    pub recipients: bool,
    pub categories: bool,
}

impl PropertySet {
    pub fn full() -> Self {
        Self {
            size: true,
            recipients: true,
            categories: true,
        }
    }

    pub fn without_size(self) -> Self {
        Self {
            size: false,
            ..self
        }
    }
}

/// Parameters for a metadata fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Free-text search over sender and subject; None fetches the inbox
    pub search: Option<String>,
    /// Upper bound on returned messages; None is unbounded
    pub max_count: Option<usize>,
    pub properties: PropertySet,
}

/// Message metadata as the remote side reports it.
/// Remote records may carry their identifier in either of two fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedMessage {
    pub id: Option<String>,
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub sender_name: Option<String>,
    pub sender_address: Option<String>,
    pub size: Option<u64>,
    pub to_recipients: Vec<String>,
    pub categories: Vec<String>,
}

impl FetchedMessage {
    /// Normalizes the remote record into the single-identifier form used
    /// everywhere downstream. An unresolvable identifier becomes empty.
    pub fn into_record(self) -> MessageRecord {
        let id = resolve_identifier(self.id.as_deref(), self.message_id.as_deref())
            .unwrap_or_default();

        MessageRecord {
            id,
            subject: self.subject,
            received_at: self.received_at,
            sender_name: self.sender_name,
            sender_address: self.sender_address,
            size_bytes: self.size,
            recipients: self.to_recipients,
            categories: self.categories,
        }
    }
}

/// A mail folder as reported by the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub display_name: String,
    pub parent_id: Option<String>,
}

/// A folder flattened to its full display path for pickers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderChoice {
    pub id: String,
    pub path: String,
}

/// Trait for remote mailbox operations - allows mocking in tests
#[cfg_attr(test, mockall::automock)]
pub trait MailGateway {
    /// Fetches message metadata, newest first
    fn fetch_messages(&mut self, request: &FetchRequest)
    -> Result<Vec<FetchedMessage>, GatewayError>;

    /// Deletes one message
    fn delete_message(&mut self, id: &str) -> Result<(), GatewayError>;

    /// Moves one message into another folder
    fn move_message(&mut self, id: &str, destination_folder_id: &str) -> Result<(), GatewayError>;

    /// Lists every folder of the mailbox
    fn list_folders(&mut self) -> Result<Vec<Folder>, GatewayError>;
}

/// Fetches message metadata including sizes when the mailbox supports them.
/// An unavailable size property degrades to records without sizes instead
/// of failing the whole fetch.
pub fn fetch_records(
    gateway: &mut dyn MailGateway,
    search: Option<String>,
    max_count: Option<usize>,
) -> Result<Vec<MessageRecord>, GatewayError> {
    let mut request = FetchRequest {
        search,
        max_count,
        properties: PropertySet::full(),
    };

    let fetched = match gateway.fetch_messages(&request) {
        Err(GatewayError::PropertyUnavailable(property)) => {
            warn!(%property, "mailbox does not report a property, fetching without sizes");
            request.properties = request.properties.without_size();
            gateway.fetch_messages(&request)?
        }
        other => other?,
    };

    let mut records: Vec<MessageRecord> = fetched
        .into_iter()
        .map(FetchedMessage::into_record)
        .collect();
    if let Some(limit) = max_count {
        records.truncate(limit);
    }
    Ok(records)
}

/// Flattens a folder tree into `Parent/Child` paths sorted alphabetically.
/// Folders whose parent is unknown are treated as roots; cycles are cut.
pub fn folder_paths(folders: &[Folder]) -> Vec<FolderChoice> {
    let by_id: HashMap<&str, &Folder> = folders.iter().map(|f| (f.id.as_str(), f)).collect();

    let mut choices: Vec<FolderChoice> = folders
        .iter()
        .map(|folder| {
            let mut segments = vec![folder.display_name.as_str()];
            let mut current = folder;
            while let Some(parent) = current
                .parent_id
                .as_deref()
                .and_then(|id| by_id.get(id).copied())
            {
                if segments.len() > folders.len() {
                    break;
                }
                segments.push(parent.display_name.as_str());
                current = parent;
            }
            segments.reverse();
            FolderChoice {
                id: folder.id.clone(),
                path: segments.join("/"),
            }
        })
        .collect();

    choices.sort_by_key(|c| c.path.to_lowercase());
    choices
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::function;

    fn folder(id: &str, name: &str, parent: Option<&str>) -> Folder {
        Folder {
            id: id.to_string(),
            display_name: name.to_string(),
            parent_id: parent.map(str::to_string),
        }
    }

    fn fetched(id: &str, address: &str) -> FetchedMessage {
        FetchedMessage {
            id: Some(id.to_string()),
            sender_address: Some(address.to_string()),
            size: Some(1024),
            ..Default::default()
        }
    }

    #[test]
    fn test_into_record_uses_secondary_identifier() {
        let message = FetchedMessage {
            id: Some(String::new()),
            message_id: Some("AAMk-2".to_string()),
            ..Default::default()
        };
        assert_eq!(message.into_record().id, "AAMk-2");
    }

    #[test]
    fn test_into_record_without_identifier_is_empty() {
        let record = FetchedMessage::default().into_record();
        assert!(!record.has_id());
    }

    #[test]
    fn test_fetch_records_falls_back_without_size() {
        let mut mock = MockMailGateway::new();

        mock.expect_fetch_messages()
            .with(function(|r: &FetchRequest| r.properties.size))
            .times(1)
            .returning(|_| Err(GatewayError::PropertyUnavailable("Size".to_string())));
        mock.expect_fetch_messages()
            .with(function(|r: &FetchRequest| !r.properties.size))
            .times(1)
            .returning(|_| {
                let mut message = fetched("1", "a@x.com");
                message.size = None;
                Ok(vec![message])
            });

        let records = fetch_records(&mut mock, None, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size_bytes, None);
    }

    #[test]
    fn test_fetch_records_propagates_other_errors() {
        let mut mock = MockMailGateway::new();
        mock.expect_fetch_messages()
            .times(1)
            .returning(|_| Err(GatewayError::Remote("offline".to_string())));

        let result = fetch_records(&mut mock, None, None);
        assert_eq!(result, Err(GatewayError::Remote("offline".to_string())));
    }

    #[test]
    fn test_fetch_records_honors_max_count() {
        let mut mock = MockMailGateway::new();
        mock.expect_fetch_messages()
            .with(function(|r: &FetchRequest| r.max_count == Some(2)))
            .returning(|_| {
                Ok(vec![
                    fetched("1", "a@x.com"),
                    fetched("2", "b@x.com"),
                    fetched("3", "c@x.com"),
                ])
            });

        let records = fetch_records(&mut mock, None, Some(2)).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_folder_paths_builds_tree() {
        let folders = vec![
            folder("inbox", "Inbox", None),
            folder("receipts", "Receipts", Some("archive")),
            folder("archive", "Archive", None),
        ];

        let paths: Vec<String> = folder_paths(&folders).into_iter().map(|c| c.path).collect();
        assert_eq!(paths, vec!["Archive", "Archive/Receipts", "Inbox"]);
    }

    #[test]
    fn test_folder_paths_survives_cycles() {
        let folders = vec![folder("a", "A", Some("b")), folder("b", "B", Some("a"))];
        let choices = folder_paths(&folders);
        assert_eq!(choices.len(), 2);
    }
}
