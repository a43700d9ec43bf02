//! Rows and data sources behind the list screens.

use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};

use crate::bulk::MessageRef;
use crate::email::MessageRecord;
use crate::gateway::{self, MailGateway};
use crate::index::{RECENT_VIEW_KEY, SEARCH_VIEW_KEY, SenderIndex};
use crate::list::{ListRow, RowSource};
use crate::ui::widgets::{RowDisplay, format_date, format_size};

/// What a list screen is showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewContext {
    Overview,
    Domain(String),
    Recent { limit: usize },
    Search { term: String },
}

impl ViewContext {
    pub fn title(&self) -> String {
        match self {
            ViewContext::Overview => " Domains ".to_string(),
            ViewContext::Domain(key) => format!(" {key} "),
            ViewContext::Recent { limit } => format!(" {limit} most recent "),
            ViewContext::Search { term } => format!(" Search: {term} "),
        }
    }

    /// Index key the rows belong to; transient views use a reserved key
    pub fn index_key(&self) -> Option<&str> {
        match self {
            ViewContext::Overview => None,
            ViewContext::Domain(key) => Some(key),
            ViewContext::Recent { .. } => Some(RECENT_VIEW_KEY),
            ViewContext::Search { .. } => Some(SEARCH_VIEW_KEY),
        }
    }
}

/// One sender domain in the overview
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRow {
    pub key: String,
    pub count: usize,
    pub newest: Option<DateTime<Utc>>,
}

impl ListRow for DomainRow {
    fn row_id(&self) -> &str {
        &self.key
    }
}

impl RowDisplay for DomainRow {
    fn cells(&self) -> Vec<Option<String>> {
        vec![
            Some(self.count.to_string()),
            self.newest.as_ref().map(format_date),
            Some(self.key.clone()),
        ]
    }
}

/// One message in an email list
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    key: String,
    pub record: MessageRecord,
}

/// Leads the row key of a message without an identifier. Usable
/// identifiers never contain control characters, so these keys cannot
/// collide with a real one.
const UNRESOLVED_KEY_PREFIX: &str = "\u{0}unresolved:";

/// Wraps records in rows. A row without an identifier is keyed by its
/// sender, subject and receive time plus an occurrence count, so its key
/// survives a reload that reorders the list.
fn message_rows(records: Vec<MessageRecord>) -> Vec<MessageRow> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    records
        .into_iter()
        .map(|record| {
            let key = if record.has_id() {
                record.id.clone()
            } else {
                let fingerprint = format!(
                    "{}|{}|{}",
                    record.sender_address.as_deref().unwrap_or_default(),
                    record.subject.as_deref().unwrap_or_default(),
                    record
                        .received_at
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_default()
                );
                let occurrence = seen.entry(fingerprint.clone()).or_default();
                *occurrence += 1;
                format!("{UNRESOLVED_KEY_PREFIX}{fingerprint}#{occurrence}")
            };
            MessageRow { key, record }
        })
        .collect()
}

impl MessageRow {
    pub fn target(&self) -> MessageRef {
        MessageRef::from_record(&self.record)
    }
}

impl ListRow for MessageRow {
    fn row_id(&self) -> &str {
        &self.key
    }
}

impl RowDisplay for MessageRow {
    fn cells(&self) -> Vec<Option<String>> {
        let record = &self.record;
        vec![
            record.received_at.as_ref().map(format_date),
            record
                .sender_name
                .clone()
                .or_else(|| record.sender_address.clone()),
            record.size_bytes.map(format_size),
            record.subject.clone(),
        ]
    }
}

/// Domain rows straight from the index, largest first
pub struct DomainSource<'a> {
    index: &'a SenderIndex,
}

impl<'a> DomainSource<'a> {
    pub fn new(index: &'a SenderIndex) -> Self {
        Self { index }
    }
}

impl RowSource<ViewContext> for DomainSource<'_> {
    type Row = DomainRow;

    fn fetch_current(&mut self, context: &ViewContext) -> Result<Vec<DomainRow>> {
        if *context != ViewContext::Overview {
            bail!("domain rows are only available for the overview");
        }
        Ok(self
            .index
            .domains()
            .into_iter()
            .map(|bucket| DomainRow {
                key: bucket.key().to_string(),
                count: bucket.count(),
                newest: bucket.newest(),
            })
            .collect())
    }
}

/// Message rows: cached for a domain, live from the gateway for the
/// recent and search views.
pub struct MessageSource<'a> {
    index: &'a SenderIndex,
    gateway: &'a mut dyn MailGateway,
}

impl<'a> MessageSource<'a> {
    pub fn new(index: &'a SenderIndex, gateway: &'a mut dyn MailGateway) -> Self {
        Self { index, gateway }
    }
}

impl RowSource<ViewContext> for MessageSource<'_> {
    type Row = MessageRow;

    fn fetch_current(&mut self, context: &ViewContext) -> Result<Vec<MessageRow>> {
        let records = match context {
            ViewContext::Overview => bail!("the overview lists domains, not messages"),
            ViewContext::Domain(key) => self
                .index
                .bucket(key)
                .map(|bucket| bucket.messages().to_vec())
                .unwrap_or_default(),
            ViewContext::Recent { limit } => {
                gateway::fetch_records(&mut *self.gateway, None, Some(*limit))
                    .context("Failed to fetch recent messages")?
            }
            ViewContext::Search { term } => {
                gateway::fetch_records(&mut *self.gateway, Some(term.clone()), None)
                    .with_context(|| format!("Failed to search for '{term}'"))?
            }
        };

        Ok(message_rows(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::DemoGateway;
    use crate::gateway::{FetchedMessage, GatewayError, MockMailGateway};
    use mockall::predicate::function;

    fn demo_index(gateway: &mut DemoGateway) -> SenderIndex {
        let mut index = SenderIndex::in_memory();
        index.rebuild(gateway, None).unwrap();
        index
    }

    #[test]
    fn test_domain_source_orders_by_count() {
        let mut gateway = DemoGateway::new();
        let index = demo_index(&mut gateway);

        let rows = DomainSource::new(&index)
            .fetch_current(&ViewContext::Overview)
            .unwrap();

        assert_eq!(rows.len(), index.domain_count());
        assert!(rows.windows(2).all(|w| w[0].count >= w[1].count));
        assert_eq!(rows[0].key, "outdoor-supply.example");
    }

    #[test]
    fn test_domain_source_rejects_message_contexts() {
        let index = SenderIndex::in_memory();
        let result = DomainSource::new(&index).fetch_current(&ViewContext::Domain("x".into()));
        assert!(result.is_err());
    }

    #[test]
    fn test_message_source_reads_domain_from_index() {
        let mut gateway = DemoGateway::new();
        let index = demo_index(&mut gateway);

        let rows = MessageSource::new(&index, &mut gateway)
            .fetch_current(&ViewContext::Domain("github.com".into()))
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].row_id(), "demo_1");
    }

    #[test]
    fn test_message_source_unknown_domain_is_empty() {
        let mut gateway = DemoGateway::new();
        let index = demo_index(&mut gateway);
        let rows = MessageSource::new(&index, &mut gateway)
            .fetch_current(&ViewContext::Domain("gone.example".into()))
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_message_source_recent_queries_gateway() {
        let index = SenderIndex::in_memory();
        let mut gateway = MockMailGateway::new();
        gateway
            .expect_fetch_messages()
            .with(function(|r: &crate::gateway::FetchRequest| {
                r.max_count == Some(2) && r.search.is_none()
            }))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    FetchedMessage {
                        id: Some("a".into()),
                        ..Default::default()
                    },
                    FetchedMessage::default(),
                ])
            });

        let rows = MessageSource::new(&index, &mut gateway)
            .fetch_current(&ViewContext::Recent { limit: 2 })
            .unwrap();

        assert_eq!(rows[0].row_id(), "a");
        assert!(rows[1].row_id().starts_with(UNRESOLVED_KEY_PREFIX));
        assert!(rows[1].target().id.is_empty());
    }

    #[test]
    fn test_message_source_search_error_has_context() {
        let index = SenderIndex::in_memory();
        let mut gateway = MockMailGateway::new();
        gateway
            .expect_fetch_messages()
            .returning(|_| Err(GatewayError::Remote("offline".into())));

        let err = MessageSource::new(&index, &mut gateway)
            .fetch_current(&ViewContext::Search {
                term: "invoice".into(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("invoice"));
    }

    #[test]
    fn test_message_cells_fall_back_to_address() {
        let record = crate::email::MessageBuilder::new()
            .id("m")
            .from("solo@example.com")
            .build();
        let cells = message_rows(vec![record]).remove(0).cells();
        assert_eq!(cells[1].as_deref(), Some("solo@example.com"));
        assert_eq!(cells[0], None);
        assert_eq!(cells[3], None);
    }

    #[test]
    fn test_unresolved_keys_survive_reordering() {
        let unresolved = |subject: &str| {
            crate::email::MessageBuilder::new()
                .from("noid@example.com")
                .subject(subject)
                .build()
        };
        let lookalike = crate::email::MessageBuilder::new()
            .id(format!("{UNRESOLVED_KEY_PREFIX}x"))
            .build();

        let first = message_rows(vec![unresolved("one"), unresolved("two")]);
        let second = message_rows(vec![
            crate::email::MessageBuilder::new().id("real").build(),
            unresolved("two"),
            unresolved("one"),
        ]);

        assert_eq!(first[0].row_id(), second[2].row_id());
        assert_eq!(first[1].row_id(), second[1].row_id());
        assert_ne!(first[0].row_id(), first[1].row_id());
        // An id shaped like a generated key is not usable, so it is rekeyed
        assert!(!lookalike.has_id());
    }

    #[test]
    fn test_duplicate_unresolved_rows_get_distinct_keys() {
        let twin = || {
            crate::email::MessageBuilder::new()
                .from("noid@example.com")
                .subject("same")
                .build()
        };
        let rows = message_rows(vec![twin(), twin()]);
        assert_ne!(rows[0].row_id(), rows[1].row_id());
    }

    #[test]
    fn test_context_keys() {
        assert_eq!(ViewContext::Overview.index_key(), None);
        assert_eq!(
            ViewContext::Recent { limit: 5 }.index_key(),
            Some(RECENT_VIEW_KEY)
        );
        assert_eq!(
            ViewContext::Domain("x.com".into()).index_key(),
            Some("x.com")
        );
    }
}
