use chrono::{DateTime, Duration, Utc};

use crate::email::{extract_email, extract_name, resolve_identifier};
use crate::gateway::{FetchRequest, FetchedMessage, Folder, GatewayError, MailGateway};

/// Folder the demo mailbox fetches from
pub const INBOX_ID: &str = "inbox";

struct StoredMessage {
    folder_id: String,
    message: FetchedMessage,
    /// Refuses delete and move, to show partial failures
    locked: bool,
}

impl StoredMessage {
    fn resolved_id(&self) -> Option<String> {
        resolve_identifier(
            self.message.id.as_deref(),
            self.message.message_id.as_deref(),
        )
    }
}

/// In-memory mailbox with realistic senders, used when no remote account
/// is wired up and for screenshots.
pub struct DemoGateway {
    folders: Vec<Folder>,
    messages: Vec<StoredMessage>,
    reports_size: bool,
}

impl Default for DemoGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoGateway {
    pub fn new() -> Self {
        Self::seeded(Utc::now())
    }

    /// Builds the demo mailbox with receive times relative to `now`
    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self {
            folders: demo_folders(),
            messages: demo_messages(now),
            reports_size: true,
        }
    }

    /// Makes the mailbox reject requests for the size property
    #[cfg(test)]
    pub fn without_size_property(mut self) -> Self {
        self.reports_size = false;
        self
    }

    /// Number of messages currently stored in a folder
    #[cfg(test)]
    pub fn folder_len(&self, folder_id: &str) -> usize {
        self.messages
            .iter()
            .filter(|m| m.folder_id == folder_id)
            .count()
    }

    fn position(&self, id: &str) -> Result<usize, GatewayError> {
        self.messages
            .iter()
            .position(|m| m.resolved_id().as_deref() == Some(id))
            .ok_or_else(|| GatewayError::MessageNotFound(id.to_string()))
    }

    fn unlocked(&self, id: &str) -> Result<usize, GatewayError> {
        let pos = self.position(id)?;
        if self.messages[pos].locked {
            return Err(GatewayError::Remote(format!(
                "message {id} is under a retention hold"
            )));
        }
        Ok(pos)
    }
}

impl MailGateway for DemoGateway {
    fn fetch_messages(
        &mut self,
        request: &FetchRequest,
    ) -> Result<Vec<FetchedMessage>, GatewayError> {
        if request.properties.size && !self.reports_size {
            return Err(GatewayError::PropertyUnavailable("Size".to_string()));
        }

        let term = request.search.as_deref().map(str::to_lowercase);
        let mut found: Vec<FetchedMessage> = self
            .messages
            .iter()
            .filter(|m| m.folder_id == INBOX_ID)
            .map(|m| &m.message)
            .filter(|m| term.as_deref().is_none_or(|term| matches_search(m, term)))
            .map(|m| {
                let mut m = m.clone();
                if !request.properties.size {
                    m.size = None;
                }
                if !request.properties.recipients {
                    m.to_recipients.clear();
                }
                if !request.properties.categories {
                    m.categories.clear();
                }
                m
            })
            .collect();

        found.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        if let Some(limit) = request.max_count {
            found.truncate(limit);
        }
        Ok(found)
    }

    fn delete_message(&mut self, id: &str) -> Result<(), GatewayError> {
        let pos = self.unlocked(id)?;
        self.messages.remove(pos);
        Ok(())
    }

    fn move_message(&mut self, id: &str, destination_folder_id: &str) -> Result<(), GatewayError> {
        if !self.folders.iter().any(|f| f.id == destination_folder_id) {
            return Err(GatewayError::FolderNotFound(
                destination_folder_id.to_string(),
            ));
        }
        let pos = self.unlocked(id)?;
        self.messages[pos].folder_id = destination_folder_id.to_string();
        Ok(())
    }

    fn list_folders(&mut self) -> Result<Vec<Folder>, GatewayError> {
        Ok(self.folders.clone())
    }
}

fn matches_search(message: &FetchedMessage, term: &str) -> bool {
    [
        message.subject.as_deref(),
        message.sender_name.as_deref(),
        message.sender_address.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(term))
}

fn demo_folders() -> Vec<Folder> {
    let folder = |id: &str, name: &str, parent: Option<&str>| Folder {
        id: id.to_string(),
        display_name: name.to_string(),
        parent_id: parent.map(str::to_string),
    };

    vec![
        folder(INBOX_ID, "Inbox", None),
        folder("archive", "Archive", None),
        folder("receipts", "Receipts", Some("archive")),
        folder("newsletters", "Newsletters", None),
        folder("deleteditems", "Deleted Items", None),
    ]
}

fn message(
    id: &str,
    from: &str,
    subject: &str,
    received_at: DateTime<Utc>,
    size: u64,
) -> FetchedMessage {
    FetchedMessage {
        id: Some(id.to_string()),
        message_id: None,
        subject: Some(subject.to_string()),
        received_at: Some(received_at),
        sender_name: extract_name(from),
        sender_address: Some(extract_email(from)),
        size: Some(size),
        to_recipients: vec!["demo@example.com".to_string()],
        categories: Vec::new(),
    }
}

/// Creates a set of realistic demo messages
fn demo_messages(now: DateTime<Utc>) -> Vec<StoredMessage> {
    let yesterday = now - Duration::days(1);
    let two_days_ago = now - Duration::days(2);
    let last_week = now - Duration::days(7);

    let mut messages = vec![
        // GitHub notifications
        message(
            "demo_1",
            "GitHub <notifications@github.com>",
            "[rust-lang/rust] Fix ICE in pattern matching (PR #12345)",
            now - Duration::hours(2),
            18_204,
        ),
        message(
            "demo_2",
            "GitHub <notifications@github.com>",
            "[tokio-rs/tokio] New issue: Memory leak in async runtime",
            now - Duration::hours(5),
            14_877,
        ),
        message(
            "demo_3",
            "GitHub <notifications@github.com>",
            "Your mass migration jobs are now available",
            yesterday,
            22_310,
        ),
        // Linear updates
        message(
            "demo_4",
            "Linear <notify@linear.app>",
            "ENG-1234: Implement user authentication",
            now - Duration::hours(1),
            9_412,
        ),
        FetchedMessage {
            id: None,
            message_id: Some("demo_5".to_string()),
            ..message(
                "",
                "Linear <notify@linear.app>",
                "Weekly project digest - Sprint 42",
                two_days_ago,
                31_005,
            )
        },
        // Personal mail
        message(
            "demo_6",
            "Alice Chen <alice@example.com>",
            "Re: Coffee tomorrow?",
            now - Duration::hours(3),
            4_120,
        ),
        message(
            "demo_7",
            "Alice Chen <alice@example.com>",
            "Coffee tomorrow?",
            yesterday - Duration::hours(2),
            3_871,
        ),
        // Stripe receipts
        message(
            "demo_8",
            "Stripe <receipts@stripe.com>",
            "Your receipt from Acme Corp",
            two_days_ago,
            40_116,
        ),
        message(
            "demo_9",
            "Stripe <receipts@stripe.com>",
            "Your receipt from Cloud Services Inc",
            last_week,
            39_880,
        ),
        message(
            "demo_10",
            "Figma <no-reply@figma.com>",
            "Bob commented on 'Homepage Redesign'",
            now - Duration::hours(4),
            12_554,
        ),
        message(
            "demo_11",
            "This Week in Rust <noreply@this-week-in-rust.org>",
            "This Week in Rust 542",
            two_days_ago + Duration::hours(4),
            88_430,
        ),
        message(
            "demo_12",
            "Amazon Web Services <no-reply@aws.amazon.com>",
            "AWS Billing Alert: Your costs exceeded the threshold",
            yesterday + Duration::hours(6),
            27_903,
        ),
        message(
            "demo_13",
            "Slack <feedback@slack.com>",
            "Your daily digest from Acme Workspace",
            now - Duration::hours(8),
            45_067,
        ),
        message(
            "demo_14",
            "Bob Smith <bob@company.com>",
            "Re: Q4 Planning",
            now - Duration::hours(6),
            6_240,
        ),
        message(
            "demo_15",
            "Charlie Davis <charlie@Company.com>",
            "Re: Q4 Planning",
            yesterday + Duration::hours(3),
            5_902,
        ),
        // Sender without a usable address
        message(
            "demo_16",
            "undisclosed-recipients",
            "Conference badge pickup",
            last_week + Duration::hours(9),
            2_048,
        ),
    ];

    // A promotional sender with enough volume to page through
    messages.extend((1..=32u32).map(|n| {
        message(
            &format!("promo_{n}"),
            "Outdoor Supply Co <deals@outdoor-supply.example>",
            &format!("Deal #{n}: up to {}% off trail gear", 10 + (n % 5) * 10),
            now - Duration::hours(10 + i64::from(n) * 7),
            60_000 + u64::from(n) * 512,
        )
    }));

    messages
        .into_iter()
        .map(|message| {
            let locked = message.id.as_deref() == Some("demo_9");
            StoredMessage {
                folder_id: INBOX_ID.to_string(),
                message,
                locked,
            }
        })
        .collect()
}
