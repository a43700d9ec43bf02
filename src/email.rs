use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Domain key used for senders whose address has no usable host part
pub const UNKNOWN_DOMAIN: &str = "unknown-domain";

static ANGLE_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("static regex is valid"));

/// Metadata for one indexed message.
///
/// Field names follow the persisted cache layout. `Id` is accepted as an
/// alias of `MessageId` so snapshots written with either spelling load into
/// the same identifier field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(rename = "MessageId", alias = "Id")]
    pub id: String,
    #[serde(rename = "Subject")]
    pub subject: Option<String>,
    #[serde(rename = "ReceivedDateTime")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(rename = "SenderName")]
    pub sender_name: Option<String>,
    #[serde(rename = "SenderEmailAddress")]
    pub sender_address: Option<String>,
    #[serde(rename = "Size")]
    pub size_bytes: Option<u64>,
    #[serde(rename = "ToRecipients", default)]
    pub recipients: Vec<String>,
    #[serde(rename = "Categories", default)]
    pub categories: Vec<String>,
}

impl MessageRecord {
    /// The lowercased sender host this message is grouped under
    pub fn domain_key(&self) -> String {
        domain_key(self.sender_address.as_deref())
    }

    /// Returns true when the record carries a usable identifier
    pub fn has_id(&self) -> bool {
        is_usable_identifier(&self.id)
    }
}

/// Builder for creating MessageRecord instances
#[cfg(test)]
#[derive(Default)]
pub struct MessageBuilder {
    id: String,
    from: Option<String>,
    subject: Option<String>,
    received_at: Option<DateTime<Utc>>,
    size_bytes: Option<u64>,
    recipients: Vec<String>,
    categories: Vec<String>,
}

#[cfg(test)]
impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sender in `Name <address>` or bare address form
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn received_at(mut self, date: DateTime<Utc>) -> Self {
        self.received_at = Some(date);
        self
    }

    pub fn size(mut self, bytes: u64) -> Self {
        self.size_bytes = Some(bytes);
        self
    }

    pub fn recipient(mut self, address: impl Into<String>) -> Self {
        self.recipients.push(address.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn build(self) -> MessageRecord {
        let (sender_name, sender_address) = match self.from.as_deref() {
            Some(from) => (extract_name(from), Some(extract_email(from))),
            None => (None, None),
        };

        MessageRecord {
            id: self.id,
            subject: self.subject,
            received_at: self.received_at,
            sender_name,
            sender_address: sender_address.filter(|a| !a.is_empty()),
            size_bytes: self.size_bytes,
            recipients: self.recipients,
            categories: self.categories,
        }
    }
}

/// Extracts the email address from a "Name <email>" format string
/// If no angle brackets are present, returns the string trimmed as-is
pub fn extract_email(from: &str) -> String {
    if let Some(captures) = ANGLE_ADDRESS.captures(from) {
        captures
            .get(1)
            .map_or_else(String::new, |m| m.as_str().trim().to_string())
    } else {
        from.trim().to_string()
    }
}

/// Extracts the display name from a "Name <email>" format string
pub fn extract_name(from: &str) -> Option<String> {
    let start = from.find('<')?;
    let name = from[..start].trim().trim_matches('"').trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Extracts the host part of an email address.
/// Returns None for anything that does not look like `local@host`.
pub fn extract_domain(email: &str) -> Option<&str> {
    let (local, host) = email.trim().rsplit_once('@')?;
    let host = host.trim_end_matches('.');
    if local.is_empty()
        || host.is_empty()
        || host.starts_with('.')
        || host.contains(char::is_whitespace)
    {
        return None;
    }
    Some(host)
}

/// Computes the index key for a sender address: lowercase host part, or
/// [`UNKNOWN_DOMAIN`] when the address is absent or malformed.
pub fn domain_key(address: Option<&str>) -> String {
    address
        .map(extract_email)
        .and_then(|email| extract_domain(&email).map(str::to_lowercase))
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

/// Identifiers are opaque printable tokens; blank ones or ones carrying
/// control characters cannot be sent back to the mailbox.
pub fn is_usable_identifier(id: &str) -> bool {
    !id.trim().is_empty() && !id.chars().any(char::is_control)
}

/// Picks the first usable identifier out of the two fields a remote
/// record may carry.
pub fn resolve_identifier(primary: Option<&str>, secondary: Option<&str>) -> Option<String> {
    [primary, secondary]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|id| is_usable_identifier(id))
        .map(str::to_string)
}
