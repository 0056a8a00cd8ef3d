//! Shared types for the request relay pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Keywords ────────────────────────────────────────────────────────

/// A configured word or phrase used to detect a taxi request.
///
/// Always non-empty, lower-cased, with inner whitespace collapsed to a
/// single space. Equality is on the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Keyword(String);

impl Keyword {
    /// Normalize raw input into a keyword. Returns `None` for blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = raw
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Multi-token keywords are matched against the whole message.
    pub fn is_phrase(&self) -> bool {
        self.0.contains(' ')
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Keyword {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Keyword::new(&value).ok_or_else(|| "keyword must not be blank".to_string())
    }
}

impl From<Keyword> for String {
    fn from(keyword: Keyword) -> Self {
        keyword.0
    }
}

/// Ordered, duplicate-free collection of keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Keyword>", into = "Vec<Keyword>")]
pub struct KeywordSet {
    keywords: Vec<Keyword>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a keyword. Returns `false` if an equal keyword is present.
    pub fn insert(&mut self, keyword: Keyword) -> bool {
        if self.contains(&keyword) {
            return false;
        }
        self.keywords.push(keyword);
        true
    }

    /// Remove a keyword. Returns `false` if it was not present.
    pub fn remove(&mut self, keyword: &Keyword) -> bool {
        let before = self.keywords.len();
        self.keywords.retain(|k| k != keyword);
        self.keywords.len() != before
    }

    pub fn contains(&self, keyword: &Keyword) -> bool {
        self.keywords.contains(keyword)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl From<Vec<Keyword>> for KeywordSet {
    fn from(keywords: Vec<Keyword>) -> Self {
        keywords.into_iter().collect()
    }
}

impl From<KeywordSet> for Vec<Keyword> {
    fn from(set: KeywordSet) -> Self {
        set.keywords
    }
}

impl FromIterator<Keyword> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = Keyword>>(iter: I) -> Self {
        let mut set = KeywordSet::new();
        for keyword in iter {
            set.insert(keyword);
        }
        set
    }
}

// ── Inbound message ─────────────────────────────────────────────────

/// Who sent a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Numeric Telegram user id.
    pub id: i64,
    /// Public handle without the leading `@`.
    pub username: Option<String>,
}

/// The monitored group a message arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChat {
    pub id: i64,
    pub title: Option<String>,
}

/// Provenance shared by every inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    pub sender: Sender,
    pub chat: SourceChat,
    /// Channel-native message sequence number, used to build permalinks.
    pub message_id: i64,
    pub sent_at: DateTime<Utc>,
}

/// What an inbound message carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePayload {
    Text { text: String },
    Contact { phone_number: String },
}

/// An inbound message from a monitored source chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub meta: MessageMeta,
    pub payload: MessagePayload,
}

// ── Classification ──────────────────────────────────────────────────

/// One keyword hit: the observed text fragment and the keyword it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub fragment: String,
    pub keyword: Keyword,
}

impl fmt::Display for MatchedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ~ '{}'", self.fragment, self.keyword)
    }
}

/// Outcome of classifying one message against a keyword set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub pairs: Vec<MatchedPair>,
}

impl MatchResult {
    pub fn count(&self) -> usize {
        self.pairs.len()
    }

    /// A single hit is enough to treat the message as a request.
    pub fn is_relevant(&self) -> bool {
        !self.pairs.is_empty()
    }
}

/// A message that was judged to be a taxi request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedRequest {
    Text { text: String, matches: MatchResult },
    Contact { phone_number: String },
}

// ── Notification ────────────────────────────────────────────────────

/// Which inbound shape produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Text,
    Contact,
}

/// How the requester is shown to drivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SenderDisplay {
    /// Public `@handle`.
    Handle { username: String },
    /// `tg://user?id=` deep link for senders without a public handle.
    DeepLink { user_id: i64 },
}

/// Phone number carried through as detected text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PhoneField {
    Known(String),
    Unknown,
}

/// Source group label, linked to the original message when possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLabel {
    pub title: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum NotificationBody {
    Text(String),
    ContactShared,
}

/// Ready-to-render representation of a detected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub kind: RequestKind,
    pub sender: SenderDisplay,
    pub phone: PhoneField,
    pub source: SourceLabel,
    pub timestamp: String,
    pub body: NotificationBody,
}

// ── Delivery ────────────────────────────────────────────────────────

/// Opaque identifier of a chat notifications are delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(String);

impl Destination {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for Destination {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed { error: String },
}

/// Result of delivering one notification to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub destination: Destination,
    pub status: DeliveryStatus,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self.status, DeliveryStatus::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(raw: &str) -> Keyword {
        Keyword::new(raw).unwrap()
    }

    #[test]
    fn keyword_is_normalized() {
        assert_eq!(kw("  Olib   KETISH ").as_str(), "olib ketish");
        assert!(kw("olib ketish").is_phrase());
        assert!(!kw("Taksi").is_phrase());
    }

    #[test]
    fn blank_keyword_rejected() {
        assert!(Keyword::new("").is_none());
        assert!(Keyword::new("   \t ").is_none());
    }

    #[test]
    fn keyword_set_rejects_normalized_duplicates() {
        let mut set = KeywordSet::new();
        assert!(set.insert(kw("taksi")));
        assert!(!set.insert(kw("TAKSI ")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn keyword_set_remove() {
        let mut set: KeywordSet = [kw("taksi"), kw("dan")].into_iter().collect();
        assert!(set.remove(&kw("Dan")));
        assert!(!set.remove(&kw("dan")));
        assert_eq!(set.iter().map(Keyword::as_str).collect::<Vec<_>>(), ["taksi"]);
    }

    #[test]
    fn keyword_set_deserializes_and_dedupes() {
        let set: KeywordSet = serde_json::from_str(r#"["taksi", "Taksi", "ga"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert!(serde_json::from_str::<KeywordSet>(r#"["taksi", " "]"#).is_err());
    }

    #[test]
    fn match_result_relevance() {
        let mut result = MatchResult::default();
        assert!(!result.is_relevant());
        result.pairs.push(MatchedPair {
            fragment: "taksi".into(),
            keyword: kw("taksi"),
        });
        assert_eq!(result.count(), 1);
        assert!(result.is_relevant());
        assert_eq!(result.pairs[0].to_string(), "'taksi' ~ 'taksi'");
    }
}
