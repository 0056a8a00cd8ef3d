//! Builds driver-facing notifications from detected requests.

use std::collections::HashMap;

use chrono::FixedOffset;
use tracing::{debug, warn};

use crate::pipeline::extract::extract_phone;
use crate::pipeline::types::{
    DetectedRequest, MatchResult, MessageMeta, NotificationBody, NotificationRecord, PhoneField,
    RequestKind, SenderDisplay, SourceLabel,
};

/// Label used when a source group has no title.
pub const FALLBACK_GROUP_TITLE: &str = "Asosiy Guruh";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Turns a detected request plus its provenance into a `NotificationRecord`.
#[derive(Debug, Clone)]
pub struct NotificationFormatter {
    /// Base permalink per source chat, e.g. `https://t.me/mygroup`.
    group_links: HashMap<i64, String>,
    /// Offset timestamps are displayed in.
    display_offset: FixedOffset,
}

impl NotificationFormatter {
    pub fn new(group_links: HashMap<i64, String>, display_offset: FixedOffset) -> Self {
        let group_links = group_links
            .into_iter()
            .map(|(id, link)| (id, link.trim().trim_end_matches('/').to_string()))
            .filter(|(_, link)| !link.is_empty())
            .collect();
        Self {
            group_links,
            display_offset,
        }
    }

    pub fn format(&self, meta: &MessageMeta, request: &DetectedRequest) -> NotificationRecord {
        let (kind, phone, body) = match request {
            DetectedRequest::Text { text, matches } => {
                debug!(
                    chat_id = meta.chat.id,
                    message_id = meta.message_id,
                    keywords = %matched_keywords(matches),
                    "Formatting text request"
                );
                (
                    RequestKind::Text,
                    extract_phone(text)
                        .map(|p| PhoneField::Known(p.to_string()))
                        .unwrap_or(PhoneField::Unknown),
                    NotificationBody::Text(text.clone()),
                )
            }
            DetectedRequest::Contact { phone_number } => (
                RequestKind::Contact,
                PhoneField::Known(phone_number.clone()),
                NotificationBody::ContactShared,
            ),
        };

        let sender = match meta.sender.username.as_deref().filter(|u| !u.is_empty()) {
            Some(username) => SenderDisplay::Handle {
                username: username.to_string(),
            },
            None => SenderDisplay::DeepLink {
                user_id: meta.sender.id,
            },
        };

        NotificationRecord {
            kind,
            sender,
            phone,
            source: self.source_label(meta),
            timestamp: meta
                .sent_at
                .with_timezone(&self.display_offset)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            body,
        }
    }

    fn source_label(&self, meta: &MessageMeta) -> SourceLabel {
        let title = meta
            .chat
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_GROUP_TITLE.to_string());

        let link = match self.group_links.get(&meta.chat.id) {
            Some(base) => Some(format!("{base}/{}", meta.message_id)),
            None => {
                warn!(chat_id = meta.chat.id, "No group link configured; label left unlinked");
                None
            }
        };

        SourceLabel { title, link }
    }
}

fn matched_keywords(matches: &MatchResult) -> String {
    matches
        .pairs
        .iter()
        .map(|pair| pair.keyword.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Rendering ───────────────────────────────────────────────────────

impl NotificationRecord {
    /// Render as a Telegram HTML message.
    pub fn render_html(&self) -> String {
        let header = match self.kind {
            RequestKind::Text => "🚖 Yangi Taksi So'rovi",
            RequestKind::Contact => "🚖 Yangi Taksi So'rovi (Kontakt)",
        };

        let sender = match &self.sender {
            SenderDisplay::Handle { username } => format!("@{}", escape_html(username)),
            SenderDisplay::DeepLink { user_id } => {
                format!("<a href='tg://user?id={user_id}'>Foydalanuvchi ID: {user_id}</a>")
            }
        };

        let phone = match &self.phone {
            PhoneField::Known(p) => escape_html(p),
            PhoneField::Unknown => "Noma'lum".to_string(),
        };

        let group = match &self.source.link {
            Some(link) => format!(
                "<a href='{}'>{}</a>",
                escape_html(link),
                escape_html(&self.source.title)
            ),
            None => escape_html(&self.source.title),
        };

        let body = match &self.body {
            NotificationBody::Text(text) => escape_html(text),
            NotificationBody::ContactShared => "Kontakt yuborildi".to_string(),
        };

        format!(
            "{header}\n\
             👤 Kimdan: {sender}\n\
             📞 Telefon: {phone}\n\
             🏢 Guruh: {group}\n\
             🕒 Vaqt: {}\n\
             💬 Xabar: {body}",
            self.timestamp
        )
    }
}

/// Escape text for Telegram's HTML parse mode (including quotes for attributes).
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::pipeline::types::{Keyword, MatchResult, MatchedPair, Sender, SourceChat};

    const GROUP_ID: i64 = -1001234567890;

    fn meta(username: Option<&str>, title: Option<&str>) -> MessageMeta {
        MessageMeta {
            sender: Sender {
                id: 42,
                username: username.map(String::from),
            },
            chat: SourceChat {
                id: GROUP_ID,
                title: title.map(String::from),
            },
            message_id: 777,
            sent_at: Utc.with_ymd_and_hms(2026, 3, 1, 7, 30, 0).unwrap(),
        }
    }

    fn formatter() -> NotificationFormatter {
        NotificationFormatter::new(
            HashMap::from([(GROUP_ID, "https://t.me/toshkent_taksi/".to_string())]),
            FixedOffset::east_opt(5 * 3600).unwrap(),
        )
    }

    fn text_request(text: &str) -> DetectedRequest {
        DetectedRequest::Text {
            text: text.into(),
            matches: MatchResult::default(),
        }
    }

    #[test]
    fn text_request_with_phone() {
        let record = formatter().format(
            &meta(Some("ali_uz"), Some("Toshkent Taksi")),
            &text_request("taksi kerak +998901234567"),
        );
        assert_eq!(record.kind, RequestKind::Text);
        assert_eq!(record.phone, PhoneField::Known("+998901234567".into()));
        assert_eq!(
            record.sender,
            SenderDisplay::Handle {
                username: "ali_uz".into()
            }
        );
        assert_eq!(
            record.source,
            SourceLabel {
                title: "Toshkent Taksi".into(),
                link: Some("https://t.me/toshkent_taksi/777".into()),
            }
        );
        assert_eq!(record.timestamp, "2026-03-01 12:30:00");
        assert_eq!(
            record.body,
            NotificationBody::Text("taksi kerak +998901234567".into())
        );
    }

    #[test]
    fn text_request_without_phone_is_unknown() {
        let record = formatter().format(&meta(Some("ali_uz"), None), &text_request("taksi kerak"));
        assert_eq!(record.phone, PhoneField::Unknown);
        assert!(record.render_html().contains("📞 Telefon: Noma'lum"));
    }

    #[test]
    fn contact_request() {
        let record = formatter().format(
            &meta(None, Some("Toshkent Taksi")),
            &DetectedRequest::Contact {
                phone_number: "998901234567".into(),
            },
        );
        assert_eq!(record.kind, RequestKind::Contact);
        assert_eq!(record.phone, PhoneField::Known("998901234567".into()));
        assert_eq!(record.body, NotificationBody::ContactShared);

        let html = record.render_html();
        assert!(html.starts_with("🚖 Yangi Taksi So'rovi (Kontakt)\n"));
        assert!(html.ends_with("💬 Xabar: Kontakt yuborildi"));
    }

    #[test]
    fn anonymous_sender_gets_deep_link() {
        let record = formatter().format(&meta(None, None), &text_request("taksi"));
        assert_eq!(record.sender, SenderDisplay::DeepLink { user_id: 42 });
        assert!(
            record
                .render_html()
                .contains("<a href='tg://user?id=42'>Foydalanuvchi ID: 42</a>")
        );
    }

    #[test]
    fn untitled_group_uses_fallback_title() {
        let record = formatter().format(&meta(None, Some("  ")), &text_request("taksi"));
        assert_eq!(record.source.title, FALLBACK_GROUP_TITLE);
    }

    #[test]
    fn missing_group_link_leaves_label_unlinked() {
        let formatter = NotificationFormatter::new(HashMap::new(), FixedOffset::east_opt(0).unwrap());
        let record = formatter.format(&meta(None, Some("Guruh")), &text_request("taksi"));
        assert_eq!(record.source.link, None);
        assert!(record.render_html().contains("🏢 Guruh: Guruh\n"));
    }

    #[test]
    fn blank_group_link_counts_as_missing() {
        let formatter = NotificationFormatter::new(
            HashMap::from([(GROUP_ID, " ".to_string())]),
            FixedOffset::east_opt(0).unwrap(),
        );
        let record = formatter.format(&meta(None, None), &text_request("taksi"));
        assert_eq!(record.source.link, None);
    }

    #[test]
    fn render_escapes_user_text() {
        let record = formatter().format(
            &meta(Some("ali_uz"), Some("A & B")),
            &text_request("<b>taksi</b> kerak"),
        );
        let html = record.render_html();
        assert!(html.contains("💬 Xabar: &lt;b&gt;taksi&lt;/b&gt; kerak"));
        assert!(html.contains(">A &amp; B</a>"));
    }

    #[test]
    fn render_layout() {
        let record = formatter().format(
            &meta(Some("ali_uz"), Some("Toshkent Taksi")),
            &text_request("taksi kerak"),
        );
        assert_eq!(
            record.render_html(),
            "🚖 Yangi Taksi So'rovi\n\
             👤 Kimdan: @ali_uz\n\
             📞 Telefon: Noma'lum\n\
             🏢 Guruh: <a href='https://t.me/toshkent_taksi/777'>Toshkent Taksi</a>\n\
             🕒 Vaqt: 2026-03-01 12:30:00\n\
             💬 Xabar: taksi kerak"
        );
    }

    #[test]
    fn matched_keywords_are_listed_in_match_order() {
        let matches = MatchResult {
            pairs: vec![
                MatchedPair {
                    fragment: "Chilonzordan".into(),
                    keyword: Keyword::new("dan").unwrap(),
                },
                MatchedPair {
                    fragment: "takisi".into(),
                    keyword: Keyword::new("taksi").unwrap(),
                },
            ],
        };
        assert_eq!(matched_keywords(&matches), "dan, taksi");
        assert_eq!(matched_keywords(&MatchResult::default()), "");
    }
}
