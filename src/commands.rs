//! Administrative chat commands for managing the keyword list.

use std::sync::Arc;

use tracing::info;

use crate::error::StoreError;
use crate::pipeline::types::Keyword;
use crate::store::ConfigStore;

/// A recognised bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Start,
    ShareContact,
    /// `/kalitqosh <keyword>`; `None` when no argument was given.
    AddKeyword(Option<Keyword>),
    /// `/kalitochir <keyword>`.
    RemoveKeyword(Option<Keyword>),
    /// `/kalitlar`.
    ListKeywords,
}

impl AdminCommand {
    /// Parse a message starting with `/`. Unknown commands yield `None`.
    ///
    /// An `@botname` suffix on the command word is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;
        let (word, args) = match rest.split_once(char::is_whitespace) {
            Some((word, args)) => (word, args),
            None => (rest, ""),
        };
        let word = word.split('@').next().unwrap_or(word);

        match word.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "sharecontact" => Some(Self::ShareContact),
            "kalitqosh" => Some(Self::AddKeyword(Keyword::new(args))),
            "kalitochir" => Some(Self::RemoveKeyword(Keyword::new(args))),
            "kalitlar" => Some(Self::ListKeywords),
            _ => None,
        }
    }

    fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::AddKeyword(_) | Self::RemoveKeyword(_) | Self::ListKeywords
        )
    }
}

pub const START_REPLY: &str = "Taksi Bot ishga tushdi! Bu bot asosiy guruhlardagi taksi so'rovlarini kuzatib, haydovchilarga yuboradi. \
\n\nAdminlar /kalitqosh, /kalitochir, /kalitlar buyrug'lari orqali kalit so'zlarni boshqarishi mumkin. \
\n\nTelefon raqamingizni yuborish uchun /sharecontact buyrug'idan foydalaning.";

pub const SHARE_CONTACT_REPLY: &str = "Iltimos, telefon raqamingizni bot bilan ulashish uchun 'Kontakt yuborish' tugmasini bosing yoki \
xabaringizda telefon raqamingizni kiriting (masalan, +998901234567).";

pub const NOT_ADMIN_REPLY: &str = "Sizda bu buyruqni ishlatish huquqi yo'q.";

/// Executes commands against the config store and produces reply text.
pub struct CommandHandler {
    store: Arc<dyn ConfigStore>,
}

impl CommandHandler {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, user_id: i64, command: &AdminCommand) -> Result<String, StoreError> {
        if command.requires_admin() && !self.store.snapshot().await?.is_admin(user_id) {
            info!(user_id, ?command, "Rejected command from non-admin");
            return Ok(NOT_ADMIN_REPLY.to_string());
        }

        let reply = match command {
            AdminCommand::Start => START_REPLY.to_string(),
            AdminCommand::ShareContact => SHARE_CONTACT_REPLY.to_string(),
            AdminCommand::AddKeyword(None) => {
                "Iltimos, kalit so'z kiriting. Foydalanish: /kalitqosh <kalit_soz>".to_string()
            }
            AdminCommand::AddKeyword(Some(keyword)) => {
                if self.store.add_keyword(keyword.clone()).await? {
                    info!(user_id, keyword = %keyword, "Keyword added by admin");
                    format!("'{keyword}' kalit so'zi qo'shildi.")
                } else {
                    format!("'{keyword}' kalit so'zi allaqachon mavjud.")
                }
            }
            AdminCommand::RemoveKeyword(None) => {
                "Iltimos, kalit so'z kiriting. Foydalanish: /kalitochir <kalit_soz>".to_string()
            }
            AdminCommand::RemoveKeyword(Some(keyword)) => {
                if self.store.remove_keyword(keyword).await? {
                    info!(user_id, keyword = %keyword, "Keyword removed by admin");
                    format!("'{keyword}' kalit so'zi o'chirildi.")
                } else {
                    format!("'{keyword}' kalit so'zi topilmadi.")
                }
            }
            AdminCommand::ListKeywords => {
                let snapshot = self.store.snapshot().await?;
                if snapshot.keywords.is_empty() {
                    "Kalit so'zlar mavjud emas.".to_string()
                } else {
                    let list = snapshot
                        .keywords
                        .iter()
                        .map(Keyword::as_str)
                        .collect::<Vec<_>>()
                        .join("\n");
                    format!("Joriy kalit so'zlar:\n{list}")
                }
            }
        };

        Ok(reply)
    }
}
