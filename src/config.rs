//! Configuration types, read from the environment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Local};
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::pipeline::classifier::{
    ClassifierConfig, DEFAULT_PHRASE_THRESHOLD, DEFAULT_TOKEN_THRESHOLD,
};
use crate::pipeline::dispatcher::{
    DEFAULT_ESCALATION_ATTEMPTS, DEFAULT_ESCALATION_DELAY, DEFAULT_PACING,
};
use crate::pipeline::types::Destination;

/// A monitored group and the base link its message permalinks hang off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGroup {
    pub id: i64,
    pub link: Option<String>,
}

/// Relay configuration.
#[derive(Debug)]
pub struct RelayConfig {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// Groups whose messages are classified.
    pub source_groups: Vec<SourceGroup>,
    /// Driver groups notifications are fanned out to.
    pub driver_groups: Vec<Destination>,
    /// Operator chat that hears about delivery failures.
    pub operator: Option<Destination>,
    /// JSON file holding keywords and admins.
    pub config_file: PathBuf,
    /// Directory for the error log file.
    pub log_dir: PathBuf,
    /// Pause after each successful delivery.
    pub delivery_pacing: Duration,
    /// Attempts for each operator report.
    pub escalation_attempts: u32,
    /// Pause between operator report attempts.
    pub escalation_delay: Duration,
    pub classifier: ClassifierConfig,
    /// Offset notification timestamps are shown in.
    pub display_offset: FixedOffset,
}

impl RelayConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("BOT_TOKEN".into()))?;

        let group_ids: Vec<i64> = split_list(lookup("MAIN_GROUP_IDS").as_deref())
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(|s| parse_value("MAIN_GROUP_IDS", &s))
            .collect::<Result<_, _>>()?;
        if group_ids.is_empty() {
            return Err(ConfigError::MissingEnvVar("MAIN_GROUP_IDS".into()));
        }

        // Links are positional; an empty entry leaves that group unlinked.
        let links: Vec<Option<String>> = match lookup("MAIN_GROUP_LINKS") {
            Some(raw) if !raw.trim().is_empty() => split_list(Some(raw.as_str()))
                .into_iter()
                .map(|s| (!s.is_empty()).then_some(s))
                .collect(),
            _ => vec![None; group_ids.len()],
        };
        if links.len() != group_ids.len() {
            return Err(ConfigError::LengthMismatch {
                ids_key: "MAIN_GROUP_IDS".into(),
                ids: group_ids.len(),
                links_key: "MAIN_GROUP_LINKS".into(),
                links: links.len(),
            });
        }
        let source_groups = group_ids
            .into_iter()
            .zip(links)
            .map(|(id, link)| SourceGroup { id, link })
            .collect();

        let driver_groups: Vec<Destination> = split_list(lookup("DRIVER_GROUP_IDS").as_deref())
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(Destination::new)
            .collect();
        if driver_groups.is_empty() {
            return Err(ConfigError::MissingEnvVar("DRIVER_GROUP_IDS".into()));
        }

        let operator = lookup("SUPERADMIN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(Destination::new);

        let display_offset = match lookup("UTC_OFFSET_HOURS") {
            Some(raw) => {
                let hours: i32 = parse_value("UTC_OFFSET_HOURS", &raw)?;
                hours
                    .checked_mul(3600)
                    .and_then(FixedOffset::east_opt)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key: "UTC_OFFSET_HOURS".into(),
                        message: format!("{hours} is out of range"),
                    })?
            }
            None => *Local::now().offset(),
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token.trim().to_string()),
            source_groups,
            driver_groups,
            operator,
            config_file: lookup("CONFIG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.json")),
            log_dir: lookup("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
            delivery_pacing: Duration::from_millis(parse_or(
                &lookup,
                "DELIVERY_PACING_MS",
                DEFAULT_PACING.as_millis() as u64,
            )?),
            escalation_attempts: parse_or(
                &lookup,
                "ESCALATION_ATTEMPTS",
                DEFAULT_ESCALATION_ATTEMPTS,
            )?,
            escalation_delay: Duration::from_secs(parse_or(
                &lookup,
                "ESCALATION_DELAY_SECS",
                DEFAULT_ESCALATION_DELAY.as_secs(),
            )?),
            classifier: ClassifierConfig {
                token_threshold: parse_or(&lookup, "TOKEN_MATCH_THRESHOLD", DEFAULT_TOKEN_THRESHOLD)?,
                phrase_threshold: parse_or(
                    &lookup,
                    "PHRASE_MATCH_THRESHOLD",
                    DEFAULT_PHRASE_THRESHOLD,
                )?,
            },
            display_offset,
        })
    }

    pub fn source_chat_ids(&self) -> Vec<i64> {
        self.source_groups.iter().map(|g| g.id).collect()
    }

    /// Base permalink per source group, for groups that have one.
    pub fn group_links(&self) -> HashMap<i64, String> {
        self.source_groups
            .iter()
            .filter_map(|g| g.link.clone().map(|link| (g.id, link)))
            .collect()
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => {
            raw.split(',').map(|s| s.trim().to_string()).collect()
        }
        _ => Vec::new(),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.into(),
        message: format!("{raw:?}: {e}"),
    })
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => parse_value(key, &raw),
        _ => Ok(default),
    }
}
