//! `ConfigStore` trait: the pipeline's only view of keyword/admin data.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::pipeline::types::{Keyword, KeywordSet};

/// Point-in-time copy of the stored configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub keywords: KeywordSet,
    /// Telegram user ids allowed to manage keywords.
    #[serde(default)]
    pub admins: BTreeSet<i64>,
}

impl ConfigSnapshot {
    /// Keywords written to a freshly created store.
    pub fn with_default_keywords() -> Self {
        Self {
            keywords: ["taksi", "dan", "ga"]
                .into_iter()
                .filter_map(Keyword::new)
                .collect(),
            admins: BTreeSet::new(),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }
}

/// Backend-agnostic keyword/admin store.
///
/// The pipeline only reads snapshots; mutations come from admin commands.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Current keywords and admins.
    async fn snapshot(&self) -> Result<ConfigSnapshot, StoreError>;

    /// Add a keyword. Returns `false` if it already exists.
    async fn add_keyword(&self, keyword: Keyword) -> Result<bool, StoreError>;

    /// Remove a keyword. Returns `false` if it was not present.
    async fn remove_keyword(&self, keyword: &Keyword) -> Result<bool, StoreError>;
}
