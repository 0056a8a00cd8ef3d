//! Transport abstraction shared by the pipeline and channel implementations.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::commands::AdminCommand;
use crate::error::ChannelError;
use crate::pipeline::types::{Destination, IncomingMessage};

/// How the receiving client should interpret `OutgoingPayload::text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Html,
    Plain,
}

/// A message ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingPayload {
    pub text: String,
    pub parse_mode: ParseMode,
}

impl OutgoingPayload {
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: ParseMode::Html,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: ParseMode::Plain,
        }
    }
}

/// An administrative command issued in any chat the bot can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub chat_id: i64,
    pub user_id: i64,
    pub command: AdminCommand,
}

/// Everything a channel hands to the host loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundUpdate {
    /// Text or contact from an allow-listed source chat.
    Message(IncomingMessage),
    Command(CommandInvocation),
}

pub type InboundStream = Pin<Box<dyn Stream<Item = InboundUpdate> + Send>>;

/// Delivers one payload to one destination.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn send(
        &self,
        destination: &Destination,
        payload: &OutgoingPayload,
    ) -> Result<(), ChannelError>;
}
