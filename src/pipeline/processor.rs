//! Request processor: the pipeline's entry points for inbound events.
//!
//! Flow:
//! 1. Snapshot keywords from the config store
//! 2. Classify the text (contacts skip this step)
//! 3. Format a `NotificationRecord`
//! 4. Dispatch to every driver group
//!
//! Nothing is ever sent back to the message's author. Outcomes are logged.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::pipeline::classifier::Classifier;
use crate::pipeline::dispatcher::{Dispatcher, FailureSink};
use crate::pipeline::formatter::NotificationFormatter;
use crate::pipeline::types::{
    DeliveryOutcome, Destination, DetectedRequest, IncomingMessage, MessageMeta, MessagePayload,
};
use crate::store::ConfigStore;

pub struct RequestProcessor {
    classifier: Classifier,
    formatter: NotificationFormatter,
    dispatcher: Dispatcher,
    store: Arc<dyn ConfigStore>,
    failures: Arc<dyn FailureSink>,
    destinations: Vec<Destination>,
}

impl RequestProcessor {
    pub fn new(
        classifier: Classifier,
        formatter: NotificationFormatter,
        dispatcher: Dispatcher,
        store: Arc<dyn ConfigStore>,
        failures: Arc<dyn FailureSink>,
        destinations: Vec<Destination>,
    ) -> Self {
        Self {
            classifier,
            formatter,
            dispatcher,
            store,
            failures,
            destinations,
        }
    }

    /// Route a message to the matching entry point.
    pub async fn handle(&self, message: IncomingMessage) {
        match message.payload {
            MessagePayload::Text { text } => self.on_text_message(message.meta, text).await,
            MessagePayload::Contact { phone_number } => {
                self.on_contact_event(message.meta, phone_number).await
            }
        }
    }

    /// Classify a group text message and relay it if it looks like a request.
    pub async fn on_text_message(&self, meta: MessageMeta, text: String) {
        debug!(
            chat_id = meta.chat.id,
            message_id = meta.message_id,
            text = %text,
            "Text message received"
        );

        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let report = format!("Kalit so'zlarni yuklashda xato: {e}");
                error!(
                    chat_id = meta.chat.id,
                    message_id = meta.message_id,
                    error = %e,
                    "Failed to load keywords; message dropped"
                );
                self.failures.escalate(&report).await;
                return;
            }
        };

        let matches = self.classifier.classify(&text, &snapshot.keywords);
        if !matches.is_relevant() {
            return;
        }

        info!(
            chat_id = meta.chat.id,
            message_id = meta.message_id,
            count = matches.count(),
            "Taxi request detected"
        );
        self.relay(&meta, DetectedRequest::Text { text, matches }).await;
    }

    /// Relay a shared contact. Contacts are always treated as requests.
    pub async fn on_contact_event(&self, meta: MessageMeta, phone_number: String) {
        info!(
            chat_id = meta.chat.id,
            message_id = meta.message_id,
            phone = %phone_number,
            "Contact received"
        );
        self.relay(&meta, DetectedRequest::Contact { phone_number }).await;
    }

    async fn relay(&self, meta: &MessageMeta, request: DetectedRequest) -> Vec<DeliveryOutcome> {
        let record = self.formatter.format(meta, &request);
        let outcomes = self.dispatcher.dispatch(&record, &self.destinations).await;

        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        info!(
            chat_id = meta.chat.id,
            delivered,
            failed = outcomes.len() - delivered,
            "Request relayed to driver groups"
        );
        outcomes
    }
}
