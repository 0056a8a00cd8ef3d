//! Taxi request relay pipeline.
//!
//! Every inbound message from a monitored group flows through:
//! 1. `Classifier::classify()`: fuzzy keyword matching (contacts skip this)
//! 2. `NotificationFormatter::format()`: provenance, phone, permalink
//! 3. `Dispatcher::dispatch()`: one attempt per driver group, failures
//!    escalated to the operator
//!
//! `RequestProcessor` ties the stages together.

pub mod classifier;
pub mod dispatcher;
pub mod extract;
pub mod formatter;
pub mod matcher;
pub mod processor;
pub mod retry;
pub mod types;
