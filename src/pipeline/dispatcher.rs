//! Fan-out of notifications to driver groups, with operator escalation.
//!
//! Each destination gets exactly one delivery attempt; a stale taxi request
//! re-sent later would mislead drivers. Failures are isolated per
//! destination and reported to a `FailureSink`, which is where retrying
//! happens.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::channels::{OutgoingPayload, Transport};
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::types::{Destination, DeliveryOutcome, DeliveryStatus, NotificationRecord};

/// Default pause after each successful delivery.
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Default escalation attempts.
pub const DEFAULT_ESCALATION_ATTEMPTS: u32 = 3;

/// Default pause between escalation attempts.
pub const DEFAULT_ESCALATION_DELAY: Duration = Duration::from_secs(5);

/// What happened to one escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32 },
    /// No operator configured.
    Disabled,
}

/// Receives reports about failures that an operator should hear about.
#[async_trait]
pub trait FailureSink: Send + Sync {
    async fn escalate(&self, error_message: &str) -> EscalationOutcome;
}

// ── Operator escalation ─────────────────────────────────────────────

/// Sends failure reports to a single operator chat with bounded retry.
pub struct OperatorEscalator {
    transport: Arc<dyn Transport>,
    operator: Option<Destination>,
    policy: RetryPolicy,
    warned_disabled: AtomicBool,
}

impl OperatorEscalator {
    pub fn new(
        transport: Arc<dyn Transport>,
        operator: Option<Destination>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            operator,
            policy,
            warned_disabled: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl FailureSink for OperatorEscalator {
    async fn escalate(&self, error_message: &str) -> EscalationOutcome {
        let Some(operator) = &self.operator else {
            if !self.warned_disabled.swap(true, Ordering::Relaxed) {
                warn!("No operator configured; failure reports will not be sent");
            }
            return EscalationOutcome::Disabled;
        };

        let payload = OutgoingPayload::plain(format!("🚨 Botda xato yuz berdi:\n{error_message}"));
        let result = self
            .policy
            .run(|_| self.transport.send(operator, &payload))
            .await;

        match result {
            Ok(((), attempts)) => {
                info!(operator = %operator, attempts, "Failure report sent to operator");
                EscalationOutcome::Delivered { attempts }
            }
            Err(e) => {
                error!(
                    operator = %operator,
                    attempts = e.attempts,
                    error = %e.last_error,
                    report = %error_message,
                    "Could not reach operator; failure report dropped"
                );
                EscalationOutcome::Exhausted {
                    attempts: e.attempts,
                }
            }
        }
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// Delivers a notification to every destination in order.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    failures: Arc<dyn FailureSink>,
    delivery_policy: RetryPolicy,
    pacing: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, failures: Arc<dyn FailureSink>) -> Self {
        Self {
            transport,
            failures,
            delivery_policy: RetryPolicy::once(),
            pacing: DEFAULT_PACING,
        }
    }

    /// Pause after each successful delivery.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub async fn dispatch(
        &self,
        record: &NotificationRecord,
        destinations: &[Destination],
    ) -> Vec<DeliveryOutcome> {
        let payload = OutgoingPayload::html(record.render_html());
        let mut outcomes = Vec::with_capacity(destinations.len());

        for destination in destinations {
            let result = self
                .delivery_policy
                .run(|_| self.transport.send(destination, &payload))
                .await;

            match result {
                Ok(_) => {
                    info!(destination = %destination, "Notification delivered");
                    outcomes.push(DeliveryOutcome {
                        destination: destination.clone(),
                        status: DeliveryStatus::Delivered,
                    });
                    if !self.pacing.is_zero() {
                        tokio::time::sleep(self.pacing).await;
                    }
                }
                Err(e) => {
                    let error_message = format!(
                        "{destination} guruhiga xabar yuborishda xato: {}",
                        e.last_error
                    );
                    error!(
                        destination = %destination,
                        error = %e.last_error,
                        "Notification delivery failed"
                    );
                    outcomes.push(DeliveryOutcome {
                        destination: destination.clone(),
                        status: DeliveryStatus::Failed {
                            error: e.last_error.to_string(),
                        },
                    });
                    self.failures.escalate(&error_message).await;
                }
            }
        }

        outcomes
    }
}
