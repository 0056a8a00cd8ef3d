//! Per-chat workers.
//!
//! Each source chat gets its own task, so messages from one chat are
//! processed in arrival order while different chats proceed concurrently.
//! A worker is spawned on the first message from its chat and lives until
//! shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pipeline::processor::RequestProcessor;
use crate::pipeline::types::IncomingMessage;

struct ChatWorker {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
}

/// Routes inbound messages to one worker task per source chat.
pub struct ChatWorkers {
    processor: Arc<RequestProcessor>,
    workers: Mutex<HashMap<i64, ChatWorker>>,
}

impl ChatWorkers {
    pub fn new(processor: Arc<RequestProcessor>) -> Self {
        Self {
            processor,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Queue a message on its chat's worker, spawning the worker if needed.
    pub async fn submit(&self, message: IncomingMessage) {
        let chat_id = message.meta.chat.id;
        let mut workers = self.workers.lock().await;

        let message = match workers.get(&chat_id) {
            Some(worker) => match worker.tx.send(message) {
                Ok(()) => return,
                // The worker died (its processor call panicked); replace it.
                Err(mpsc::error::SendError(message)) => {
                    warn!(chat_id, "Chat worker stopped unexpectedly; respawning");
                    message
                }
            },
            None => message,
        };

        let worker = self.spawn(chat_id);
        // A freshly spawned receiver is alive, so this cannot fail.
        let _ = worker.tx.send(message);
        workers.insert(chat_id, worker);
    }

    /// Number of chats with a live worker.
    pub async fn active(&self) -> usize {
        self.workers
            .lock()
            .await
            .values()
            .filter(|w| !w.handle.is_finished())
            .count()
    }

    /// Close every queue and wait for the workers to drain it.
    pub async fn shutdown(&self) {
        let workers: Vec<_> = self.workers.lock().await.drain().collect();
        info!(workers = workers.len(), "Stopping chat workers");

        for (chat_id, worker) in workers {
            drop(worker.tx);
            if let Err(e) = worker.handle.await {
                warn!(chat_id, error = %e, "Chat worker ended abnormally");
            }
        }
    }

    fn spawn(&self, chat_id: i64) -> ChatWorker {
        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
        let processor = Arc::clone(&self.processor);

        let handle = tokio::spawn(async move {
            debug!(chat_id, "Chat worker started");
            while let Some(message) = rx.recv().await {
                processor.handle(message).await;
            }
            debug!(chat_id, "Chat worker finished");
        });

        ChatWorker { tx, handle }
    }
}
