//! Topic consumer service.
//!
//! On start a [`Queue`] spawns `consumers` fetcher tasks, each joining the
//! configured group on the broker as its own member. Fetchers forward
//! messages into a bounded channel drained by `processors` handler tasks.
//! Each message reaches exactly one handler per group, so queues sharing a
//! group split the topic between them. Handler errors are logged and the
//! message is dropped.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, QueueMessage};
use crate::config::QueueConf;
use crate::service::Service;

/// Buffered messages per processor between fetchers and processors.
const BUFFER_PER_PROCESSOR: usize = 8;

/// Handles messages consumed from a queue.
#[async_trait]
pub trait ConsumeHandler: Send + Sync + 'static {
    async fn consume(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Consumes one topic for one group.
pub struct Queue {
    conf: QueueConf,
    handler: Arc<dyn ConsumeHandler>,
    broker: Arc<Broker>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Queue {
    pub fn new(conf: QueueConf, broker: Arc<Broker>, handler: Arc<dyn ConsumeHandler>) -> Self {
        Self {
            conf,
            handler,
            broker,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn conf(&self) -> &QueueConf {
        &self.conf
    }

    /// Whether the queue's tasks are running.
    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    async fn fetch(
        name: String,
        mut subscription: mpsc::Receiver<QueueMessage>,
        sender: mpsc::Sender<QueueMessage>,
        cancel: CancellationToken,
    ) {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = subscription.recv() => received,
            };
            let Some(message) = received else {
                tracing::info!(queue = %name, "Subscription closed, fetcher shutting down");
                break;
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    }

    async fn process(
        name: String,
        receiver: Arc<Mutex<mpsc::Receiver<QueueMessage>>>,
        handler: Arc<dyn ConsumeHandler>,
        cancel: CancellationToken,
    ) {
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = async { receiver.lock().await.recv().await } => message,
            };
            let Some(message) = message else {
                break;
            };
            if let Err(e) = handler.consume(&message.key, &message.value).await {
                tracing::error!(
                    queue = %name,
                    key = %message.key,
                    error = %e,
                    "Failed to consume message"
                );
            }
        }
    }
}

#[async_trait]
impl Service for Queue {
    fn name(&self) -> &str {
        &self.conf.name
    }

    fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let (sender, receiver) = mpsc::channel(self.conf.processors * BUFFER_PER_PROCESSOR);
        let receiver = Arc::new(Mutex::new(receiver));

        for _ in 0..self.conf.consumers {
            self.tasks.push(tokio::spawn(Self::fetch(
                self.conf.name.clone(),
                self.broker.subscribe(&self.conf.topic, &self.conf.group),
                sender.clone(),
                self.cancel.clone(),
            )));
        }
        for _ in 0..self.conf.processors {
            self.tasks.push(tokio::spawn(Self::process(
                self.conf.name.clone(),
                Arc::clone(&receiver),
                Arc::clone(&self.handler),
                self.cancel.clone(),
            )));
        }

        tracing::info!(
            queue = %self.conf.name,
            topic = %self.conf.topic,
            group = %self.conf.group,
            consumers = self.conf.consumers,
            processors = self.conf.processors,
            "Queue started"
        );
    }

    async fn stop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(queue = %self.conf.name, error = %e, "Queue task panicked");
            }
        }
        // Allow a later restart.
        self.cancel = CancellationToken::new();
        tracing::info!(queue = %self.conf.name, "Queue stopped");
    }
}
