//! Simple stateless pub-sub plumbing for engine events.
//!
//! Subscribers register an async closure against an event type; the engine publishes
//! events after the relevant transaction commits. Handlers receive only the event itself
//! and run on their own task, so a slow subscriber can never hold up an order flow.
//! Delivery is best-effort: if a channel is full or closed the event is dropped with a
//! log line.

use std::{future::Future, pin::Pin, sync::Arc};

use log::{debug, trace, warn};
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped. Each event is handled on its own task.
    pub async fn start_handler(mut self) {
        debug!("📬️ Event handler started");
        // Drop the internal sender so the loop ends once the last producer goes away.
        drop(self.sender);
        while let Some(event) = self.listener.recv().await {
            trace!("📬️ Dispatching event to handler");
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                (handler)(event).await;
            });
        }
        debug!("📬️ Event handler shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E> {
    sender: mpsc::Sender<E>,
}

impl<E> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            warn!("📬️ Event dropped: no live handler ({e})");
        }
    }
}
