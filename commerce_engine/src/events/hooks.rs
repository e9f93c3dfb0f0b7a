use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler, EventProducer, Handler, OrderAnnulledEvent, OrderDeliveredEvent, OrderPaidEvent,
};

/// Producer handles the APIs publish to. Cloneable; empty producers drop events silently.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
    pub order_delivered_producer: Vec<EventProducer<OrderDeliveredEvent>>,
}

pub struct EventHandlers {
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_order_annulled: Option<EventHandler<OrderAnnulledEvent>>,
    pub on_order_delivered: Option<EventHandler<OrderDeliveredEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_paid: hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, f)),
            on_order_annulled: hooks.on_order_annulled.map(|f| EventHandler::new(buffer_size, f)),
            on_order_delivered: hooks.on_order_delivered.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_delivered {
            result.order_delivered_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(async move { handler.start_handler().await });
        }
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(async move { handler.start_handler().await });
        }
        if let Some(handler) = self.on_order_delivered {
            tokio::spawn(async move { handler.start_handler().await });
        }
    }
}

/// Async closures to run on engine events. Register with the `on_*` methods, then build
/// [`EventHandlers`] from the hooks.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
    pub on_order_delivered: Option<Handler<OrderDeliveredEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_order_delivered<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderDeliveredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_delivered = Some(Arc::new(f));
        self
    }
}
