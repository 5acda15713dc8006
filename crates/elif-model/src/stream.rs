//! Filterable publish/subscribe streams
//!
//! Each subscriber registers a predicate and gets an unbounded channel.
//! Publishing delivers synchronously, in order, to every subscriber whose
//! predicate accepts the event. Dropped subscriptions are pruned on the next
//! publish.

use futures::Stream;
use parking_lot::Mutex;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct Subscriber<T> {
    accepts: Predicate<T>,
    sender: mpsc::UnboundedSender<T>,
}

pub struct EventStream<T> {
    subscribers: Mutex<Vec<Subscriber<T>>>,
}

impl<T: Clone + Send + 'static> EventStream<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Receive every event
    pub fn subscribe(&self) -> Subscription<T> {
        self.subscribe_filtered(|_| true)
    }

    /// Receive events accepted by `accepts`
    pub fn subscribe_filtered<F>(&self, accepts: F) -> Subscription<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber {
            accepts: Box::new(accepts),
            sender,
        });
        Subscription { receiver }
    }

    pub fn publish(&self, event: T) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| !subscriber.sender.is_closed());
        for subscriber in subscribers.iter() {
            if (subscriber.accepts)(&event) {
                // A receiver dropped since the retain above is pruned next time
                let _ = subscriber.sender.send(event.clone());
            }
        }
    }

    /// Live subscriber count
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| !subscriber.sender.is_closed());
        subscribers.len()
    }
}

impl<T: Clone + Send + 'static> Default for EventStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next event; `None` once the stream is gone
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Next already delivered event, if any
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Every already delivered event
    pub fn drain(&mut self) -> Vec<T> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Stop receiving; already delivered events stay readable
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_recv(cx)
    }
}
