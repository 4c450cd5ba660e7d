//! Hand-off of player events from the engine thread to async consumers.
//!
//! `emit` is called on whatever thread the engine uses for callbacks and
//! never blocks. Every subscriber owns its own unbounded queue, so a slow
//! consumer delays nobody and no event is lost while it is subscribed.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use soundboar_core::Event;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

/// Fan-out point for normalized events.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    subscribers: Vec<UnboundedSender<Event>>,
    /// Events emitted before anyone subscribed; handed to the first subscriber.
    backlog: Option<VecDeque<Event>>,
    closed: bool,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                subscribers: Vec::new(),
                backlog: Some(VecDeque::new()),
                closed: false,
            })),
        }
    }

    /// Queue `event` for every subscriber.
    ///
    /// Emits are serialized, so all subscribers observe the same order.
    /// Only events from before the first subscription are kept for later:
    /// once that subscriber took the backlog, an event emitted while no
    /// subscription is live reaches nobody and is discarded.
    pub fn emit(&self, event: Event) {
        let mut inner = self.inner.lock();
        if inner.closed {
            trace!("Broadcaster closed, discarding {event}");
            return;
        }

        if let Some(backlog) = inner.backlog.as_mut() {
            backlog.push_back(event);
            return;
        }

        inner.subscribers.retain(|tx| tx.send(event).is_ok());
        if inner.subscribers.is_empty() {
            debug!("No subscribers, discarding {event}");
        } else {
            trace!("Emitted {event} to {} subscribers", inner.subscribers.len());
        }
    }

    /// Open a new subscription.
    ///
    /// The first subscription also receives everything emitted before it.
    /// Subscribing after [`close`](Self::close) yields a stream that ends
    /// once that backlog, if any, is drained.
    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = unbounded_channel();
        let mut inner = self.inner.lock();

        if let Some(backlog) = inner.backlog.take() {
            debug!("First subscriber, replaying {} buffered events", backlog.len());
            for event in backlog {
                let _ = tx.send(event);
            }
        }

        if !inner.closed {
            inner.subscribers.push(tx);
        }

        EventStream { rx }
    }

    /// Stop accepting events. Subscribers drain what they have, then end.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if !inner.closed {
            debug!("Closing broadcaster with {} subscribers", inner.subscribers.len());
        }
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// A single subscriber's view of the event sequence.
///
/// Dropping the stream unsubscribes; events queued for it are discarded.
pub struct EventStream {
    rx: UnboundedReceiver<Event>,
}

impl EventStream {
    /// Wait for the next event. `None` once the broadcaster is closed and
    /// everything queued for this subscriber has been delivered.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Stop receiving new events; already queued ones can still be read.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Take an already queued event without waiting.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_events_before_subscription_are_replayed_first() {
        let events = EventBroadcaster::new();
        events.emit(Event::FileChange);
        events.emit(Event::StateChange);

        let mut stream = events.subscribe();
        events.emit(Event::VolumeChange);

        assert_eq!(stream.next().await, Some(Event::FileChange));
        assert_eq!(stream.next().await, Some(Event::StateChange));
        assert_eq!(stream.next().await, Some(Event::VolumeChange));
    }

    #[tokio::test]
    async fn test_order_preserved_across_threads() {
        let events = EventBroadcaster::new();
        let mut stream = events.subscribe();

        let producer = events.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..300 {
                producer.emit(Event::ALL[i % Event::ALL.len()]);
            }
        });

        for i in 0..300 {
            let event = timeout(WAIT, stream.next()).await.unwrap();
            assert_eq!(event, Some(Event::ALL[i % Event::ALL.len()]));
        }
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let events = EventBroadcaster::new();
        let mut stream = events.subscribe();
        events.emit(Event::Error);
        events.close();
        events.emit(Event::StateChange);

        assert_eq!(stream.next().await, Some(Event::Error));
        assert_eq!(timeout(WAIT, stream.next()).await.unwrap(), None);
        assert!(events.is_closed());
    }

    #[tokio::test]
    async fn test_close_wakes_pending_waiter() {
        let events = EventBroadcaster::new();
        let mut stream = events.subscribe();

        let closer = events.clone();
        let waiter = tokio::spawn(async move { stream.next().await });
        tokio::task::yield_now().await;
        closer.close();

        assert_eq!(timeout(WAIT, waiter).await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn test_fan_out_to_independent_subscribers() {
        let events = EventBroadcaster::new();
        let mut first = events.subscribe();
        let mut second = events.subscribe();
        events.emit(Event::VolumeChange);

        assert_eq!(first.next().await, Some(Event::VolumeChange));
        assert_eq!(second.next().await, Some(Event::VolumeChange));
        assert_eq!(events.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let events = EventBroadcaster::new();
        let keep = events.subscribe();
        drop(events.subscribe());
        events.emit(Event::StateChange);

        assert_eq!(events.subscriber_count(), 1);
        drop(keep);
        assert_eq!(events.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_closing_stream_while_emitting_never_hangs() {
        let events = EventBroadcaster::new();
        let mut stream = events.subscribe();

        let producer = events.clone();
        let handle = std::thread::spawn(move || producer.emit(Event::FileChange));
        stream.close();
        handle.join().unwrap();

        let outcome = timeout(WAIT, stream.next()).await.unwrap();
        assert!(outcome.is_none() || outcome == Some(Event::FileChange));
    }

    #[tokio::test]
    async fn test_events_without_live_subscriber_are_discarded() {
        let events = EventBroadcaster::new();
        drop(events.subscribe());
        events.emit(Event::FileChange);

        let mut late = events.subscribe();
        events.emit(Event::VolumeChange);
        assert_eq!(late.next().await, Some(Event::VolumeChange));
        assert_eq!(late.try_next(), None);
    }

    #[tokio::test]
    async fn test_subscribe_after_close_yields_backlog() {
        let events = EventBroadcaster::new();
        events.emit(Event::FileChange);
        events.close();

        let mut stream = events.subscribe();
        assert_eq!(stream.next().await, Some(Event::FileChange));
        assert_eq!(stream.next().await, None);
    }
}
