//! In-process event bus with bounded history.
//!
//! Listeners registered with [`EventBus::on_all`] or [`EventBus::on_event`]
//! are called synchronously, in registration order, on the emitting thread.
//! Per-type listeners run before all-events listeners. Every emitted event is
//! also appended to a capped history and forwarded to a tokio broadcast
//! channel for async consumers.

use crate::models::{Event, EventType, generate_event_id};
use crate::ring_buffer::RingBuffer;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Default history capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

const BROADCAST_CAPACITY: usize = 1024;

/// Synchronous event listener.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscriptions {
    next_id: u64,
    all: Vec<(SubscriptionId, Listener)>,
    by_type: HashMap<EventType, Vec<(SubscriptionId, Listener)>>,
}

impl Subscriptions {
    const fn allocate(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

struct Inner {
    history: Mutex<RingBuffer<Event>>,
    subscriptions: RwLock<Subscriptions>,
    sender: broadcast::Sender<Event>,
}

/// Central event bus.
///
/// Cloning yields another handle to the same bus.
///
/// # Example
///
/// ```rust
/// use guardian_cognition::{Event, EventBus, EventType};
/// use serde_json::json;
///
/// let bus = EventBus::new(100);
/// bus.emit_event(Event::new(EventType::TaskStart, json!({"task": "index"})));
/// assert_eq!(bus.history(None).len(), 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Filtered receiver that yields events matching a predicate.
pub struct FilteredReceiver<F> {
    receiver: broadcast::Receiver<Event>,
    predicate: F,
}

impl EventBus {
    /// Creates a bus retaining at most `history_capacity` events.
    #[must_use]
    pub fn new(history_capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                history: Mutex::new(RingBuffer::new(history_capacity)),
                subscriptions: RwLock::new(Subscriptions::default()),
                sender,
            }),
        }
    }

    /// Emits an event.
    ///
    /// An empty id is replaced with a generated one and a zero timestamp
    /// with the current time. The completed event is returned.
    pub fn emit_event(&self, mut event: Event) -> Event {
        if event.id.is_empty() {
            event.id = generate_event_id();
        }
        if event.timestamp == 0 {
            event.timestamp = crate::current_timestamp_millis();
        }

        {
            let mut history = self
                .inner
                .history
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if history.push(event.clone()).is_some() {
                metrics::counter!("event_bus_evicted_total").increment(1);
            }
        }

        // Snapshot so listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener> = {
            let subscriptions = self
                .inner
                .subscriptions
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            subscriptions
                .by_type
                .get(&event.event_type)
                .into_iter()
                .flatten()
                .chain(subscriptions.all.iter())
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in &listeners {
            listener(&event);
        }

        metrics::counter!("event_bus_emit_total", "type" => event.event_type.as_str())
            .increment(1);
        if self.inner.sender.send(event.clone()).is_err() {
            // No async receivers attached.
            metrics::counter!("event_bus_unobserved_total").increment(1);
        }
        tracing::trace!(id = %event.id, event_type = %event.event_type, "event emitted");
        event
    }

    /// Subscribes a listener to every event.
    pub fn on_all<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut subscriptions = self
            .inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = subscriptions.allocate();
        subscriptions.all.push((id, Arc::new(listener)));
        metrics::counter!("event_bus_subscriptions_total").increment(1);
        id
    }

    /// Subscribes a listener to one event type.
    pub fn on_event<F>(&self, event_type: EventType, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut subscriptions = self
            .inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = subscriptions.allocate();
        subscriptions
            .by_type
            .entry(event_type)
            .or_default()
            .push((id, Arc::new(listener)));
        metrics::counter!("event_bus_subscriptions_total").increment(1);
        id
    }

    /// Removes a subscription. Returns false if it was not registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .inner
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.all.len();
        subscriptions.all.retain(|(sid, _)| *sid != id);
        if subscriptions.all.len() != before {
            return true;
        }
        for listeners in subscriptions.by_type.values_mut() {
            let before = listeners.len();
            listeners.retain(|(sid, _)| *sid != id);
            if listeners.len() != before {
                return true;
            }
        }
        false
    }

    /// Subscribes an async receiver to every subsequent event.
    ///
    /// Receivers that fall behind skip the oldest undelivered events.
    #[must_use]
    pub fn subscribe_async(&self) -> broadcast::Receiver<Event> {
        self.inner.sender.subscribe()
    }

    /// Subscribes an async receiver to one event type.
    #[must_use]
    pub fn subscribe_event_type_async(
        &self,
        event_type: EventType,
    ) -> FilteredReceiver<impl Fn(&Event) -> bool> {
        FilteredReceiver {
            receiver: self.inner.sender.subscribe(),
            predicate: move |event: &Event| event.event_type == event_type,
        }
    }

    fn recent<F>(&self, limit: Option<usize>, predicate: F) -> Vec<Event>
    where
        F: Fn(&Event) -> bool,
    {
        let history = self
            .inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        history
            .recent_matching(limit.unwrap_or(usize::MAX), predicate)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Returns the most recent events, oldest first.
    #[must_use]
    pub fn history(&self, limit: Option<usize>) -> Vec<Event> {
        self.recent(limit, |_| true)
    }

    /// Returns the most recent events of one type, oldest first.
    #[must_use]
    pub fn history_by_type(&self, event_type: EventType, limit: Option<usize>) -> Vec<Event> {
        self.recent(limit, |e| e.event_type == event_type)
    }

    /// Returns the most recent events tagged with a Guardian, oldest first.
    #[must_use]
    pub fn history_by_guardian(&self, guardian_id: &str, limit: Option<usize>) -> Vec<Event> {
        self.recent(limit, |e| e.guardian_id.as_deref() == Some(guardian_id))
    }

    /// Empties the history. Subscriptions are kept.
    pub fn clear(&self) {
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no events are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<F> FilteredReceiver<F>
where
    F: Fn(&Event) -> bool,
{
    /// Receives the next event that matches the predicate.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if (self.predicate)(&event) {
                        return Ok(event);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    metrics::counter!("event_bus_lagged_total").increment(skipped);
                },
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(event_type: EventType, n: u64) -> Event {
        Event::new(event_type, json!({ "n": n }))
    }

    #[test]
    fn test_emit_fills_id_and_timestamp() {
        let bus = EventBus::new(10);
        let emitted = bus.emit_event(event(EventType::TaskStart, 0));
        assert!(emitted.id.starts_with("evt_"));
        assert!(emitted.timestamp > 0);

        let explicit = bus.emit_event(
            event(EventType::TaskStart, 1)
                .with_id("fixed")
                .with_timestamp(5),
        );
        assert_eq!(explicit.id, "fixed");
        assert_eq!(explicit.timestamp, 5);
    }

    #[test]
    fn test_history_is_capped_fifo() {
        let bus = EventBus::new(3);
        for n in 0..5 {
            bus.emit_event(event(EventType::TaskStart, n));
        }
        let history = bus.history(None);
        let ns: Vec<u64> = history.iter().map(|e| e.payload["n"].as_u64().unwrap()).collect();
        assert_eq!(ns, vec![2, 3, 4]);
    }

    #[test]
    fn test_history_limit_returns_most_recent_last() {
        let bus = EventBus::new(100);
        for n in 0..10 {
            bus.emit_event(event(EventType::TaskStart, n));
        }
        let history = bus.history(Some(4));
        let ns: Vec<u64> = history.iter().map(|e| e.payload["n"].as_u64().unwrap()).collect();
        assert_eq!(ns, vec![6, 7, 8, 9]);
        assert_eq!(bus.history(Some(50)).len(), 10);
    }

    #[test]
    fn test_history_by_type_and_guardian() {
        let bus = EventBus::new(100);
        bus.emit_event(event(EventType::TaskStart, 0).with_guardian("lyria"));
        bus.emit_event(event(EventType::TaskComplete, 1).with_guardian("draconia"));
        bus.emit_event(event(EventType::TaskStart, 2).with_guardian("draconia"));

        assert_eq!(bus.history_by_type(EventType::TaskStart, None).len(), 2);
        let draconia = bus.history_by_guardian("draconia", Some(1));
        assert_eq!(draconia.len(), 1);
        assert_eq!(draconia[0].payload["n"], json!(2));
        assert!(bus.history_by_guardian("nobody", None).is_empty());
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let bus = EventBus::new(10);
        let log = Arc::new(Mutex::new(Vec::new()));

        let l1 = Arc::clone(&log);
        bus.on_all(move |_| l1.lock().unwrap().push("all-1"));
        let l2 = Arc::clone(&log);
        bus.on_event(EventType::TaskFail, move |_| l2.lock().unwrap().push("fail"));
        let l3 = Arc::clone(&log);
        bus.on_all(move |_| l3.lock().unwrap().push("all-2"));

        bus.emit_event(event(EventType::TaskFail, 0));
        bus.emit_event(event(EventType::TaskStart, 1));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["fail", "all-1", "all-2", "all-1", "all-2"]
        );
    }

    #[test]
    fn test_events_delivered_in_emit_order() {
        let bus = EventBus::new(10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on_all(move |e| sink.lock().unwrap().push(e.payload["n"].as_u64().unwrap()));
        for n in 0..5 {
            bus.emit_event(event(EventType::PatternMatch, n));
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_off_stops_delivery() {
        let bus = EventBus::new(10);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = bus.on_event(EventType::TaskStart, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit_event(event(EventType::TaskStart, 0));
        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit_event(event(EventType::TaskStart, 1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_keeps_subscriptions() {
        let bus = EventBus::new(10);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        bus.on_all(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit_event(event(EventType::TaskStart, 0));
        bus.clear();
        assert!(bus.is_empty());
        bus.emit_event(event(EventType::TaskStart, 1));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn test_listener_may_subscribe_during_delivery() {
        let bus = EventBus::new(10);
        let inner_bus = bus.clone();
        bus.on_all(move |_| {
            inner_bus.on_all(|_| {});
        });
        bus.emit_event(event(EventType::TaskStart, 0));
        assert_eq!(bus.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_event_type_async_skips_non_matching() {
        let bus = EventBus::new(10);
        let mut filtered = bus.subscribe_event_type_async(EventType::MemoryStored);

        bus.emit_event(event(EventType::TaskStart, 0));
        bus.emit_event(event(EventType::MemoryStored, 1));

        let received = filtered.recv().await.expect("receive event");
        assert_eq!(received.event_type, EventType::MemoryStored);
        assert_eq!(received.payload["n"], json!(1));
    }

    #[tokio::test]
    async fn test_subscribe_async_receives_everything() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe_async();
        bus.emit_event(event(EventType::BudgetAlert, 7));
        let received = receiver.recv().await.expect("receive event");
        assert_eq!(received.event_type, EventType::BudgetAlert);
    }
}
