//! Ordered event delivery to registered handlers.
//!
//! The first event of a session is delivered synchronously from
//! [`EventDispatcher::dispatch`] so "session started" feedback is immediate.
//! Later events are queued and delivered together on the next scheduling
//! tick ([`EventDispatcher::tick`]), so a burst of frames in one chunk costs
//! one render pass instead of many. Queueing never reorders, merges or drops
//! events, except that nothing is delivered once the session is cancelled.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::sse::{Event, EventKind};

/// Callback invoked for a delivered event.
///
/// Handlers run on the session task; long blocking work stalls decoding of
/// the frames behind it.
pub type Handler = Box<dyn FnMut(&Event) + Send>;

/// Delivers events to handlers keyed by event type.
pub struct EventDispatcher {
    handlers: HashMap<String, Handler>,
    observers: Vec<Handler>,
    fallback_handler: Option<Handler>,
    pending: VecDeque<Event>,
    first_delivered: bool,
    delivered: u64,
    cancel: CancellationToken,
}

impl EventDispatcher {
    /// Create a dispatcher that stops delivering once `cancel` fires.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            handlers: HashMap::new(),
            observers: Vec::new(),
            fallback_handler: None,
            pending: VecDeque::new(),
            first_delivered: false,
            delivered: 0,
            cancel,
        }
    }

    /// Register the handler for one event type, replacing any previous one.
    pub fn on<F>(&mut self, event_type: impl Into<String>, handler: F) -> &mut Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.handlers.insert(event_type.into(), Box::new(handler));
        self
    }

    /// Register the handler for a known kind.
    pub fn on_kind<F>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.on(String::from(kind), handler)
    }

    /// Register an observer that sees every event before its typed handler.
    pub fn on_any<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.observers.push(Box::new(handler));
        self
    }

    /// Register the handler for types with no registered handler.
    pub fn on_unhandled<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.fallback_handler = Some(Box::new(handler));
        self
    }

    /// Hand an event to the dispatcher.
    ///
    /// Returns false if the event was discarded because the session is
    /// cancelled.
    pub fn dispatch(&mut self, event: Event) -> bool {
        if self.cancel.is_cancelled() {
            tracing::debug!(event_type = event.event_type(), "Discarding event after cancel");
            return false;
        }

        if !self.first_delivered {
            self.first_delivered = true;
            self.deliver(&event);
        } else {
            self.pending.push_back(event);
        }
        true
    }

    /// Deliver every queued event in arrival order.
    ///
    /// Stops and discards the queue as soon as the session is cancelled,
    /// including by a handler running inside this flush.
    pub fn flush(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.pending.pop_front() {
            if self.cancel.is_cancelled() {
                tracing::debug!(
                    discarded = self.pending.len() + 1,
                    "Discarding queued events after cancel"
                );
                self.pending.clear();
                break;
            }
            self.deliver(&event);
            count += 1;
        }
        count
    }

    /// Yield to the scheduler, then deliver the queued batch.
    pub async fn tick(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        tokio::task::yield_now().await;
        self.flush()
    }

    /// Events handed over but not yet delivered.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Events delivered to handlers so far.
    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    pub fn first_event_delivered(&self) -> bool {
        self.first_delivered
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn deliver(&mut self, event: &Event) {
        self.delivered += 1;

        for observer in self.observers.iter_mut() {
            observer(event);
        }

        match self.handlers.get_mut(event.event_type()) {
            Some(handler) => handler(event),
            None => {
                tracing::debug!(
                    event_type = event.event_type(),
                    known = event.kind.is_known(),
                    "No handler for event type"
                );
                if let Some(handler) = self.fallback_handler.as_mut() {
                    handler(event);
                }
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("observers", &self.observers.len())
            .field("pending", &self.pending.len())
            .field("first_delivered", &self.first_delivered)
            .field("delivered", &self.delivered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(dispatcher: &mut EventDispatcher) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatcher.on_any(move |event| sink.lock().unwrap().push(event.event_type().to_string()));
        seen
    }

    #[test]
    fn test_first_event_is_synchronous() {
        let mut dispatcher = EventDispatcher::default();
        let seen = recorder(&mut dispatcher);

        dispatcher.dispatch(Event::empty(EventKind::Started));
        assert_eq!(*seen.lock().unwrap(), vec!["started"]);
        assert!(dispatcher.first_event_delivered());

        dispatcher.dispatch(Event::empty(EventKind::Searching));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(dispatcher.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_tick_delivers_batch_in_order() {
        let mut dispatcher = EventDispatcher::default();
        let seen = recorder(&mut dispatcher);

        for kind in ["started", "searching", "search_result", "analyzing"] {
            dispatcher.dispatch(Event::empty(EventKind::from(kind)));
        }
        assert_eq!(dispatcher.tick().await, 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["started", "searching", "search_result", "analyzing"]
        );
        assert_eq!(dispatcher.delivered_count(), 4);
    }

    #[test]
    fn test_typed_handler_and_unhandled_fallback() {
        let mut dispatcher = EventDispatcher::default();
        let typed = Arc::new(Mutex::new(0));
        let unhandled = Arc::new(Mutex::new(Vec::new()));

        let typed_sink = Arc::clone(&typed);
        dispatcher.on_kind(EventKind::Token, move |_| *typed_sink.lock().unwrap() += 1);
        let unhandled_sink = Arc::clone(&unhandled);
        dispatcher.on_unhandled(move |event| {
            unhandled_sink
                .lock()
                .unwrap()
                .push(event.event_type().to_string())
        });

        dispatcher.dispatch(Event::empty(EventKind::Token));
        dispatcher.dispatch(Event::empty(EventKind::Other("mystery".to_string())));
        dispatcher.dispatch(Event::empty(EventKind::Token));
        dispatcher.flush();

        assert_eq!(*typed.lock().unwrap(), 2);
        assert_eq!(*unhandled.lock().unwrap(), vec!["mystery"]);
    }

    #[test]
    fn test_unknown_type_without_handlers_does_not_panic() {
        let mut dispatcher = EventDispatcher::default();
        dispatcher.dispatch(Event::empty(EventKind::Other("mystery".to_string())));
        assert_eq!(dispatcher.delivered_count(), 1);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_known_type_without_handler_is_logged() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let unhandled = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&unhandled);
        tracing::subscriber::with_default(subscriber, || {
            let mut dispatcher = EventDispatcher::default();
            dispatcher.on_unhandled(move |event| {
                sink.lock().unwrap().push(event.event_type().to_string())
            });
            dispatcher.dispatch(Event::empty(EventKind::Searching));
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("No handler for event type"));
        assert!(output.contains("searching"));
        assert!(output.contains("known=true"));
        assert_eq!(*unhandled.lock().unwrap(), vec!["searching"]);
    }

    #[test]
    fn test_cancel_from_handler_stops_queued_events() {
        let cancel = CancellationToken::new();
        let mut dispatcher = EventDispatcher::new(cancel.clone());
        let seen = recorder(&mut dispatcher);

        let cancel_on_second = cancel.clone();
        let mut count = 0;
        dispatcher.on_any(move |_| {
            count += 1;
            if count == 2 {
                cancel_on_second.cancel();
            }
        });

        for _ in 0..5 {
            dispatcher.dispatch(Event::empty(EventKind::Progress));
        }
        dispatcher.flush();

        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(dispatcher.pending_len(), 0);
        assert!(!dispatcher.dispatch(Event::empty(EventKind::Complete)));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
