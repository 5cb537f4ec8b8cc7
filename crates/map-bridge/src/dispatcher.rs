use std::collections::HashMap;

use tracing::{debug, warn};
use transit_common::TransitError;

use crate::event::{EventKind, MapEvent};

type Handler<S> = Box<dyn Fn(&mut S, &MapEvent) + Send + Sync>;

/// Routes page events to handlers registered per event type.
///
/// Handlers get mutable access to the host state `S`. Nothing here is fatal:
/// unparseable, unknown and unhandled events are logged and dropped.
pub struct EventDispatcher<S> {
    handlers: HashMap<EventKind, Vec<Handler<S>>>,
}

impl<S> EventDispatcher<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `kind`. Handlers run in registration order.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> &mut Self
    where
        F: Fn(&mut S, &MapEvent) + Send + Sync + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
        self
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Runs every handler registered for the event's type. Returns how many ran.
    pub fn dispatch(&self, state: &mut S, event: &MapEvent) -> usize {
        match self.handlers.get(&event.kind()) {
            Some(handlers) => {
                for handler in handlers {
                    handler(state, event);
                }
                handlers.len()
            }
            None => {
                debug!(kind = ?event.kind(), "No handler registered for map event");
                0
            }
        }
    }

    /// Parses a raw page message and dispatches it.
    ///
    /// Returns the event when the message could be parsed.
    pub fn dispatch_raw(&self, state: &mut S, raw: &str) -> Option<MapEvent> {
        let event = parse_logged(raw)?;
        self.dispatch(state, &event);
        Some(event)
    }
}

impl<S> Default for EventDispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// [`MapEvent::parse`], with failures logged instead of returned.
pub fn parse_logged(raw: &str) -> Option<MapEvent> {
    match MapEvent::parse(raw) {
        Ok(event) => Some(event),
        Err(TransitError::UnknownEvent(kind)) => {
            warn!("Ignoring unknown map event: {}", kind);
            None
        }
        Err(e) => {
            warn!("Ignoring map message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counts {
        ready: u32,
        clicks: Vec<String>,
    }

    fn dispatcher() -> EventDispatcher<Counts> {
        let mut dispatcher = EventDispatcher::new();
        dispatcher
            .on(EventKind::MapReady, |s: &mut Counts, _| s.ready += 1)
            .on(EventKind::RouteClicked, |s: &mut Counts, e| {
                if let MapEvent::RouteClicked { route_id } = e {
                    s.clicks.push(route_id.clone());
                }
            });
        dispatcher
    }

    #[test]
    fn dispatches_by_type() {
        let dispatcher = dispatcher();
        let mut state = Counts::default();
        dispatcher.dispatch_raw(&mut state, "mapReady");
        dispatcher.dispatch_raw(&mut state, r#"{"type":"routeClicked","routeId":"r9"}"#);
        assert_eq!(state.ready, 1);
        assert_eq!(state.clicks, vec!["r9".to_string()]);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let mut dispatcher: EventDispatcher<Vec<u8>> = EventDispatcher::new();
        dispatcher
            .on(EventKind::MapReady, |s, _| s.push(1))
            .on(EventKind::MapReady, |s, _| s.push(2));
        let mut order = Vec::new();
        assert_eq!(dispatcher.dispatch(&mut order, &MapEvent::MapReady), 2);
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn garbage_and_unhandled_events_are_ignored() {
        let dispatcher = dispatcher();
        let mut state = Counts::default();
        assert!(dispatcher.dispatch_raw(&mut state, "not json at all").is_none());
        assert!(dispatcher.dispatch_raw(&mut state, r#"{"type":"somethingNew"}"#).is_none());

        let event = dispatcher
            .dispatch_raw(&mut state, r#"{"type":"webviewDebug","message":"hi"}"#)
            .unwrap();
        assert_eq!(event.kind(), EventKind::WebviewDebug);
        assert!(!dispatcher.handles(EventKind::WebviewDebug));
        assert_eq!(state.ready, 0);
        assert!(state.clicks.is_empty());
    }
}
