//! Named events and the callbacks listening for them.
//!
//! Anything holding the shared [`EventHandler`] can send an [`Event`]; every
//! callback registered for its type runs synchronously, in registration
//! order. Systems register through an [`EventConnections`] so that everything
//! they connected goes away with them.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tessera_core::{FromValue, Value};
use tracing::{debug, error, trace};

use crate::script::panic_message;

/// A typed event: a type name and a bag of named values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    event_type: String,
    values: BTreeMap<String, Value>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            values: BTreeMap::new(),
        }
    }

    /// An event carrying the entries of `payload`. Anything but a map is
    /// stored under `value`.
    pub fn from_value(event_type: impl Into<String>, payload: &Value) -> Self {
        let mut event = Self::new(event_type);
        match payload {
            Value::Map(values) => {
                for (name, value) in values {
                    event.set(name.clone(), value.clone());
                }
            }
            Value::Null => {}
            other => event.set("value", other.clone()),
        }
        event
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Insert or overwrite `name`. Storing [`Value::Null`] removes it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        match value.into() {
            Value::Null => {
                self.values.remove(&name);
            }
            value => {
                self.values.insert(name, value);
            }
        }
    }

    /// Typed read. `None` when missing or of another kind.
    pub fn get<T: FromValue>(&self, name: &str) -> Option<T> {
        T::from_value(self.values.get(name)?)
    }

    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// The payload as a map value.
    pub fn to_value(&self) -> Value {
        Value::Map(self.values.clone())
    }
}

type Callback = Rc<dyn Fn(&Event)>;

/// Identifies one registered callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventConnection {
    event_type: String,
    id: u64,
}

impl EventConnection {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

/// Maps event types to the callbacks listening for them.
///
/// Every method takes `&self`: callbacks may send events or change
/// connections while an event is being delivered.
#[derive(Default)]
pub struct EventHandler {
    callbacks: RefCell<BTreeMap<String, Vec<(u64, Callback)>>>,
    next_id: Cell<u64>,
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for `event_type`. Unknown types are accepted: nothing checks
    /// that anyone ever sends them.
    pub fn register_callback<F>(&self, event_type: &str, callback: F) -> EventConnection
    where
        F: Fn(&Event) + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.callbacks
            .borrow_mut()
            .entry(event_type.to_owned())
            .or_default()
            .push((id, Rc::new(callback)));
        debug!(event = event_type, id, "callback registered");
        EventConnection {
            event_type: event_type.to_owned(),
            id,
        }
    }

    pub fn is_connected(&self, connection: &EventConnection) -> bool {
        self.callbacks
            .borrow()
            .get(&connection.event_type)
            .is_some_and(|list| list.iter().any(|(id, _)| *id == connection.id))
    }

    /// Remove a callback. Returns whether it was still registered.
    pub fn disconnect(&self, connection: &EventConnection) -> bool {
        let mut callbacks = self.callbacks.borrow_mut();
        let Some(list) = callbacks.get_mut(&connection.event_type) else {
            debug!(event = %connection.event_type, "disconnect for an event type nobody listens to");
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != connection.id);
        let removed = list.len() != before;
        if list.is_empty() {
            callbacks.remove(&connection.event_type);
        }
        removed
    }

    /// Remove every callback.
    pub fn clear(&self) {
        self.callbacks.borrow_mut().clear();
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.callbacks.borrow().get(event_type).map_or(0, Vec::len)
    }

    /// Deliver `event` to the callbacks listening for its type. Returns
    /// whether at least one received it.
    ///
    /// The listener list is fixed when delivery starts. A panicking callback
    /// is logged and the remaining ones still run.
    pub fn send_event(&self, event: &Event) -> bool {
        let listeners: Vec<Callback> = match self.callbacks.borrow().get(event.event_type()) {
            Some(list) => list.iter().map(|(_, callback)| Rc::clone(callback)).collect(),
            None => Vec::new(),
        };
        if listeners.is_empty() {
            trace!(event = event.event_type(), "no listener for event");
            return false;
        }

        for callback in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                error!(event = event.event_type(), "event callback {}", panic_message(payload));
            }
        }
        true
    }

    /// Send an event without payload.
    pub fn send(&self, event_type: &str) -> bool {
        self.send_event(&Event::new(event_type))
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let callbacks = self.callbacks.borrow();
        f.debug_map()
            .entries(callbacks.iter().map(|(event, list)| (event, list.len())))
            .finish()
    }
}

/// The callbacks one owner registered, disconnected together when the owner
/// lets go of them.
pub struct EventConnections {
    handler: Rc<EventHandler>,
    connections: Vec<EventConnection>,
}

impl EventConnections {
    pub fn new(handler: Rc<EventHandler>) -> Self {
        Self {
            handler,
            connections: Vec::new(),
        }
    }

    pub fn handler(&self) -> &Rc<EventHandler> {
        &self.handler
    }

    pub fn register_callback<F>(&mut self, event_type: &str, callback: F) -> EventConnection
    where
        F: Fn(&Event) + 'static,
    {
        let connection = self.handler.register_callback(event_type, callback);
        self.connections.push(connection.clone());
        connection
    }

    pub fn send_event(&self, event: &Event) -> bool {
        self.handler.send_event(event)
    }

    /// Connections still registered.
    pub fn len(&self) -> usize {
        self.connections
            .iter()
            .filter(|connection| self.handler.is_connected(connection))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disconnect everything registered through this set. Returns how many
    /// callbacks were still connected.
    pub fn clear(&mut self) -> usize {
        let removed = self
            .connections
            .drain(..)
            .filter(|connection| self.handler.disconnect(connection))
            .count();
        if removed > 0 {
            debug!(removed, "event connections cleared");
        }
        removed
    }
}

impl Drop for EventConnections {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for EventConnections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.connections).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(handler: &EventHandler, event_type: &str) -> (EventConnection, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        let connection = handler.register_callback(event_type, move |_| seen.set(seen.get() + 1));
        (connection, count)
    }

    #[test]
    fn send_reaches_only_matching_listeners() {
        let handler = EventHandler::new();
        let (_, jumps) = counter(&handler, "jump");
        let (_, lands) = counter(&handler, "land");

        assert!(handler.send("jump"));
        assert!(handler.send("jump"));
        assert!(!handler.send("dive"));
        assert_eq!((jumps.get(), lands.get()), (2, 0));
    }

    #[test]
    fn callbacks_see_the_payload() {
        let handler = EventHandler::new();
        let received = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&received);
        handler.register_callback("damage", move |event| {
            *sink.borrow_mut() = event.get::<i64>("amount");
        });

        handler.send_event(&Event::new("damage").with("amount", 7).with("source", "spikes"));
        assert_eq!(*received.borrow(), Some(7));
    }

    #[test]
    fn disconnect_stops_delivery() {
        let handler = EventHandler::new();
        let (connection, count) = counter(&handler, "tick");
        assert!(handler.is_connected(&connection));
        assert!(handler.disconnect(&connection));
        assert!(!handler.disconnect(&connection));
        assert!(!handler.is_connected(&connection));

        assert!(!handler.send("tick"));
        assert_eq!(count.get(), 0);
        assert_eq!(handler.listener_count("tick"), 0);
    }

    #[test]
    fn callbacks_can_send_and_register_while_delivering() {
        let handler = Rc::new(EventHandler::new());
        let (_, echoes) = counter(&handler, "echo");
        let inner = Rc::clone(&handler);
        handler.register_callback("shout", move |_| {
            inner.send("echo");
            inner.register_callback("shout", |_| {});
        });

        assert!(handler.send("shout"));
        assert_eq!(echoes.get(), 1);
        assert_eq!(handler.listener_count("shout"), 2);
    }

    #[test]
    fn panicking_callback_does_not_stop_the_others() {
        let handler = EventHandler::new();
        handler.register_callback("boom", |_| panic!("listener blew up"));
        let (_, count) = counter(&handler, "boom");

        assert!(handler.send("boom"));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dropping_connections_disconnects_them() {
        let handler = Rc::new(EventHandler::new());
        let (outside, _) = counter(&handler, "door");
        {
            let mut owned = EventConnections::new(Rc::clone(&handler));
            owned.register_callback("door", |_| {});
            owned.register_callback("bell", |_| {});
            assert_eq!(owned.len(), 2);
            assert_eq!(handler.listener_count("door"), 2);
        }
        assert_eq!(handler.listener_count("door"), 1);
        assert_eq!(handler.listener_count("bell"), 0);
        assert!(handler.is_connected(&outside));
    }

    #[test]
    fn non_map_payload_is_stored_as_value() {
        let event = Event::from_value("score", &Value::from(12));
        assert_eq!(event.get::<i64>("value"), Some(12));

        let event = Event::from_value("hit", &Value::from(serde_json::json!({ "x": 1, "gone": null })));
        assert!(event.contains("x"));
        assert!(!event.contains("gone"));
    }
}
