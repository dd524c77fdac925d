//! Input bindings: raw window input turned into named events.
//!
//! A binding configuration is a JSON object mapping an event type to the
//! input that sends it:
//!
//! ```json
//! {
//!     "pause": { "type": "keypressed", "key": "Escape", "state": "game" },
//!     "left": [{ "type": "keyhold", "key": "Left" }, { "type": "keyhold", "key": "A" }],
//!     "quit": "closed"
//! }
//! ```
//!
//! A list means any of its entries. Fields other than `type`, `key`, `state`
//! and the modifier flags are copied into the event payload.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tessera_core::{InputEvent, Value};
use tessera_ecs::{Event, EventHandler};
use tracing::{debug, warn};

use crate::error::InputError;
use crate::state::RESERVED_STATE_NAME;

/// The kind of input a pattern reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Closed,
    KeyPressed,
    KeyReleased,
    /// Fires every frame while the key is down.
    KeyHold,
}

impl Trigger {
    fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "closed" => Some(Self::Closed),
            "keypressed" => Some(Self::KeyPressed),
            "keyreleased" => Some(Self::KeyReleased),
            "keyhold" => Some(Self::KeyHold),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::KeyPressed => "keypressed",
            Self::KeyReleased => "keyreleased",
            Self::KeyHold => "keyhold",
        }
    }

    fn takes_key(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A modifier key that must be down for a pattern to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Modifier {
    /// Either shift key
    Shift,
    LShift,
    RShift,
    /// Either alt key
    Alt,
    LAlt,
    RAlt,
    /// Either control key
    Control,
    LControl,
    RControl,
}

impl Modifier {
    const ALL: [Modifier; 9] = [
        Self::Shift,
        Self::LShift,
        Self::RShift,
        Self::Alt,
        Self::LAlt,
        Self::RAlt,
        Self::Control,
        Self::LControl,
        Self::RControl,
    ];

    /// The configuration field naming this modifier.
    pub fn field(self) -> &'static str {
        match self {
            Self::Shift => "shift",
            Self::LShift => "lshift",
            Self::RShift => "rshift",
            Self::Alt => "alt",
            Self::LAlt => "lalt",
            Self::RAlt => "ralt",
            Self::Control => "control",
            Self::LControl => "lcontrol",
            Self::RControl => "rcontrol",
        }
    }

    /// Key names satisfying the modifier.
    fn keys(self) -> &'static [&'static str] {
        match self {
            Self::Shift => &["LShift", "RShift"],
            Self::LShift => &["LShift"],
            Self::RShift => &["RShift"],
            Self::Alt => &["LAlt", "RAlt"],
            Self::LAlt => &["LAlt"],
            Self::RAlt => &["RAlt"],
            Self::Control => &["LControl", "RControl"],
            Self::LControl => &["LControl"],
            Self::RControl => &["RControl"],
        }
    }

    fn is_down(self, held: &BTreeSet<String>) -> bool {
        self.keys().iter().any(|key| held.contains(&key.to_lowercase()))
    }
}

/// One way of sending a bound event.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPattern {
    pub trigger: Trigger,
    /// `None` matches any key.
    pub key: Option<String>,
    /// Only fires while this state is on top. `all` fires in every state.
    pub state: String,
    pub modifiers: Vec<Modifier>,
    pub payload: BTreeMap<String, Value>,
}

impl InputPattern {
    pub fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            key: None,
            state: RESERVED_STATE_NAME.to_owned(),
            modifiers: Vec::new(),
            payload: BTreeMap::new(),
        }
    }

    fn parse(event_type: &str, description: &Value) -> Result<Self, InputError> {
        let fields = match description {
            Value::Str(name) => return Self::parse_trigger(event_type, name).map(Self::new),
            Value::Map(fields) => fields,
            other => {
                return Err(InputError::new(
                    event_type,
                    format!("expected a string or a map, got {}", other.kind()),
                ))
            }
        };

        let mut rest = fields.clone();
        let trigger = match rest.remove("type") {
            Some(Value::Str(name)) => Self::parse_trigger(event_type, &name)?,
            Some(other) => {
                return Err(InputError::new(event_type, format!("'type' must be a string, got {}", other.kind())))
            }
            None => return Err(InputError::new(event_type, "missing 'type'")),
        };
        let mut pattern = Self::new(trigger);

        if trigger.takes_key() {
            match rest.remove("key") {
                None => {}
                Some(Value::Str(key)) if key.eq_ignore_ascii_case("any") => {}
                Some(Value::Str(key)) => pattern.key = Some(key),
                Some(other) => {
                    return Err(InputError::new(event_type, format!("'key' must be a string, got {}", other.kind())))
                }
            }
        }

        match rest.remove("state") {
            None => {}
            Some(Value::Str(state)) => pattern.state = state,
            Some(other) => warn!(
                event = event_type,
                found = %other.kind(),
                "binding 'state' must be a string, defaulting to '{RESERVED_STATE_NAME}'"
            ),
        }

        for modifier in Modifier::ALL {
            match rest.remove(modifier.field()) {
                None | Some(Value::Bool(false)) => {}
                Some(Value::Bool(true)) => pattern.modifiers.push(modifier),
                Some(other) => warn!(
                    event = event_type,
                    modifier = modifier.field(),
                    found = %other.kind(),
                    "modifier flags must be booleans, ignoring"
                ),
            }
        }

        pattern.payload = rest;
        Ok(pattern)
    }

    fn parse_trigger(event_type: &str, name: &str) -> Result<Trigger, InputError> {
        Trigger::parse(name).ok_or_else(|| InputError::new(event_type, format!("unknown input type '{name}'")))
    }

    fn to_value(&self) -> Value {
        let mut fields = self.payload.clone();
        fields.insert("type".to_owned(), Value::from(self.trigger.as_str()));
        fields.insert("state".to_owned(), Value::from(self.state.as_str()));
        if let Some(key) = &self.key {
            fields.insert("key".to_owned(), Value::from(key.as_str()));
        }
        for modifier in &self.modifiers {
            fields.insert(modifier.field().to_owned(), Value::Bool(true));
        }
        Value::Map(fields)
    }

    fn active_in(&self, state: Option<&str>) -> bool {
        self.state == RESERVED_STATE_NAME || state == Some(self.state.as_str())
    }

    fn matches_key(&self, key: &str) -> bool {
        self.key.as_deref().map_or(true, |wanted| wanted.eq_ignore_ascii_case(key))
    }

    /// Whether `input` fires this pattern. Hold patterns never match a
    /// single input.
    fn matches(&self, input: &InputEvent) -> bool {
        match (self.trigger, input) {
            (Trigger::Closed, InputEvent::Closed) => true,
            (Trigger::KeyPressed, InputEvent::KeyPressed(key)) | (Trigger::KeyReleased, InputEvent::KeyReleased(key)) => {
                self.matches_key(key)
            }
            _ => false,
        }
    }

    /// The event this pattern sends. Input data wins over the configured
    /// payload.
    fn event(&self, event_type: &str, key: Option<&str>) -> Event {
        let mut event = Event::from_value(event_type, &Value::Map(self.payload.clone()));
        if let Some(key) = key {
            event.set("key", key);
        }
        event
    }
}

/// Event types mapped to the input patterns that send them.
#[derive(Debug, Default)]
pub struct InputBindings {
    bindings: BTreeMap<String, Vec<InputPattern>>,
    /// Inputs received since the last trigger, in arrival order.
    pending: Vec<InputEvent>,
    /// Keys currently down, lowercased.
    held: BTreeSet<String>,
}

impl InputBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `description` (a pattern or a list of patterns) to `event_type`.
    /// Patterns add to the ones already bound to the same event type.
    pub fn connect(&mut self, event_type: &str, description: &Value) -> Result<(), InputError> {
        let patterns = match description {
            Value::List(entries) if entries.is_empty() => {
                return Err(InputError::new(event_type, "empty list of inputs"))
            }
            Value::List(entries) => entries
                .iter()
                .map(|entry| match entry {
                    Value::List(_) => Err(InputError::new(event_type, "lists cannot be nested")),
                    entry => InputPattern::parse(event_type, entry),
                })
                .collect::<Result<Vec<_>, _>>()?,
            single => vec![InputPattern::parse(event_type, single)?],
        };
        debug!(event = event_type, patterns = patterns.len(), "input bound");
        self.bindings.entry(event_type.to_owned()).or_default().extend(patterns);
        Ok(())
    }

    /// Remove every pattern bound to `event_type`.
    pub fn disconnect(&mut self, event_type: &str) -> bool {
        self.bindings.remove(event_type).is_some()
    }

    /// Bind every entry of `configuration`. Entries that fail are logged,
    /// skipped and returned.
    pub fn load_configuration(&mut self, configuration: &Value) -> Vec<InputError> {
        let entries = match configuration {
            Value::Map(entries) => entries,
            Value::Null => return Vec::new(),
            other => {
                let err = InputError::new("<configuration>", format!("expected a map, got {}", other.kind()));
                warn!("{err}");
                return vec![err];
            }
        };

        let mut errors = Vec::new();
        for (event_type, description) in entries {
            if let Err(err) = self.connect(event_type, description) {
                warn!("{err}");
                errors.push(err);
            }
        }
        errors
    }

    /// The current bindings in the form [`load_configuration`](Self::load_configuration) reads.
    pub fn save_configuration(&self) -> Value {
        let entries = self
            .bindings
            .iter()
            .map(|(event_type, patterns)| {
                let description = match patterns.as_slice() {
                    [single] => single.to_value(),
                    many => Value::List(many.iter().map(InputPattern::to_value).collect()),
                };
                (event_type.clone(), description)
            })
            .collect();
        Value::Map(entries)
    }

    pub fn patterns(&self, event_type: &str) -> Option<&[InputPattern]> {
        self.bindings.get(event_type).map(Vec::as_slice)
    }

    /// Bound event types, sorted.
    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Drop every binding and forget the input state.
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.pending.clear();
        self.held.clear();
    }

    /// Record an input for the next [`trigger`](Self::trigger).
    pub fn process(&mut self, input: &InputEvent) {
        match input {
            InputEvent::KeyPressed(key) => {
                self.held.insert(key.to_lowercase());
            }
            InputEvent::KeyReleased(key) => {
                self.held.remove(&key.to_lowercase());
            }
            InputEvent::Closed => {}
        }
        self.pending.push(input.clone());
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains(&key.to_lowercase())
    }

    /// Send the events bound to the recorded inputs, then the ones bound to
    /// held keys, and forget the recorded inputs. `state` is the name of the
    /// top state. Returns how many events were sent.
    ///
    /// Each input sends each bound event type at most once; so does each
    /// frame of holding.
    pub fn trigger(&mut self, state: Option<&str>, events: &EventHandler) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut sent = 0;

        for input in &pending {
            let key = match input {
                InputEvent::KeyPressed(key) | InputEvent::KeyReleased(key) => Some(key.as_str()),
                InputEvent::Closed => None,
            };
            for (event_type, patterns) in &self.bindings {
                let fired = patterns.iter().find(|pattern| {
                    pattern.active_in(state) && pattern.matches(input) && self.modifiers_down(pattern)
                });
                if let Some(pattern) = fired {
                    events.send_event(&pattern.event(event_type, key));
                    sent += 1;
                }
            }
        }

        for (event_type, patterns) in &self.bindings {
            let fired = patterns.iter().find_map(|pattern| {
                if pattern.trigger != Trigger::KeyHold || !pattern.active_in(state) || !self.modifiers_down(pattern) {
                    return None;
                }
                let key = match &pattern.key {
                    Some(key) => self.is_held(key).then(|| key.clone()),
                    None => self.held.iter().next().cloned(),
                }?;
                Some((pattern, key))
            });
            if let Some((pattern, key)) = fired {
                events.send_event(&pattern.event(event_type, Some(&key)));
                sent += 1;
            }
        }

        sent
    }

    fn modifiers_down(&self, pattern: &InputPattern) -> bool {
        pattern.modifiers.iter().all(|modifier| modifier.is_down(&self.held))
    }
}
