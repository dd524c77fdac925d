//! The state stack.
//!
//! States form a most-recent-first stack. Each frame, `update` flows from the
//! top down and stops after the first state that is not *transcendant*; `draw`
//! does the same, gated by *transparent*. Removals are queued and applied
//! between frames so a traversal never sees the stack change under it.

use std::collections::VecDeque;
use std::rc::Rc;

use tessera_core::{InputEvent, Registry, RenderTarget};
use tracing::{debug, info, warn};

use crate::context::{Context, StateRequest};
use crate::error::StateError;

/// Name that can never be used for a state.
pub const RESERVED_STATE_NAME: &str = "all";

/// Bound on request rounds applied after one operation, so two states that
/// keep switching to each other cannot lock the frame.
const MAX_REQUEST_ROUNDS: usize = 16;

/// One screen or mode of the runtime.
pub trait State {
    /// Called once, right after construction.
    fn on_create(&mut self, _ctx: &mut Context) {}

    /// Called once, right before the state is dropped.
    fn on_destroy(&mut self, _ctx: &mut Context) {}

    /// The state became the top of the stack.
    fn activate(&mut self, _ctx: &mut Context) {}

    /// Another state was put on top of this one.
    fn deactivate(&mut self, _ctx: &mut Context) {}

    fn update(&mut self, ctx: &mut Context, dt: f32);

    fn draw(&mut self, ctx: &mut Context, target: &mut dyn RenderTarget);

    fn handle_event(&mut self, _ctx: &mut Context, _event: &InputEvent) {}

    /// Whether `update` also reaches the state below.
    fn is_transcendant(&self) -> bool {
        false
    }

    /// Whether `draw` also reaches the state below.
    fn is_transparent(&self) -> bool {
        false
    }
}

/// Factories receive the name the state is created under.
pub type StateRegistry = Registry<dyn State, str>;

struct StackEntry {
    name: String,
    state: Box<dyn State>,
}

pub struct StateManager {
    registry: Rc<StateRegistry>,
    /// Front is the top.
    stack: VecDeque<StackEntry>,
    pending_removal: VecDeque<String>,
    context: Context,
}

impl StateManager {
    pub fn new(registry: Rc<StateRegistry>, context: Context) -> Self {
        Self {
            registry,
            stack: VecDeque::new(),
            pending_removal: VecDeque::new(),
            context,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    // ---- Stack queries ----

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Name of the top state.
    pub fn current(&self) -> Option<&str> {
        self.stack.front().map(|entry| entry.name.as_str())
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.current() == Some(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stack.iter().any(|entry| entry.name == name)
    }

    /// State names, top first.
    pub fn names(&self) -> Vec<&str> {
        self.stack.iter().map(|entry| entry.name.as_str()).collect()
    }

    // ---- Stack changes ----

    /// Create `name` and put it on top.
    pub fn push(&mut self, name: &str) -> Result<(), StateError> {
        self.push_now(name)?;
        self.apply_requests();
        Ok(())
    }

    /// Bring `name` to the top, creating it if it is not on the stack. The
    /// previous top stays on the stack.
    pub fn switch_to(&mut self, name: &str) -> Result<(), StateError> {
        self.switch_now(name)?;
        self.apply_requests();
        Ok(())
    }

    /// Queue `name` for removal at the next [`process_removals`](Self::process_removals).
    pub fn remove(&mut self, name: &str) {
        if name == RESERVED_STATE_NAME {
            warn!("'{RESERVED_STATE_NAME}' is a reserved state name, nothing to remove");
            return;
        }
        self.pending_removal.push_back(name.to_owned());
    }

    /// Apply queued removals in request order, then queued entity removals.
    pub fn process_removals(&mut self) {
        while let Some(name) = self.pending_removal.pop_front() {
            let Some(pos) = self.stack.iter().position(|entry| entry.name == name) else {
                debug!(state = %name, "removal requested for a state not on the stack");
                continue;
            };
            if let Some(mut entry) = self.stack.remove(pos) {
                entry.state.on_destroy(&mut self.context);
                info!(state = %entry.name, "state destroyed");
            }
            if pos == 0 {
                if let Some(top) = self.stack.front_mut() {
                    top.state.activate(&mut self.context);
                }
            }
        }
        self.context.flush_entity_removals();
        self.apply_requests();
    }

    fn check_name(name: &str) -> Result<(), StateError> {
        if name == RESERVED_STATE_NAME {
            return Err(StateError::Reserved(name.to_owned()));
        }
        Ok(())
    }

    fn push_now(&mut self, name: &str) -> Result<(), StateError> {
        Self::check_name(name)?;
        let mut state = self
            .registry
            .create(name, name)
            .ok_or_else(|| StateError::NotFound(name.to_owned()))?;

        if let Some(top) = self.stack.front_mut() {
            top.state.deactivate(&mut self.context);
        }
        state.on_create(&mut self.context);
        state.activate(&mut self.context);
        self.stack.push_front(StackEntry {
            name: name.to_owned(),
            state,
        });
        info!(state = name, "state pushed");
        Ok(())
    }

    fn switch_now(&mut self, name: &str) -> Result<(), StateError> {
        Self::check_name(name)?;
        let Some(pos) = self.stack.iter().position(|entry| entry.name == name) else {
            return self.push_now(name);
        };
        if pos == 0 {
            return Ok(());
        }

        if let Some(top) = self.stack.front_mut() {
            top.state.deactivate(&mut self.context);
        }
        if let Some(mut entry) = self.stack.remove(pos) {
            entry.state.activate(&mut self.context);
            self.stack.push_front(entry);
        }
        info!(state = name, "switched to state");
        Ok(())
    }

    /// Apply the stack changes states requested through the context.
    fn apply_requests(&mut self) {
        for _ in 0..MAX_REQUEST_ROUNDS {
            let requests = self.context.states.take();
            if requests.is_empty() {
                return;
            }
            for request in requests {
                let result = match &request {
                    StateRequest::Push(name) => self.push_now(name),
                    StateRequest::SwitchTo(name) => self.switch_now(name),
                    StateRequest::Remove(name) => {
                        self.remove(name);
                        Ok(())
                    }
                };
                if let Err(err) = result {
                    warn!(?request, "state request failed: {err}");
                }
            }
        }
        warn!("state requests still pending after {MAX_REQUEST_ROUNDS} rounds, deferring");
    }

    // ---- Frame ----

    /// Update from the top down, stopping after the first non-transcendant
    /// state.
    pub fn update(&mut self, dt: f32) {
        for entry in self.stack.iter_mut() {
            entry.state.update(&mut self.context, dt);
            if !entry.state.is_transcendant() {
                break;
            }
        }
        self.apply_requests();
    }

    /// Draw from the top down, stopping after the first non-transparent state.
    pub fn draw(&mut self, target: &mut dyn RenderTarget) {
        for entry in self.stack.iter_mut() {
            entry.state.draw(&mut self.context, target);
            if !entry.state.is_transparent() {
                break;
            }
        }
        self.apply_requests();
    }

    /// Deliver `event` to the top state.
    pub fn handle_event(&mut self, event: &InputEvent) {
        self.context.input.process(event);
        if let Some(top) = self.stack.front_mut() {
            top.state.handle_event(&mut self.context, event);
        }
        self.apply_requests();
    }

    /// Turn the input collected since the last call into bound events, as
    /// seen from the top state. Returns how many events were sent.
    pub fn trigger_input(&mut self) -> usize {
        let current = self.stack.front().map(|entry| entry.name.as_str());
        let sent = self.context.input.trigger(current, &self.context.events);
        self.apply_requests();
        sent
    }
}

impl Drop for StateManager {
    fn drop(&mut self) {
        while let Some(mut entry) = self.stack.pop_front() {
            entry.state.on_destroy(&mut self.context);
            debug!(state = %entry.name, "state destroyed on shutdown");
        }
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("stack", &self.names())
            .field("pending_removal", &self.pending_removal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Registries;
    use crate::description::MemoryDescriptions;
    use crate::map::FlatMap;
    use serde_json::json;
    use std::cell::RefCell;
    use tessera_core::RecordingTarget;
    use tessera_ecs::{builtin_components, builtin_systems, NativeScriptEngine};

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records every callback; flags and an optional self-removal are configurable.
    struct Recorder {
        name: String,
        log: Log,
        transcendant: bool,
        transparent: bool,
        remove_self_on_update: bool,
    }

    impl Recorder {
        fn record(&self, what: &str) {
            self.log.borrow_mut().push(format!("{}.{what}", self.name));
        }
    }

    impl State for Recorder {
        fn on_create(&mut self, _ctx: &mut Context) {
            self.record("create");
        }
        fn on_destroy(&mut self, _ctx: &mut Context) {
            self.record("destroy");
        }
        fn activate(&mut self, _ctx: &mut Context) {
            self.record("activate");
        }
        fn deactivate(&mut self, _ctx: &mut Context) {
            self.record("deactivate");
        }
        fn update(&mut self, ctx: &mut Context, _dt: f32) {
            self.record("update");
            if self.remove_self_on_update {
                ctx.states.remove(self.name.clone());
            }
        }
        fn draw(&mut self, _ctx: &mut Context, _target: &mut dyn RenderTarget) {
            self.record("draw");
        }
        fn handle_event(&mut self, _ctx: &mut Context, _event: &InputEvent) {
            self.record("event");
        }
        fn is_transcendant(&self) -> bool {
            self.transcendant
        }
        fn is_transparent(&self) -> bool {
            self.transparent
        }
    }

    fn registry(log: &Log) -> StateRegistry {
        let mut registry = StateRegistry::new("state");
        let flags = [
            ("game", false, false, false),
            ("pause", false, false, false),
            ("overlay", true, true, false),
            ("fleeting", false, false, true),
        ];
        for (name, transcendant, transparent, remove_self_on_update) in flags {
            let log = Rc::clone(log);
            registry.register(name, move |created_as: &str| {
                Box::new(Recorder {
                    name: created_as.to_owned(),
                    log: Rc::clone(&log),
                    transcendant,
                    transparent,
                    remove_self_on_update,
                }) as Box<dyn State>
            });
        }
        registry
    }

    fn manager(log: &Log) -> StateManager {
        let registries = Registries::new(builtin_components(), builtin_systems(), registry(log));
        let context = Context::new(
            &registries,
            Box::new(MemoryDescriptions::new()),
            Rc::new(NativeScriptEngine::new()),
            Box::new(FlatMap::default()),
        );
        StateManager::new(Rc::clone(&registries.states), context)
    }

    fn take(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.borrow_mut())
    }

    #[test]
    fn starts_empty() {
        let log = Log::default();
        let states = manager(&log);
        assert!(states.is_empty());
        assert_eq!(states.current(), None);
    }

    #[test]
    fn push_creates_and_deactivates_previous_top() {
        let log = Log::default();
        let mut states = manager(&log);
        states.push("game").unwrap();
        states.push("pause").unwrap();
        assert_eq!(states.names(), vec!["pause", "game"]);
        assert_eq!(
            take(&log),
            vec![
                "game.create",
                "game.activate",
                "game.deactivate",
                "pause.create",
                "pause.activate"
            ]
        );
    }

    #[test]
    fn opaque_top_blocks_update_and_draw() {
        let log = Log::default();
        let mut states = manager(&log);
        states.push("game").unwrap();
        states.push("pause").unwrap();
        take(&log);

        let mut target = RecordingTarget::new();
        states.update(0.016);
        states.draw(&mut target);
        assert_eq!(take(&log), vec!["pause.update", "pause.draw"]);
    }

    #[test]
    fn transcendant_transparent_top_reaches_below() {
        let log = Log::default();
        let mut states = manager(&log);
        states.push("game").unwrap();
        states.push("overlay").unwrap();
        take(&log);

        let mut target = RecordingTarget::new();
        states.update(0.016);
        states.draw(&mut target);
        assert_eq!(
            take(&log),
            vec!["overlay.update", "game.update", "overlay.draw", "game.draw"]
        );
    }

    #[test]
    fn removal_inside_update_waits_for_frame_boundary() {
        let log = Log::default();
        let mut states = manager(&log);
        states.push("fleeting").unwrap();
        take(&log);

        let mut target = RecordingTarget::new();
        states.update(0.016);
        states.draw(&mut target);
        assert!(states.contains("fleeting"));
        assert_eq!(take(&log), vec!["fleeting.update", "fleeting.draw"]);

        states.process_removals();
        assert!(states.is_empty());
        assert_eq!(take(&log), vec!["fleeting.destroy"]);
    }

    #[test]
    fn switch_to_moves_existing_state_to_top() {
        let log = Log::default();
        let mut states = manager(&log);
        states.push("game").unwrap();
        states.push("pause").unwrap();
        take(&log);

        states.switch_to("game").unwrap();
        assert_eq!(states.names(), vec!["game", "pause"]);
        assert_eq!(take(&log), vec!["pause.deactivate", "game.activate"]);

        // Already on top: nothing happens.
        states.switch_to("game").unwrap();
        assert!(take(&log).is_empty());
    }

    #[test]
    fn switch_to_unknown_state_pushes_it() {
        let log = Log::default();
        let mut states = manager(&log);
        states.switch_to("game").unwrap();
        assert_eq!(states.current(), Some("game"));
        assert_eq!(
            states.switch_to("credits"),
            Err(StateError::NotFound("credits".into()))
        );
        assert_eq!(states.names(), vec!["game"]);
    }

    #[test]
    fn reserved_name_is_rejected() {
        let log = Log::default();
        let mut states = manager(&log);
        assert_eq!(states.push("all"), Err(StateError::Reserved("all".into())));
        assert_eq!(states.switch_to("all"), Err(StateError::Reserved("all".into())));
    }

    #[test]
    fn removing_the_top_activates_the_uncovered_state() {
        let log = Log::default();
        let mut states = manager(&log);
        states.push("game").unwrap();
        states.push("pause").unwrap();
        take(&log);

        states.remove("pause");
        states.remove("pause");
        states.process_removals();
        assert_eq!(states.names(), vec!["game"]);
        assert_eq!(take(&log), vec!["pause.destroy", "game.activate"]);
    }

    #[test]
    fn events_reach_the_top_only() {
        let log = Log::default();
        let mut states = manager(&log);
        states.push("game").unwrap();
        states.push("overlay").unwrap();
        take(&log);
        states.handle_event(&InputEvent::KeyPressed("Space".into()));
        assert_eq!(take(&log), vec!["overlay.event"]);
    }

    #[test]
    fn bound_input_fires_for_the_top_state_only() {
        let log = Log::default();
        let mut states = manager(&log);
        let bindings = json!({
            "pause": { "type": "keypressed", "key": "P", "state": "game" },
            "resume": { "type": "keypressed", "key": "P", "state": "pause" }
        });
        states.context_mut().input.load_configuration(&tessera_core::Value::from(bindings));
        let heard = Log::default();
        for event_type in ["pause", "resume"] {
            let heard = Rc::clone(&heard);
            states
                .context()
                .events
                .register_callback(event_type, move |event| heard.borrow_mut().push(event.event_type().to_owned()));
        }

        states.push("game").unwrap();
        states.handle_event(&InputEvent::KeyPressed("P".into()));
        assert_eq!(states.trigger_input(), 1);
        states.push("pause").unwrap();
        states.handle_event(&InputEvent::KeyPressed("p".into()));
        assert_eq!(states.trigger_input(), 1);
        assert_eq!(states.trigger_input(), 0);

        assert_eq!(take(&heard), vec!["pause", "resume"]);
    }

    #[test]
    fn drop_destroys_every_state_once() {
        let log = Log::default();
        {
            let mut states = manager(&log);
            states.push("game").unwrap();
            states.push("pause").unwrap();
            take(&log);
        }
        assert_eq!(take(&log), vec!["pause.destroy", "game.destroy"]);
    }
}
