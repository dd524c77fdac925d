//! The frame loop.

use std::time::Instant;

use tessera_core::{ClockConfig, Color, FrameClock, InputEvent, Window};
use tessera_state::StateManager;
use tracing::{debug, info, trace};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No state left on the stack
    StackEmpty,
    WindowClosed,
    /// A state asked to quit
    CloseRequested,
    FrameLimit,
}

/// Drives a [`StateManager`] against a [`Window`].
pub struct Engine<W: Window> {
    window: W,
    states: StateManager,
    clock: FrameClock,
    clear_color: Color,
}

impl<W: Window> Engine<W> {
    pub fn new(window: W, states: StateManager, clock: ClockConfig, clear_color: Color) -> Self {
        Self {
            window,
            states,
            clock: FrameClock::new(clock),
            clear_color,
        }
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn states(&self) -> &StateManager {
        &self.states
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Run one frame with the raw delta of the previous one.
    ///
    /// Order: pending removals, events, bound input, update, draw. Returns why the loop
    /// should stop, if it should.
    pub fn frame(&mut self, raw_delta: f32) -> Option<StopReason> {
        self.states.process_removals();
        if self.states.is_empty() {
            return Some(StopReason::StackEmpty);
        }

        for event in self.window.poll_events() {
            if event == InputEvent::Closed {
                info!("window closed");
                self.window.close();
                return Some(StopReason::WindowClosed);
            }
            self.states.handle_event(&event);
        }
        let sent = self.states.trigger_input();
        if sent > 0 {
            trace!(sent, "input events sent");
        }

        let dt = self.clock.tick(raw_delta);
        self.states.update(dt);

        self.window.clear(self.clear_color);
        self.states.draw(self.window.as_target());
        self.window.display();

        if self.states.context().close_requested() {
            self.window.close();
            return Some(StopReason::CloseRequested);
        }
        if !self.window.is_open() {
            return Some(StopReason::WindowClosed);
        }
        None
    }

    /// Loop until something stops it. `fixed_delta` replaces wall-clock
    /// timing; `max_frames` bounds the run.
    pub fn run(&mut self, fixed_delta: Option<f32>, max_frames: Option<u64>) -> StopReason {
        let mut last = Instant::now();
        let mut frames = 0u64;

        let reason = loop {
            if max_frames.is_some_and(|max| frames >= max) {
                break StopReason::FrameLimit;
            }

            let now = Instant::now();
            let delta = fixed_delta.unwrap_or_else(|| now.duration_since(last).as_secs_f32());
            last = now;

            if let Some(reason) = self.frame(delta) {
                break reason;
            }
            frames += 1;
        };

        debug!(frames, "frame loop finished");
        info!(?reason, total_time = self.clock.total_time, "stopped");
        reason
    }
}

impl<W: Window> std::fmt::Debug for Engine<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("states", &self.states)
            .field("frame_count", &self.clock.frame_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessWindow;
    use serde_json::json;
    use std::rc::Rc;
    use tessera_core::DrawCommand;
    use tessera_ecs::NativeScriptEngine;
    use tessera_state::{Context, FlatMap, MemoryDescriptions, Registries};

    fn engine(window: HeadlessWindow, initial: &str) -> Engine<HeadlessWindow> {
        let registries = Registries::builtin();
        let descriptions = MemoryDescriptions::new()
            .with_state("game", json!({ "systems": ["orthogonal"], "level": "yard" }))
            .with_level(
                "yard",
                json!({
                    "map": "yard.tmx",
                    "entities": [
                        { "name": "tree", "components": { "position": [2, 3], "sprite": { "texture": "tree.png" } } }
                    ]
                }),
            );
        let context = Context::new(
            &registries,
            Box::new(descriptions),
            Rc::new(NativeScriptEngine::new()),
            Box::new(FlatMap::new(1)),
        );
        let mut states = StateManager::new(Rc::clone(&registries.states), context);
        states.push(initial).unwrap();
        Engine::new(window, states, ClockConfig::default(), Color::BLACK)
    }

    #[test]
    fn frame_limit_stops_the_loop() {
        let mut engine = engine(HeadlessWindow::new("test"), "game");
        assert_eq!(engine.run(Some(0.1), Some(5)), StopReason::FrameLimit);
        assert_eq!(engine.window().frames_presented(), 5);
        assert_eq!(engine.clock().frame_count, 5);
        assert!((engine.clock().total_time - 0.5).abs() < 1e-5);
    }

    #[test]
    fn game_frame_draws_map_then_sprites() {
        let mut engine = engine(HeadlessWindow::new("test"), "game");
        assert_eq!(engine.frame(0.016), None);

        let commands = engine.window().commands();
        let map = commands
            .iter()
            .position(|c| matches!(c, DrawCommand::MapLayer { map, layer: 0 } if map == "yard.tmx"));
        let sprite = commands
            .iter()
            .position(|c| matches!(c, DrawCommand::Sprite(s) if s.texture == "tree.png"));
        assert!(map.is_some() && sprite.is_some());
        assert!(map < sprite);
    }

    #[test]
    fn menu_key_starts_the_game_next_frame() {
        let mut window = HeadlessWindow::new("test");
        window.queue_event(0, InputEvent::KeyPressed("Enter".into()));
        let mut engine = engine(window, "mainmenu");

        assert_eq!(engine.frame(0.016), None);
        assert_eq!(engine.states().names(), vec!["game", "mainmenu"]);

        assert_eq!(engine.frame(0.016), None);
        assert_eq!(engine.states().names(), vec!["game"]);
    }

    #[test]
    fn escape_in_menu_requests_close() {
        let mut window = HeadlessWindow::new("test");
        window.queue_event(0, InputEvent::KeyPressed("Escape".into()));
        let mut engine = engine(window, "mainmenu");

        assert_eq!(engine.run(Some(0.016), None), StopReason::CloseRequested);
        assert!(!engine.window().is_open());
    }

    #[test]
    fn closed_event_stops_before_update() {
        let mut window = HeadlessWindow::new("test");
        window.queue_event(2, InputEvent::Closed);
        let mut engine = engine(window, "game");

        assert_eq!(engine.run(Some(0.016), Some(10)), StopReason::WindowClosed);
        assert_eq!(engine.window().frames_presented(), 2);
    }

    #[test]
    fn bound_keys_reach_listeners_during_the_frame() {
        let mut window = HeadlessWindow::new("test");
        window.queue_event(0, InputEvent::KeyPressed("Space".into()));
        window.queue_event(1, InputEvent::KeyReleased("Space".into()));
        let mut engine = engine(window, "game");
        let bindings = json!({
            "jump": { "type": "keypressed", "key": "space", "state": "game" },
            "charge": { "type": "keyhold", "key": "space" }
        });
        engine.states.context_mut().input.load_configuration(&tessera_core::Value::from(bindings));

        let heard = Rc::new(std::cell::RefCell::new(Vec::new()));
        for event_type in ["jump", "charge"] {
            let heard = Rc::clone(&heard);
            engine
                .states
                .context()
                .events
                .register_callback(event_type, move |event| heard.borrow_mut().push(event.event_type().to_owned()));
        }

        assert_eq!(engine.run(Some(0.016), Some(3)), StopReason::FrameLimit);
        assert_eq!(*heard.borrow(), vec!["jump", "charge"]);
    }

    #[test]
    fn empty_stack_stops_the_loop() {
        let mut engine = engine(HeadlessWindow::new("test"), "game");
        engine.states.remove("game");
        assert_eq!(engine.frame(0.016), Some(StopReason::StackEmpty));
        assert_eq!(engine.window().frames_presented(), 0);
    }
}
