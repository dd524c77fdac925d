use tessera_core::{InputEvent, RenderTarget, SpriteDraw};

use crate::context::Context;
use crate::state::State;

/// Overlay shown over the game. Blocks both update and draw below it.
#[derive(Debug)]
pub struct PauseState {
    name: String,
}

impl PauseState {
    pub const NAME: &'static str = "pause";
    pub const RESUME_KEY: &'static str = "Escape";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl State for PauseState {
    fn update(&mut self, _ctx: &mut Context, _dt: f32) {}

    fn draw(&mut self, ctx: &mut Context, target: &mut dyn RenderTarget) {
        let view = *ctx.systems.view();
        target.set_view(&view);
        target.draw_sprite(&SpriteDraw {
            texture: "paused".to_owned(),
            position: view.center,
            frame: 0,
            layer: 0,
        });
    }

    fn handle_event(&mut self, ctx: &mut Context, event: &InputEvent) {
        if matches!(event, InputEvent::KeyPressed(key) if key == Self::RESUME_KEY) {
            ctx.states.remove(self.name.clone());
        }
    }
}
