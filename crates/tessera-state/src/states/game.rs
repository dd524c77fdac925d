use tessera_core::{InputEvent, RenderTarget};
use tracing::{error, warn};

use crate::context::Context;
use crate::state::State;
use crate::states::PauseState;

/// Gameplay: loads its systems and level from the state description, then
/// drives them every frame.
#[derive(Debug)]
pub struct GameState {
    name: String,
}

impl GameState {
    pub const NAME: &'static str = "game";
    pub const DEFAULT_LEVEL: &'static str = "tutorial";
    pub const PAUSE_KEY: &'static str = "Escape";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl State for GameState {
    fn on_create(&mut self, ctx: &mut Context) {
        ctx.systems.clear();

        let mut level = Self::DEFAULT_LEVEL.to_owned();
        match ctx.descriptions.state_description(&self.name) {
            Ok(description) => {
                if !ctx.load_systems(&description.systems) {
                    warn!(state = %self.name, "some systems failed to load");
                }
                if let Some(name) = description.level {
                    level = name;
                }
            }
            Err(err) => error!(state = %self.name, "{err}"),
        }

        match ctx.change_level(&level) {
            Ok(report) if !report.is_clean() => warn!(
                level = %report.level,
                skipped = report.skipped.len(),
                component_errors = report.component_errors.len(),
                "level loaded with errors"
            ),
            Ok(_) => {}
            Err(err) => error!(level = %level, "{err}"),
        }
    }

    fn on_destroy(&mut self, ctx: &mut Context) {
        ctx.systems.clear();
        ctx.entities.clear();
    }

    fn update(&mut self, ctx: &mut Context, dt: f32) {
        ctx.systems.update(dt, &mut ctx.entities);
        ctx.level.update(dt);
    }

    fn draw(&mut self, ctx: &mut Context, target: &mut dyn RenderTarget) {
        let view = *ctx.systems.view();
        target.set_view(&view);
        for layer in 0..ctx.level.layer_count().max(1) {
            ctx.level.draw_layer(target, layer, &view);
            ctx.systems.draw(target, layer, &ctx.entities);
        }
    }

    fn handle_event(&mut self, ctx: &mut Context, event: &InputEvent) {
        if matches!(event, InputEvent::KeyPressed(key) if key == Self::PAUSE_KEY) {
            ctx.states.push(PauseState::NAME);
        }
    }
}
