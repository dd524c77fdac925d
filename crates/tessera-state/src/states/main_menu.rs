use tessera_core::{InputEvent, RenderTarget, SpriteDraw};
use tracing::info;

use crate::context::Context;
use crate::state::State;
use crate::states::GameState;

/// Title screen. Any key starts the game; Escape quits.
#[derive(Debug)]
pub struct MainMenuState {
    name: String,
}

impl MainMenuState {
    pub const NAME: &'static str = "mainmenu";
    pub const QUIT_KEY: &'static str = "Escape";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl State for MainMenuState {
    fn activate(&mut self, _ctx: &mut Context) {
        info!("main menu");
    }

    fn update(&mut self, _ctx: &mut Context, _dt: f32) {}

    fn draw(&mut self, ctx: &mut Context, target: &mut dyn RenderTarget) {
        let view = *ctx.systems.view();
        target.set_view(&view);
        target.draw_sprite(&SpriteDraw {
            texture: "title".to_owned(),
            position: view.center,
            frame: 0,
            layer: 0,
        });
    }

    fn handle_event(&mut self, ctx: &mut Context, event: &InputEvent) {
        match event {
            InputEvent::KeyPressed(key) if key == Self::QUIT_KEY => ctx.request_close(),
            InputEvent::KeyPressed(_) => {
                ctx.states.switch_to(GameState::NAME);
                ctx.states.remove(self.name.clone());
            }
            _ => {}
        }
    }
}
