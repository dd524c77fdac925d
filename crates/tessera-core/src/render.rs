//! Narrow interfaces to the render surface and window.
//!
//! The runtime never talks to a graphics API directly; states and systems draw
//! through [`RenderTarget`], and the outer loop drives a [`Window`].

use crate::types::{Color, SpriteDraw, View};

/// Something states and systems can draw into.
pub trait RenderTarget {
    /// Set the camera used by subsequent draw calls.
    fn set_view(&mut self, view: &View);

    fn draw_sprite(&mut self, sprite: &SpriteDraw);

    /// Draw one layer of the named tile map.
    fn draw_map_layer(&mut self, map: &str, layer: u32, view: &View);
}

/// Input and window events delivered to the active state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// The user asked to close the window
    Closed,
    KeyPressed(String),
    KeyReleased(String),
}

/// The render surface owned by the outer loop.
pub trait Window: RenderTarget {
    fn is_open(&self) -> bool;

    /// Events gathered since the last call.
    fn poll_events(&mut self) -> Vec<InputEvent>;

    fn clear(&mut self, color: Color);

    /// Present the frame.
    fn display(&mut self);

    fn close(&mut self);

    /// Upcast for code that only draws.
    fn as_target(&mut self) -> &mut dyn RenderTarget;
}

/// A recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    SetView(View),
    Sprite(SpriteDraw),
    MapLayer { map: String, layer: u32 },
}

/// Render target keeping every draw call in order.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub commands: Vec<DrawCommand>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sprites drawn so far.
    pub fn sprites(&self) -> impl Iterator<Item = &SpriteDraw> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Sprite(sprite) => Some(sprite),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl RenderTarget for RecordingTarget {
    fn set_view(&mut self, view: &View) {
        self.commands.push(DrawCommand::SetView(*view));
    }

    fn draw_sprite(&mut self, sprite: &SpriteDraw) {
        self.commands.push(DrawCommand::Sprite(sprite.clone()));
    }

    fn draw_map_layer(&mut self, map: &str, layer: u32, _view: &View) {
        self.commands.push(DrawCommand::MapLayer {
            map: map.to_owned(),
            layer,
        });
    }
}
