//! Core types used throughout the Tessera runtime

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A 2D camera: the region of the world shown on the render target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub center: Vec2,
    pub size: Vec2,
    /// Rotation in degrees
    pub rotation: f32,
}

impl Default for View {
    fn default() -> Self {
        Self::new(Vec2::new(400.0, 300.0), Vec2::new(800.0, 600.0))
    }
}

impl View {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Self {
            center,
            size,
            rotation: 0.0,
        }
    }

    /// A view showing the rectangle starting at `origin` with the given size
    pub fn from_rect(origin: Vec2, size: Vec2) -> Self {
        Self::new(origin + size * 0.5, size)
    }

    /// Translate the view by the given offset
    pub fn move_by(&mut self, offset: Vec2) {
        self.center += offset;
    }

    /// Scale the visible area (factor > 1 zooms out)
    pub fn zoom(&mut self, factor: f32) {
        self.size *= factor;
    }

    /// Whether a world point lies inside the (unrotated) visible area
    pub fn contains(&self, point: Vec2) -> bool {
        let half = self.size * 0.5;
        let delta = (point - self.center).abs();
        delta.x <= half.x && delta.y <= half.y
    }
}

/// RGBA color with floating point components (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    /// Create a color from RGB values (alpha = 1.0)
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from a hex value (0xRRGGBB)
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xFF) as f32 / 255.0;
        let g = ((hex >> 8) & 0xFF) as f32 / 255.0;
        let b = (hex & 0xFF) as f32 / 255.0;
        Self::rgb(r, g, b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// One sprite submitted to a render target
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteDraw {
    /// Texture name, resolved by the render backend
    pub texture: String,
    pub position: Vec2,
    /// Frame index inside the texture's sheet
    pub frame: u32,
    pub layer: u32,
}
