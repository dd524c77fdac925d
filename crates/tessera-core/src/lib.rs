//! Tessera Core - Core types and utilities for the Tessera runtime
//!
//! This crate provides the foundational pieces shared by every other crate:
//! - The generic name→factory [`Registry`]
//! - [`Value`], the dynamically typed payload used by components and scripts
//! - Frame timing
//! - The view, color and render-target interfaces

pub mod registry;
pub mod render;
pub mod time;
pub mod types;
pub mod value;

pub use glam::Vec2;
pub use registry::Registry;
pub use render::{DrawCommand, InputEvent, RecordingTarget, RenderTarget, Window};
pub use time::{ClockConfig, FrameClock};
pub use types::{Color, SpriteDraw, View};
pub use value::{FromValue, Value, ValueKind};
