use std::path::PathBuf;

use tessera_core::{RenderTarget, View};
use tracing::info;

use crate::error::MapError;

/// A layered tile map, as consumed by the game state.
pub trait TileMap {
    fn load(&mut self, name: &str) -> Result<(), MapError>;

    /// The loaded map, if any.
    fn name(&self) -> Option<&str>;

    fn layer_count(&self) -> u32;

    fn update(&mut self, _dt: f32) {}

    fn draw_layer(&self, target: &mut dyn RenderTarget, layer: u32, view: &View);
}

/// Placeholder map with a fixed number of layers. Drawing a layer forwards
/// the map name to the render target, which owns the actual tile data.
#[derive(Debug, Clone)]
pub struct FlatMap {
    folder: Option<PathBuf>,
    name: Option<String>,
    layers: u32,
}

impl FlatMap {
    pub fn new(layers: u32) -> Self {
        Self {
            folder: None,
            name: None,
            layers,
        }
    }

    /// Require map files to exist under `folder`.
    pub fn with_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = Some(folder.into());
        self
    }
}

impl Default for FlatMap {
    fn default() -> Self {
        Self::new(1)
    }
}

impl TileMap for FlatMap {
    fn load(&mut self, name: &str) -> Result<(), MapError> {
        if name.is_empty() {
            return Err(MapError::Load {
                name: name.to_owned(),
                reason: "empty map name".to_owned(),
            });
        }
        if let Some(folder) = &self.folder {
            if !folder.join(name).is_file() {
                return Err(MapError::NotFound(name.to_owned()));
            }
        }
        info!(map = name, layers = self.layers, "map loaded");
        self.name = Some(name.to_owned());
        Ok(())
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn layer_count(&self) -> u32 {
        if self.name.is_some() {
            self.layers
        } else {
            0
        }
    }

    fn draw_layer(&self, target: &mut dyn RenderTarget, layer: u32, view: &View) {
        if let Some(name) = &self.name {
            target.draw_map_layer(name, layer, view);
        }
    }
}
