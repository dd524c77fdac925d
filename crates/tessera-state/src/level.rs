use std::collections::BTreeMap;

use tessera_core::{RenderTarget, Value, View};
use tessera_ecs::{ComponentError, EntityId};

use crate::description::DescriptionSource;
use crate::error::DescriptionError;
use crate::map::TileMap;

/// The loaded level: its map and the entity templates resolved for it.
pub struct Level {
    name: Option<String>,
    map: Box<dyn TileMap>,
    templates: BTreeMap<String, Value>,
}

impl Level {
    pub fn new(map: Box<dyn TileMap>) -> Self {
        Self {
            name: None,
            map,
            templates: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn map(&self) -> &dyn TileMap {
        self.map.as_ref()
    }

    pub fn map_mut(&mut self) -> &mut dyn TileMap {
        self.map.as_mut()
    }

    pub fn layer_count(&self) -> u32 {
        self.map.layer_count()
    }

    pub fn update(&mut self, dt: f32) {
        self.map.update(dt);
    }

    pub fn draw_layer(&self, target: &mut dyn RenderTarget, layer: u32, view: &View) {
        self.map.draw_layer(target, layer, view);
    }

    /// Forget the previous level's templates and switch to `name`.
    pub(crate) fn reset(&mut self, name: &str) {
        self.name = Some(name.to_owned());
        self.templates.clear();
    }

    /// Template for `entity_type`, loaded once per level.
    pub(crate) fn template(
        &mut self,
        source: &dyn DescriptionSource,
        entity_type: &str,
    ) -> Result<Value, DescriptionError> {
        if let Some(template) = self.templates.get(entity_type) {
            return Ok(template.clone());
        }
        let template = source.entity_defaults(entity_type, self.name.as_deref())?;
        self.templates.insert(entity_type.to_owned(), template.clone());
        Ok(template)
    }
}

impl std::fmt::Debug for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Level")
            .field("name", &self.name)
            .field("map", &self.map.name())
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Outcome of a level change. Bad entries are reported, not fatal.
#[derive(Debug, Default)]
pub struct LevelReport {
    pub level: String,
    /// Entities created, in description order.
    pub entities: Vec<EntityId>,
    /// Entries that could not be turned into an entity.
    pub skipped: Vec<DescriptionError>,
    /// Components that failed on otherwise created entities, by entity name.
    pub component_errors: Vec<(String, ComponentError)>,
}

impl LevelReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.component_errors.is_empty()
    }
}
