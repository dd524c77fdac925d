use std::collections::BTreeMap;
use std::fmt;

use tessera_core::Value;
use tracing::warn;

use crate::component::{Component, ComponentRegistry};
use crate::error::ComponentError;

/// A generational entity handle. Uses compact u32 index + generation so that
/// systems can keep references to entities they do not own.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl EntityId {
    /// Create an id from raw parts (mainly for testing).
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index of this entity.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation of this entity (incremented on reuse).
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// A named bag of components, at most one per component type name.
pub struct Entity {
    id: EntityId,
    name: String,
    components: BTreeMap<String, Box<dyn Component>>,
}

impl Entity {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            components: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The (non-unique) entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build a component through `registry` and attach it.
    ///
    /// A duplicate type or an unknown name is logged and leaves the entity
    /// untouched. A payload rejected by the component's initializer is
    /// returned to the caller and the component is not attached.
    pub fn add_component(
        &mut self,
        registry: &ComponentRegistry,
        component_type: &str,
        payload: &Value,
    ) -> Result<(), ComponentError> {
        if self.components.contains_key(component_type) {
            let err = ComponentError::Duplicate {
                entity: self.name.clone(),
                component: component_type.to_owned(),
            };
            warn!("{err}");
            return Err(err);
        }

        let Some(mut component) = registry.create(component_type, &()) else {
            let err = ComponentError::Unknown(component_type.to_owned());
            warn!(entity = %self.name, "{err}");
            return Err(err);
        };

        component.initialize(payload)?;
        self.components.insert(component_type.to_owned(), component);
        Ok(())
    }

    pub fn remove_component(&mut self, component_type: &str) -> Option<Box<dyn Component>> {
        self.components.remove(component_type)
    }

    pub fn has_component(&self, component_type: &str) -> bool {
        self.components.contains_key(component_type)
    }

    /// Whether every listed component type is present.
    pub fn has_components(&self, component_types: &[&str]) -> bool {
        component_types.iter().all(|name| self.has_component(name))
    }

    pub fn component(&self, component_type: &str) -> Option<&dyn Component> {
        self.components.get(component_type).map(|c| c.as_ref())
    }

    pub fn component_mut(&mut self, component_type: &str) -> Option<&mut dyn Component> {
        // Two-step to keep the trait object's 'static bound out of the returned borrow.
        match self.components.get_mut(component_type) {
            Some(component) => Some(component.as_mut()),
            None => None,
        }
    }

    /// The component under `component_type`, downcast to its concrete type.
    pub fn component_as<T: Component>(&self, component_type: &str) -> Option<&T> {
        self.components
            .get(component_type)?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn component_as_mut<T: Component>(&mut self, component_type: &str) -> Option<&mut T> {
        self.components
            .get_mut(component_type)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Names of the attached components, sorted.
    pub fn component_names(&self) -> Vec<&str> {
        self.components.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Component)> {
        self.components
            .iter()
            .map(|(name, component)| (name.as_str(), component.as_ref()))
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("components", &self.component_names())
            .finish()
    }
}
