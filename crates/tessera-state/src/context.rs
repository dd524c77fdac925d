//! The shared context handed to every state callback.

use std::rc::Rc;

use tessera_core::Value;
use tessera_ecs::{
    builtin_components, builtin_systems, Component, ComponentError, ComponentRegistry, EntityId,
    EntityManager, EventHandler, ScriptEngine, SystemManager, SystemRegistry,
};
use tracing::{debug, info, warn};

use crate::description::{DescriptionSource, EntitySpec};
use crate::error::DescriptionError;
use crate::input::InputBindings;
use crate::level::{Level, LevelReport};
use crate::map::TileMap;
use crate::state::StateRegistry;
use crate::states::builtin_states;

/// A stack change requested from inside a state callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateRequest {
    Push(String),
    SwitchTo(String),
    Remove(String),
}

/// Queue of stack changes. States cannot touch the stack while it is being
/// traversed, so they file requests here and the manager applies them.
#[derive(Debug, Default)]
pub struct StateControl {
    requests: Vec<StateRequest>,
}

impl StateControl {
    pub fn push(&mut self, state: impl Into<String>) {
        self.requests.push(StateRequest::Push(state.into()));
    }

    pub fn switch_to(&mut self, state: impl Into<String>) {
        self.requests.push(StateRequest::SwitchTo(state.into()));
    }

    /// Removal always happens at the next frame boundary.
    pub fn remove(&mut self, state: impl Into<String>) {
        self.requests.push(StateRequest::Remove(state.into()));
    }

    pub fn pending(&self) -> &[StateRequest] {
        &self.requests
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<StateRequest> {
        std::mem::take(&mut self.requests)
    }
}

/// The factory tables, built once at startup.
#[derive(Debug, Clone)]
pub struct Registries {
    pub components: Rc<ComponentRegistry>,
    pub systems: Rc<SystemRegistry>,
    pub states: Rc<StateRegistry>,
}

impl Registries {
    pub fn new(components: ComponentRegistry, systems: SystemRegistry, states: StateRegistry) -> Self {
        Self {
            components: Rc::new(components),
            systems: Rc::new(systems),
            states: Rc::new(states),
        }
    }

    /// Every built-in component, system and state.
    pub fn builtin() -> Self {
        Self::new(builtin_components(), builtin_systems(), builtin_states())
    }
}

/// Everything a state may work with.
pub struct Context {
    pub entities: EntityManager,
    pub systems: SystemManager,
    pub level: Level,
    pub descriptions: Box<dyn DescriptionSource>,
    pub scripts: Rc<dyn ScriptEngine>,
    pub states: StateControl,
    /// Shared with every system and guest module.
    pub events: Rc<EventHandler>,
    pub input: InputBindings,
    close_requested: bool,
}

impl Context {
    pub fn new(
        registries: &Registries,
        descriptions: Box<dyn DescriptionSource>,
        scripts: Rc<dyn ScriptEngine>,
        map: Box<dyn TileMap>,
    ) -> Self {
        let events = Rc::new(EventHandler::new());
        Self {
            entities: EntityManager::new(Rc::clone(&registries.components)),
            systems: SystemManager::new(Rc::clone(&registries.systems), Rc::clone(&scripts))
                .with_events(Rc::clone(&events)),
            level: Level::new(map),
            descriptions,
            scripts,
            states: StateControl::default(),
            events,
            input: InputBindings::new(),
            close_requested: false,
        }
    }

    /// Replace the input bindings with the configuration from the
    /// description source. Returns how many event types are bound; entries
    /// that fail to parse are logged and skipped.
    pub fn load_input_bindings(&mut self) -> Result<usize, DescriptionError> {
        let configuration = self.descriptions.input_description()?;
        self.input.clear();
        let errors = self.input.load_configuration(&configuration);
        info!(bound = self.input.len(), skipped = errors.len(), "input bindings loaded");
        Ok(self.input.len())
    }

    /// Create an entity and route it to the active systems.
    pub fn add_entity(&mut self, name: &str, components: &Value) -> (EntityId, Vec<ComponentError>) {
        let (id, errors) = self.entities.add_entity_with(name, components);
        if let Some(entity) = self.entities.get(id) {
            if !self.systems.is_empty() && !self.systems.add_entity(entity) {
                warn!(entity = name, "no active system accepted the entity");
            }
        }
        (id, errors)
    }

    /// Build a component on a live entity and re-route the entity, since the
    /// change may make it match other systems. `None` when `id` is not alive.
    pub fn add_component(
        &mut self,
        id: EntityId,
        component_type: &str,
        payload: &Value,
    ) -> Option<Result<(), ComponentError>> {
        let result = self.entities.add_component(id, component_type, payload)?;
        if result.is_ok() {
            self.refresh_entity(id);
        }
        Some(result)
    }

    /// Detach a component and re-route the entity.
    pub fn remove_component(&mut self, id: EntityId, component_type: &str) -> Option<Box<dyn Component>> {
        let removed = self.entities.get_mut(id)?.remove_component(component_type)?;
        self.refresh_entity(id);
        Some(removed)
    }

    fn refresh_entity(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get(id) {
            self.systems.refresh_entity(entity);
        }
    }

    /// Activate systems and hand them the existing entities.
    pub fn load_systems<S: AsRef<str>>(&mut self, names: &[S]) -> bool {
        let loaded = self.systems.load_systems(names);
        self.systems.sync_entities(&self.entities);
        loaded
    }

    /// Replace every entity with the content of level `name`.
    ///
    /// A missing or malformed description, or a map that fails to load, is
    /// returned as an error and leaves the current level untouched. Bad entity
    /// entries are collected in the report.
    pub fn change_level(&mut self, name: &str) -> Result<LevelReport, DescriptionError> {
        info!(level = name, "changing level");
        let description = self.descriptions.level_description(name)?;
        self.level.map_mut().load(&description.map)?;

        self.systems.clear_entities();
        self.entities.clear();
        self.level.reset(name);

        let mut report = LevelReport {
            level: name.to_owned(),
            ..LevelReport::default()
        };

        for entry in &description.entities {
            let spec = match EntitySpec::parse(name, entry) {
                Ok(spec) => spec,
                Err(err) => {
                    warn!("{err}");
                    report.skipped.push(err);
                    continue;
                }
            };

            let defaults = match &spec.entity_type {
                Some(entity_type) => match self.level.template(self.descriptions.as_ref(), entity_type) {
                    Ok(defaults) => defaults,
                    Err(err) => {
                        warn!(entity = %spec.name, "{err}");
                        report.skipped.push(err);
                        continue;
                    }
                },
                None => Value::Null,
            };

            let components = defaults.merge(&spec.components);
            let (id, errors) = self.add_entity(&spec.name, &components);
            report.entities.push(id);
            report
                .component_errors
                .extend(errors.into_iter().map(|err| (spec.name.clone(), err)));
        }

        info!(
            level = name,
            entities = report.entities.len(),
            skipped = report.skipped.len(),
            "level loaded"
        );
        Ok(report)
    }

    /// Apply deferred entity removals. Returns how many entities were destroyed.
    pub fn flush_entity_removals(&mut self) -> usize {
        let mut removed = 0;
        for id in self.entities.take_pending_removals() {
            self.systems.remove_entity(id);
            if self.entities.remove(id).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "entity removals applied");
        }
        removed
    }

    /// Ask the runtime to stop after the current frame.
    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("entities", &self.entities)
            .field("systems", &self.systems)
            .field("level", &self.level)
            .field("states", &self.states)
            .field("events", &self.events)
            .field("input", &self.input)
            .field("close_requested", &self.close_requested)
            .finish()
    }
}
