use std::fmt;
use std::rc::Rc;

use tessera_core::{Registry, RenderTarget, View};
use tracing::{debug, info, warn};

use crate::entity::{Entity, EntityId};
use crate::entity_manager::{EntityManager, EntityScope};
use crate::error::SystemError;
use crate::events::{EventConnections, EventHandler};
use crate::extern_system::ExternSystem;
use crate::script::ScriptEngine;

/// Per-frame logic over the entities accepted by [`check_components`](System::check_components).
pub trait System {
    /// Advance by `dt` seconds. Returns whether any work happened.
    fn update(&mut self, dt: f32, view: &mut View, world: EntityScope<'_>) -> bool;

    /// Draw the members belonging to `layer`.
    fn draw(
        &mut self,
        _target: &mut dyn RenderTarget,
        _layer: u32,
        _view: &View,
        _entities: &EntityManager,
        _members: &[EntityId],
    ) {
    }

    /// Whether this system should process `entity`. Must not have side effects.
    fn check_components(&self, entity: &Entity) -> bool;
}

pub type SystemRegistry = Registry<dyn System>;

struct ActiveSystem {
    name: String,
    system: Box<dyn System>,
    members: Vec<EntityId>,
    // Dropped after `system`, so a guest `destroy` hook still sees its callbacks.
    events: EventConnections,
}

/// The set of systems active for the current state, in activation order.
pub struct SystemManager {
    registry: Rc<SystemRegistry>,
    scripts: Rc<dyn ScriptEngine>,
    events: Rc<EventHandler>,
    active: Vec<ActiveSystem>,
    view: View,
}

impl SystemManager {
    pub fn new(registry: Rc<SystemRegistry>, scripts: Rc<dyn ScriptEngine>) -> Self {
        Self {
            registry,
            scripts,
            events: Rc::new(EventHandler::new()),
            active: Vec::new(),
            view: View::default(),
        }
    }

    /// Share `events` with the systems instead of a private handler.
    pub fn with_events(mut self, events: Rc<EventHandler>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Rc<EventHandler> {
        &self.events
    }

    // ---- Activation ----

    /// Activate the system `name` (case-insensitive).
    ///
    /// Registered systems win; otherwise a script module of the same name is
    /// loaded as an [`ExternSystem`].
    pub fn add_system(&mut self, name: &str) -> Result<(), SystemError> {
        let name = name.to_lowercase();
        if self.contains(&name) {
            let err = SystemError::Duplicate(name);
            warn!("{err}");
            return Err(err);
        }

        let mut events = EventConnections::new(Rc::clone(&self.events));
        let system = match self.registry.create(&name, &()) {
            Some(system) => system,
            None if self.scripts.has_module(&name) => {
                Box::new(ExternSystem::load(&name, &*self.scripts, &mut events)?) as Box<dyn System>
            }
            None => return Err(SystemError::NotFound(name)),
        };

        info!(system = %name, "system activated");
        self.active.push(ActiveSystem {
            name,
            system,
            members: Vec::new(),
            events,
        });
        Ok(())
    }

    /// Activate every listed system. Failures are logged and skipped; returns
    /// `true` only if all of them loaded.
    pub fn load_systems<S: AsRef<str>>(&mut self, names: &[S]) -> bool {
        let mut all_loaded = true;
        for name in names {
            if let Err(err) = self.add_system(name.as_ref()) {
                warn!(system = name.as_ref(), "failed to load system: {err}");
                all_loaded = false;
            }
        }
        all_loaded
    }

    /// Deactivate `name`, disconnecting its event callbacks. Returns whether
    /// it was active.
    pub fn remove_system(&mut self, name: &str) -> bool {
        let name = name.to_lowercase();
        let before = self.active.len();
        self.active.retain(|active| active.name != name);
        before != self.active.len()
    }

    /// Deactivate every system.
    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.active.iter().any(|active| active.name == name)
    }

    pub fn system(&self, name: &str) -> Option<&dyn System> {
        let name = name.to_lowercase();
        self.active
            .iter()
            .find(|active| active.name == name)
            .map(|active| active.system.as_ref())
    }

    /// Active system names, in activation order.
    pub fn names(&self) -> Vec<&str> {
        self.active.iter().map(|active| active.name.as_str()).collect()
    }

    /// Working set of `name`, in insertion order.
    pub fn members(&self, name: &str) -> Option<&[EntityId]> {
        let name = name.to_lowercase();
        self.active
            .iter()
            .find(|active| active.name == name)
            .map(|active| active.members.as_slice())
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    // ---- Routing ----

    /// Offer `entity` to every active system. Returns whether at least one
    /// accepted it.
    pub fn add_entity(&mut self, entity: &Entity) -> bool {
        let mut accepted = false;
        for active in &mut self.active {
            if active.members.contains(&entity.id()) {
                accepted = true;
                continue;
            }
            if active.system.check_components(entity) {
                active.members.push(entity.id());
                accepted = true;
            }
        }
        accepted
    }

    /// Drop `id` from every working set. Returns whether any system held it.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let mut removed = false;
        for active in &mut self.active {
            if let Some(pos) = active.members.iter().position(|member| *member == id) {
                active.members.remove(pos);
                removed = true;
            }
        }
        removed
    }

    /// Re-check `entity` after its components changed.
    pub fn refresh_entity(&mut self, entity: &Entity) -> bool {
        let id = entity.id();
        let mut accepted = false;
        for active in &mut self.active {
            let wanted = active.system.check_components(entity);
            let pos = active.members.iter().position(|member| *member == id);
            match (wanted, pos) {
                (true, None) => active.members.push(id),
                (false, Some(pos)) => {
                    active.members.remove(pos);
                }
                _ => {}
            }
            accepted |= wanted;
        }
        accepted
    }

    /// Offer every live entity, in creation order, to every active system.
    pub fn sync_entities(&mut self, entities: &EntityManager) {
        for entity in entities.iter() {
            self.add_entity(entity);
        }
    }

    /// Empty every working set, keeping the systems active.
    pub fn clear_entities(&mut self) {
        for active in &mut self.active {
            active.members.clear();
        }
    }

    // ---- Frame ----

    /// Run every active system once. Returns whether any of them did work.
    pub fn update(&mut self, dt: f32, entities: &mut EntityManager) -> bool {
        let mut worked = false;
        for active in &mut self.active {
            let scope = EntityScope::new(entities, &active.members, &mut active.events);
            worked |= active.system.update(dt, &mut self.view, scope);
        }
        worked
    }

    /// Draw `layer` through every active system, after applying the view.
    pub fn draw(&mut self, target: &mut dyn RenderTarget, layer: u32, entities: &EntityManager) {
        target.set_view(&self.view);
        for active in &mut self.active {
            active
                .system
                .draw(target, layer, &self.view, entities, &active.members);
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut View {
        &mut self.view
    }

    pub fn set_view(&mut self, view: View) {
        debug!(center = ?view.center, size = ?view.size, "view changed");
        self.view = view;
    }
}

impl fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemManager")
            .field("active", &self.names())
            .field("view", &self.view)
            .finish()
    }
}
