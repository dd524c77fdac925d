use std::rc::Rc;

use tessera_core::Value;
use tracing::{debug, warn};

use crate::component::ComponentRegistry;
use crate::entity::{Entity, EntityId};
use crate::error::ComponentError;
use crate::events::{Event, EventConnection, EventConnections};

/// One entity slot. The generation is bumped every time the slot is vacated.
#[derive(Default)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Owns every live entity. Entities are kept in creation order so name
/// lookups return the first match.
pub struct EntityManager {
    registry: Rc<ComponentRegistry>,
    /// Indexed by `EntityId::index`.
    slots: Vec<Slot>,
    /// Vacant slot indices, reused last-in first-out.
    vacant: Vec<u32>,
    order: Vec<EntityId>,
    pending_removal: Vec<EntityId>,
}

impl EntityManager {
    pub fn new(registry: Rc<ComponentRegistry>) -> Self {
        Self {
            registry,
            slots: Vec::new(),
            vacant: Vec::new(),
            order: Vec::new(),
            pending_removal: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // ---- Creation ----

    /// Create an entity with no components.
    pub fn add_entity(&mut self, name: impl Into<String>) -> EntityId {
        let index = match self.vacant.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = EntityId {
            index,
            generation: slot.generation,
        };
        slot.entity = Some(Entity::new(id, name));
        self.order.push(id);
        id
    }

    /// Create an entity and attach every `component: payload` pair of
    /// `components`.
    ///
    /// Each component is built independently; the ones that fail are reported
    /// in the returned list and the entity keeps the rest.
    pub fn add_entity_with(
        &mut self,
        name: impl Into<String>,
        components: &Value,
    ) -> (EntityId, Vec<ComponentError>) {
        let id = self.add_entity(name);
        let mut errors = Vec::new();

        let pairs = match components {
            Value::Map(pairs) => Some(pairs),
            Value::Null => None,
            other => {
                errors.push(ComponentError::malformed(
                    "entity",
                    format!("components must be a map, got {}", other.kind()),
                ));
                None
            }
        };

        let registry = Rc::clone(&self.registry);
        if let (Some(pairs), Some(entity)) = (pairs, self.slot_mut(id)) {
            for (component_type, payload) in pairs {
                if let Err(err) = entity.add_component(&registry, component_type, payload) {
                    if matches!(err, ComponentError::Malformed { .. }) {
                        warn!(entity = %entity.name(), "{err}");
                    }
                    errors.push(err);
                }
            }
        }

        (id, errors)
    }

    /// Build a component through the registry and attach it to `id`.
    ///
    /// Returns `None` when `id` is not alive.
    pub fn add_component(
        &mut self,
        id: EntityId,
        component_type: &str,
        payload: &Value,
    ) -> Option<Result<(), ComponentError>> {
        let registry = Rc::clone(&self.registry);
        let entity = self.get_mut(id)?;
        Some(entity.add_component(&registry, component_type, payload))
    }

    fn slot_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?
            .entity
            .as_mut()
    }

    // ---- Lookup ----

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?
            .entity
            .as_ref()
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slot_mut(id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// The first entity created with `name`.
    pub fn find(&self, name: &str) -> Option<&Entity> {
        self.iter().find(|entity| entity.name() == name)
    }

    /// The first entity named `name` holding every listed component.
    pub fn find_with(&self, name: &str, components: &[&str]) -> Option<&Entity> {
        self.iter()
            .find(|entity| entity.name() == name && entity.has_components(components))
    }

    /// Entities in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.get(*id))
    }

    /// Ids in creation order.
    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // ---- Removal ----

    /// Destroy an entity now. Must not be called while a system is iterating;
    /// systems go through [`request_removal`](Self::request_removal).
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.vacate(id)?;
        self.order.retain(|other| *other != id);
        debug!(entity = %entity.name(), id = %id, "entity removed");
        Some(entity)
    }

    fn vacate(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let entity = slot.entity.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(id.index);
        Some(entity)
    }

    /// Queue `id` for removal at the next frame boundary.
    pub fn request_removal(&mut self, id: EntityId) {
        if !self.pending_removal.contains(&id) {
            self.pending_removal.push(id);
        }
    }

    pub fn has_pending_removals(&self) -> bool {
        !self.pending_removal.is_empty()
    }

    /// Drain the removal queue in request order.
    pub fn take_pending_removals(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.pending_removal)
    }

    /// Destroy every entity.
    pub fn clear(&mut self) {
        for id in std::mem::take(&mut self.order) {
            self.vacate(id);
        }
        self.pending_removal.clear();
    }
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("len", &self.len())
            .field("pending_removal", &self.pending_removal)
            .finish()
    }
}

/// The slice of the world a system sees during `update`: its own members,
/// read-only lookups by name, deferred removal and the event bus.
pub struct EntityScope<'a> {
    manager: &'a mut EntityManager,
    members: &'a [EntityId],
    events: &'a mut EventConnections,
}

impl<'a> EntityScope<'a> {
    pub fn new(manager: &'a mut EntityManager, members: &'a [EntityId], events: &'a mut EventConnections) -> Self {
        Self {
            manager,
            members,
            events,
        }
    }

    /// The system's working set, in insertion order.
    pub fn members(&self) -> &'a [EntityId] {
        self.members
    }

    fn is_member(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    /// A member entity.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        if !self.is_member(id) {
            return None;
        }
        self.manager.get(id)
    }

    /// A member entity, mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if !self.is_member(id) {
            return None;
        }
        self.manager.get_mut(id)
    }

    /// Any live entity, by name (first match).
    pub fn find(&self, name: &str) -> Option<&Entity> {
        self.manager.find(name)
    }

    /// Ask for `id` to be destroyed at the next frame boundary.
    pub fn request_removal(&mut self, id: EntityId) {
        self.manager.request_removal(id);
    }

    pub fn send_event(&self, event: &Event) -> bool {
        self.events.send_event(event)
    }

    /// Listen for `event_type` for as long as the system stays active.
    pub fn register_callback<F>(&mut self, event_type: &str, callback: F) -> EventConnection
    where
        F: Fn(&Event) + 'static,
    {
        self.events.register_callback(event_type, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::builtin_components;
    use crate::components::Position;
    use crate::events::EventHandler;

    fn manager() -> EntityManager {
        EntityManager::new(Rc::new(builtin_components()))
    }

    #[test]
    fn find_returns_first_match() {
        let mut entities = manager();
        let first = entities.add_entity("slime");
        let _second = entities.add_entity("slime");
        assert_eq!(entities.find("slime").map(Entity::id), Some(first));
        assert!(entities.find("ghost").is_none());
    }

    #[test]
    fn find_with_filters_on_components() {
        let mut entities = manager();
        entities.add_entity("slime");
        let (with_position, errors) = entities.add_entity_with(
            "slime",
            &Value::from(serde_json::json!({ "position": [1, 1] })),
        );
        assert!(errors.is_empty());
        assert_eq!(
            entities.find_with("slime", &["position"]).map(Entity::id),
            Some(with_position)
        );
    }

    #[test]
    fn bad_components_are_isolated() {
        let mut entities = manager();
        let payload = Value::from(serde_json::json!({
            "position": [4, 2],
            "sprite": { "layer": 1 },
            "portal": {},
        }));
        let (id, errors) = entities.add_entity_with("door", &payload);
        assert_eq!(errors.len(), 2);
        let entity = entities.get(id).unwrap();
        assert_eq!(entity.component_names(), vec!["position"]);
        assert_eq!(
            entity.component_as::<Position>("position"),
            Some(&Position { x: 4.0, y: 2.0 })
        );
    }

    #[test]
    fn removal_is_deferred_until_flushed() {
        let mut entities = manager();
        let a = entities.add_entity("a");
        let b = entities.add_entity("b");
        {
            let members = [a];
            let mut events = EventConnections::new(Rc::new(EventHandler::new()));
            let mut scope = EntityScope::new(&mut entities, &members, &mut events);
            assert!(scope.get(b).is_none());
            scope.request_removal(a);
            scope.request_removal(a);
        }
        assert!(entities.contains(a));

        let pending = entities.take_pending_removals();
        assert_eq!(pending, vec![a]);
        for id in pending {
            entities.remove(id);
        }
        assert!(!entities.contains(a));
        assert_eq!(entities.ids(), &[b]);
    }

    #[test]
    fn stale_ids_do_not_resolve() {
        let mut entities = manager();
        let old = entities.add_entity("old");
        entities.remove(old);
        let new = entities.add_entity("new");
        assert_eq!(new.index(), old.index());
        assert!(entities.get(old).is_none());
        assert_eq!(entities.get(new).map(Entity::name), Some("new"));
    }

    #[test]
    fn vacated_slots_are_reused_newest_first() {
        let mut entities = manager();
        let ids: Vec<_> = ["a", "b", "c"].into_iter().map(|name| entities.add_entity(name)).collect();
        assert_eq!(ids.iter().map(|id| id.index()).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(ids.iter().all(|id| id.generation() == 0));

        entities.remove(ids[0]);
        entities.remove(ids[2]);
        assert!(entities.remove(ids[2]).is_none());

        let d = entities.add_entity("d");
        let e = entities.add_entity("e");
        let f = entities.add_entity("f");
        assert_eq!((d.index(), d.generation()), (2, 1));
        assert_eq!((e.index(), e.generation()), (0, 1));
        assert_eq!((f.index(), f.generation()), (3, 0));
        assert_eq!(entities.len(), 4);
    }

    #[test]
    fn scope_reaches_the_event_bus() {
        let mut entities = manager();
        let handler = Rc::new(EventHandler::new());
        let mut events = EventConnections::new(Rc::clone(&handler));
        {
            let mut scope = EntityScope::new(&mut entities, &[], &mut events);
            scope.register_callback("ping", |_| {});
            assert!(scope.send_event(&Event::new("ping")));
            assert!(!scope.send_event(&Event::new("pong")));
        }
        assert_eq!(handler.listener_count("ping"), 1);
        drop(events);
        assert_eq!(handler.listener_count("ping"), 0);
    }

    #[test]
    fn clear_removes_everything() {
        let mut entities = manager();
        entities.add_entity("a");
        entities.add_entity("b");
        let old = entities.ids()[0];
        entities.clear();
        assert!(entities.is_empty());
        assert!(entities.find("a").is_none());
        assert!(!entities.contains(old));
        assert_ne!(entities.add_entity("c"), old);
    }
}
