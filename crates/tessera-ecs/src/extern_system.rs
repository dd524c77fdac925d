use std::cell::RefCell;
use std::fmt;

use tessera_core::{RenderTarget, Value, View};
use tracing::{debug, error, info, warn};

use crate::entity::{Entity, EntityId};
use crate::entity_manager::{EntityManager, EntityScope};
use crate::error::ScriptError;
use crate::events::EventConnections;
use crate::script::{Hook, ScriptEngine, ScriptModule};
use crate::system::System;

/// A system whose behavior lives in a guest module.
///
/// `update` is required; `init`, `draw`, `checkComponents` and `destroy` are
/// optional. Guest faults after loading are logged and treated as no-ops.
pub struct ExternSystem {
    name: String,
    // `check_components` takes `&self` but the guest call needs `&mut`.
    module: RefCell<Box<dyn ScriptModule>>,
}

impl ExternSystem {
    /// Load the module `name` and run its `init` hook, which may listen for
    /// events through `events`.
    pub fn load(name: &str, engine: &dyn ScriptEngine, events: &mut EventConnections) -> Result<Self, ScriptError> {
        let mut module = engine.load_module(name)?;

        if !module.has_hook(Hook::UPDATE) {
            return Err(ScriptError::MissingHook {
                module: name.to_owned(),
                hook: Hook::UPDATE.to_owned(),
            });
        }

        if module.has_hook(Hook::INIT) {
            module.call_hook(Hook::Init { events }).map_err(ScriptError::Init)?;
        }

        info!(system = name, "extern system loaded");
        Ok(Self {
            name: name.to_owned(),
            module: RefCell::new(module),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl System for ExternSystem {
    fn update(&mut self, dt: f32, view: &mut View, world: EntityScope<'_>) -> bool {
        match self.module.get_mut().call_hook(Hook::Update { dt, view, world }) {
            Ok(Value::Bool(worked)) => worked,
            Ok(_) => true,
            Err(fault) => {
                error!("{fault}");
                false
            }
        }
    }

    fn draw(
        &mut self,
        target: &mut dyn RenderTarget,
        layer: u32,
        view: &View,
        entities: &EntityManager,
        members: &[EntityId],
    ) {
        let module = self.module.get_mut();
        if !module.has_hook(Hook::DRAW) {
            return;
        }
        let hook = Hook::Draw {
            layer,
            view,
            target,
            entities,
            members,
        };
        if let Err(fault) = module.call_hook(hook) {
            error!("{fault}");
        }
    }

    fn check_components(&self, entity: &Entity) -> bool {
        let Ok(mut module) = self.module.try_borrow_mut() else {
            warn!(system = %self.name, "re-entrant component check rejected");
            return false;
        };
        if !module.has_hook(Hook::CHECK_COMPONENTS) {
            return false;
        }
        match module.call_hook(Hook::CheckComponents { entity }) {
            Ok(Value::Bool(accepted)) => accepted,
            Ok(other) => {
                warn!(
                    system = %self.name,
                    returned = %other.kind(),
                    "checkComponents must return a boolean, rejecting entity"
                );
                false
            }
            Err(fault) => {
                error!("{fault}");
                false
            }
        }
    }
}

impl Drop for ExternSystem {
    fn drop(&mut self) {
        let module = self.module.get_mut();
        if !module.has_hook(Hook::DESTROY) {
            return;
        }
        match module.call_hook(Hook::Destroy) {
            Ok(_) => debug!(system = %self.name, "extern system destroyed"),
            Err(fault) => error!("{fault}"),
        }
    }
}

impl fmt::Debug for ExternSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternSystem").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::builtin_components;
    use crate::error::GuestFault;
    use crate::events::{Event, EventHandler};
    use crate::extern_component::ExternComponent;
    use crate::script::{NativeModule, NativeScriptEngine};
    use std::cell::Cell;
    use std::rc::Rc;

    fn entities() -> EntityManager {
        EntityManager::new(Rc::new(builtin_components()))
    }

    fn connections() -> EventConnections {
        EventConnections::new(Rc::new(EventHandler::new()))
    }

    #[test]
    fn missing_update_hook_fails_to_load() {
        let engine = NativeScriptEngine::new().with("lazy", || Ok(NativeModule::new("lazy")));
        assert!(matches!(
            ExternSystem::load("lazy", &engine, &mut connections()),
            Err(ScriptError::MissingHook { .. })
        ));
    }

    #[test]
    fn init_fault_fails_to_load() {
        let engine = NativeScriptEngine::new().with("grumpy", || {
            Ok(NativeModule::new("grumpy")
                .on_init(|_| Err("refusing to start".to_owned()))
                .on_update(|_, _, _| Ok(true)))
        });
        match ExternSystem::load("grumpy", &engine, &mut connections()) {
            Err(ScriptError::Init(GuestFault { hook, message, .. })) => {
                assert_eq!(hook, "init");
                assert_eq!(message, "refusing to start");
            }
            other => panic!("unexpected result: {:?}", other.map(|s| s.name().to_owned())),
        }
    }

    #[test]
    fn update_mutates_member_components() {
        let engine = NativeScriptEngine::new().with("counter", || {
            Ok(NativeModule::new("counter").on_update(|_, _, mut world| {
                for &id in world.members() {
                    if let Some(bag) = world
                        .get_mut(id)
                        .and_then(|e| e.component_as_mut::<ExternComponent>("extern"))
                    {
                        let ticks = bag.get_int("ticks").unwrap_or(0);
                        bag.set("ticks", ticks + 1);
                    }
                }
                Ok(true)
            }))
        });
        let mut system = ExternSystem::load("counter", &engine, &mut connections()).unwrap();
        let mut entities = entities();
        let (id, _) = entities.add_entity_with(
            "box",
            &Value::from(serde_json::json!({ "extern": { "ticks": 0 } })),
        );
        let members = [id];
        let mut view = View::default();
        let mut events = connections();

        assert!(system.update(0.016, &mut view, EntityScope::new(&mut entities, &members, &mut events)));
        assert!(system.update(0.016, &mut view, EntityScope::new(&mut entities, &members, &mut events)));

        let bag = entities
            .get(id)
            .and_then(|e| e.component_as::<ExternComponent>("extern"))
            .unwrap();
        assert_eq!(bag.get_int("ticks"), Some(2));
    }

    #[test]
    fn faulting_update_is_a_no_op() {
        let engine = NativeScriptEngine::new().with("faulty", || {
            Ok(NativeModule::new("faulty").on_update(|_, _, _| panic!("index out of range")))
        });
        let mut system = ExternSystem::load("faulty", &engine, &mut connections()).unwrap();
        let mut entities = entities();
        let mut view = View::default();
        let mut events = connections();
        assert!(!system.update(0.016, &mut view, EntityScope::new(&mut entities, &[], &mut events)));
        // The system stays usable after a fault.
        assert!(!system.update(0.016, &mut view, EntityScope::new(&mut entities, &[], &mut events)));
    }

    #[test]
    fn non_boolean_check_rejects() {
        let engine = NativeScriptEngine::new().with("confused", || {
            Ok(NativeModule::new("confused")
                .on_update(|_, _, _| Ok(false))
                .hook(Hook::CHECK_COMPONENTS, |_| Ok(Value::from("yes"))))
        });
        let system = ExternSystem::load("confused", &engine, &mut connections()).unwrap();
        let mut entities = entities();
        let id = entities.add_entity("thing");
        assert!(!system.check_components(entities.get(id).unwrap()));
    }

    #[test]
    fn check_components_forwards_to_guest() {
        let engine = NativeScriptEngine::new().with("picky", || {
            Ok(NativeModule::new("picky")
                .on_update(|_, _, _| Ok(false))
                .on_check_components(|entity| entity.has_component("extern")))
        });
        let system = ExternSystem::load("picky", &engine, &mut connections()).unwrap();
        let mut entities = entities();
        let plain = entities.add_entity("plain");
        let (tagged, _) = entities.add_entity_with("tagged", &Value::from(serde_json::json!({ "extern": {} })));
        assert!(!system.check_components(entities.get(plain).unwrap()));
        assert!(system.check_components(entities.get(tagged).unwrap()));
    }

    #[test]
    fn init_callbacks_feed_update() {
        let engine = NativeScriptEngine::new().with("doorbell", || {
            let rings = Rc::new(Cell::new(0));
            let heard = Rc::clone(&rings);
            Ok(NativeModule::new("doorbell")
                .on_init(move |events| {
                    let heard = Rc::clone(&heard);
                    events.register_callback("ring", move |_| heard.set(heard.get() + 1));
                    Ok(())
                })
                .on_update(move |_, _, world| {
                    let answered = rings.replace(0) > 0;
                    if answered {
                        world.send_event(&Event::new("answered"));
                    }
                    Ok(answered)
                }))
        });
        let handler = Rc::new(EventHandler::new());
        let mut events = EventConnections::new(Rc::clone(&handler));
        let mut system = ExternSystem::load("doorbell", &engine, &mut events).unwrap();
        let answered = Rc::new(Cell::new(false));
        let flag = Rc::clone(&answered);
        handler.register_callback("answered", move |_| flag.set(true));

        let mut entities = entities();
        let mut view = View::default();
        assert!(!system.update(0.016, &mut view, EntityScope::new(&mut entities, &[], &mut events)));
        handler.send("ring");
        assert!(system.update(0.016, &mut view, EntityScope::new(&mut entities, &[], &mut events)));
        assert!(answered.get());

        drop(events);
        assert_eq!(handler.listener_count("ring"), 0);
    }

    #[test]
    fn destroy_runs_on_drop() {
        let destroyed = Rc::new(Cell::new(0));
        let seen = Rc::clone(&destroyed);
        let engine = NativeScriptEngine::new().with("tidy", move || {
            let seen = Rc::clone(&seen);
            Ok(NativeModule::new("tidy")
                .on_update(|_, _, _| Ok(false))
                .on_destroy(move || seen.set(seen.get() + 1)))
        });
        let system = ExternSystem::load("tidy", &engine, &mut connections()).unwrap();
        drop(system);
        assert_eq!(destroyed.get(), 1);
    }
}
