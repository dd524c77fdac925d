//! Script modules bundled with the runtime.
//!
//! Content names these in a state's `systems` list like any other system;
//! they read their parameters from the entity's `extern` component.

use std::cell::Cell;
use std::rc::Rc;

use tessera_core::{Value, Vec2, View};
use tessera_ecs::{Entity, EntityScope, ExternComponent, NativeModule, NativeScriptEngine, Position};

/// Moves entities by the `vx`/`vy` velocity in their extern component.
pub const WANDER: &str = "wander";

/// Counts the `ttl` in the extern component down and removes the entity
/// when it runs out.
pub const LIFETIME: &str = "lifetime";

/// Steers entities with a `speed` in their extern component toward the
/// `move_*` events received since the last frame.
pub const CONTROL: &str = "control";

const DIRECTIONS: [(&str, Vec2); 4] = [
    ("move_left", Vec2::NEG_X),
    ("move_right", Vec2::X),
    ("move_up", Vec2::NEG_Y),
    ("move_down", Vec2::Y),
];

pub fn script_engine() -> NativeScriptEngine {
    NativeScriptEngine::new()
        .with(WANDER, || Ok(wander()))
        .with(LIFETIME, || Ok(lifetime()))
        .with(CONTROL, || Ok(control()))
}

fn extern_of(entity: &Entity) -> Option<&ExternComponent> {
    entity.component_as::<ExternComponent>(ExternComponent::NAME)
}

/// Integers and floats alike.
fn number(bag: &ExternComponent, key: &str) -> Option<f64> {
    bag.get_value(key).and_then(Value::as_number)
}

fn wander() -> NativeModule {
    NativeModule::new(WANDER)
        .on_check_components(|entity| {
            entity.has_component(Position::NAME)
                && extern_of(entity).is_some_and(|e| e.contains("vx") || e.contains("vy"))
        })
        .on_update(|dt, _view: &mut View, mut world: EntityScope<'_>| {
            let mut moved = false;
            for &id in world.members() {
                let Some(entity) = world.get_mut(id) else {
                    continue;
                };
                let Some(velocity) = extern_of(entity) else {
                    continue;
                };
                let vx = number(velocity, "vx").unwrap_or(0.0) as f32;
                let vy = number(velocity, "vy").unwrap_or(0.0) as f32;
                if let Some(position) = entity.component_as_mut::<Position>(Position::NAME) {
                    position.set_vec(position.vec() + Vec2::new(vx, vy) * dt);
                    moved = true;
                }
            }
            Ok(moved)
        })
}

fn control() -> NativeModule {
    let heading = Rc::new(Cell::new(Vec2::ZERO));
    let steer = Rc::clone(&heading);
    NativeModule::new(CONTROL)
        .on_init(move |events| {
            for (event_type, direction) in DIRECTIONS {
                let steer = Rc::clone(&steer);
                events.register_callback(event_type, move |_| steer.set(steer.get() + direction));
            }
            Ok(())
        })
        .on_check_components(|entity| {
            entity.has_component(Position::NAME) && extern_of(entity).is_some_and(|e| e.contains("speed"))
        })
        .on_update(move |dt, _view: &mut View, mut world: EntityScope<'_>| {
            let step = heading.replace(Vec2::ZERO).normalize_or_zero() * dt;
            if step == Vec2::ZERO {
                return Ok(false);
            }
            let mut moved = false;
            for &id in world.members() {
                let Some(entity) = world.get_mut(id) else {
                    continue;
                };
                let Some(speed) = extern_of(entity).and_then(|bag| number(bag, "speed")) else {
                    continue;
                };
                if let Some(position) = entity.component_as_mut::<Position>(Position::NAME) {
                    position.set_vec(position.vec() + step * speed as f32);
                    moved = true;
                }
            }
            Ok(moved)
        })
}

fn lifetime() -> NativeModule {
    NativeModule::new(LIFETIME)
        .on_check_components(|entity| extern_of(entity).is_some_and(|e| e.contains("ttl")))
        .on_update(|dt, _view: &mut View, mut world: EntityScope<'_>| {
            let mut expired = Vec::new();
            for &id in world.members() {
                let Some(bag) = world
                    .get_mut(id)
                    .and_then(|entity| entity.component_as_mut::<ExternComponent>(ExternComponent::NAME))
                else {
                    continue;
                };
                let Some(ttl) = number(bag, "ttl") else {
                    return Err(format!("entity {id} has a non-numeric ttl"));
                };
                let ttl = ttl - f64::from(dt);
                bag.set("ttl", ttl);
                if ttl <= 0.0 {
                    expired.push(id);
                }
            }
            for &id in &expired {
                world.request_removal(id);
            }
            Ok(!expired.is_empty())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tessera_ecs::{builtin_components, builtin_systems, EntityManager, ScriptEngine, SystemManager};

    fn world() -> (EntityManager, SystemManager) {
        let entities = EntityManager::new(Rc::new(builtin_components()));
        let systems = SystemManager::new(Rc::new(builtin_systems()), Rc::new(script_engine()));
        (entities, systems)
    }

    #[test]
    fn engine_lists_bundled_modules() {
        let engine = script_engine();
        assert_eq!(engine.module_names(), vec!["control", "lifetime", "wander"]);
        assert!(engine.has_module("Wander"));
    }

    #[test]
    fn wander_moves_by_velocity() {
        let (mut entities, mut systems) = world();
        assert!(systems.load_systems(&["wander"]));

        let (bat, errors) = entities.add_entity_with(
            "bat",
            &Value::from(json!({ "position": [0, 0], "extern": { "vx": 2.0, "vy": -1.0 } })),
        );
        assert!(errors.is_empty());
        let (rock, _) = entities.add_entity_with("rock", &Value::from(json!({ "position": [5, 5] })));
        systems.sync_entities(&entities);
        assert_eq!(systems.members("wander"), Some(&[bat][..]));

        assert!(systems.update(0.5, &mut entities));
        let position = |id| entities.get(id).and_then(|e| e.component_as::<Position>(Position::NAME)).copied();
        assert_eq!(position(bat), Some(Position { x: 1.0, y: -0.5 }));
        assert_eq!(position(rock), Some(Position { x: 5.0, y: 5.0 }));
    }

    #[test]
    fn control_follows_move_events_until_the_next_frame() {
        let (mut entities, mut systems) = world();
        assert!(systems.load_systems(&["control"]));
        let (hero, _) = entities.add_entity_with(
            "hero",
            &Value::from(json!({ "position": [0, 0], "extern": { "speed": 10 } })),
        );
        entities.add_entity_with("rock", &Value::from(json!({ "position": [5, 5] })));
        systems.sync_entities(&entities);
        assert_eq!(systems.members("control"), Some(&[hero][..]));

        assert!(!systems.update(0.5, &mut entities));

        let events = Rc::clone(systems.events());
        assert!(events.send("move_right"));
        assert!(events.send("move_down"));
        assert!(systems.update(0.5, &mut entities));
        let moved = entities
            .get(hero)
            .and_then(|e| e.component_as::<Position>(Position::NAME))
            .copied()
            .unwrap();
        let expected = 5.0 / 2f32.sqrt();
        assert!((moved.x - expected).abs() < 1e-4);
        assert!((moved.y - expected).abs() < 1e-4);

        assert!(!systems.update(0.5, &mut entities));
        systems.remove_system("control");
        assert!(!events.send("move_left"));
    }

    #[test]
    fn lifetime_requests_removal_when_expired() {
        let (mut entities, mut systems) = world();
        systems.load_systems(&["lifetime"]);
        let (spark, _) = entities.add_entity_with("spark", &Value::from(json!({ "extern": { "ttl": 0.3 } })));
        systems.sync_entities(&entities);

        systems.update(0.2, &mut entities);
        assert!(!entities.has_pending_removals());

        systems.update(0.2, &mut entities);
        assert_eq!(entities.take_pending_removals(), vec![spark]);
    }

    #[test]
    fn lifetime_faults_on_bad_ttl() {
        let (mut entities, mut systems) = world();
        systems.load_systems(&["lifetime"]);
        entities.add_entity_with("odd", &Value::from(json!({ "extern": { "ttl": "soon" } })));
        systems.sync_entities(&entities);

        assert!(!systems.update(0.1, &mut entities));
        assert!(systems.contains("lifetime"));
    }
}
