//! Built-in states.

mod game;
mod main_menu;
mod pause;

pub use game::GameState;
pub use main_menu::MainMenuState;
pub use pause::PauseState;

use crate::state::{State, StateRegistry};

/// Register `mainmenu`, `game` and `pause`.
pub fn register_builtin_states(registry: &mut StateRegistry) {
    registry.register(MainMenuState::NAME, |name: &str| {
        Box::new(MainMenuState::new(name)) as Box<dyn State>
    });
    registry.register(GameState::NAME, |name: &str| {
        Box::new(GameState::new(name)) as Box<dyn State>
    });
    registry.register(PauseState::NAME, |name: &str| {
        Box::new(PauseState::new(name)) as Box<dyn State>
    });
}

/// A registry holding every built-in state.
pub fn builtin_states() -> StateRegistry {
    let mut registry = StateRegistry::new("state");
    register_builtin_states(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Registries};
    use crate::description::MemoryDescriptions;
    use crate::map::FlatMap;
    use crate::state::StateManager;
    use serde_json::json;
    use std::rc::Rc;
    use tessera_core::{DrawCommand, InputEvent, RecordingTarget};
    use tessera_ecs::{NativeModule, NativeScriptEngine, Position};

    fn descriptions() -> MemoryDescriptions {
        MemoryDescriptions::new()
            .with_state("game", json!({ "systems": ["Orthogonal", "mover"], "level": "meadow" }))
            .with_level(
                "meadow",
                json!({
                    "map": "meadow.tmx",
                    "entities": [
                        { "name": "hero", "components": {
                            "position": [10, 10],
                            "sprite": { "texture": "hero.png", "layer": 1 }
                        } }
                    ]
                }),
            )
    }

    /// A scripted system moving every member one unit right per update.
    fn scripts() -> NativeScriptEngine {
        NativeScriptEngine::new().with("mover", || {
            Ok(NativeModule::new("mover")
                .on_check_components(|entity| entity.has_component("position"))
                .on_update(|_, _, mut world| {
                    for &id in world.members() {
                        if let Some(position) = world
                            .get_mut(id)
                            .and_then(|e| e.component_as_mut::<Position>("position"))
                        {
                            position.x += 1.0;
                        }
                    }
                    Ok(true)
                }))
        })
    }

    fn manager() -> StateManager {
        let registries = Registries::builtin();
        let context = Context::new(
            &registries,
            Box::new(descriptions()),
            Rc::new(scripts()),
            Box::new(FlatMap::new(2)),
        );
        StateManager::new(Rc::clone(&registries.states), context)
    }

    fn hero_x(states: &StateManager) -> f32 {
        states
            .context()
            .entities
            .find("hero")
            .and_then(|e| e.component_as::<Position>("position"))
            .map(|p| p.x)
            .unwrap()
    }

    #[test]
    fn menu_key_starts_the_game() {
        let mut states = manager();
        states.push(MainMenuState::NAME).unwrap();
        states.handle_event(&InputEvent::KeyPressed("Enter".into()));

        // The menu is removed at the frame boundary, the game is already on top.
        assert_eq!(states.names(), vec!["game", "mainmenu"]);
        states.process_removals();
        assert_eq!(states.names(), vec!["game"]);
        assert_eq!(states.context().systems.names(), vec!["orthogonal", "mover"]);
        assert_eq!(states.context().level.name(), Some("meadow"));
    }

    #[test]
    fn game_updates_scripted_systems_and_draws_layers() {
        let mut states = manager();
        states.push(GameState::NAME).unwrap();
        states.update(0.016);
        assert_eq!(hero_x(&states), 11.0);

        let mut target = RecordingTarget::new();
        states.draw(&mut target);
        let layers: Vec<_> = target
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::MapLayer { layer, .. } => Some(*layer),
                _ => None,
            })
            .collect();
        assert_eq!(layers, vec![0, 1]);
        let hero = target.sprites().next().unwrap();
        assert_eq!((hero.texture.as_str(), hero.layer), ("hero.png", 1));
    }

    #[test]
    fn pause_freezes_the_game_until_resumed() {
        let mut states = manager();
        states.push(GameState::NAME).unwrap();
        states.handle_event(&InputEvent::KeyPressed(GameState::PAUSE_KEY.into()));
        assert_eq!(states.current(), Some("pause"));

        states.update(0.016);
        assert_eq!(hero_x(&states), 10.0);
        let mut target = RecordingTarget::new();
        states.draw(&mut target);
        assert!(target.commands.iter().all(|c| !matches!(c, DrawCommand::MapLayer { .. })));

        states.handle_event(&InputEvent::KeyPressed(PauseState::RESUME_KEY.into()));
        states.process_removals();
        assert_eq!(states.current(), Some("game"));
        states.update(0.016);
        assert_eq!(hero_x(&states), 11.0);
    }

    #[test]
    fn escape_in_menu_requests_close() {
        let mut states = manager();
        states.push(MainMenuState::NAME).unwrap();
        states.handle_event(&InputEvent::KeyPressed(MainMenuState::QUIT_KEY.into()));
        assert!(states.context().close_requested());
    }

    #[test]
    fn game_without_description_still_starts() {
        let registries = Registries::builtin();
        let context = Context::new(
            &registries,
            Box::new(MemoryDescriptions::new()),
            Rc::new(NativeScriptEngine::new()),
            Box::new(FlatMap::default()),
        );
        let mut states = StateManager::new(Rc::clone(&registries.states), context);
        states.push(GameState::NAME).unwrap();
        assert!(states.context().systems.is_empty());
        assert!(states.context().entities.is_empty());
    }
}
