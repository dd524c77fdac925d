//! Built-in systems.

use tessera_core::{RenderTarget, SpriteDraw, View};

use crate::components::{Animation, Position, Sprite};
use crate::entity::{Entity, EntityId};
use crate::entity_manager::{EntityManager, EntityScope};
use crate::events::Event;
use crate::system::{System, SystemRegistry};

/// Register the systems shipped with the runtime.
pub fn register_builtin_systems(registry: &mut SystemRegistry) {
    registry.register(AnimationSystem::NAME, |_: &()| {
        Box::new(AnimationSystem) as Box<dyn System>
    });
    registry.register(OrthogonalRender::NAME, |_: &()| {
        Box::new(OrthogonalRender) as Box<dyn System>
    });
}

/// A registry holding every built-in system.
pub fn builtin_systems() -> SystemRegistry {
    let mut registry = SystemRegistry::new("system");
    register_builtin_systems(&mut registry);
    registry
}

/// Steps `animation` components and mirrors the frame into `sprite`.
///
/// Sends [`AnimationSystem::FINISHED`] with the entity `name` when a
/// non-looping animation reaches its last frame.
#[derive(Debug, Default)]
pub struct AnimationSystem;

impl AnimationSystem {
    pub const NAME: &'static str = "animation";
    pub const FINISHED: &'static str = "animationFinished";
}

impl System for AnimationSystem {
    fn update(&mut self, dt: f32, _view: &mut View, mut world: EntityScope<'_>) -> bool {
        let mut changed = false;
        let mut finished = Vec::new();
        for &id in world.members() {
            let Some(entity) = world.get_mut(id) else {
                continue;
            };
            let Some((frame, done)) = entity
                .component_as_mut::<Animation>(Animation::NAME)
                .and_then(|animation| {
                    animation
                        .advance(dt)
                        .then(|| (animation.current, animation.is_finished()))
                })
            else {
                continue;
            };
            if done {
                finished.push(entity.name().to_owned());
            }
            if let Some(sprite) = entity.component_as_mut::<Sprite>(Sprite::NAME) {
                sprite.frame = frame;
                changed = true;
            }
        }
        for name in finished {
            world.send_event(&Event::new(Self::FINISHED).with("name", name));
        }
        changed
    }

    fn check_components(&self, entity: &Entity) -> bool {
        entity.has_components(&[Sprite::NAME, Animation::NAME])
    }
}

/// Draws positioned sprites on their layer of a top-down orthogonal map.
#[derive(Debug, Default)]
pub struct OrthogonalRender;

impl OrthogonalRender {
    pub const NAME: &'static str = "orthogonal";
}

impl System for OrthogonalRender {
    fn update(&mut self, _dt: f32, _view: &mut View, _world: EntityScope<'_>) -> bool {
        false
    }

    fn draw(
        &mut self,
        target: &mut dyn RenderTarget,
        layer: u32,
        _view: &View,
        entities: &EntityManager,
        members: &[EntityId],
    ) {
        for entity in members.iter().filter_map(|id| entities.get(*id)) {
            let (Some(sprite), Some(position)) = (
                entity.component_as::<Sprite>(Sprite::NAME),
                entity.component_as::<Position>(Position::NAME),
            ) else {
                continue;
            };
            if sprite.layer != layer {
                continue;
            }
            target.draw_sprite(&SpriteDraw {
                texture: sprite.texture.clone(),
                position: position.vec(),
                frame: sprite.frame,
                layer,
            });
        }
    }

    fn check_components(&self, entity: &Entity) -> bool {
        entity.has_components(&[Sprite::NAME, Position::NAME])
    }
}
