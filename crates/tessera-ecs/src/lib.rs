//! Tessera ECS - Entities, components and systems
//!
//! Entities are named bags of components built by name through a
//! [`ComponentRegistry`]. Systems pick the entities they care about through a
//! component predicate and are driven once per frame by the
//! [`SystemManager`]. The extern bridge ([`ExternComponent`],
//! [`ExternSystem`]) lets content and guest scripts plug into the same
//! dispatch without new host types. Systems and guest modules talk to each
//! other through named [`Event`]s sent over a shared [`EventHandler`].

mod component;
mod components;
mod entity;
mod entity_manager;
mod error;
mod events;
mod extern_component;
mod extern_system;
pub mod script;
mod system;
mod systems;

pub use component::{builtin_components, register_builtin_components, Component, ComponentRegistry};
pub use components::{Animation, Position, Sprite};
pub use entity::{Entity, EntityId};
pub use entity_manager::{EntityManager, EntityScope};
pub use error::{ComponentError, GuestFault, ScriptError, SystemError};
pub use events::{Event, EventConnection, EventConnections, EventHandler};
pub use extern_component::ExternComponent;
pub use extern_system::ExternSystem;
pub use script::{Hook, NativeModule, NativeScriptEngine, ScriptEngine, ScriptModule};
pub use system::{System, SystemManager, SystemRegistry};
pub use systems::{builtin_systems, register_builtin_systems, AnimationSystem, OrthogonalRender};
