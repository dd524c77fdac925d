//! Tessera State - State stack, shared context and level loading
//!
//! A [`StateManager`] owns the stack of [`State`]s and the [`Context`] every
//! state works through. Levels and state descriptions are declarative JSON
//! read through a [`DescriptionSource`]. [`InputBindings`] turn window input
//! into named events on the shared event bus.

mod context;
mod description;
mod error;
mod input;
mod level;
mod map;
mod state;
pub mod states;

pub use context::{Context, Registries, StateControl, StateRequest};
pub use description::{
    DescriptionSource, EntitySpec, FileDescriptions, LevelDescription, MediaPaths, MemoryDescriptions,
    StateDescription,
};
pub use error::{DescriptionError, InputError, MapError, StateError};
pub use input::{InputBindings, InputPattern, Modifier, Trigger};
pub use level::{Level, LevelReport};
pub use map::{FlatMap, TileMap};
pub use state::{State, StateManager, StateRegistry, RESERVED_STATE_NAME};
pub use states::{builtin_states, register_builtin_states};
