//! The guest-code boundary.
//!
//! Script-bound systems talk to guest code only through [`ScriptEngine`] and
//! [`ScriptModule`]. Every hook call resolves to a `Result`: a guest error or
//! panic comes back as a [`GuestFault`] and never unwinds into the frame loop.
//!
//! [`NativeScriptEngine`] is the in-process engine: modules are Rust closures
//! catalogued by name, which keeps the boundary testable without embedding an
//! interpreter.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tessera_core::{RenderTarget, Value, View};
use tracing::warn;

use crate::entity::{Entity, EntityId};
use crate::entity_manager::{EntityManager, EntityScope};
use crate::error::{GuestFault, ScriptError};
use crate::events::EventConnections;

/// One hook invocation and the capabilities handed to it.
pub enum Hook<'a> {
    /// Runs once on load. Callbacks registered here live as long as the
    /// system.
    Init {
        events: &'a mut EventConnections,
    },
    Update {
        dt: f32,
        view: &'a mut View,
        world: EntityScope<'a>,
    },
    Draw {
        layer: u32,
        view: &'a View,
        target: &'a mut dyn RenderTarget,
        entities: &'a EntityManager,
        members: &'a [EntityId],
    },
    CheckComponents {
        entity: &'a Entity,
    },
    Destroy,
}

impl Hook<'_> {
    pub const INIT: &'static str = "init";
    pub const UPDATE: &'static str = "update";
    pub const DRAW: &'static str = "draw";
    pub const CHECK_COMPONENTS: &'static str = "checkComponents";
    pub const DESTROY: &'static str = "destroy";

    /// The guest-side name of the hook.
    pub fn name(&self) -> &'static str {
        match self {
            Hook::Init { .. } => Self::INIT,
            Hook::Update { .. } => Self::UPDATE,
            Hook::Draw { .. } => Self::DRAW,
            Hook::CheckComponents { .. } => Self::CHECK_COMPONENTS,
            Hook::Destroy => Self::DESTROY,
        }
    }
}

impl fmt::Debug for Hook<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook({})", self.name())
    }
}

/// Loads guest modules by logical name.
pub trait ScriptEngine {
    fn has_module(&self, name: &str) -> bool;

    /// Load and evaluate a module. Failures are reported here, never on first use.
    fn load_module(&self, name: &str) -> Result<Box<dyn ScriptModule>, ScriptError>;

    /// Known module names, sorted.
    fn module_names(&self) -> Vec<String>;
}

/// A loaded guest module.
pub trait ScriptModule {
    fn name(&self) -> &str;

    fn has_hook(&self, hook: &str) -> bool;

    fn call_hook(&mut self, hook: Hook<'_>) -> Result<Value, GuestFault>;
}

type HookFn = Box<dyn FnMut(Hook<'_>) -> Result<Value, String>>;

/// A guest module made of Rust closures, one per hook.
pub struct NativeModule {
    name: String,
    hooks: BTreeMap<&'static str, HookFn>,
}

impl NativeModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: BTreeMap::new(),
        }
    }

    /// Install a raw hook handler.
    pub fn hook<F>(mut self, name: &'static str, handler: F) -> Self
    where
        F: FnMut(Hook<'_>) -> Result<Value, String> + 'static,
    {
        self.hooks.insert(name, Box::new(handler));
        self
    }

    pub fn on_init<F>(self, mut handler: F) -> Self
    where
        F: FnMut(&mut EventConnections) -> Result<(), String> + 'static,
    {
        self.hook(Hook::INIT, move |hook| match hook {
            Hook::Init { events } => handler(events).map(|()| Value::Null),
            other => Err(unexpected(&other)),
        })
    }

    /// The update hook. The returned flag reports whether work happened.
    pub fn on_update<F>(self, mut handler: F) -> Self
    where
        F: FnMut(f32, &mut View, EntityScope<'_>) -> Result<bool, String> + 'static,
    {
        self.hook(Hook::UPDATE, move |hook| match hook {
            Hook::Update { dt, view, world } => handler(dt, view, world).map(Value::Bool),
            other => Err(unexpected(&other)),
        })
    }

    pub fn on_draw<F>(self, mut handler: F) -> Self
    where
        F: FnMut(u32, &View, &mut dyn RenderTarget, &EntityManager, &[EntityId]) + 'static,
    {
        self.hook(Hook::DRAW, move |hook| match hook {
            Hook::Draw {
                layer,
                view,
                target,
                entities,
                members,
            } => {
                handler(layer, view, target, entities, members);
                Ok(Value::Null)
            }
            other => Err(unexpected(&other)),
        })
    }

    pub fn on_check_components<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&Entity) -> bool + 'static,
    {
        self.hook(Hook::CHECK_COMPONENTS, move |hook| match hook {
            Hook::CheckComponents { entity } => Ok(Value::Bool(predicate(entity))),
            other => Err(unexpected(&other)),
        })
    }

    pub fn on_destroy<F>(self, mut handler: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.hook(Hook::DESTROY, move |_| {
            handler();
            Ok(Value::Null)
        })
    }
}

fn unexpected(hook: &Hook<'_>) -> String {
    format!("handler received an unexpected '{}' call", hook.name())
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_owned()
    }
}

impl ScriptModule for NativeModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_hook(&self, hook: &str) -> bool {
        self.hooks.contains_key(hook)
    }

    fn call_hook(&mut self, hook: Hook<'_>) -> Result<Value, GuestFault> {
        let hook_name = hook.name();
        let fault = |message: String| GuestFault {
            module: self.name.clone(),
            hook: hook_name.to_owned(),
            message,
        };

        let Some(handler) = self.hooks.get_mut(hook_name) else {
            return Err(fault("hook is not defined".to_owned()));
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(hook))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(fault(message)),
            Err(payload) => Err(fault(panic_message(payload))),
        }
    }
}

impl fmt::Debug for NativeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeModule")
            .field("name", &self.name)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

type ModuleConstructor = Box<dyn Fn() -> Result<NativeModule, String>>;

/// In-process script engine: a catalogue of module constructors.
#[derive(Default)]
pub struct NativeScriptEngine {
    modules: BTreeMap<String, ModuleConstructor>,
}

impl NativeScriptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue a module. Names are case-insensitive; the first
    /// registration of a name wins.
    pub fn register<F>(&mut self, name: &str, constructor: F) -> bool
    where
        F: Fn() -> Result<NativeModule, String> + 'static,
    {
        let name = name.to_lowercase();
        if self.modules.contains_key(&name) {
            warn!(module = %name, "script module registered twice, keeping the first");
            return false;
        }
        self.modules.insert(name, Box::new(constructor));
        true
    }

    pub fn with<F>(mut self, name: &str, constructor: F) -> Self
    where
        F: Fn() -> Result<NativeModule, String> + 'static,
    {
        self.register(name, constructor);
        self
    }
}

impl ScriptEngine for NativeScriptEngine {
    fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(&name.to_lowercase())
    }

    fn load_module(&self, name: &str) -> Result<Box<dyn ScriptModule>, ScriptError> {
        let key = name.to_lowercase();
        let constructor = self
            .modules
            .get(&key)
            .ok_or_else(|| ScriptError::ModuleNotFound(name.to_owned()))?;

        match panic::catch_unwind(AssertUnwindSafe(|| constructor())) {
            Ok(Ok(module)) => Ok(Box::new(module)),
            Ok(Err(message)) => Err(ScriptError::Load {
                module: key,
                message,
            }),
            Err(payload) => Err(ScriptError::Load {
                module: key,
                message: panic_message(payload),
            }),
        }
    }

    fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }
}

impl fmt::Debug for NativeScriptEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeScriptEngine")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventHandler};

    #[test]
    fn unknown_module_is_not_found() {
        let engine = NativeScriptEngine::new();
        assert!(!engine.has_module("ghost"));
        assert!(matches!(
            engine.load_module("ghost"),
            Err(ScriptError::ModuleNotFound(_))
        ));
    }

    #[test]
    fn constructor_failure_is_a_load_error() {
        let engine = NativeScriptEngine::new()
            .with("broken", || Err("syntax error at line 3".to_owned()))
            .with("explodes", || panic!("constructor blew up"));

        assert!(matches!(engine.load_module("broken"), Err(ScriptError::Load { .. })));
        match engine.load_module("explodes") {
            Err(ScriptError::Load { message, .. }) => assert!(message.contains("constructor blew up")),
            other => panic!("unexpected result: {:?}", other.map(|m| m.name().to_owned())),
        }
    }

    #[test]
    fn names_are_case_insensitive() {
        let mut engine = NativeScriptEngine::new();
        assert!(engine.register("Wander", || Ok(NativeModule::new("wander"))));
        assert!(!engine.register("wander", || Ok(NativeModule::new("other"))));
        assert!(engine.has_module("WANDER"));
        assert_eq!(engine.module_names(), vec!["wander".to_owned()]);
    }

    fn connections() -> EventConnections {
        EventConnections::new(std::rc::Rc::new(EventHandler::new()))
    }

    #[test]
    fn panicking_hook_becomes_a_fault() {
        let mut module = NativeModule::new("bomb").on_init(|_| panic!("boom"));
        let mut events = connections();
        let fault = module.call_hook(Hook::Init { events: &mut events }).unwrap_err();
        assert_eq!(fault.module, "bomb");
        assert_eq!(fault.hook, "init");
        assert!(fault.message.contains("boom"));
    }

    #[test]
    fn init_registers_callbacks_through_the_hook() {
        let heard = std::rc::Rc::new(std::cell::Cell::new(false));
        let flag = std::rc::Rc::clone(&heard);
        let mut module = NativeModule::new("listener").on_init(move |events| {
            let flag = std::rc::Rc::clone(&flag);
            events.register_callback("whistle", move |_| flag.set(true));
            Ok(())
        });
        let mut events = connections();
        module.call_hook(Hook::Init { events: &mut events }).unwrap();

        assert!(events.send_event(&Event::new("whistle")));
        assert!(heard.get());
    }

    #[test]
    fn missing_hook_is_a_fault() {
        let mut module = NativeModule::new("empty");
        assert!(!module.has_hook(Hook::DESTROY));
        assert!(module.call_hook(Hook::Destroy).is_err());
    }
}
