use tessera_core::ValueKind;

/// Errors raised while building or mutating an entity's components.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComponentError {
    #[error("entity '{entity}' already has a '{component}' component")]
    Duplicate { entity: String, component: String },

    #[error("no component registered under '{0}'")]
    Unknown(String),

    #[error("malformed '{component}' payload: {reason}")]
    Malformed { component: String, reason: String },

    #[error("'{component}' has no field '{field}'")]
    UnknownField { component: String, field: String },

    #[error("'{component}.{field}' expects {expected}, got {found}")]
    FieldType {
        component: String,
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

impl ComponentError {
    pub fn malformed(component: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            component: component.to_owned(),
            reason: reason.into(),
        }
    }
}

/// A fault raised by guest code at a hook call boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{module}::{hook} faulted: {message}")]
pub struct GuestFault {
    pub module: String,
    pub hook: String,
    pub message: String,
}

/// Errors raised while loading a guest module.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("script module '{0}' not found")]
    ModuleNotFound(String),

    #[error("script module '{module}' failed to load: {message}")]
    Load { module: String, message: String },

    #[error("script module '{module}' does not define the required '{hook}' hook")]
    MissingHook { module: String, hook: String },

    #[error("script module initialization failed: {0}")]
    Init(GuestFault),
}

/// Errors raised by the system manager.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SystemError {
    #[error("system '{0}' is already active")]
    Duplicate(String),

    #[error("no system or script module named '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Script(#[from] ScriptError),
}
