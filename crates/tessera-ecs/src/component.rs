use std::any::Any;

use tessera_core::{Registry, Value, ValueKind};

use crate::components::{Animation, Position, Sprite};
use crate::error::ComponentError;
use crate::extern_component::ExternComponent;

/// A unit of entity data, built by name through a [`ComponentRegistry`].
pub trait Component: Any {
    /// Populate the component from its load-time payload.
    fn initialize(&mut self, payload: &Value) -> Result<(), ComponentError>;

    /// Read a field by name, for callers that do not know the concrete type.
    fn field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Write a field by name.
    fn set_field(&mut self, name: &str, _value: Value) -> Result<(), ComponentError> {
        Err(ComponentError::UnknownField {
            component: self.type_name().to_owned(),
            field: name.to_owned(),
        })
    }

    /// Name used in diagnostics.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub type ComponentRegistry = Registry<dyn Component>;

/// Register the components shipped with the runtime.
pub fn register_builtin_components(registry: &mut ComponentRegistry) {
    registry.register(Position::NAME, |_: &()| {
        Box::new(Position::default()) as Box<dyn Component>
    });
    registry.register(Sprite::NAME, |_: &()| {
        Box::new(Sprite::default()) as Box<dyn Component>
    });
    registry.register(Animation::NAME, |_: &()| {
        Box::new(Animation::default()) as Box<dyn Component>
    });
    registry.register(ExternComponent::NAME, |_: &()| {
        Box::new(ExternComponent::default()) as Box<dyn Component>
    });
}

/// A registry holding every built-in component.
pub fn builtin_components() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new("component");
    register_builtin_components(&mut registry);
    registry
}

pub(crate) fn field_type_error(
    component: &str,
    field: &str,
    expected: ValueKind,
    found: &Value,
) -> ComponentError {
    ComponentError::FieldType {
        component: component.to_owned(),
        field: field.to_owned(),
        expected,
        found: found.kind(),
    }
}

/// Numeric field accessor accepting both integer and float values.
pub(crate) fn number_field(component: &str, field: &str, value: &Value) -> Result<f64, ComponentError> {
    value
        .as_number()
        .ok_or_else(|| field_type_error(component, field, ValueKind::Float, value))
}

/// Non-negative integer field accessor.
pub(crate) fn count_field(component: &str, field: &str, value: &Value) -> Result<u32, ComponentError> {
    value
        .as_int()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| field_type_error(component, field, ValueKind::Int, value))
}
