//! Schema-less component for externally authored content.
//!
//! An [`ExternComponent`] is an ordered bag of named [`Value`]s. Scripts and
//! level files can attach arbitrary attributes to an entity through it without
//! the host declaring a new component type.

use std::any::Any;
use std::collections::BTreeMap;

use tessera_core::{FromValue, Value, ValueKind};
use tracing::debug;

use crate::component::Component;
use crate::error::ComponentError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternComponent {
    values: BTreeMap<String, Value>,
}

impl ExternComponent {
    pub const NAME: &'static str = "extern";

    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `name`. Storing [`Value::Null`] removes the key.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        match value.into() {
            Value::Null => {
                self.values.remove(&name);
            }
            value => {
                self.values.insert(name, value);
            }
        }
    }

    /// Typed read. `None` when the key is missing or holds another kind.
    pub fn get<T: FromValue>(&self, name: &str) -> Option<T> {
        let value = self.values.get(name)?;
        let converted = T::from_value(value);
        if converted.is_none() {
            debug!(
                attribute = name,
                found = %value.kind(),
                "extern attribute has a different kind than requested"
            );
        }
        converted
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        let value = self.values.get(name)?;
        if value.kind() != ValueKind::Str {
            debug!(attribute = name, found = %value.kind(), "extern attribute is not a string");
        }
        value.as_str()
    }

    /// The raw stored value, of any kind.
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Attribute names, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The whole bag as a map value.
    pub fn to_value(&self) -> Value {
        Value::Map(self.values.clone())
    }
}

impl Component for ExternComponent {
    fn initialize(&mut self, payload: &Value) -> Result<(), ComponentError> {
        match payload {
            Value::Map(values) => {
                self.values = values
                    .iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                Ok(())
            }
            Value::Null => {
                self.values.clear();
                Ok(())
            }
            other => Err(ComponentError::malformed(
                Self::NAME,
                format!("expected a map, got {}", other.kind()),
            )),
        }
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), ComponentError> {
        self.set(name, value);
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        Self::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
