// SPDX-License-Identifier: MIT OR Apache-2.0
//! Named, typed parameters read by transition conditions and blend trees.

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameter store shared between a component and its layer controllers
pub type SharedParameters = Arc<RwLock<ParameterStore>>;

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterType {
    /// 32-bit float
    Float,
    /// 32-bit integer
    Integer,
    /// Boolean
    Boolean,
    /// Boolean that is cleared once consumed
    Trigger,
}

impl ParameterType {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Trigger => "trigger",
        }
    }
}

/// Current value of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    /// Float value
    Float(f32),
    /// Integer value
    Integer(i32),
    /// Boolean value
    Boolean(bool),
    /// Trigger state
    Trigger(bool),
}

impl ParameterValue {
    /// Zero value of a type
    pub fn zero(kind: ParameterType) -> Self {
        match kind {
            ParameterType::Float => Self::Float(0.0),
            ParameterType::Integer => Self::Integer(0),
            ParameterType::Boolean => Self::Boolean(false),
            ParameterType::Trigger => Self::Trigger(false),
        }
    }

    /// Type of this value
    pub fn kind(&self) -> ParameterType {
        match self {
            Self::Float(_) => ParameterType::Float,
            Self::Integer(_) => ParameterType::Integer,
            Self::Boolean(_) => ParameterType::Boolean,
            Self::Trigger(_) => ParameterType::Trigger,
        }
    }

    /// Numeric view used by condition comparisons (booleans are 0 or 1)
    pub fn as_f32(&self) -> f32 {
        match self {
            Self::Float(v) => *v,
            Self::Integer(v) => *v as f32,
            Self::Boolean(v) | Self::Trigger(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Convert an authored JSON value to a parameter of type `kind`.
    ///
    /// `null` becomes the zero value.
    pub fn from_json(kind: ParameterType, value: &serde_json::Value) -> Option<Self> {
        if value.is_null() {
            return Some(Self::zero(kind));
        }
        match kind {
            ParameterType::Float => value.as_f64().map(|v| Self::Float(v as f32)),
            ParameterType::Integer => value
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Self::Integer),
            ParameterType::Boolean => value.as_bool().map(Self::Boolean),
            ParameterType::Trigger => value.as_bool().map(Self::Trigger),
        }
    }
}

/// Error reading or writing a parameter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    /// No parameter with this name
    #[error("Parameter not found: {0}")]
    NotFound(String),

    /// The parameter exists with another type
    #[error("Parameter {name} is a {found}, not a {expected}")]
    TypeMismatch {
        /// Parameter name
        name: String,
        /// Requested type
        expected: &'static str,
        /// Declared type
        found: &'static str,
    },

    /// A fractional or out-of-range number was given for an integer
    #[error("Parameter {name} is an integer, got {value}")]
    NotIntegral {
        /// Parameter name
        name: String,
        /// Rejected value
        value: f64,
    },
}

/// Parameter values plus the triggers to clear at the end of the frame
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: IndexMap<String, ParameterValue>,
    consumed_triggers: IndexSet<String>,
}

impl ParameterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in a shared handle
    pub fn shared(self) -> SharedParameters {
        Arc::new(RwLock::new(self))
    }

    /// Declare or replace a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.values.insert(name.into(), value);
    }

    /// Remove every parameter
    pub fn clear(&mut self) {
        self.values.clear();
        self.consumed_triggers.clear();
    }

    /// Look up a parameter of any type
    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.values.get(name).copied()
    }

    /// Look up a parameter, checking its declared type
    pub fn get_typed(&self, name: &str, kind: ParameterType) -> Result<ParameterValue, ParameterError> {
        let value = self
            .get(name)
            .ok_or_else(|| ParameterError::NotFound(name.to_string()))?;
        if value.kind() != kind {
            return Err(ParameterError::TypeMismatch {
                name: name.to_string(),
                expected: kind.name(),
                found: value.kind().name(),
            });
        }
        Ok(value)
    }

    /// Overwrite a parameter; the new value must match the declared type
    pub fn set(&mut self, name: &str, value: ParameterValue) -> Result<(), ParameterError> {
        let slot = self
            .values
            .get_mut(name)
            .ok_or_else(|| ParameterError::NotFound(name.to_string()))?;
        if slot.kind() != value.kind() {
            return Err(ParameterError::TypeMismatch {
                name: name.to_string(),
                expected: value.kind().name(),
                found: slot.kind().name(),
            });
        }
        *slot = value;
        Ok(())
    }

    /// Whether `name` is a trigger parameter
    pub fn is_trigger(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(ParameterValue::Trigger(_)))
    }

    /// Schedule a trigger to be cleared by [`Self::reset_consumed_triggers`]
    pub fn consume_trigger(&mut self, name: &str) {
        if !self.consumed_triggers.contains(name) {
            self.consumed_triggers.insert(name.to_string());
        }
    }

    /// Clear every consumed trigger
    pub fn reset_consumed_triggers(&mut self) {
        for name in self.consumed_triggers.drain(..) {
            if let Some(value) = self.values.get_mut(&name) {
                if value.kind() == ParameterType::Trigger {
                    *value = ParameterValue::Trigger(false);
                }
            }
        }
    }

    /// Triggers waiting to be cleared
    pub fn consumed_triggers(&self) -> impl Iterator<Item = &str> {
        self.consumed_triggers.iter().map(String::as_str)
    }

    /// Parameter names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameters are declared
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let mut store = ParameterStore::new();
        store.insert("speed", ParameterValue::Float(1.5));

        assert_eq!(store.get_typed("speed", ParameterType::Float), Ok(ParameterValue::Float(1.5)));
        assert!(matches!(
            store.get_typed("speed", ParameterType::Integer),
            Err(ParameterError::TypeMismatch { .. })
        ));
        assert_eq!(
            store.get_typed("missing", ParameterType::Float),
            Err(ParameterError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_set_rejects_other_type() {
        let mut store = ParameterStore::new();
        store.insert("grounded", ParameterValue::Boolean(false));

        assert!(store.set("grounded", ParameterValue::Float(1.0)).is_err());
        assert_eq!(store.get("grounded"), Some(ParameterValue::Boolean(false)));

        store.set("grounded", ParameterValue::Boolean(true)).unwrap();
        assert_eq!(store.get("grounded"), Some(ParameterValue::Boolean(true)));
    }

    #[test]
    fn test_consumed_triggers_reset() {
        let mut store = ParameterStore::new();
        store.insert("jump", ParameterValue::Trigger(true));
        store.insert("grounded", ParameterValue::Boolean(true));

        store.consume_trigger("jump");
        store.consume_trigger("jump");
        assert_eq!(store.consumed_triggers().count(), 1);

        store.reset_consumed_triggers();
        assert_eq!(store.get("jump"), Some(ParameterValue::Trigger(false)));
        assert_eq!(store.get("grounded"), Some(ParameterValue::Boolean(true)));
        assert_eq!(store.consumed_triggers().count(), 0);
    }

    #[test]
    fn test_from_json() {
        use serde_json::json;
        assert_eq!(
            ParameterValue::from_json(ParameterType::Integer, &json!(3)),
            Some(ParameterValue::Integer(3))
        );
        assert_eq!(ParameterValue::from_json(ParameterType::Integer, &json!(2.5)), None);
        assert_eq!(
            ParameterValue::from_json(ParameterType::Trigger, &serde_json::Value::Null),
            Some(ParameterValue::Trigger(false))
        );
    }
}
