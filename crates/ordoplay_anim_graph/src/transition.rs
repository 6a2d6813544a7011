// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transitions between states and the conditions gating them.

use crate::parameter::ParameterStore;
use crate::state::START;
use serde::{Deserialize, Serialize};

/// Comparison applied by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    /// `parameter > value`
    GreaterThan,
    /// `parameter < value`
    LessThan,
    /// `parameter >= value`
    GreaterThanEquals,
    /// `parameter <= value`
    LessThanEquals,
    /// `parameter == value`
    Equal,
    /// `parameter != value`
    NotEqual,
}

impl Predicate {
    /// Apply the comparison
    pub fn compare(&self, a: f32, b: f32) -> bool {
        match self {
            Self::GreaterThan => a > b,
            Self::LessThan => a < b,
            Self::GreaterThanEquals => a >= b,
            Self::LessThanEquals => a <= b,
            Self::Equal => a == b,
            Self::NotEqual => a != b,
        }
    }
}

/// Literal a parameter is compared against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    /// Boolean literal (for boolean and trigger parameters)
    Bool(bool),
    /// Numeric literal
    Number(f32),
}

impl ConditionValue {
    fn as_f32(&self) -> f32 {
        match self {
            Self::Bool(true) => 1.0,
            Self::Bool(false) => 0.0,
            Self::Number(v) => *v,
        }
    }
}

/// One `parameter <predicate> value` test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimCondition {
    /// Parameter name
    pub parameter_name: String,
    /// Comparison
    pub predicate: Predicate,
    /// Right-hand side
    pub value: ConditionValue,
}

impl AnimCondition {
    /// Create a condition
    pub fn new(parameter_name: impl Into<String>, predicate: Predicate, value: ConditionValue) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            predicate,
            value,
        }
    }

    /// Whether the condition holds; unknown parameters never match
    pub fn is_met(&self, params: &ParameterStore) -> bool {
        params
            .get(&self.parameter_name)
            .is_some_and(|p| self.predicate.compare(p.as_f32(), self.value.as_f32()))
    }
}

/// A directed edge between two states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimTransition {
    /// Source state; `None` for transitions requested directly by code
    #[serde(default)]
    pub from: Option<String>,
    /// Destination state
    pub to: String,
    /// Crossfade duration in seconds
    #[serde(default)]
    pub time: f32,
    /// Lower values are checked first
    #[serde(default)]
    pub priority: i32,
    /// Every condition must hold
    #[serde(default)]
    pub conditions: Vec<AnimCondition>,
    /// Normalized source progress at which the edge may fire
    #[serde(default)]
    pub exit_time: Option<f32>,
    /// Normalized destination progress to start from, in (0, 1)
    #[serde(default)]
    pub transition_offset: Option<f32>,
}

impl AnimTransition {
    /// Create an unconditional transition
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            to: to.into(),
            time: 0.0,
            priority: 0,
            conditions: Vec::new(),
            exit_time: None,
            transition_offset: None,
        }
    }

    /// Create a sourceless transition straight into `to`
    pub fn direct(to: impl Into<String>) -> Self {
        Self {
            from: None,
            ..Self::new("", to)
        }
    }

    /// Set the crossfade duration
    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a condition
    pub fn with_condition(mut self, condition: AnimCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Set the exit time
    pub fn with_exit_time(mut self, exit_time: f32) -> Self {
        self.exit_time = Some(exit_time);
        self
    }

    /// Set the destination start offset
    pub fn with_transition_offset(mut self, offset: f32) -> Self {
        self.transition_offset = Some(offset);
        self
    }

    /// Whether this edge leaves `state`
    pub fn leaves(&self, state: &str) -> bool {
        self.from.as_deref() == Some(state)
    }

    /// Whether every condition holds
    pub fn conditions_met(&self, params: &ParameterStore) -> bool {
        self.conditions.iter().all(|c| c.is_met(params))
    }
}

/// Make sure the graph has an entry edge.
///
/// Adds `START -> default_state` when no transition leaves `START`. Returns
/// whether an edge was added.
pub fn ensure_entry_transition(transitions: &mut Vec<AnimTransition>, default_state: &str) -> bool {
    if transitions.iter().any(|t| t.leaves(START)) {
        return false;
    }
    transitions.push(AnimTransition::new(START, default_state));
    true
}
