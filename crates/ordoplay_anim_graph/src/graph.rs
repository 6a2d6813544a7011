// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authored state-graph data, as produced by the asset pipeline.

use crate::parameter::{ParameterStore, ParameterType, ParameterValue};
use crate::state::{is_reserved, BlendTree, ANY, END, START};
use crate::transition::{ensure_entry_transition, AnimTransition};
use indexmap::IndexMap;
use ordoplay_anim_track::{AnimBlendType, AnimMask};
use serde::{Deserialize, Serialize};

fn default_one() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

/// One state of a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateData {
    /// State name
    pub name: String,
    /// Playback speed multiplier
    #[serde(default = "default_one")]
    pub speed: f32,
    /// Whether clips loop
    #[serde(default = "default_true", rename = "loop")]
    pub looping: bool,
    /// Entered from `START` when the graph has no entry edge
    #[serde(default)]
    pub default_state: bool,
    /// Optional 1D blend tree
    #[serde(default)]
    pub blend_tree: Option<BlendTree>,
}

impl StateData {
    /// Plain looping state at normal speed
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            speed: 1.0,
            looping: true,
            default_state: false,
            blend_tree: None,
        }
    }
}

/// One layer of the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerData {
    /// Layer name, unique within the graph
    pub name: String,
    /// States
    #[serde(default)]
    pub states: Vec<StateData>,
    /// Transitions
    #[serde(default)]
    pub transitions: Vec<AnimTransition>,
    /// How the layer combines with those below it
    #[serde(default)]
    pub blend_type: AnimBlendType,
    /// Initial layer weight
    #[serde(default = "default_one")]
    pub weight: f32,
    /// Nodes the layer may animate; all when absent
    #[serde(default)]
    pub mask: Option<AnimMask>,
    /// Share weight with the other normalized layers
    #[serde(default)]
    pub normalized_weight: bool,
}

impl LayerData {
    /// Empty layer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            blend_type: AnimBlendType::Overwrite,
            weight: 1.0,
            mask: None,
            normalized_weight: false,
        }
    }

    /// The state entered from `START`: the one flagged `defaultState`, else
    /// the first non-reserved state
    pub fn default_state(&self) -> Option<&str> {
        self.states
            .iter()
            .find(|s| s.default_state)
            .or_else(|| self.states.iter().find(|s| !is_reserved(&s.name)))
            .map(|s| s.name.as_str())
    }

    /// Add `START -> default state` when the layer has no entry edge
    pub fn ensure_entry_transition(&mut self) -> bool {
        let Some(default) = self.default_state().map(str::to_string) else {
            return false;
        };
        ensure_entry_transition(&mut self.transitions, &default)
    }

    fn has_state(&self, name: &str) -> bool {
        is_reserved(name) || self.states.iter().any(|s| s.name == name)
    }
}

/// Declared parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterData {
    /// Parameter type
    #[serde(rename = "type")]
    pub kind: ParameterType,
    /// Initial value; `null` means the type's zero
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A complete animation state graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateGraph {
    /// Layers, bottom first
    #[serde(default)]
    pub layers: Vec<LayerData>,
    /// Declared parameters
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterData>,
}

impl StateGraph {
    /// Parse and validate a graph from JSON
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let graph: Self = serde_json::from_str(json)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check layer names, transition endpoints and parameter values
    pub fn validate(&self) -> Result<(), GraphError> {
        for (index, layer) in self.layers.iter().enumerate() {
            if self.layers[..index].iter().any(|l| l.name == layer.name) {
                return Err(GraphError::DuplicateLayer(layer.name.clone()));
            }

            for transition in &layer.transitions {
                let from = transition.from.as_deref().unwrap_or(START);
                if from == END || !layer.has_state(from) {
                    return Err(GraphError::UnknownState {
                        layer: layer.name.clone(),
                        state: from.to_string(),
                    });
                }
                if transition.to == START || transition.to == ANY || !layer.has_state(&transition.to) {
                    return Err(GraphError::UnknownState {
                        layer: layer.name.clone(),
                        state: transition.to.clone(),
                    });
                }
            }
        }

        for (name, data) in &self.parameters {
            if ParameterValue::from_json(data.kind, &data.value).is_none() {
                return Err(GraphError::InvalidParameter {
                    name: name.clone(),
                    kind: data.kind.name(),
                });
            }
        }
        Ok(())
    }

    /// Parameter store holding the declared defaults
    pub fn default_parameters(&self) -> ParameterStore {
        let mut store = ParameterStore::new();
        for (name, data) in &self.parameters {
            let value = ParameterValue::from_json(data.kind, &data.value)
                .unwrap_or_else(|| ParameterValue::zero(data.kind));
            store.insert(name.clone(), value);
        }
        store
    }

    /// Find a layer by name
    pub fn layer(&self, name: &str) -> Option<&LayerData> {
        self.layers.iter().find(|l| l.name == name)
    }
}

/// Error loading a state graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A transition names a state the layer does not have
    #[error("Unknown state {state} in layer {layer}")]
    UnknownState {
        /// Layer name
        layer: String,
        /// Offending state
        state: String,
    },

    /// Two layers share a name
    #[error("Duplicate layer: {0}")]
    DuplicateLayer(String),

    /// A parameter's initial value does not fit its type
    #[error("Parameter {name} has an invalid {kind} value")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Declared type
        kind: &'static str,
    },

    /// Malformed JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
