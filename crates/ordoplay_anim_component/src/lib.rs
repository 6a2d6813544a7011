// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation component runtime for `OrdoPlay`.
//!
//! Ties the state graph and track crates together into something an entity
//! can own:
//! - Layers with weight crossfades, masks and blend modes
//! - The component that updates layers and writes their output to a binder
//! - Typed event listeners
//! - Ordered, mutation-safe script update loops
//! - RON settings for the headless preview
//!
//! ## Architecture
//!
//! [`AnimComponent`] owns an ordered map of [`AnimComponentLayer`]s, one per
//! state-graph layer, all reading the same parameter store. Each frame it
//! advances every layer, then locks the [`SharedBinder`] once and writes the
//! layers bottom to top. [`ScriptRegistry`] drives per-frame behaviours over
//! [`SortedLoopArray`]s so scripts may be created or destroyed mid-loop.

pub mod component;
pub mod config;
pub mod emitter;
pub mod layer;
pub mod script;
pub mod sorted_loop_array;

pub use component::{
    AnimComponent, AnimComponentEvent, AnimComponentOptions, SharedBinder, BASE_LAYER,
};
pub use config::{ConfigError, ParameterOverride, PreviewConfig, TrackBinding};
pub use emitter::{EventEmitter, ListenerId};
pub use layer::{AnimComponentLayer, LayerOptions, WeightBlend};
pub use script::{
    Capabilities, ExecutionOrder, ScriptBehaviour, ScriptContext, ScriptError, ScriptEvent,
    ScriptId, ScriptRegistry, MAX_EXECUTION_ORDER,
};
pub use sorted_loop_array::{SortKey, SortedLoopArray};
