// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation state graphs for `OrdoPlay`.
//!
//! This crate turns authored state-graph data into running state machines:
//! - Typed parameters shared by every layer of a component
//! - States, 1D blend trees and conditional transitions
//! - Clip playback with per-target weighted blending
//! - The per-layer controller that ties them together
//!
//! ## Architecture
//!
//! [`StateGraph`] is plain serde data. A layer's [`LayerData`] builds an
//! [`AnimController`], which owns an [`AnimEvaluator`] full of [`AnimClip`]s.
//! Parameters live in a [`SharedParameters`] handle so the owning component
//! can write them while controllers read them during update.

pub mod controller;
pub mod evaluator;
pub mod graph;
pub mod parameter;
pub mod state;
pub mod transition;

pub use controller::{AnimController, ControllerEvent};
pub use evaluator::{AnimClip, AnimEvaluator, BlendedValue, ClipEvent};
pub use graph::{GraphError, LayerData, ParameterData, StateData, StateGraph};
pub use parameter::{ParameterError, ParameterStore, ParameterType, ParameterValue, SharedParameters};
pub use state::{is_reserved, AnimState, BlendChild, BlendTree, StateAnimation, ANY, END, START};
pub use transition::{
    ensure_entry_transition, AnimCondition, AnimTransition, ConditionValue, Predicate,
};
