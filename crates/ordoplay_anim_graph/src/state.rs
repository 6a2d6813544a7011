// SPDX-License-Identifier: MIT OR Apache-2.0
//! States of an animation state machine.

use crate::parameter::ParameterStore;
use ordoplay_anim_track::AnimTrack;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Entry pseudo-state
pub const START: &str = "START";
/// Exit pseudo-state; transitions into it restart the graph
pub const END: &str = "END";
/// Pseudo-state whose transitions apply from every state
pub const ANY: &str = "ANY";

/// Whether `name` is one of the pseudo-states
pub fn is_reserved(name: &str) -> bool {
    matches!(name, START | END | ANY)
}

/// A child of a 1D blend tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendChild {
    /// Child name; animations bind to `State.Child`
    pub name: String,
    /// Position on the parameter axis
    pub point: f32,
    /// Playback speed override
    #[serde(default)]
    pub speed: Option<f32>,
}

/// Blends children by where a float parameter falls on a line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendTree {
    /// Parameter driving the blend
    pub parameter: String,
    /// Children, in any order
    pub children: Vec<BlendChild>,
}

impl BlendTree {
    /// Weight of every child for parameter value `value`, in `children` order
    pub fn weights(&self, value: f32) -> Vec<f32> {
        let mut weights = vec![0.0; self.children.len()];
        if self.children.is_empty() {
            return weights;
        }

        let mut order: Vec<usize> = (0..self.children.len()).collect();
        order.sort_by(|&a, &b| self.children[a].point.total_cmp(&self.children[b].point));

        let first = order[0];
        let last = order[order.len() - 1];
        if value <= self.children[first].point {
            weights[first] = 1.0;
            return weights;
        }
        if value >= self.children[last].point {
            weights[last] = 1.0;
            return weights;
        }

        for pair in order.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let (pa, pb) = (self.children[a].point, self.children[b].point);
            if value >= pa && value < pb {
                let t = (value - pa) / (pb - pa);
                weights[a] = 1.0 - t;
                weights[b] = t;
                break;
            }
        }
        weights
    }
}

/// A track bound to a state (or to one blend tree child)
#[derive(Debug, Clone)]
pub struct StateAnimation {
    /// `State` or `State.Child`; also the evaluator clip name
    pub name: String,
    /// Bound track
    pub track: Arc<AnimTrack>,
    /// Playback speed override
    pub speed: Option<f32>,
    /// Current normalized blend weight
    pub weight: f32,
}

/// A named state
#[derive(Debug, Clone)]
pub struct AnimState {
    name: String,
    /// Playback speed multiplier
    pub speed: f32,
    /// Whether the state's clips loop
    pub looping: bool,
    blend_tree: Option<BlendTree>,
    animations: Vec<StateAnimation>,
}

impl AnimState {
    /// Create a state with no animations bound
    pub fn new(name: impl Into<String>, speed: f32, looping: bool, blend_tree: Option<BlendTree>) -> Self {
        Self {
            name: name.into(),
            speed,
            looping,
            blend_tree,
            animations: Vec::new(),
        }
    }

    /// State name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blend tree, if this state blends several children
    pub fn blend_tree(&self) -> Option<&BlendTree> {
        self.blend_tree.as_ref()
    }

    /// Bound animations
    pub fn animations(&self) -> &[StateAnimation] {
        &self.animations
    }

    /// Whether any animation is bound
    pub fn has_animations(&self) -> bool {
        !self.animations.is_empty()
    }

    /// Bind `track` to `path` (`State` or `State.Child`), replacing any
    /// previous binding at the same path
    pub fn add_animation(&mut self, path: &str, track: Arc<AnimTrack>) {
        let child = path.split_once('.').map(|(_, child)| child);
        let speed = match (&self.blend_tree, child) {
            (Some(tree), Some(child)) => tree
                .children
                .iter()
                .find(|c| c.name == child)
                .and_then(|c| c.speed),
            _ => None,
        };

        if self.blend_tree.is_none() {
            // A plain state plays exactly one track
            self.animations.clear();
        }

        match self.animations.iter_mut().find(|a| a.name == path) {
            Some(existing) => {
                existing.track = track;
                existing.speed = speed;
            }
            None => self.animations.push(StateAnimation {
                name: path.to_string(),
                track,
                speed,
                weight: 1.0,
            }),
        }
    }

    /// Drop every bound animation
    pub fn clear_animations(&mut self) {
        self.animations.clear();
    }

    /// Whether the state can play: pseudo-states always can, plain states
    /// need a track, blend trees need a track for every child
    pub fn playable(&self) -> bool {
        if is_reserved(&self.name) {
            return true;
        }
        match &self.blend_tree {
            Some(tree) => tree.children.iter().all(|child| {
                let path = format!("{}.{}", self.name, child.name);
                self.animations.iter().any(|a| a.name == path)
            }),
            None => self.has_animations(),
        }
    }

    /// Length of the state's timeline: the longest bound track
    pub fn duration(&self) -> f32 {
        self.animations
            .iter()
            .map(|a| a.track.duration())
            .fold(0.0, f32::max)
    }

    /// Recompute animation weights from the blend tree parameter
    pub fn update_weights(&mut self, params: &ParameterStore) {
        let Some(tree) = &self.blend_tree else {
            for animation in &mut self.animations {
                animation.weight = 1.0;
            }
            return;
        };

        let value = params.get(&tree.parameter).map_or(0.0, |p| p.as_f32());
        let weights = tree.weights(value);
        for animation in &mut self.animations {
            let child = animation.name.split_once('.').map(|(_, child)| child);
            animation.weight = tree
                .children
                .iter()
                .position(|c| Some(c.name.as_str()) == child)
                .map_or(0.0, |i| weights[i]);
        }
    }
}
