// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layer masks and the contract for writing animated values to targets.

use crate::keyframe::Interpolation;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How a layer's values combine with the layers below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AnimBlendType {
    /// Blend toward this layer's value by the layer weight
    #[default]
    Overwrite,
    /// Add this layer's value scaled by the layer weight
    Additive,
}

/// One mask entry: either a plain flag or a node with a children switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskEntry {
    /// `true` includes the node itself only, `false` excludes it
    Flag(bool),
    /// `{ "children": true }` includes the node and its whole subtree
    Node {
        /// Whether descendants are included
        #[serde(default)]
        children: bool,
    },
}

/// Restricts a layer to a set of scene-graph nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimMask {
    entries: IndexMap<String, MaskEntry>,
}

impl AnimMask {
    /// Create an empty mask (includes nothing)
    pub fn new() -> Self {
        Self::default()
    }

    /// Include a single node
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.entries.insert(path.into(), MaskEntry::Flag(true));
        self
    }

    /// Include a node and all of its descendants
    pub fn include_children(mut self, path: impl Into<String>) -> Self {
        self.entries
            .insert(path.into(), MaskEntry::Node { children: true });
        self
    }

    /// Raw entries
    pub fn entries(&self) -> &IndexMap<String, MaskEntry> {
        &self.entries
    }

    /// Whether the slash-delimited `node` path may be animated
    pub fn includes(&self, node: &str) -> bool {
        match self.entries.get(node) {
            Some(MaskEntry::Flag(included)) => return *included,
            Some(MaskEntry::Node { .. }) => return true,
            None => {}
        }

        // Walk up the ancestors looking for a subtree include
        let mut path = node;
        while let Some(split) = path.rfind('/') {
            path = &path[..split];
            if let Some(MaskEntry::Node { children: true }) = self.entries.get(path) {
                return true;
            }
        }
        false
    }
}

/// Receives blended animation output.
///
/// The scene side implements this to push values onto bones, transforms or
/// material properties. Layers write in order once per frame.
pub trait AnimBinder {
    /// Called once at the start of every component update
    fn begin_frame(&mut self) {}

    /// Combine one layer's value for `node.property`
    fn write(
        &mut self,
        node: &str,
        property: &str,
        value: &[f32],
        weight: f32,
        blend: AnimBlendType,
    );

    /// Cached blended values are stale and must be recomputed
    fn dirtify(&mut self);

    /// Drop resolved targets so they are looked up again
    fn rebind(&mut self) {}
}

/// A blended property value
#[derive(Debug, Clone, PartialEq)]
pub struct TargetValue {
    /// Value before any layer is applied
    pub base: Vec<f32>,
    /// Value after this frame's layers
    pub value: Vec<f32>,
}

/// In-memory binder keeping node/property values in maps
#[derive(Debug, Clone, Default)]
pub struct PropertyBinder {
    targets: IndexMap<String, IndexMap<String, TargetValue>>,
    dirty: bool,
    rebinds: usize,
}

impl PropertyBinder {
    /// Create an empty binder
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the rest value of a property
    pub fn set_base(&mut self, node: &str, property: &str, base: Vec<f32>) {
        let target = self.target_mut(node, property, base.len());
        target.value.clone_from(&base);
        target.base = base;
    }

    /// Current value of `node.property`
    pub fn value(&self, node: &str, property: &str) -> Option<&[f32]> {
        self.targets
            .get(node)?
            .get(property)
            .map(|t| t.value.as_slice())
    }

    /// Iterate over every bound `(node, property, value)`
    pub fn values(&self) -> impl Iterator<Item = (&str, &str, &TargetValue)> {
        self.targets.iter().flat_map(|(node, props)| {
            props
                .iter()
                .map(move |(prop, value)| (node.as_str(), prop.as_str(), value))
        })
    }

    /// Whether `dirtify` was called since the last `take_dirty`
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Number of times targets were dropped for rebinding
    pub fn rebind_count(&self) -> usize {
        self.rebinds
    }

    fn target_mut(&mut self, node: &str, property: &str, components: usize) -> &mut TargetValue {
        let props = match self.targets.get_index_of(node) {
            Some(index) => &mut self.targets[index],
            None => self.targets.entry(node.to_string()).or_default(),
        };
        match props.get_index_of(property) {
            Some(index) => &mut props[index],
            None => props
                .entry(property.to_string())
                .or_insert_with(|| TargetValue {
                    base: vec![0.0; components],
                    value: vec![0.0; components],
                }),
        }
    }
}

impl AnimBinder for PropertyBinder {
    fn begin_frame(&mut self) {
        for props in self.targets.values_mut() {
            for target in props.values_mut() {
                target.value.clone_from(&target.base);
            }
        }
    }

    fn write(
        &mut self,
        node: &str,
        property: &str,
        value: &[f32],
        weight: f32,
        blend: AnimBlendType,
    ) {
        let target = self.target_mut(node, property, value.len());
        if target.value.len() != value.len() {
            target.value.resize(value.len(), 0.0);
            target.base.resize(value.len(), 0.0);
        }
        for (current, incoming) in target.value.iter_mut().zip(value) {
            *current = match blend {
                AnimBlendType::Overwrite => Interpolation::lerp(*current, *incoming, weight),
                AnimBlendType::Additive => *current + *incoming * weight,
            };
        }
    }

    fn dirtify(&mut self) {
        self.dirty = true;
    }

    fn rebind(&mut self) {
        self.rebinds += 1;
        for props in self.targets.values_mut() {
            for target in props.values_mut() {
                target.value.clone_from(&target.base);
            }
        }
    }
}
