// SPDX-License-Identifier: MIT OR Apache-2.0
//! The animation component: owns the layers, the shared parameters and the
//! target binder, and drives them once per frame.

use crate::emitter::{EventEmitter, ListenerId};
use crate::layer::{AnimComponentLayer, LayerOptions};
use indexmap::{IndexMap, IndexSet};
use ordoplay_anim_graph::{
    AnimController, ClipEvent, ControllerEvent, GraphError, LayerData, ParameterError,
    ParameterStore, ParameterType, ParameterValue, SharedParameters, StateGraph,
};
use ordoplay_anim_track::{AnimBinder, AnimEvent, AnimTrack};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the layer created on demand by [`AnimComponent::assign_animation`]
pub const BASE_LAYER: &str = "Base";

/// Target binder shared between the scene and the component
pub type SharedBinder = Arc<Mutex<dyn AnimBinder + Send>>;

/// Component settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimComponentOptions {
    /// Multiplier applied to every update's `dt`
    pub speed: f32,
    /// Start playing layers as soon as they become playable
    pub activate: bool,
    /// Node every layer's targets are resolved under
    pub root_bone: Option<String>,
    /// Treat each target's blended clip weights as full coverage
    pub normalize_weights: bool,
}

impl Default for AnimComponentOptions {
    fn default() -> Self {
        Self {
            speed: 1.0,
            activate: true,
            root_bone: None,
            normalize_weights: false,
        }
    }
}

/// Notifications fired by [`AnimComponent`]
#[derive(Debug, Clone, PartialEq)]
pub enum AnimComponentEvent {
    /// A clip crossed a timeline event
    Timeline {
        /// Layer name
        layer: String,
        /// State owning the clip
        state: String,
        /// The event
        event: AnimEvent,
    },
    /// A looping clip wrapped
    Loop {
        /// Layer name
        layer: String,
        /// Clip name
        clip: String,
    },
    /// A one-shot clip finished
    End {
        /// Layer name
        layer: String,
        /// Clip name
        clip: String,
    },
    /// A layer changed state
    StateChanged {
        /// Layer name
        layer: String,
        /// State left
        from: String,
        /// State entered
        to: String,
    },
    /// Playback started
    Play,
    /// Playback paused
    Pause,
}

impl AnimComponentEvent {
    fn from_controller(layer: &str, event: ControllerEvent) -> Self {
        let layer = layer.to_string();
        match event {
            ControllerEvent::StateChanged { from, to } => Self::StateChanged { layer, from, to },
            ControllerEvent::Clip(clip_event) => {
                let state = clip_event.state().to_string();
                match clip_event {
                    ClipEvent::Timeline { event, .. } => Self::Timeline { layer, state, event },
                    ClipEvent::Loop { clip } => Self::Loop { layer, clip },
                    ClipEvent::End { clip } => Self::End { layer, clip },
                }
            }
        }
    }
}

/// Layered animation state machines writing into one binder
pub struct AnimComponent {
    layers: IndexMap<String, AnimComponentLayer>,
    parameters: SharedParameters,
    state_graph: Option<StateGraph>,
    binder: SharedBinder,
    speed: f32,
    activate: bool,
    playing: bool,
    root_bone: Option<String>,
    normalize_weights: bool,
    single_frame_triggers: IndexSet<String>,
    emitter: EventEmitter<AnimComponentEvent>,
}

impl std::fmt::Debug for AnimComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimComponent")
            .field("layers", &self.layers.keys().collect::<Vec<_>>())
            .field("speed", &self.speed)
            .field("playing", &self.playing)
            .field("root_bone", &self.root_bone)
            .finish_non_exhaustive()
    }
}

impl AnimComponent {
    /// Create a component with no layers, writing into `binder`
    pub fn new(binder: SharedBinder, options: AnimComponentOptions) -> Self {
        Self {
            layers: IndexMap::new(),
            parameters: ParameterStore::new().shared(),
            state_graph: None,
            binder,
            speed: options.speed,
            activate: options.activate,
            playing: options.activate,
            root_bone: options.root_bone,
            normalize_weights: options.normalize_weights,
            single_frame_triggers: IndexSet::new(),
            emitter: EventEmitter::new(),
        }
    }

    // ---- Playback ----

    /// Advance every layer by `dt * speed` and write the result to the binder
    pub fn update(&mut self, dt: f32) {
        if !self.playing {
            self.clear_frame_triggers();
            return;
        }

        let dt = dt * self.speed;
        for layer in self.layers.values_mut() {
            layer.update(dt);
        }

        let mut dirty = false;
        for layer in self.layers.values_mut() {
            dirty |= layer.take_weight_dirty();
        }
        self.write_targets(dirty);

        let mut events = Vec::new();
        for (name, layer) in &mut self.layers {
            events.extend(
                layer
                    .take_events()
                    .into_iter()
                    .map(|event| AnimComponentEvent::from_controller(name, event)),
            );
        }
        for event in &events {
            self.emitter.fire(event);
        }

        self.clear_frame_triggers();
    }

    /// Clear single-frame triggers and triggers consumed by transitions
    fn clear_frame_triggers(&mut self) {
        let mut params = self.parameters.write();
        for name in self.single_frame_triggers.drain(..) {
            if let Err(e) = params.set(&name, ParameterValue::Trigger(false)) {
                tracing::warn!("Failed to clear single-frame trigger: {}", e);
            }
        }
        params.reset_consumed_triggers();
    }

    fn write_targets(&self, dirty: bool) {
        let normalized_total: f32 = self
            .layers
            .values()
            .filter(|l| l.normalized_weight())
            .map(AnimComponentLayer::weight)
            .sum();

        let mut binder = self.binder.lock();
        binder.begin_frame();
        for layer in self.layers.values() {
            let weight = if layer.normalized_weight() && normalized_total > 0.0 {
                layer.weight() / normalized_total
            } else {
                layer.weight()
            };
            layer.write_targets(&mut *binder, weight);
        }
        if dirty {
            binder.dirtify();
        }
    }

    /// Whether the component updates
    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Start or pause every layer
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        for layer in self.layers.values_mut() {
            if !playing {
                layer.pause();
            } else if layer.playable() {
                layer.play(None);
            }
        }

        let event = if playing {
            AnimComponentEvent::Play
        } else {
            AnimComponentEvent::Pause
        };
        self.emitter.fire(&event);
    }

    /// Whether every layer has animations bound to all of its states
    pub fn playable(&self) -> bool {
        self.layers.values().all(AnimComponentLayer::playable)
    }

    /// Time scale
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Set the time scale
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Whether clip weights are normalized per target
    pub fn normalize_weights(&self) -> bool {
        self.normalize_weights
    }

    /// Set clip weight normalization on every layer
    pub fn set_normalize_weights(&mut self, normalize: bool) {
        self.normalize_weights = normalize;
        for layer in self.layers.values_mut() {
            layer.controller_mut().set_normalize_weights(normalize);
        }
    }

    /// Node targets are resolved under
    pub fn root_bone(&self) -> Option<&str> {
        self.root_bone.as_deref()
    }

    /// Parameters back to the graph defaults, every layer back to its entry
    pub fn reset(&mut self) {
        if let Some(graph) = &self.state_graph {
            *self.parameters.write() = graph.default_parameters();
        }
        self.single_frame_triggers.clear();
        for layer in self.layers.values_mut() {
            layer.reset();
        }
    }

    /// Drop resolved targets in every layer and in the binder
    pub fn rebind(&mut self) {
        for layer in self.layers.values_mut() {
            layer.rebind();
        }
        self.binder.lock().rebind();
    }

    // ---- State graph ----

    /// Replace the layers and parameters with those of `graph`
    pub fn load_state_graph(&mut self, graph: StateGraph) -> Result<(), GraphError> {
        graph.validate()?;

        *self.parameters.write() = graph.default_parameters();
        self.single_frame_triggers.clear();
        self.layers.clear();
        for data in &graph.layers {
            self.insert_layer(data);
        }

        tracing::info!(
            "Loaded animation state graph: {} layers, {} parameters",
            graph.layers.len(),
            graph.parameters.len()
        );
        self.state_graph = Some(graph);
        Ok(())
    }

    /// Drop the graph, its layers and its parameters
    pub fn remove_state_graph(&mut self) {
        self.state_graph = None;
        self.layers.clear();
        self.parameters.write().clear();
        self.single_frame_triggers.clear();
    }

    /// Loaded state graph
    pub fn state_graph(&self) -> Option<&StateGraph> {
        self.state_graph.as_ref()
    }

    fn insert_layer(&mut self, data: &LayerData) -> &mut AnimComponentLayer {
        let mut controller =
            AnimController::from_layer_data(data, self.parameters.clone(), self.activate);
        controller.set_normalize_weights(self.normalize_weights);
        let options = LayerOptions {
            weight: data.weight,
            blend_type: data.blend_type,
            normalized_weight: data.normalized_weight,
            mask: data.mask.clone(),
        };
        let layer = AnimComponentLayer::new(&data.name, controller, options, self.root_bone.clone());
        self.layers.entry(data.name.clone()).or_insert(layer)
    }

    // ---- Layers ----

    /// Add an empty layer. Adding a name that exists returns the existing
    /// layer untouched.
    pub fn add_layer(&mut self, name: &str, options: LayerOptions) -> &mut AnimComponentLayer {
        if let Some(index) = self.layers.get_index_of(name) {
            tracing::debug!("Animation layer {} already exists", name);
            return &mut self.layers[index];
        }

        let data = LayerData {
            blend_type: options.blend_type,
            weight: options.weight,
            mask: options.mask.clone(),
            normalized_weight: options.normalized_weight,
            ..LayerData::new(name)
        };
        if let Some(graph) = &mut self.state_graph {
            graph.layers.push(data.clone());
        }

        self.insert_layer(&data)
    }

    /// Layers in update order
    pub fn layers(&self) -> impl Iterator<Item = &AnimComponentLayer> {
        self.layers.values()
    }

    /// Find a layer by name
    pub fn find_animation_layer(&self, name: &str) -> Option<&AnimComponentLayer> {
        self.layers.get(name)
    }

    /// Find a layer by name
    pub fn find_animation_layer_mut(&mut self, name: &str) -> Option<&mut AnimComponentLayer> {
        self.layers.get_mut(name)
    }

    /// The first layer
    pub fn base_layer(&self) -> Option<&AnimComponentLayer> {
        self.layers.first().map(|(_, layer)| layer)
    }

    /// Bind `track` to `node_path` in `layer` (the base layer by default).
    ///
    /// Without a state graph, a missing layer is created on the fly.
    pub fn assign_animation(
        &mut self,
        node_path: &str,
        track: Arc<AnimTrack>,
        layer: Option<&str>,
        speed: Option<f32>,
        looping: Option<bool>,
    ) {
        let layer_name = layer.unwrap_or(BASE_LAYER);
        if !self.layers.contains_key(layer_name) {
            if self.state_graph.is_some() {
                tracing::error!(
                    "Cannot assign animation {}: no layer named {}",
                    node_path,
                    layer_name
                );
                return;
            }
            self.add_layer(layer_name, LayerOptions::default());
        }

        if let Some(layer) = self.layers.get_mut(layer_name) {
            layer.assign_animation(node_path, track, speed, looping);
        }
    }

    /// Unbind every animation of state `node` in `layer` (the base layer by
    /// default)
    pub fn remove_node_animations(&mut self, node: &str, layer: Option<&str>) {
        let layer_name = layer.unwrap_or(BASE_LAYER);
        match self.layers.get_mut(layer_name) {
            Some(layer) => layer.remove_node_animations(node),
            None => tracing::error!("Cannot remove animations: no layer named {}", layer_name),
        }
    }

    // ---- Parameters ----

    /// Shared parameter store
    pub fn parameters(&self) -> &SharedParameters {
        &self.parameters
    }

    fn get_parameter(&self, name: &str, kind: ParameterType) -> Option<ParameterValue> {
        match self.parameters.read().get_typed(name, kind) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Failed to read animation parameter: {}", e);
                None
            }
        }
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> bool {
        match self.parameters.write().set(name, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to set animation parameter: {}", e);
                false
            }
        }
    }

    /// Value of float parameter `name`
    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.get_parameter(name, ParameterType::Float)? {
            ParameterValue::Float(value) => Some(value),
            _ => None,
        }
    }

    /// Set float parameter `name`
    pub fn set_float(&mut self, name: &str, value: f32) {
        self.set_parameter(name, ParameterValue::Float(value));
    }

    /// Value of integer parameter `name`
    pub fn get_integer(&self, name: &str) -> Option<i32> {
        match self.get_parameter(name, ParameterType::Integer)? {
            ParameterValue::Integer(value) => Some(value),
            _ => None,
        }
    }

    /// Set integer parameter `name`. Fractional or out-of-range values are
    /// rejected.
    pub fn set_integer(&mut self, name: &str, value: impl Into<f64>) {
        let value = value.into();
        if self.get_parameter(name, ParameterType::Integer).is_none() {
            return;
        }
        if value.fract() != 0.0 || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
            let e = ParameterError::NotIntegral {
                name: name.to_string(),
                value,
            };
            tracing::error!("Failed to set animation parameter: {}", e);
            return;
        }
        self.set_parameter(name, ParameterValue::Integer(value as i32));
    }

    /// Value of boolean parameter `name`
    pub fn get_boolean(&self, name: &str) -> Option<bool> {
        match self.get_parameter(name, ParameterType::Boolean)? {
            ParameterValue::Boolean(value) => Some(value),
            _ => None,
        }
    }

    /// Set boolean parameter `name`
    pub fn set_boolean(&mut self, name: &str, value: bool) {
        self.set_parameter(name, ParameterValue::Boolean(value));
    }

    /// Whether trigger `name` is set
    pub fn get_trigger(&self, name: &str) -> Option<bool> {
        match self.get_parameter(name, ParameterType::Trigger)? {
            ParameterValue::Trigger(value) => Some(value),
            _ => None,
        }
    }

    /// Set trigger `name`. A single-frame trigger is cleared at the end of
    /// the next update whether or not a transition consumed it, including an
    /// update made while paused.
    pub fn set_trigger(&mut self, name: &str, single_frame: bool) {
        if self.set_parameter(name, ParameterValue::Trigger(true)) && single_frame {
            self.single_frame_triggers.insert(name.to_string());
        }
    }

    /// Clear trigger `name`
    pub fn reset_trigger(&mut self, name: &str) {
        self.set_parameter(name, ParameterValue::Trigger(false));
    }

    // ---- Events ----

    /// Subscribe to every event
    pub fn on(&self, handler: impl Fn(&AnimComponentEvent) + Send + Sync + 'static) -> ListenerId {
        self.emitter.on(handler)
    }

    /// Subscribe to the next event only
    pub fn once(&self, handler: impl Fn(&AnimComponentEvent) + Send + Sync + 'static) -> ListenerId {
        self.emitter.once(handler)
    }

    /// Unsubscribe
    pub fn off(&self, id: ListenerId) -> bool {
        self.emitter.off(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_anim_track::{
        AnimCurve, AnimData, AnimEvents, InterpolationMode, PropertyBinder,
    };

    fn curve(node: &str, property: &str) -> AnimCurve {
        AnimCurve {
            node: node.to_string(),
            property: property.to_string(),
            input: 0,
            output: 0,
            interpolation: InterpolationMode::Linear,
            quaternion: false,
        }
    }

    fn track(name: &str, duration: f32, node: &str, from: f32, to: f32) -> Arc<AnimTrack> {
        Arc::new(
            AnimTrack::new(
                name,
                duration,
                vec![AnimData::times(vec![0.0, duration])],
                vec![AnimData::new(1, vec![from, to])],
                vec![curve(node, "x")],
                AnimEvents::default(),
            )
            .unwrap(),
        )
    }

    fn component() -> (AnimComponent, Arc<Mutex<PropertyBinder>>) {
        let binder = Arc::new(Mutex::new(PropertyBinder::new()));
        let shared: SharedBinder = binder.clone();
        (AnimComponent::new(shared, AnimComponentOptions::default()), binder)
    }

    const TWO_LAYERS: &str = r#"{
        "layers": [
            {
                "name": "Base",
                "states": [{ "name": "Idle", "loop": true }],
                "transitions": [{ "from": "START", "to": "Idle" }]
            },
            {
                "name": "Overlay",
                "states": [{ "name": "Wave", "loop": false }],
                "transitions": [{ "from": "START", "to": "Wave" }]
            }
        ],
        "parameters": {
            "count": { "type": "integer", "value": 1 },
            "jump": { "type": "trigger", "value": false }
        }
    }"#;

    #[test]
    fn test_two_layer_scenario() {
        let (mut component, binder) = component();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        component.on(move |e| sink.lock().push(e.clone()));

        component
            .load_state_graph(StateGraph::from_json(TWO_LAYERS).unwrap())
            .unwrap();
        assert!(!component.playable());

        component.assign_animation("Idle", track("idle", 2.0, "Hips", 3.0, 3.0), None, None, None);
        component.assign_animation("Wave", track("wave", 1.0, "Arm", 0.0, 1.0), Some("Overlay"), None, None);
        assert!(component.playable());

        let overlay = component.find_animation_layer_mut("Overlay").unwrap();
        assert_eq!(overlay.active_state(), "Wave");
        overlay.set_weight(0.0);
        overlay.blend_to_weight(1.0, 0.5);

        for _ in 0..5 {
            component.update(0.1);
        }
        let overlay = component.find_animation_layer("Overlay").unwrap();
        assert_eq!(overlay.weight(), 1.0);
        assert!(!overlay.blending());
        assert!((overlay.active_state_progress() - 0.5).abs() < 1e-5);

        for _ in 0..6 {
            component.update(0.1);
        }
        let overlay = component.find_animation_layer("Overlay").unwrap();
        assert_eq!(overlay.active_state_progress(), 1.0);
        assert_eq!(component.base_layer().unwrap().active_state(), "Idle");

        {
            let binder = binder.lock();
            assert_eq!(binder.value("Hips", "x"), Some(&[3.0][..]));
            assert_eq!(binder.value("Arm", "x"), Some(&[1.0][..]));
        }

        let events = events.lock();
        assert!(events.contains(&AnimComponentEvent::StateChanged {
            layer: "Base".to_string(),
            from: "START".to_string(),
            to: "Idle".to_string(),
        }));
        let ends = events
            .iter()
            .filter(|e| matches!(e, AnimComponentEvent::End { layer, .. } if layer == "Overlay"))
            .count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn test_weight_change_dirtifies_binder() {
        let (mut component, binder) = component();
        component.assign_animation("Idle", AnimTrack::empty(), None, None, None);
        component.update(0.1);
        assert!(!binder.lock().take_dirty());

        component.find_animation_layer_mut(BASE_LAYER).unwrap().set_weight(0.5);
        component.update(0.1);
        assert!(binder.lock().take_dirty());
    }

    #[test]
    fn test_integer_guard() {
        let (mut component, _) = component();
        component
            .load_state_graph(StateGraph::from_json(TWO_LAYERS).unwrap())
            .unwrap();

        component.set_integer("count", 2.5);
        assert_eq!(component.get_integer("count"), Some(1));

        component.set_integer("count", 3);
        assert_eq!(component.get_integer("count"), Some(3));

        component.set_float("count", 1.0);
        assert_eq!(component.get_integer("count"), Some(3));
        assert_eq!(component.get_float("count"), None);
        assert_eq!(component.get_boolean("missing"), None);
    }

    #[test]
    fn test_single_frame_trigger_clears_after_update() {
        let (mut component, _) = component();
        component
            .load_state_graph(StateGraph::from_json(TWO_LAYERS).unwrap())
            .unwrap();

        component.set_trigger("jump", false);
        component.update(0.1);
        assert_eq!(component.get_trigger("jump"), Some(true));

        component.reset_trigger("jump");
        component.set_trigger("jump", true);
        assert_eq!(component.get_trigger("jump"), Some(true));
        component.update(0.1);
        assert_eq!(component.get_trigger("jump"), Some(false));
    }

    #[test]
    fn test_single_frame_trigger_clears_while_paused() {
        let (mut component, _) = component();
        component
            .load_state_graph(StateGraph::from_json(TWO_LAYERS).unwrap())
            .unwrap();
        component.set_playing(false);

        component.set_trigger("jump", true);
        component.update(0.1);
        assert_eq!(component.get_trigger("jump"), Some(false));

        // Plain triggers survive a paused frame
        component.set_trigger("jump", false);
        component.update(0.1);
        assert_eq!(component.get_trigger("jump"), Some(true));
    }

    #[test]
    fn test_graph_layers_keep_normalized_weight() {
        let (mut component, binder) = component();
        let graph = TWO_LAYERS.replace(
            "\"name\": \"Overlay\",",
            "\"name\": \"Overlay\", \"normalizedWeight\": true,",
        );
        component
            .load_state_graph(StateGraph::from_json(&graph).unwrap())
            .unwrap();
        assert!(!component.base_layer().unwrap().normalized_weight());
        assert!(component.find_animation_layer("Overlay").unwrap().normalized_weight());

        component.add_layer("Upper", LayerOptions { normalized_weight: true, ..LayerOptions::default() });
        assert!(component.state_graph().unwrap().layer("Upper").unwrap().normalized_weight);

        component.assign_animation("Idle", track("idle", 1.0, "Root", 2.0, 2.0), None, None, None);
        component.assign_animation("Wave", track("wave", 1.0, "Root", 4.0, 4.0), Some("Overlay"), None, None);
        component.assign_animation("Lift", track("lift", 1.0, "Root", 8.0, 8.0), Some("Upper"), None, None);
        component.update(0.1);

        // Base writes 2, then Overlay and Upper each write at 0.5: 3, then 5.5
        assert_eq!(binder.lock().value("Root", "x"), Some(&[5.5][..]));
    }

    #[test]
    fn test_add_layer_is_idempotent() {
        let (mut component, _) = component();
        component.add_layer("Upper", LayerOptions::default());
        component
            .add_layer("Upper", LayerOptions { weight: 0.25, ..LayerOptions::default() });

        assert_eq!(component.layers().count(), 1);
        assert_eq!(component.find_animation_layer("Upper").unwrap().weight(), 1.0);
    }

    #[test]
    fn test_assign_without_graph_creates_base_layer() {
        let (mut component, _) = component();
        component.assign_animation("Idle", AnimTrack::empty(), None, None, None);

        let base = component.base_layer().unwrap();
        assert_eq!(base.name(), BASE_LAYER);
        assert!(base.playing());
        assert_eq!(base.active_state(), "Idle");
    }

    #[test]
    fn test_assign_to_unknown_layer_with_graph_is_rejected() {
        let (mut component, _) = component();
        component
            .load_state_graph(StateGraph::from_json(TWO_LAYERS).unwrap())
            .unwrap();
        component.assign_animation("Idle", AnimTrack::empty(), Some("Legs"), None, None);
        assert!(component.find_animation_layer("Legs").is_none());
    }

    #[test]
    fn test_set_playing_fires_events() {
        let (mut component, _) = component();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        component.on(move |e| sink.lock().push(e.clone()));

        component.assign_animation("Idle", AnimTrack::empty(), None, None, None);
        component.set_playing(false);
        assert!(!component.base_layer().unwrap().playing());
        component.update(0.1);
        assert_eq!(component.base_layer().unwrap().active_state_current_time(), 0.0);

        component.set_playing(true);
        assert!(component.base_layer().unwrap().playing());
        let events = events.lock();
        assert_eq!(
            events.as_slice(),
            &[AnimComponentEvent::Pause, AnimComponentEvent::Play]
        );
    }

    #[test]
    fn test_normalized_layer_weights() {
        let (mut component, binder) = component();
        for (layer, value) in [("A", 2.0), ("B", 4.0)] {
            component.add_layer(
                layer,
                LayerOptions { normalized_weight: true, ..LayerOptions::default() },
            );
            component.assign_animation("Pose", track("pose", 1.0, "Root", value, value), Some(layer), None, None);
        }
        component.update(0.1);

        // Each layer writes at 0.5: A takes 0 to 1, B takes 1 to 2.5
        assert_eq!(binder.lock().value("Root", "x"), Some(&[2.5][..]));
    }

    #[test]
    fn test_reset_restores_graph_defaults() {
        let (mut component, _) = component();
        component
            .load_state_graph(StateGraph::from_json(TWO_LAYERS).unwrap())
            .unwrap();
        component.set_integer("count", 7);
        component.reset();
        assert_eq!(component.get_integer("count"), Some(1));
    }
}
