// SPDX-License-Identifier: MIT OR Apache-2.0
//! One weighted animation layer of a component.

use ordoplay_anim_graph::{is_reserved, AnimController, AnimTransition, ControllerEvent};
use ordoplay_anim_track::{AnimBinder, AnimBlendType, AnimMask, AnimTrack, Interpolation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Construction options for a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerOptions {
    /// Initial weight
    pub weight: f32,
    /// How the layer combines with the layers below it
    pub blend_type: AnimBlendType,
    /// Whether the weight is divided by the sum of all normalized layers
    pub normalized_weight: bool,
    /// Nodes the layer may animate; all when `None`
    pub mask: Option<AnimMask>,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            weight: 1.0,
            blend_type: AnimBlendType::Overwrite,
            normalized_weight: false,
            mask: None,
        }
    }
}

/// In-flight layer weight crossfade. All fields are zero when idle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightBlend {
    /// Length of the crossfade in seconds
    pub duration: f32,
    /// Seconds elapsed
    pub elapsed: f32,
    /// Weight when the crossfade started
    pub start_weight: f32,
    /// Weight at the end
    pub target_weight: f32,
}

/// A controller plus the weight it contributes with
#[derive(Debug)]
pub struct AnimComponentLayer {
    name: String,
    controller: AnimController,
    weight: f32,
    blend_type: AnimBlendType,
    normalized_weight: bool,
    mask: Option<AnimMask>,
    blend: WeightBlend,
    blending: bool,
    weight_dirty: bool,
    root: Option<String>,
}

impl AnimComponentLayer {
    /// Wrap `controller`. Targets are written under `root` when set.
    pub fn new(
        name: impl Into<String>,
        mut controller: AnimController,
        options: LayerOptions,
        root: Option<String>,
    ) -> Self {
        controller.assign_mask(options.mask.clone());
        Self {
            name: name.into(),
            controller,
            weight: options.weight,
            blend_type: options.blend_type,
            normalized_weight: options.normalized_weight,
            mask: options.mask,
            blend: WeightBlend::default(),
            blending: false,
            weight_dirty: false,
            root,
        }
    }

    /// Layer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The layer's state machine
    pub fn controller(&self) -> &AnimController {
        &self.controller
    }

    /// The layer's state machine
    pub fn controller_mut(&mut self) -> &mut AnimController {
        &mut self.controller
    }

    /// Current weight
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Set the weight; targets are marked stale
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
        self.weight_dirty = true;
    }

    /// Whether the weight changed since the last call
    pub fn take_weight_dirty(&mut self) -> bool {
        std::mem::take(&mut self.weight_dirty)
    }

    /// Fade the weight to `weight` over `time` seconds, replacing any fade
    /// in progress. A non-positive `time` snaps on the next update.
    pub fn blend_to_weight(&mut self, weight: f32, time: f32) {
        self.blend = WeightBlend {
            duration: time.max(0.0),
            elapsed: 0.0,
            start_weight: self.weight,
            target_weight: weight,
        };
        self.blending = true;
    }

    /// Current crossfade state
    pub fn weight_blend(&self) -> WeightBlend {
        self.blend
    }

    /// Whether a weight crossfade is running
    pub fn blending(&self) -> bool {
        self.blending
    }

    /// How this layer combines with those below it
    pub fn blend_type(&self) -> AnimBlendType {
        self.blend_type
    }

    /// Whether the weight takes part in normalization
    pub fn normalized_weight(&self) -> bool {
        self.normalized_weight
    }

    /// Current mask
    pub fn mask(&self) -> Option<&AnimMask> {
        self.mask.as_ref()
    }

    /// Replace the mask. Returns whether targets must be rebound.
    pub fn assign_mask(&mut self, mask: Option<AnimMask>) -> bool {
        self.mask.clone_from(&mask);
        self.controller.assign_mask(mask)
    }

    /// Root node targets are written under
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Start playing, optionally jumping to state `name`
    pub fn play(&mut self, name: Option<&str>) {
        self.controller.play(name);
    }

    /// Pause playback
    pub fn pause(&mut self) {
        self.controller.pause();
    }

    /// Return to the entry state, staying in the current play state
    pub fn reset(&mut self) {
        let playing = self.controller.playing();
        self.controller.reset();
        self.controller.set_playing(playing);
    }

    /// Forget resolved targets
    pub fn rebind(&mut self) {
        self.controller.rebind();
    }

    /// Whether the layer is playing
    pub fn playing(&self) -> bool {
        self.controller.playing()
    }

    /// Start or stop playback
    pub fn set_playing(&mut self, playing: bool) {
        self.controller.set_playing(playing);
    }

    /// Whether every state has animations bound
    pub fn playable(&self) -> bool {
        self.controller.playable()
    }

    /// Active state name
    pub fn active_state(&self) -> &str {
        self.controller.active_state()
    }

    /// Previous state name
    pub fn previous_state(&self) -> Option<&str> {
        self.controller.previous_state()
    }

    /// Normalized progress through the active state
    pub fn active_state_progress(&self) -> f32 {
        self.controller.active_state_progress()
    }

    /// Active state length in seconds
    pub fn active_state_duration(&self) -> f32 {
        self.controller.active_state_duration()
    }

    /// Seconds spent in the active state
    pub fn active_state_current_time(&self) -> f32 {
        self.controller.active_state_current_time()
    }

    /// Seek the active state
    pub fn set_active_state_current_time(&mut self, time: f32) {
        self.controller.set_active_state_current_time(time);
    }

    /// Whether a state crossfade is running
    pub fn transitioning(&self) -> bool {
        self.controller.transitioning()
    }

    /// State crossfade progress
    pub fn transition_progress(&self) -> Option<f32> {
        self.controller.transition_progress()
    }

    /// Authored state names
    pub fn states(&self) -> Vec<&str> {
        self.controller.states()
    }

    /// Bind `track` to `node_path` (`State` or `State.Child`).
    ///
    /// Invalid input is logged and ignored. The layer gets an entry edge into
    /// the state if it has none yet.
    pub fn assign_animation(
        &mut self,
        node_path: &str,
        track: Arc<AnimTrack>,
        speed: Option<f32>,
        looping: Option<bool>,
    ) {
        let state = node_path.split_once('.').map_or(node_path, |(state, _)| state);
        if state.is_empty() {
            tracing::error!("Layer {}: cannot assign an animation to an empty node path", self.name);
            return;
        }
        if is_reserved(state) {
            tracing::error!("Layer {}: cannot assign an animation to reserved state {}", self.name, state);
            return;
        }
        let duration = track.duration();
        if !duration.is_finite() || duration < 0.0 {
            tracing::error!(
                "Layer {}: track {} has invalid duration {}",
                self.name,
                track.name(),
                duration
            );
            return;
        }

        self.controller.ensure_entry_transition(state);
        self.controller.assign_animation(node_path, track, speed, looping);
    }

    /// Unbind every animation of state `node`, pausing if it was playing
    pub fn remove_node_animations(&mut self, node: &str) {
        if self.controller.remove_node_animations(node) {
            self.controller.pause();
        }
    }

    /// Crossfade from the active state to `to` over `time` seconds
    pub fn transition(&mut self, to: &str, time: f32, transition_offset: Option<f32>) {
        let mut transition = AnimTransition::new(self.controller.active_state(), to).with_time(time);
        transition.transition_offset = transition_offset;
        self.controller.update_state_from_transition(&transition);
    }

    /// Advance the weight crossfade, then the controller
    pub fn update(&mut self, dt: f32) {
        if self.blending {
            self.blend.elapsed += dt;
            if self.blend.elapsed >= self.blend.duration {
                self.set_weight(self.blend.target_weight);
                self.blend = WeightBlend::default();
                self.blending = false;
            } else {
                let t = self.blend.elapsed / self.blend.duration;
                self.set_weight(Interpolation::lerp(
                    self.blend.start_weight,
                    self.blend.target_weight,
                    t,
                ));
            }
        }

        self.controller.update(dt);
    }

    /// Write the blended output into `binder` at `weight`
    pub fn write_targets<B: AnimBinder + ?Sized>(&self, binder: &mut B, weight: f32) {
        if weight <= 0.0 {
            return;
        }

        let normalize = self.controller.normalize_weights();
        for (node, property, blended) in self.controller.evaluator().outputs() {
            let coverage = if normalize { 1.0 } else { blended.weight.min(1.0) };
            let path = match &self.root {
                Some(root) => format!("{root}/{node}"),
                None => node.to_string(),
            };
            binder.write(&path, property, &blended.value, weight * coverage, self.blend_type);
        }
    }

    /// Drain controller events
    pub fn take_events(&mut self) -> Vec<ControllerEvent> {
        self.controller.take_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_anim_graph::ParameterStore;
    use ordoplay_anim_track::PropertyBinder;

    fn layer() -> AnimComponentLayer {
        let controller = AnimController::new(ParameterStore::new().shared(), true);
        AnimComponentLayer::new("Base", controller, LayerOptions::default(), None)
    }

    #[test]
    fn test_blend_to_weight_boundary() {
        let mut layer = layer();
        layer.set_weight(0.0);
        layer.take_weight_dirty();

        layer.blend_to_weight(1.0, 2.0);
        assert_eq!(layer.weight(), 0.0);

        layer.update(1.0);
        assert_eq!(layer.weight(), 0.5);
        assert!(layer.blending());
        assert!(layer.take_weight_dirty());

        layer.update(1.0);
        assert_eq!(layer.weight(), 1.0);
        assert!(!layer.blending());
        assert_eq!(layer.weight_blend(), WeightBlend::default());
    }

    #[test]
    fn test_blend_override_starts_from_current_weight() {
        let mut layer = layer();
        layer.blend_to_weight(0.0, 1.0);
        layer.update(0.5);
        assert_eq!(layer.weight(), 0.5);

        layer.blend_to_weight(1.0, 1.0);
        assert_eq!(layer.weight_blend().start_weight, 0.5);
        layer.update(0.5);
        assert_eq!(layer.weight(), 0.75);
    }

    #[test]
    fn test_zero_time_blend_snaps_on_next_update() {
        let mut layer = layer();
        layer.blend_to_weight(0.25, 0.0);
        assert_eq!(layer.weight(), 1.0);
        layer.update(0.0);
        assert_eq!(layer.weight(), 0.25);
        assert!(!layer.blending());
    }

    #[test]
    fn test_assign_animation_rejects_invalid_input() {
        let mut layer = layer();
        layer.assign_animation("", AnimTrack::empty(), None, None);
        layer.assign_animation("START", AnimTrack::empty(), None, None);
        layer.assign_animation("ANY.Child", AnimTrack::empty(), None, None);
        assert!(layer.states().is_empty());
        assert!(layer.controller().transitions().is_empty());
    }

    #[test]
    fn test_first_assignment_adds_entry_and_plays() {
        let mut layer = layer();
        layer.assign_animation("Idle", AnimTrack::empty(), None, None);

        assert_eq!(layer.states(), vec!["Idle"]);
        assert_eq!(layer.controller().transitions().len(), 1);
        assert!(layer.playing());
        assert_eq!(layer.active_state(), "Idle");

        layer.assign_animation("Wave", AnimTrack::empty(), None, None);
        assert_eq!(layer.controller().transitions().len(), 1);
    }

    #[test]
    fn test_reset_keeps_playing_flag() {
        let mut layer = layer();
        layer.assign_animation("Idle", AnimTrack::empty(), None, None);
        layer.update(0.5);
        layer.reset();
        assert!(layer.playing());
        assert_eq!(layer.active_state(), "Idle");
        assert_eq!(layer.active_state_current_time(), 0.0);

        layer.pause();
        layer.reset();
        assert!(!layer.playing());
        assert_eq!(layer.active_state(), "START");
    }

    #[test]
    fn test_remove_active_animations_pauses() {
        let mut layer = layer();
        layer.assign_animation("Idle", AnimTrack::empty(), None, None);
        layer.remove_node_animations("Idle");
        assert!(!layer.playing());
        assert!(!layer.playable());
    }

    #[test]
    fn test_transition_crossfades_from_active() {
        let mut layer = layer();
        layer.assign_animation("Idle", AnimTrack::empty(), None, None);
        layer.assign_animation("Run", AnimTrack::empty(), None, None);
        layer.update(0.1);

        layer.transition("Run", 0.5, None);
        assert_eq!(layer.active_state(), "Run");
        assert_eq!(layer.previous_state(), Some("Idle"));
        assert!(layer.transitioning());
        assert_eq!(layer.transition_progress(), Some(0.0));
    }

    #[test]
    fn test_write_targets_under_root() {
        use ordoplay_anim_track::{AnimCurve, AnimData, AnimEvents, InterpolationMode};

        let track = AnimTrack::new(
            "raise",
            1.0,
            vec![AnimData::times(vec![0.0, 1.0])],
            vec![AnimData::new(1, vec![2.0, 2.0])],
            vec![AnimCurve {
                node: "Arm".to_string(),
                property: "height".to_string(),
                input: 0,
                output: 0,
                interpolation: InterpolationMode::Linear,
                quaternion: false,
            }],
            AnimEvents::default(),
        )
        .unwrap();

        let controller = AnimController::new(ParameterStore::new().shared(), true);
        let mut layer = AnimComponentLayer::new(
            "Upper",
            controller,
            LayerOptions::default(),
            Some("Rig".to_string()),
        );
        layer.assign_animation("Raise", Arc::new(track), None, None);
        layer.update(0.1);

        let mut binder = PropertyBinder::new();
        binder.begin_frame();
        layer.write_targets(&mut binder, 0.5);
        assert_eq!(binder.value("Rig/Arm", "height"), Some(&[1.0][..]));
    }
}
