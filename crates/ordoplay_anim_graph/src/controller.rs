// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-layer state machine driving an [`AnimEvaluator`].
//!
//! The controller owns the states and transitions of one layer. Each update
//! it advances time in the active state, takes at most one eligible
//! transition, crossfades clip weights between the outgoing and incoming
//! states, then lets the evaluator advance and blend every clip.

use crate::evaluator::{AnimClip, AnimEvaluator, ClipEvent};
use crate::graph::LayerData;
use crate::parameter::SharedParameters;
use crate::state::{is_reserved, AnimState, ANY, END, START};
use crate::transition::{self, AnimTransition};
use indexmap::IndexMap;
use ordoplay_anim_track::{AnimMask, AnimTrack};
use std::sync::Arc;

/// Something the controller reports back to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// The active state changed
    StateChanged {
        /// State left
        from: String,
        /// State entered
        to: String,
    },
    /// A clip crossed a timeline event, looped or ended
    Clip(ClipEvent),
}

/// A state being faded out, with the weight it had when it was left
#[derive(Debug, Clone)]
struct PreviousState {
    name: String,
    weight: f32,
}

/// State machine for one animation layer
#[derive(Debug)]
pub struct AnimController {
    states: IndexMap<String, AnimState>,
    transitions: Vec<AnimTransition>,
    parameters: SharedParameters,
    evaluator: AnimEvaluator,
    activate: bool,
    playing: bool,
    active_state: String,
    previous_state: Option<String>,
    time_in_state: f32,
    time_in_state_before: f32,
    transitioning: bool,
    total_transition_time: f32,
    current_transition_time: f32,
    transition_previous_states: Vec<PreviousState>,
    normalize_weights: bool,
    events: Vec<ControllerEvent>,
}

impl AnimController {
    /// Create a controller holding only the pseudo-states.
    ///
    /// With `activate` set, the controller starts playing as soon as every
    /// state has animations bound.
    pub fn new(parameters: SharedParameters, activate: bool) -> Self {
        let mut states = IndexMap::new();
        for name in [START, END, ANY] {
            states.insert(name.to_string(), AnimState::new(name, 1.0, false, None));
        }

        Self {
            states,
            transitions: Vec::new(),
            parameters,
            evaluator: AnimEvaluator::new(),
            activate,
            playing: false,
            active_state: START.to_string(),
            previous_state: None,
            time_in_state: 0.0,
            time_in_state_before: 0.0,
            transitioning: false,
            total_transition_time: 1.0,
            current_transition_time: 1.0,
            transition_previous_states: Vec::new(),
            normalize_weights: false,
            events: Vec::new(),
        }
    }

    /// Build a controller from an authored layer
    pub fn from_layer_data(data: &LayerData, parameters: SharedParameters, activate: bool) -> Self {
        let mut controller = Self::new(parameters, activate);
        for state in &data.states {
            controller.states.insert(
                state.name.clone(),
                AnimState::new(&state.name, state.speed, state.looping, state.blend_tree.clone()),
            );
        }
        controller.transitions = data.transitions.clone();
        if let Some(default) = data.default_state() {
            controller.ensure_entry_transition(default);
        }
        controller
    }

    /// Whether the controller advances on update
    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Start or stop playback
    pub fn set_playing(&mut self, playing: bool) {
        if playing {
            self.play(None);
        } else {
            self.pause();
        }
    }

    /// Whether every state has what it needs to play
    pub fn playable(&self) -> bool {
        self.states.values().all(AnimState::playable)
    }

    /// Name of the active state
    pub fn active_state(&self) -> &str {
        &self.active_state
    }

    /// Name of the state the last transition came from
    pub fn previous_state(&self) -> Option<&str> {
        self.previous_state.as_deref()
    }

    /// Normalized time in the active state. Looping states keep counting
    /// past 1.0; one-shot states stop at 1.0.
    pub fn active_state_progress(&self) -> f32 {
        self.progress_for_time(self.time_in_state)
    }

    /// Length of the active state in seconds
    pub fn active_state_duration(&self) -> f32 {
        if is_reserved(&self.active_state) {
            return 0.0;
        }
        self.states
            .get(&self.active_state)
            .map_or(0.0, AnimState::duration)
    }

    /// Seconds spent in the active state
    pub fn active_state_current_time(&self) -> f32 {
        self.time_in_state
    }

    /// Seek the active state. While paused the evaluator is refreshed so
    /// targets show the new time right away.
    pub fn set_active_state_current_time(&mut self, time: f32) {
        self.time_in_state_before = time;
        self.time_in_state = time;
        if let Some(state) = self.states.get(&self.active_state) {
            for animation in state.animations() {
                if let Some(clip) = self.evaluator.find_clip_mut(&animation.name) {
                    clip.set_time(time);
                }
            }
        }

        if !self.playing {
            self.evaluator.update(0.0);
        }
    }

    /// Whether a crossfade between states is running
    pub fn transitioning(&self) -> bool {
        self.transitioning
    }

    /// Crossfade progress in `[0, 1]`, or `None` when not transitioning
    pub fn transition_progress(&self) -> Option<f32> {
        self.transitioning.then(|| self.interpolated_transition_time().min(1.0))
    }

    /// Names of the authored states, pseudo-states excluded
    pub fn states(&self) -> Vec<&str> {
        self.states
            .keys()
            .map(String::as_str)
            .filter(|name| !is_reserved(name))
            .collect()
    }

    /// Look up a state
    pub fn state(&self, name: &str) -> Option<&AnimState> {
        self.states.get(name)
    }

    /// Transitions in authored order
    pub fn transitions(&self) -> &[AnimTransition] {
        &self.transitions
    }

    /// Whether clip weights are normalized to full coverage per target
    pub fn normalize_weights(&self) -> bool {
        self.normalize_weights
    }

    /// Set weight normalization
    pub fn set_normalize_weights(&mut self, normalize: bool) {
        self.normalize_weights = normalize;
    }

    /// Clip evaluator
    pub fn evaluator(&self) -> &AnimEvaluator {
        &self.evaluator
    }

    /// Shared parameters read by conditions
    pub fn parameters(&self) -> &SharedParameters {
        &self.parameters
    }

    /// Drain events produced since the last call
    pub fn take_events(&mut self) -> Vec<ControllerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Start playing, optionally jumping to `state` first.
    ///
    /// Entry edges are taken here rather than on the first update, so the
    /// first tick already advances the entered state.
    pub fn play(&mut self, state: Option<&str>) {
        if let Some(name) = state {
            self.transition_to_state(name);
        }
        self.playing = true;

        if self.active_state == START {
            if let Some(entry) = self.find_transition(None, None) {
                self.update_state_from_transition(&entry);
            }
        }
    }

    /// Stop advancing; clips hold their pose
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Return to `START`, stopped, with no clips
    pub fn reset(&mut self) {
        self.previous_state = None;
        self.active_state = START.to_string();
        self.playing = false;
        self.current_transition_time = 1.0;
        self.total_transition_time = 1.0;
        self.transitioning = false;
        self.time_in_state = 0.0;
        self.time_in_state_before = 0.0;
        self.transition_previous_states.clear();
        self.evaluator.remove_clips();
    }

    /// Forget resolved targets
    pub fn rebind(&mut self) {
        self.evaluator.rebind();
    }

    /// Replace the layer mask. Returns whether targets must be rebound.
    pub fn assign_mask(&mut self, mask: Option<AnimMask>) -> bool {
        self.evaluator.assign_mask(mask)
    }

    /// Bind `track` to `path` (`State` or `State.Child`), creating the state
    /// when it does not exist yet
    pub fn assign_animation(
        &mut self,
        path: &str,
        track: Arc<AnimTrack>,
        speed: Option<f32>,
        looping: Option<bool>,
    ) {
        let state_name = path.split_once('.').map_or(path, |(state, _)| state);
        let state = self
            .states
            .entry(state_name.to_string())
            .or_insert_with(|| AnimState::new(state_name, speed.unwrap_or(1.0), true, None));

        state.add_animation(path, track.clone());
        if let Some(speed) = speed {
            state.speed = speed;
        }
        if let Some(looping) = looping {
            state.looping = looping;
        }
        self.evaluator.update_clip_track(path, &track);

        if !self.playing && self.activate && self.playable() {
            self.play(None);
        }
    }

    /// Unbind every animation of state `node`.
    ///
    /// Returns `true` when that state was playing, in which case the owner
    /// should stop playback.
    pub fn remove_node_animations(&mut self, node: &str) -> bool {
        if is_reserved(node) {
            tracing::error!("Cannot remove animations from reserved state {}", node);
            return false;
        }
        let Some(state) = self.states.get_mut(node) else {
            tracing::error!("Cannot remove animations from unknown state {}", node);
            return false;
        };

        for animation in state.animations() {
            self.evaluator.remove_clip_named(&animation.name);
        }
        state.clear_animations();

        self.playing && self.active_state == node
    }

    /// Add `START -> default_state` if the graph has no entry edge
    pub fn ensure_entry_transition(&mut self, default_state: &str) -> bool {
        transition::ensure_entry_transition(&mut self.transitions, default_state)
    }

    /// Append a transition
    pub fn add_transition(&mut self, transition: AnimTransition) {
        self.transitions.push(transition);
    }

    /// Advance by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        if !self.playing {
            return;
        }

        let speed = self.states.get(&self.active_state).map_or(1.0, |s| s.speed);
        self.time_in_state_before = self.time_in_state;
        self.time_in_state += dt * speed;

        if let Some(transition) = self.find_transition(None, None) {
            self.update_state_from_transition(&transition);
        }

        if let Some(state) = self.states.get_mut(&self.active_state) {
            if state.blend_tree().is_some() {
                state.update_weights(&self.parameters.read());
            }
        }

        if self.transitioning {
            self.current_transition_time += dt;
            if self.current_transition_time <= self.total_transition_time {
                self.apply_crossfade_weights();
            } else {
                self.finish_transition();
            }
        } else {
            self.apply_active_weights(1.0);
        }

        self.evaluator.update(dt);
        self.events
            .extend(self.evaluator.take_events().into_iter().map(ControllerEvent::Clip));
    }

    /// Enter `transition.to`, crossfading out of the current state over
    /// `transition.time` seconds
    pub fn update_state_from_transition(&mut self, transition: &AnimTransition) {
        if !self.states.contains_key(&transition.to) {
            tracing::error!("Transition to unknown state {}", transition.to);
            return;
        }

        let from = std::mem::replace(&mut self.active_state, transition.to.clone());
        self.previous_state = transition.from.as_ref().map(|_| from.clone());

        {
            let mut params = self.parameters.write();
            for condition in &transition.conditions {
                if params.is_trigger(&condition.parameter_name) {
                    params.consume_trigger(&condition.parameter_name);
                }
            }
        }

        if let Some(previous) = self.previous_state.clone() {
            self.push_previous_state(previous);
        }

        self.transitioning = true;
        self.total_transition_time = transition.time;
        self.current_transition_time = 0.0;

        if let Some(state) = self.states.get_mut(&self.active_state) {
            if state.blend_tree().is_some() {
                state.update_weights(&self.parameters.read());
            }
        }

        let Some(state) = self.states.get(&self.active_state) else {
            return;
        };
        let duration = state.duration();
        let offset = transition
            .transition_offset
            .filter(|offset| *offset > 0.0 && *offset < 1.0);
        let start_time = offset.map_or(0.0, |offset| duration * offset);
        self.time_in_state = start_time;
        self.time_in_state_before = start_time;

        for animation in state.animations() {
            let clip_time = match offset {
                Some(offset) => duration * offset,
                None if state.speed < 0.0 => duration,
                None => 0.0,
            };
            let weight = if transition.time > 0.0 { 0.0 } else { animation.weight };

            match self.evaluator.find_clip_mut(&animation.name) {
                Some(clip) => {
                    clip.reset();
                    clip.set_blend_weight(weight);
                    clip.play();
                    clip.set_time(clip_time);
                }
                None => {
                    let mut clip = AnimClip::new(
                        &animation.name,
                        animation.track.clone(),
                        clip_time,
                        animation.speed.unwrap_or(state.speed),
                        true,
                        state.looping,
                    );
                    clip.set_blend_weight(weight);
                    self.evaluator.add_clip(clip);
                }
            }
        }

        // A cut has nothing to fade, so edges out of the new state stay open
        if transition.time <= 0.0 {
            self.finish_transition();
        }

        tracing::debug!("Animation state {} -> {}", from, self.active_state);
        self.events.push(ControllerEvent::StateChanged {
            from,
            to: self.active_state.clone(),
        });
    }

    fn transition_to_state(&mut self, name: &str) {
        if !self.states.contains_key(name) {
            tracing::warn!("Cannot play unknown animation state {}", name);
            return;
        }

        let active = self.active_state.clone();
        let transition = match self.find_transition(Some(&active), Some(name)) {
            Some(transition) => transition,
            None => {
                self.evaluator.remove_clips();
                AnimTransition::direct(name)
            }
        };
        self.update_state_from_transition(&transition);
    }

    /// Highest-priority eligible transition, from `from` to `to` when both
    /// are given, else out of the active state (and `ANY`)
    fn find_transition(&self, from: Option<&str>, to: Option<&str>) -> Option<AnimTransition> {
        let mut candidates: Vec<&AnimTransition> = match (from, to) {
            (Some(from), Some(to)) => self
                .transitions
                .iter()
                .filter(|t| t.leaves(from) && t.to == to)
                .collect(),
            // No interruptions while a crossfade is running
            _ if self.transitioning => return None,
            _ => self
                .transitions
                .iter()
                .filter(|t| {
                    t.leaves(&self.active_state) || (self.active_state != START && t.leaves(ANY))
                })
                .collect(),
        };
        candidates.sort_by_key(|t| t.priority);

        let mut found = {
            let params = self.parameters.read();
            candidates
                .into_iter()
                .find(|t| {
                    t.to != self.active_state && self.exit_time_reached(t) && t.conditions_met(&params)
                })?
                .clone()
        };

        if found.to == END {
            let Some(entry) = self
                .transitions
                .iter()
                .filter(|t| t.leaves(START))
                .min_by_key(|t| t.priority)
            else {
                tracing::warn!("Transition to END but the graph has no entry transition");
                return None;
            };
            found.to = entry.to.clone();
        }
        Some(found)
    }

    fn exit_time_reached(&self, transition: &AnimTransition) -> bool {
        let Some(exit_time) = transition.exit_time else {
            return true;
        };

        let mut before = self.progress_for_time(self.time_in_state_before);
        let mut progress = self.progress_for_time(self.time_in_state);

        // Below 1.0 a looping state may exit once per loop
        let per_loop = exit_time < 1.0 && self.active_state_looping();
        if per_loop {
            before -= before.floor();
            progress -= progress.floor();
        }

        if progress == before {
            return progress == exit_time;
        }
        if per_loop && progress < before {
            // Wrapped this tick: the crossed window is (before, 1) + [0, progress]
            return exit_time > before || exit_time <= progress;
        }
        exit_time > before && exit_time <= progress
    }

    fn progress_for_time(&self, time: f32) -> f32 {
        if is_reserved(&self.active_state) {
            return 1.0;
        }
        let duration = self.active_state_duration();
        if duration <= 0.0 {
            return 0.0;
        }

        let progress = time / duration;
        if self.active_state_looping() {
            progress
        } else {
            progress.min(1.0)
        }
    }

    fn active_state_looping(&self) -> bool {
        self.states.get(&self.active_state).is_some_and(|s| s.looping)
    }

    fn interpolated_transition_time(&self) -> f32 {
        if self.total_transition_time > 0.0 {
            self.current_transition_time / self.total_transition_time
        } else {
            1.0
        }
    }

    fn push_previous_state(&mut self, name: String) {
        if !self.transitioning {
            self.transition_previous_states.clear();
        }
        self.transition_previous_states.push(PreviousState { name, weight: 1.0 });

        // A transition taken mid-crossfade freezes the outgoing weights
        let interpolated = self.interpolated_transition_time().min(1.0);
        let count = self.transition_previous_states.len();
        for (index, previous) in self.transition_previous_states.iter_mut().enumerate() {
            if !self.transitioning {
                previous.weight = 1.0;
            } else if index != count - 1 {
                previous.weight *= 1.0 - interpolated;
            } else {
                previous.weight = interpolated;
            }

            let Some(state) = self.states.get(&previous.name) else {
                continue;
            };
            for animation in state.animations() {
                let renamed = format!("{}.previous.{}", animation.name, index);
                if self.evaluator.find_clip(&renamed).is_none() {
                    if let Some(clip) = self.evaluator.find_clip_mut(&animation.name) {
                        clip.set_name(renamed.clone());
                    }
                }
                // Only the most recent outgoing state keeps advancing
                if index != count - 1 {
                    if let Some(clip) = self.evaluator.find_clip_mut(&renamed) {
                        clip.pause();
                    }
                }
            }
        }
    }

    fn apply_crossfade_weights(&mut self) {
        let interpolated = self.interpolated_transition_time();
        for (index, previous) in self.transition_previous_states.iter().enumerate() {
            let Some(state) = self.states.get(&previous.name) else {
                continue;
            };
            for animation in state.animations() {
                let name = format!("{}.previous.{}", animation.name, index);
                if let Some(clip) = self.evaluator.find_clip_mut(&name) {
                    clip.set_blend_weight((1.0 - interpolated) * animation.weight * previous.weight);
                }
            }
        }
        self.apply_active_weights(interpolated);
    }

    fn finish_transition(&mut self) {
        self.transitioning = false;
        self.transition_previous_states.clear();

        let active: Vec<String> = self
            .states
            .get(&self.active_state)
            .map(|s| s.animations().iter().map(|a| a.name.clone()).collect())
            .unwrap_or_default();
        let stale: Vec<String> = self
            .evaluator
            .clips()
            .iter()
            .map(|c| c.name().to_string())
            .filter(|name| !active.contains(name))
            .collect();
        for name in &stale {
            self.evaluator.remove_clip_named(name);
        }

        self.apply_active_weights(1.0);
    }

    fn apply_active_weights(&mut self, scale: f32) {
        let Some(state) = self.states.get(&self.active_state) else {
            return;
        };
        for animation in state.animations() {
            if let Some(clip) = self.evaluator.find_clip_mut(&animation.name) {
                clip.set_blend_weight(scale * animation.weight);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{ParameterStore, ParameterValue};
    use crate::state::{BlendChild, BlendTree};
    use crate::transition::{AnimCondition, ConditionValue, Predicate};
    use ordoplay_anim_track::{AnimCurve, AnimData, AnimEvents, InterpolationMode};

    /// Track whose `Root.value` equals the time
    fn ramp(name: &str, duration: f32) -> Arc<AnimTrack> {
        Arc::new(
            AnimTrack::new(
                name,
                duration,
                vec![AnimData::times(vec![0.0, duration])],
                vec![AnimData::new(1, vec![0.0, duration])],
                vec![AnimCurve {
                    node: "Root".to_string(),
                    property: "value".to_string(),
                    input: 0,
                    output: 0,
                    interpolation: InterpolationMode::Linear,
                    quaternion: false,
                }],
                AnimEvents::default(),
            )
            .unwrap(),
        )
    }

    fn controller(params: ParameterStore) -> AnimController {
        let mut controller = AnimController::new(params.shared(), false);
        controller.assign_animation("Idle", ramp("idle", 1.0), None, None);
        controller.assign_animation("Run", ramp("run", 2.0), None, None);
        controller.ensure_entry_transition("Idle");
        controller
    }

    fn clip_names(controller: &AnimController) -> Vec<&str> {
        controller.evaluator().clips().iter().map(AnimClip::name).collect()
    }

    #[test]
    fn test_play_takes_entry_transition() {
        let mut controller = controller(ParameterStore::new());
        assert_eq!(controller.active_state(), START);

        controller.play(None);
        assert!(controller.playing());
        assert_eq!(controller.active_state(), "Idle");
        assert_eq!(controller.previous_state(), Some(START));
        assert_eq!(clip_names(&controller), vec!["Idle"]);

        let events = controller.take_events();
        assert_eq!(
            events,
            vec![ControllerEvent::StateChanged {
                from: START.to_string(),
                to: "Idle".to_string()
            }]
        );
    }

    #[test]
    fn test_activate_plays_once_playable() {
        let mut controller = AnimController::new(ParameterStore::new().shared(), true);
        controller.ensure_entry_transition("Idle");
        controller.assign_animation("Idle", ramp("idle", 1.0), None, None);
        assert!(controller.playing());
        assert_eq!(controller.active_state(), "Idle");
    }

    #[test]
    fn test_exit_time() {
        let mut controller = controller(ParameterStore::new());
        controller.add_transition(AnimTransition::new("Idle", "Run").with_exit_time(0.5));
        controller.play(None);

        controller.update(0.25);
        assert_eq!(controller.active_state(), "Idle");
        controller.update(0.25);
        assert_eq!(controller.active_state(), "Run");
    }

    #[test]
    fn test_exit_time_in_first_tick_after_play() {
        let mut controller = AnimController::new(ParameterStore::new().shared(), false);
        controller.assign_animation("Jump", ramp("jump", 1.0), None, Some(false));
        controller.assign_animation("Land", ramp("land", 1.0), None, None);
        controller.ensure_entry_transition("Jump");
        controller.add_transition(AnimTransition::new("Jump", "Land").with_exit_time(0.05));

        controller.play(None);
        assert_eq!(controller.active_state(), "Jump");
        assert!(!controller.transitioning());

        controller.update(0.1);
        assert_eq!(controller.active_state(), "Land");
        assert_eq!(clip_names(&controller), vec!["Land"]);
    }

    #[test]
    fn test_cut_leaves_new_state_open() {
        let mut controller = controller(ParameterStore::new());
        controller.add_transition(AnimTransition::new("Run", "Idle").with_exit_time(0.1));
        controller.play(None);
        controller.update(0.1);

        controller.play(Some("Run"));
        assert!(!controller.transitioning());
        assert_eq!(controller.transition_progress(), None);

        // Run lasts 2s: 0.25s crosses the 0.1 exit time
        controller.update(0.25);
        assert_eq!(controller.active_state(), "Idle");
        assert_eq!(controller.previous_state(), Some("Run"));

        controller.update_state_from_transition(&AnimTransition::new("Idle", "Run"));
        assert!(!controller.transitioning());
        assert_eq!(clip_names(&controller), vec!["Run"]);
        assert_eq!(controller.evaluator().clips()[0].blend_weight(), 1.0);
    }

    #[test]
    fn test_exit_time_wraps_for_looping_states() {
        let mut controller = controller(ParameterStore::new());
        controller.add_transition(AnimTransition::new("Idle", "Run").with_exit_time(0.9));
        controller.play(None);

        controller.update(0.5);
        controller.update(0.375);
        assert_eq!(controller.active_state(), "Idle");

        // 0.875 -> 1.25 wraps past 0.9
        controller.update(0.375);
        assert_eq!(controller.active_state(), "Run");
    }

    #[test]
    fn test_trigger_is_consumed() {
        let mut params = ParameterStore::new();
        params.insert("jump", ParameterValue::Trigger(false));
        let mut controller = controller(params);
        controller.add_transition(AnimTransition::new("Idle", "Run").with_condition(AnimCondition::new(
            "jump",
            Predicate::Equal,
            ConditionValue::Bool(true),
        )));
        controller.play(None);

        controller.update(0.1);
        assert_eq!(controller.active_state(), "Idle");

        controller
            .parameters()
            .write()
            .set("jump", ParameterValue::Trigger(true))
            .unwrap();
        controller.update(0.1);
        assert_eq!(controller.active_state(), "Run");

        let mut params = controller.parameters().write();
        assert_eq!(params.consumed_triggers().collect::<Vec<_>>(), vec!["jump"]);
        params.reset_consumed_triggers();
        assert_eq!(params.get("jump"), Some(ParameterValue::Trigger(false)));
    }

    #[test]
    fn test_crossfade() {
        let mut params = ParameterStore::new();
        params.insert("speed", ParameterValue::Float(0.0));
        let mut controller = controller(params);
        controller.add_transition(
            AnimTransition::new("Idle", "Run")
                .with_time(1.0)
                .with_condition(AnimCondition::new(
                    "speed",
                    Predicate::GreaterThan,
                    ConditionValue::Number(0.5),
                )),
        );
        controller.play(None);
        controller.update(0.5);

        controller
            .parameters()
            .write()
            .set("speed", ParameterValue::Float(1.0))
            .unwrap();
        controller.update(0.25);

        assert!(controller.transitioning());
        assert_eq!(controller.transition_progress(), Some(0.25));
        assert_eq!(clip_names(&controller), vec!["Idle.previous.0", "Run"]);
        let weights: Vec<f32> = controller
            .evaluator()
            .clips()
            .iter()
            .map(AnimClip::blend_weight)
            .collect();
        assert_eq!(weights, vec![0.75, 0.25]);

        controller.update(1.0);
        assert!(!controller.transitioning());
        assert_eq!(controller.transition_progress(), None);
        assert_eq!(clip_names(&controller), vec!["Run"]);
        assert_eq!(controller.evaluator().clips()[0].blend_weight(), 1.0);
    }

    #[test]
    fn test_transition_offset() {
        let mut controller = controller(ParameterStore::new());
        controller.play(None);
        controller.update(0.1);

        let transition = AnimTransition::new("Idle", "Run").with_transition_offset(0.25);
        controller.update_state_from_transition(&transition);
        assert_eq!(controller.active_state_current_time(), 0.5);
        assert_eq!(controller.evaluator().find_clip("Run").map(AnimClip::time), Some(0.5));
    }

    #[test]
    fn test_end_restarts_from_entry() {
        let mut controller = controller(ParameterStore::new());
        controller.assign_animation("Jump", ramp("jump", 0.5), None, Some(false));
        controller.add_transition(AnimTransition::new("Idle", "Jump").with_exit_time(0.5));
        controller.add_transition(AnimTransition::new("Jump", END).with_exit_time(1.0));
        controller.play(None);

        controller.update(0.25);
        controller.update(0.25);
        assert_eq!(controller.active_state(), "Jump");
        controller.update(0.25);
        assert_eq!(controller.active_state(), "Jump");
        controller.update(0.25);
        assert_eq!(controller.active_state(), "Idle");
        assert_eq!(controller.previous_state(), Some("Jump"));
    }

    #[test]
    fn test_any_state_transition() {
        let mut params = ParameterStore::new();
        params.insert("hit", ParameterValue::Boolean(false));
        let mut controller = controller(params);
        controller.add_transition(AnimTransition::new(ANY, "Run").with_condition(AnimCondition::new(
            "hit",
            Predicate::Equal,
            ConditionValue::Bool(true),
        )));
        controller.play(None);
        controller.update(0.1);

        controller
            .parameters()
            .write()
            .set("hit", ParameterValue::Boolean(true))
            .unwrap();
        controller.update(0.1);
        assert_eq!(controller.active_state(), "Run");

        // Already in Run: the ANY edge does not re-enter it
        controller.update(0.1);
        controller.update(0.1);
        assert_eq!(controller.previous_state(), Some("Idle"));
    }

    #[test]
    fn test_one_shot_progress_clamps() {
        let mut controller = controller(ParameterStore::new());
        controller.assign_animation("Idle", ramp("idle", 1.0), None, Some(false));
        controller.play(None);
        for _ in 0..15 {
            controller.update(0.1);
        }
        assert_eq!(controller.active_state_progress(), 1.0);
        assert_eq!(controller.active_state_duration(), 1.0);
    }

    #[test]
    fn test_seek_while_paused_evaluates() {
        let mut controller = controller(ParameterStore::new());
        controller.play(None);
        controller.update(0.1);
        controller.pause();

        controller.set_active_state_current_time(0.75);
        let value = controller.evaluator().output("Root", "value").unwrap();
        assert!((value.value[0] - 0.75).abs() < 1e-6);

        controller.update(0.1);
        assert_eq!(controller.active_state_current_time(), 0.75);
    }

    #[test]
    fn test_play_named_state_without_edge() {
        let mut controller = controller(ParameterStore::new());
        controller.play(None);
        controller.update(0.1);

        controller.play(Some("Run"));
        assert_eq!(controller.active_state(), "Run");
        assert_eq!(clip_names(&controller), vec!["Run"]);
    }

    #[test]
    fn test_blend_tree_weights_follow_parameter() {
        let mut params = ParameterStore::new();
        params.insert("speed", ParameterValue::Float(0.5));
        let mut data = LayerData::new("Base");
        data.states.push(crate::graph::StateData {
            blend_tree: Some(BlendTree {
                parameter: "speed".to_string(),
                children: vec![
                    BlendChild { name: "Walk".to_string(), point: 0.0, speed: None },
                    BlendChild { name: "Run".to_string(), point: 1.0, speed: None },
                ],
            }),
            ..crate::graph::StateData::new("Move")
        });
        let mut controller = AnimController::from_layer_data(&data, params.shared(), false);
        controller.assign_animation("Move.Walk", ramp("walk", 1.0), None, None);
        controller.assign_animation("Move.Run", ramp("run", 1.0), None, None);
        assert!(controller.playable());

        controller.play(None);
        controller.update(0.1);
        let weights: Vec<f32> = controller
            .evaluator()
            .clips()
            .iter()
            .map(AnimClip::blend_weight)
            .collect();
        assert_eq!(weights, vec![0.5, 0.5]);

        controller
            .parameters()
            .write()
            .set("speed", ParameterValue::Float(0.75))
            .unwrap();
        controller.update(0.1);
        let weights: Vec<f32> = controller
            .evaluator()
            .clips()
            .iter()
            .map(AnimClip::blend_weight)
            .collect();
        assert_eq!(weights, vec![0.25, 0.75]);
    }

    #[test]
    fn test_remove_node_animations() {
        let mut controller = controller(ParameterStore::new());
        controller.play(None);

        assert!(!controller.remove_node_animations(START));
        assert!(!controller.remove_node_animations("Swim"));
        assert!(!controller.remove_node_animations("Run"));
        assert!(controller.remove_node_animations("Idle"));
        assert!(!controller.playable());
        assert!(controller.evaluator().clips().is_empty());
    }

    #[test]
    fn test_reset() {
        let mut controller = controller(ParameterStore::new());
        controller.play(None);
        controller.update(0.3);
        controller.reset();

        assert!(!controller.playing());
        assert_eq!(controller.active_state(), START);
        assert_eq!(controller.previous_state(), None);
        assert_eq!(controller.active_state_current_time(), 0.0);
        assert!(controller.evaluator().clips().is_empty());
        assert_eq!(controller.states(), vec!["Idle", "Run"]);
    }
}
