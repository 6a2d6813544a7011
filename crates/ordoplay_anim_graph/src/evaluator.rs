// SPDX-License-Identifier: MIT OR Apache-2.0
//! Clip playback and weighted blending of clip results per target.

use indexmap::IndexMap;
use ordoplay_anim_track::{AnimEvent, AnimMask, AnimSnapshot, AnimTrack, Interpolation};
use std::sync::Arc;

/// Something that happened to a clip during an update
#[derive(Debug, Clone, PartialEq)]
pub enum ClipEvent {
    /// A timeline event was crossed
    Timeline {
        /// Clip name
        clip: String,
        /// The event
        event: AnimEvent,
    },
    /// A looping clip wrapped around
    Loop {
        /// Clip name
        clip: String,
    },
    /// A non-looping clip reached its end
    End {
        /// Clip name
        clip: String,
    },
}

impl ClipEvent {
    /// Name of the clip the event came from
    pub fn clip(&self) -> &str {
        match self {
            Self::Timeline { clip, .. } | Self::Loop { clip } | Self::End { clip } => clip,
        }
    }

    /// State owning the clip (clip names are `State`, `State.Child` or
    /// `State.Child.previous.N`)
    pub fn state(&self) -> &str {
        let clip = self.clip();
        clip.split_once('.').map_or(clip, |(state, _)| state)
    }
}

/// One playing instance of a track
#[derive(Debug, Clone)]
pub struct AnimClip {
    name: String,
    track: Arc<AnimTrack>,
    snapshot: AnimSnapshot,
    time: f32,
    speed: f32,
    playing: bool,
    looping: bool,
    blend_weight: f32,
}

impl AnimClip {
    /// Create a clip starting at `time`
    pub fn new(
        name: impl Into<String>,
        track: Arc<AnimTrack>,
        time: f32,
        speed: f32,
        playing: bool,
        looping: bool,
    ) -> Self {
        let snapshot = AnimSnapshot::new(&track);
        Self {
            name: name.into(),
            track,
            snapshot,
            time,
            speed,
            playing,
            looping,
            blend_weight: 1.0,
        }
    }

    /// Clip name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the clip
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Track being played
    pub fn track(&self) -> &Arc<AnimTrack> {
        &self.track
    }

    /// Swap the track, keeping the playhead
    pub fn set_track(&mut self, track: Arc<AnimTrack>) {
        self.snapshot = AnimSnapshot::new(&track);
        self.track = track;
    }

    /// Last evaluation
    pub fn snapshot(&self) -> &AnimSnapshot {
        &self.snapshot
    }

    /// Playhead in seconds
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Move the playhead; takes effect on the next update
    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    /// Playback speed
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Set playback speed
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Whether the clip wraps at its end
    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Set looping
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Whether the playhead advances
    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Resume advancing
    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Stop advancing; the clip keeps contributing at its current time
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Rewind to the start
    pub fn reset(&mut self) {
        self.time = 0.0;
    }

    /// Contribution to the blended output
    pub fn blend_weight(&self) -> f32 {
        self.blend_weight
    }

    /// Set the contribution to the blended output
    pub fn set_blend_weight(&mut self, weight: f32) {
        self.blend_weight = weight;
    }

    /// Normalized position of `time` within the track
    pub fn progress_for_time(&self, time: f32) -> f32 {
        let duration = self.track.duration();
        if duration > 0.0 {
            time / duration
        } else {
            0.0
        }
    }

    /// Advance by `dt` seconds and evaluate the track, pushing crossed events
    pub fn update(&mut self, dt: f32, events: &mut Vec<ClipEvent>) {
        let duration = self.track.duration();
        if self.playing && dt != 0.0 {
            if duration > 0.0 && duration.is_finite() {
                self.advance(dt * self.speed, duration, events);
            } else {
                self.time = 0.0;
            }
        }
        self.track.eval(self.time, &mut self.snapshot);
    }

    fn advance(&mut self, delta: f32, duration: f32, events: &mut Vec<ClipEvent>) {
        let previous = self.time;
        let mut time = previous + delta;

        if delta > 0.0 {
            if time < duration {
                self.push_timeline(previous, time, events);
            } else if self.looping {
                self.push_timeline(previous, duration, events);
                time = time.rem_euclid(duration);
                events.push(ClipEvent::Loop {
                    clip: self.name.clone(),
                });
                self.push_timeline(0.0, time, events);
            } else {
                time = duration;
                if previous < duration {
                    // Events sitting exactly on the last frame still fire
                    self.push_timeline(previous, f32::INFINITY, events);
                    events.push(ClipEvent::End {
                        clip: self.name.clone(),
                    });
                }
            }
        } else if time < 0.0 {
            if self.looping {
                time = time.rem_euclid(duration);
                events.push(ClipEvent::Loop {
                    clip: self.name.clone(),
                });
            } else {
                time = 0.0;
                if previous > 0.0 {
                    events.push(ClipEvent::End {
                        clip: self.name.clone(),
                    });
                }
            }
        }

        self.time = time;
    }

    fn push_timeline(&self, start: f32, end: f32, events: &mut Vec<ClipEvent>) {
        for event in self.track.events().in_range(start, end) {
            events.push(ClipEvent::Timeline {
                clip: self.name.clone(),
                event: event.clone(),
            });
        }
    }
}

/// Weighted sum of every clip writing one target
#[derive(Debug, Clone, PartialEq)]
pub struct BlendedValue {
    /// Blended value (weighted average, or normalized for quaternions)
    pub value: Vec<f32>,
    /// Sum of clip weights that contributed
    pub weight: f32,
    /// Whether the value is a rotation
    pub quaternion: bool,
}

/// Plays a set of clips and blends their results per `node.property`
#[derive(Debug, Clone, Default)]
pub struct AnimEvaluator {
    clips: Vec<AnimClip>,
    mask: Option<AnimMask>,
    outputs: IndexMap<String, IndexMap<String, BlendedValue>>,
    events: Vec<ClipEvent>,
}

impl AnimEvaluator {
    /// Create an evaluator with no clips
    pub fn new() -> Self {
        Self::default()
    }

    /// Clips in insertion order
    pub fn clips(&self) -> &[AnimClip] {
        &self.clips
    }

    /// Mutable clips
    pub fn clips_mut(&mut self) -> &mut [AnimClip] {
        &mut self.clips
    }

    /// Append a clip
    pub fn add_clip(&mut self, clip: AnimClip) {
        self.clips.push(clip);
    }

    /// Remove the clip at `index`, keeping the order of the rest
    pub fn remove_clip(&mut self, index: usize) -> Option<AnimClip> {
        (index < self.clips.len()).then(|| self.clips.remove(index))
    }

    /// Remove a clip by name
    pub fn remove_clip_named(&mut self, name: &str) -> Option<AnimClip> {
        let index = self.clips.iter().position(|c| c.name == name)?;
        Some(self.clips.remove(index))
    }

    /// Remove every clip
    pub fn remove_clips(&mut self) {
        self.clips.clear();
    }

    /// Find a clip by name
    pub fn find_clip(&self, name: &str) -> Option<&AnimClip> {
        self.clips.iter().find(|c| c.name == name)
    }

    /// Find a clip by name
    pub fn find_clip_mut(&mut self, name: &str) -> Option<&mut AnimClip> {
        self.clips.iter_mut().find(|c| c.name == name)
    }

    /// Point every clip named `name` at a new track
    pub fn update_clip_track(&mut self, name: &str, track: &Arc<AnimTrack>) {
        for clip in self.clips.iter_mut().filter(|c| c.name == name) {
            clip.set_track(track.clone());
        }
    }

    /// Current mask
    pub fn mask(&self) -> Option<&AnimMask> {
        self.mask.as_ref()
    }

    /// Replace the mask. Returns whether it changed, in which case targets
    /// must be rebound.
    pub fn assign_mask(&mut self, mask: Option<AnimMask>) -> bool {
        if self.mask == mask {
            return false;
        }
        self.mask = mask;
        self.outputs.clear();
        true
    }

    /// Forget every resolved target
    pub fn rebind(&mut self) {
        self.outputs.clear();
    }

    /// Advance every clip by `dt` and blend their results
    pub fn update(&mut self, dt: f32) {
        for clip in &mut self.clips {
            clip.update(dt, &mut self.events);
        }
        self.blend();
    }

    /// Drain events collected since the last call
    pub fn take_events(&mut self) -> Vec<ClipEvent> {
        std::mem::take(&mut self.events)
    }

    /// Blended `(node, property, value)` for every target touched this update
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &str, &BlendedValue)> {
        self.outputs.iter().flat_map(|(node, props)| {
            props
                .iter()
                .filter(|(_, blended)| blended.weight > 0.0)
                .map(move |(prop, blended)| (node.as_str(), prop.as_str(), blended))
        })
    }

    /// Blended value of one target
    pub fn output(&self, node: &str, property: &str) -> Option<&BlendedValue> {
        self.outputs
            .get(node)?
            .get(property)
            .filter(|blended| blended.weight > 0.0)
    }

    fn blend(&mut self) {
        for props in self.outputs.values_mut() {
            for blended in props.values_mut() {
                blended.weight = 0.0;
                blended.value.fill(0.0);
            }
        }

        for clip in &self.clips {
            let weight = clip.blend_weight;
            if weight <= 0.0 {
                continue;
            }

            for (curve, result) in clip.track.curves().iter().zip(&clip.snapshot.results) {
                if self.mask.as_ref().is_some_and(|m| !m.includes(&curve.node)) {
                    continue;
                }

                let blended = target_entry(&mut self.outputs, &curve.node, &curve.property);
                blended.quaternion = curve.quaternion;
                if blended.value.len() != result.len() {
                    blended.value.resize(result.len(), 0.0);
                }

                // Keep rotations in the same hemisphere before summing
                let sign = if curve.quaternion && dot(&blended.value, result) < 0.0 {
                    -1.0
                } else {
                    1.0
                };
                for (acc, value) in blended.value.iter_mut().zip(result) {
                    *acc += value * weight * sign;
                }
                blended.weight += weight;
            }
        }

        for props in self.outputs.values_mut() {
            for blended in props.values_mut() {
                if blended.weight <= 0.0 {
                    continue;
                }
                if blended.quaternion {
                    Interpolation::normalize(&mut blended.value);
                } else {
                    let inv = 1.0 / blended.weight;
                    blended.value.iter_mut().for_each(|v| *v *= inv);
                }
            }
        }
    }
}

fn target_entry<'a>(
    outputs: &'a mut IndexMap<String, IndexMap<String, BlendedValue>>,
    node: &str,
    property: &str,
) -> &'a mut BlendedValue {
    let props = match outputs.get_index_of(node) {
        Some(index) => &mut outputs[index],
        None => outputs.entry(node.to_string()).or_default(),
    };
    match props.get_index_of(property) {
        Some(index) => &mut props[index],
        None => props
            .entry(property.to_string())
            .or_insert_with(|| BlendedValue {
                value: Vec::new(),
                weight: 0.0,
                quaternion: false,
            }),
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_anim_track::{AnimCurve, AnimData, AnimEvents, InterpolationMode};

    fn ramp(name: &str, node: &str, to: f32, events: &[AnimEvent]) -> Arc<AnimTrack> {
        Arc::new(
            AnimTrack::new(
                name,
                1.0,
                vec![AnimData::times(vec![0.0, 1.0])],
                vec![AnimData::new(1, vec![0.0, to])],
                vec![AnimCurve {
                    node: node.to_string(),
                    property: "weight".to_string(),
                    input: 0,
                    output: 0,
                    interpolation: InterpolationMode::Linear,
                    quaternion: false,
                }],
                AnimEvents::new(events),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_looping_clip_wraps_and_fires_events() {
        let track = ramp("wave", "Root", 1.0, &[AnimEvent::new("step", 0.25), AnimEvent::new("land", 0.75)]);
        let mut clip = AnimClip::new("Wave", track, 0.0, 1.0, true, true);
        let mut events = Vec::new();

        clip.update(0.5, &mut events);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ClipEvent::Timeline { event, .. } if event.name == "step"));

        events.clear();
        clip.update(0.75, &mut events);
        assert!((clip.time() - 0.25).abs() < 1e-6);
        let kinds: Vec<_> = events
            .iter()
            .map(|e| match e {
                ClipEvent::Timeline { event, .. } => event.name.as_str(),
                ClipEvent::Loop { .. } => "loop",
                ClipEvent::End { .. } => "end",
            })
            .collect();
        assert_eq!(kinds, vec!["land", "loop"]);
    }

    #[test]
    fn test_one_shot_clip_clamps_and_ends_once() {
        let track = ramp("jump", "Root", 2.0, &[AnimEvent::new("done", 1.0)]);
        let mut clip = AnimClip::new("Jump", track, 0.0, 1.0, true, false);
        let mut events = Vec::new();

        clip.update(1.5, &mut events);
        assert_eq!(clip.time(), 1.0);
        assert_eq!(clip.snapshot().results[0], vec![2.0]);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], ClipEvent::End { .. }));

        events.clear();
        clip.update(0.5, &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn test_paused_clip_still_evaluates() {
        let track = ramp("pose", "Root", 4.0, &[]);
        let mut clip = AnimClip::new("Pose", track, 0.0, 1.0, false, true);
        clip.set_time(0.5);
        clip.update(0.1, &mut Vec::new());
        assert_eq!(clip.time(), 0.5);
        assert_eq!(clip.snapshot().results[0], vec![2.0]);
    }

    #[test]
    fn test_weighted_average() {
        let mut evaluator = AnimEvaluator::new();
        let mut a = AnimClip::new("A", ramp("a", "Root", 10.0, &[]), 1.0, 1.0, false, false);
        let mut b = AnimClip::new("B", ramp("b", "Root", 20.0, &[]), 1.0, 1.0, false, false);
        a.set_blend_weight(0.25);
        b.set_blend_weight(0.25);
        evaluator.add_clip(a);
        evaluator.add_clip(b);

        evaluator.update(0.0);
        let blended = evaluator.output("Root", "weight").unwrap();
        assert_eq!(blended.weight, 0.5);
        assert!((blended.value[0] - 15.0).abs() < 1e-5);
    }

    #[test]
    fn test_mask_filters_targets() {
        let mut evaluator = AnimEvaluator::new();
        evaluator.add_clip(AnimClip::new("Arm", ramp("arm", "Root/Arm", 1.0, &[]), 0.0, 1.0, true, true));
        evaluator.add_clip(AnimClip::new("Leg", ramp("leg", "Root/Leg", 1.0, &[]), 0.0, 1.0, true, true));

        assert!(evaluator.assign_mask(Some(AnimMask::new().include_children("Root/Arm"))));
        assert!(!evaluator.assign_mask(Some(AnimMask::new().include_children("Root/Arm"))));

        evaluator.update(0.5);
        let nodes: Vec<_> = evaluator.outputs().map(|(node, _, _)| node).collect();
        assert_eq!(nodes, vec!["Root/Arm"]);
    }

    #[test]
    fn test_remove_clips() {
        let mut evaluator = AnimEvaluator::new();
        evaluator.add_clip(AnimClip::new("A", AnimTrack::empty(), 0.0, 1.0, true, true));
        evaluator.add_clip(AnimClip::new("B", AnimTrack::empty(), 0.0, 1.0, true, true));

        assert_eq!(evaluator.remove_clip(0).map(|c| c.name().to_string()), Some("A".to_string()));
        assert!(evaluator.remove_clip(5).is_none());
        assert!(evaluator.find_clip("B").is_some());
        assert!(evaluator.remove_clip_named("B").is_some());
        assert!(evaluator.clips().is_empty());
    }
}
