// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation tracks and snapshot evaluation.

use crate::cache::AnimCache;
use crate::events::{AnimEvent, AnimEvents};
use crate::keyframe::InterpolationMode;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Flat keyframe buffer: key times (one component) or key values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimData {
    /// Floats per value (1 for scalars and times, 3 for vectors, 4 for quaternions)
    pub components: usize,
    /// Packed values
    pub data: Vec<f32>,
}

impl AnimData {
    /// Create a buffer
    pub fn new(components: usize, data: Vec<f32>) -> Self {
        Self { components, data }
    }

    /// Create a key time buffer
    pub fn times(data: Vec<f32>) -> Self {
        Self::new(1, data)
    }

    /// Number of whole values in the buffer
    pub fn len(&self) -> usize {
        if self.components == 0 {
            0
        } else {
            self.data.len() / self.components
        }
    }

    /// Whether the buffer holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of key `index` laid out for `mode`
    pub fn key_value(&self, index: usize, mode: InterpolationMode) -> &[f32] {
        let stride = self.components;
        let start = match mode {
            InterpolationMode::CubicSpline => index * stride * 3 + stride,
            InterpolationMode::Step | InterpolationMode::Linear => index * stride,
        };
        &self.data[start..start + stride]
    }

    /// In-tangent of key `index` in a cubic spline buffer
    pub fn key_in_tangent(&self, index: usize) -> &[f32] {
        let start = index * self.components * 3;
        &self.data[start..start + self.components]
    }

    /// Out-tangent of key `index` in a cubic spline buffer
    pub fn key_out_tangent(&self, index: usize) -> &[f32] {
        let start = index * self.components * 3 + self.components * 2;
        &self.data[start..start + self.components]
    }
}

/// One animated property: which keys drive which target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimCurve {
    /// Slash-delimited node path of the target
    pub node: String,
    /// Property on the node (e.g. `localPosition`)
    pub property: String,
    /// Index into the track's inputs
    pub input: usize,
    /// Index into the track's outputs
    pub output: usize,
    /// Interpolation between keys
    #[serde(default)]
    pub interpolation: InterpolationMode,
    /// Values are unit quaternions
    #[serde(default)]
    pub quaternion: bool,
}

/// Error building a track
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// Duration is negative or NaN
    #[error("Invalid duration {0} for track")]
    InvalidDuration(f32),

    /// A curve points past the input list
    #[error("Curve {curve} references missing input {index}")]
    InputOutOfRange {
        /// Curve index
        curve: usize,
        /// Offending input index
        index: usize,
    },

    /// A curve points past the output list
    #[error("Curve {curve} references missing output {index}")]
    OutputOutOfRange {
        /// Curve index
        curve: usize,
        /// Offending output index
        index: usize,
    },

    /// Buffer length is not a whole number of values
    #[error("Buffer {index} is malformed: {reason}")]
    MalformedBuffer {
        /// Buffer index
        index: usize,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Output key count does not match its input
    #[error("Curve {curve} has {outputs} output keys for {inputs} input keys")]
    KeyCountMismatch {
        /// Curve index
        curve: usize,
        /// Keys in the input
        inputs: usize,
        /// Keys in the output
        outputs: usize,
    },
}

/// Serialized form of a track, as produced by the asset pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimTrackData {
    /// Track name
    pub name: String,
    /// Duration in seconds
    pub duration: f32,
    /// Key time buffers
    pub inputs: Vec<AnimData>,
    /// Key value buffers
    pub outputs: Vec<AnimData>,
    /// Curves
    pub curves: Vec<AnimCurve>,
    /// Timeline events
    #[serde(default)]
    pub events: Vec<AnimEvent>,
}

/// A playable animation: keyframe curves plus timeline events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "AnimTrackData", into = "AnimTrackData")]
pub struct AnimTrack {
    name: String,
    duration: f32,
    inputs: Vec<AnimData>,
    outputs: Vec<AnimData>,
    curves: Vec<AnimCurve>,
    events: AnimEvents,
}

impl AnimTrack {
    /// Create a track, validating that every curve refers to real buffers
    pub fn new(
        name: impl Into<String>,
        duration: f32,
        inputs: Vec<AnimData>,
        outputs: Vec<AnimData>,
        curves: Vec<AnimCurve>,
        events: AnimEvents,
    ) -> Result<Self, TrackError> {
        if duration.is_nan() || duration < 0.0 {
            return Err(TrackError::InvalidDuration(duration));
        }

        for (index, input) in inputs.iter().enumerate() {
            if input.components != 1 {
                return Err(TrackError::MalformedBuffer {
                    index,
                    reason: "key times must have one component",
                });
            }
        }
        for (index, output) in outputs.iter().enumerate() {
            if output.components == 0 || output.data.len() % output.components != 0 {
                return Err(TrackError::MalformedBuffer {
                    index,
                    reason: "length is not a multiple of the component count",
                });
            }
        }

        for (curve_index, curve) in curves.iter().enumerate() {
            let input = inputs.get(curve.input).ok_or(TrackError::InputOutOfRange {
                curve: curve_index,
                index: curve.input,
            })?;
            let output = outputs.get(curve.output).ok_or(TrackError::OutputOutOfRange {
                curve: curve_index,
                index: curve.output,
            })?;

            let expected = input.len() * curve.interpolation.values_per_key();
            if output.len() != expected {
                return Err(TrackError::KeyCountMismatch {
                    curve: curve_index,
                    inputs: input.len(),
                    outputs: output.len() / curve.interpolation.values_per_key(),
                });
            }
        }

        Ok(Self {
            name: name.into(),
            duration,
            inputs,
            outputs,
            curves,
            events,
        })
    }

    /// Shared placeholder bound before real content loads.
    ///
    /// It has no curves and a duration of `f32::MAX`, so it plays forever
    /// and evaluating it only stamps the snapshot time.
    pub fn empty() -> Arc<AnimTrack> {
        static EMPTY: OnceLock<Arc<AnimTrack>> = OnceLock::new();
        EMPTY
            .get_or_init(|| {
                Arc::new(AnimTrack {
                    name: "empty".to_string(),
                    duration: f32::MAX,
                    inputs: Vec::new(),
                    outputs: Vec::new(),
                    curves: Vec::new(),
                    events: AnimEvents::default(),
                })
            })
            .clone()
    }

    /// Track name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Duration in seconds
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Key time buffers
    pub fn inputs(&self) -> &[AnimData] {
        &self.inputs
    }

    /// Key value buffers
    pub fn outputs(&self) -> &[AnimData] {
        &self.outputs
    }

    /// Curves
    pub fn curves(&self) -> &[AnimCurve] {
        &self.curves
    }

    /// Timeline events
    pub fn events(&self) -> &AnimEvents {
        &self.events
    }

    /// Copy of this track with its event list replaced
    pub fn with_events(&self, events: AnimEvents) -> Self {
        Self {
            events,
            ..self.clone()
        }
    }

    /// Evaluate every curve at `time` into `snapshot`
    pub fn eval(&self, time: f32, snapshot: &mut AnimSnapshot) {
        snapshot.time = time;
        if self.curves.is_empty() {
            return;
        }
        snapshot.fit(self);

        for (input, cache) in self.inputs.iter().zip(snapshot.cache.iter_mut()) {
            cache.update(time, &input.data);
        }

        for (index, curve) in self.curves.iter().enumerate() {
            snapshot.cache[curve.input].eval(
                &mut snapshot.results[index],
                curve.interpolation,
                &self.outputs[curve.output],
                curve.quaternion,
            );
        }
    }
}

impl TryFrom<AnimTrackData> for AnimTrack {
    type Error = TrackError;

    fn try_from(data: AnimTrackData) -> Result<Self, Self::Error> {
        Self::new(
            data.name,
            data.duration,
            data.inputs,
            data.outputs,
            data.curves,
            AnimEvents::new(&data.events),
        )
    }
}

impl From<AnimTrack> for AnimTrackData {
    fn from(track: AnimTrack) -> Self {
        Self {
            name: track.name,
            duration: track.duration,
            inputs: track.inputs,
            outputs: track.outputs,
            curves: track.curves,
            events: track.events.events().to_vec(),
        }
    }
}

/// Caller-owned scratch state for evaluating one track
#[derive(Debug, Clone, Default)]
pub struct AnimSnapshot {
    /// Time of the last evaluation
    pub time: f32,
    /// One bracketing cache per track input
    pub cache: Vec<AnimCache>,
    /// One result per curve, sized to the curve's output components
    pub results: Vec<Vec<f32>>,
}

impl AnimSnapshot {
    /// Create a snapshot sized for `track`
    pub fn new(track: &AnimTrack) -> Self {
        let mut snapshot = Self::default();
        snapshot.fit(track);
        snapshot
    }

    /// Resize caches and results when the snapshot was built for another track
    ///
    /// Caches of a same-shape track are kept; [`AnimCache`] re-checks its
    /// interval against the input it is given before reusing it.
    fn fit(&mut self, track: &AnimTrack) {
        let sized = self.cache.len() == track.inputs.len()
            && self.results.len() == track.curves.len()
            && self
                .results
                .iter()
                .zip(&track.curves)
                .all(|(r, c)| r.len() == track.outputs[c.output].components);
        if sized {
            return;
        }

        self.cache = vec![AnimCache::new(); track.inputs.len()];
        self.results = track
            .curves
            .iter()
            .map(|c| vec![0.0; track.outputs[c.output].components])
            .collect();
    }
}
