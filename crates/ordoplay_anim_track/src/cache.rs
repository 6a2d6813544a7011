// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe bracketing cache.
//!
//! Playback samples a track at steadily increasing times, so the interval
//! found on the previous frame (or the one right after it) almost always
//! contains the next sample. The cache keeps that interval and only falls
//! back to a binary search when both guesses miss.

use crate::keyframe::{Interpolation, InterpolationMode};
use crate::track::AnimData;

/// Bracketing state for one input (key time) buffer
#[derive(Debug, Clone)]
pub struct AnimCache {
    /// Time of the left key, `-inf` before the first key
    left: f32,
    /// Time of the right key, `+inf` at or after the last key
    right: f32,
    /// Interval length in seconds (0 when clamped)
    span: f32,
    /// Reciprocal of `span` (0 when clamped)
    recip: f32,
    /// Left key index
    p0: usize,
    /// Right key index
    p1: usize,
    /// Normalized position inside the interval
    t: f32,
}

impl AnimCache {
    /// Create a cache that searches on its first update
    pub fn new() -> Self {
        Self {
            left: f32::INFINITY,
            right: f32::NEG_INFINITY,
            span: 0.0,
            recip: 0.0,
            p0: 0,
            p1: 0,
            t: 0.0,
        }
    }

    /// Bracket `time` inside `input` (ascending key times)
    pub fn update(&mut self, time: f32, input: &[f32]) {
        if !self.holds(time, input) {
            self.locate(time, input);
        }
        self.t = if self.recip == 0.0 {
            0.0
        } else {
            ((time - self.left) * self.recip).clamp(0.0, 1.0)
        };
    }

    /// Whether the cached interval brackets `time` and still matches `input`
    fn holds(&self, time: f32, input: &[f32]) -> bool {
        if !(time >= self.left && time < self.right) {
            return false;
        }
        let len = input.len();
        if self.p0 != self.p1 {
            return self.p1 < len && input[self.p0] == self.left && input[self.p1] == self.right;
        }
        match len {
            0 => self.left == f32::NEG_INFINITY && self.right == f32::INFINITY,
            _ if self.left == f32::NEG_INFINITY => self.p0 == 0 && input[0] == self.right,
            _ => self.p0 == len - 1 && input[self.p0] == self.left && self.right == f32::INFINITY,
        }
    }

    fn locate(&mut self, time: f32, input: &[f32]) {
        let len = input.len();
        if len == 0 {
            self.clamp_to(f32::NEG_INFINITY, f32::INFINITY, 0);
            return;
        }
        if time < input[0] {
            self.clamp_to(f32::NEG_INFINITY, input[0], 0);
            return;
        }
        if time >= input[len - 1] {
            self.clamp_to(input[len - 1], f32::INFINITY, len - 1);
            return;
        }

        // Interval after the cached one, then binary search
        let next = self.p1;
        let index = if next + 1 < len && input[next] <= time && time < input[next + 1] {
            next
        } else {
            input.partition_point(|&key| key <= time) - 1
        };

        self.left = input[index];
        self.right = input[index + 1];
        self.p0 = index;
        self.p1 = index + 1;
        self.span = self.right - self.left;
        self.recip = if self.span > 0.0 { 1.0 / self.span } else { 0.0 };
    }

    fn clamp_to(&mut self, left: f32, right: f32, key: usize) {
        self.left = left;
        self.right = right;
        self.p0 = key;
        self.p1 = key;
        self.span = 0.0;
        self.recip = 0.0;
    }

    /// Left and right key indices of the current interval
    pub fn keys(&self) -> (usize, usize) {
        (self.p0, self.p1)
    }

    /// Normalized position inside the current interval
    pub fn t(&self) -> f32 {
        self.t
    }

    /// Evaluate `output` at the bracketed position into `result`
    pub fn eval(
        &self,
        result: &mut [f32],
        mode: InterpolationMode,
        output: &AnimData,
        quaternion: bool,
    ) {
        if output.is_empty() {
            return;
        }

        match mode {
            InterpolationMode::Step => {
                result.copy_from_slice(output.key_value(self.p0, mode));
            }
            InterpolationMode::Linear => {
                let a = output.key_value(self.p0, mode);
                if self.p0 == self.p1 {
                    result.copy_from_slice(a);
                    return;
                }
                let b = output.key_value(self.p1, mode);
                if quaternion {
                    Interpolation::slerp_into(a, b, self.t, result);
                } else {
                    Interpolation::lerp_into(a, b, self.t, result);
                }
            }
            InterpolationMode::CubicSpline => {
                if self.p0 == self.p1 {
                    result.copy_from_slice(output.key_value(self.p0, mode));
                    return;
                }
                let v0 = output.key_value(self.p0, mode);
                let out_tangent = output.key_out_tangent(self.p0);
                let v1 = output.key_value(self.p1, mode);
                let in_tangent = output.key_in_tangent(self.p1);
                for (i, r) in result.iter_mut().enumerate() {
                    *r = Interpolation::hermite(
                        v0[i],
                        out_tangent[i] * self.span,
                        v1[i],
                        in_tangent[i] * self.span,
                        self.t,
                    );
                }
                if quaternion {
                    Interpolation::normalize(result);
                }
            }
        }
    }
}

impl Default for AnimCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [f32; 4] = [0.0, 1.0, 2.0, 4.0];

    #[test]
    fn test_brackets_interior_time() {
        let mut cache = AnimCache::new();
        cache.update(1.5, &KEYS);
        assert_eq!(cache.keys(), (1, 2));
        assert!((cache.t() - 0.5).abs() < 1e-6);

        cache.update(3.0, &KEYS);
        assert_eq!(cache.keys(), (2, 3));
        assert!((cache.t() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clamps_outside_range() {
        let mut cache = AnimCache::new();
        cache.update(-1.0, &KEYS);
        assert_eq!(cache.keys(), (0, 0));
        assert_eq!(cache.t(), 0.0);

        cache.update(10.0, &KEYS);
        assert_eq!(cache.keys(), (3, 3));
        assert_eq!(cache.t(), 0.0);
    }

    #[test]
    fn test_backwards_seek_searches_again() {
        let mut cache = AnimCache::new();
        cache.update(3.5, &KEYS);
        cache.update(0.25, &KEYS);
        assert_eq!(cache.keys(), (0, 1));
        assert!((cache.t() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_switching_inputs_searches_again() {
        let mut cache = AnimCache::new();
        cache.update(1.5, &[0.0, 1.0, 2.0]);
        assert_eq!(cache.keys(), (1, 2));

        // Key 2 does not exist in the shorter input
        cache.update(1.5, &[0.0, 4.0]);
        assert_eq!(cache.keys(), (0, 1));
        assert!((cache.t() - 0.375).abs() < 1e-6);

        cache.update(0.5, &[0.0, 1.0, 2.0]);
        cache.update(0.5, &[0.0, 4.0]);
        assert_eq!(cache.keys(), (0, 1));
        assert!((cache.t() - 0.125).abs() < 1e-6);

        cache.update(5.0, &[0.0, 4.0]);
        assert_eq!(cache.keys(), (1, 1));
        cache.update(5.0, &[0.0, 1.0, 2.0]);
        assert_eq!(cache.keys(), (2, 2));
    }

    #[test]
    fn test_empty_input() {
        let mut cache = AnimCache::new();
        cache.update(1.0, &[]);
        assert_eq!(cache.keys(), (0, 0));
        assert_eq!(cache.t(), 0.0);
    }

    #[test]
    fn test_cubic_spline_hits_keys() {
        // in, value, out per key
        let output = AnimData::new(1, vec![0.0, 2.0, 1.0, 1.0, 6.0, 0.0]);
        let mut cache = AnimCache::new();
        let mut result = [0.0];

        cache.update(0.0, &[0.0, 1.0]);
        cache.eval(&mut result, InterpolationMode::CubicSpline, &output, false);
        assert_eq!(result[0], 2.0);

        cache.update(1.0, &[0.0, 1.0]);
        cache.eval(&mut result, InterpolationMode::CubicSpline, &output, false);
        assert_eq!(result[0], 6.0);
    }
}
