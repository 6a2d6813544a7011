// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interpolation modes and curve math.

use serde::{Deserialize, Serialize};

/// Interpolation mode between two keys of a curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum InterpolationMode {
    /// Hold the left key's value until the next key
    Step,
    /// Linear interpolation (spherical for quaternion curves)
    #[default]
    Linear,
    /// Cubic Hermite spline with per-key in/out tangents
    CubicSpline,
}

impl InterpolationMode {
    /// Number of value-sized entries stored per key in an output buffer
    pub fn values_per_key(&self) -> usize {
        match self {
            Self::Step | Self::Linear => 1,
            Self::CubicSpline => 3,
        }
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Hermite spline interpolation
    pub fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }

    /// Component-wise lerp of two equally sized slices into `out`
    pub fn lerp_into(a: &[f32], b: &[f32], t: f32, out: &mut [f32]) {
        for ((o, a), b) in out.iter_mut().zip(a).zip(b) {
            *o = Self::lerp(*a, *b, t);
        }
    }

    /// Spherical linear interpolation of two quaternions into `out`
    pub fn slerp_into(a: &[f32], b: &[f32], t: f32, out: &mut [f32]) {
        let mut dot: f32 = a.iter().zip(b).map(|(a, b)| a * b).sum();

        // Take the short way around
        let sign = if dot < 0.0 {
            dot = -dot;
            -1.0
        } else {
            1.0
        };

        if dot > 0.9995 {
            for ((o, a), b) in out.iter_mut().zip(a).zip(b) {
                *o = Self::lerp(*a, *b * sign, t);
            }
            Self::normalize(out);
            return;
        }

        let theta_0 = dot.acos();
        let theta = theta_0 * t;
        let sin_theta = theta.sin();
        let sin_theta_0 = theta_0.sin();

        let s0 = theta.cos() - dot * sin_theta / sin_theta_0;
        let s1 = sin_theta / sin_theta_0 * sign;

        for ((o, a), b) in out.iter_mut().zip(a).zip(b) {
            *o = a * s0 + b * s1;
        }
    }

    /// Normalize a vector in place; zero-length input is left untouched
    pub fn normalize(values: &mut [f32]) {
        let len = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if len > 0.0 {
            for v in values.iter_mut() {
                *v /= len;
            }
        }
    }
}
