// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation tracks for `OrdoPlay`.
//!
//! This crate holds the read-only side of the animation runtime:
//! - Keyframe buffers and curves
//! - Bracketing caches for fast playback sampling
//! - Snapshot evaluation of a track at a point in time
//! - Timeline events
//! - Layer masks and the target binder contract
//!
//! ## Architecture
//!
//! Tracks are immutable and shared behind `Arc`. Everything that changes
//! while a track plays lives in a caller-owned [`AnimSnapshot`], so any
//! number of clips can evaluate the same track without coordination.

pub mod binding;
pub mod cache;
pub mod events;
pub mod keyframe;
pub mod track;

pub use binding::{AnimBinder, AnimBlendType, AnimMask, MaskEntry, PropertyBinder, TargetValue};
pub use cache::AnimCache;
pub use events::{AnimEvent, AnimEvents};
pub use keyframe::{Interpolation, InterpolationMode};
pub use track::{AnimCurve, AnimData, AnimSnapshot, AnimTrack, AnimTrackData, TrackError};
