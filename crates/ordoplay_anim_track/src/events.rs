// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline events attached to tracks.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A named marker on a track's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimEvent {
    /// Event name
    pub name: String,
    /// Time in seconds
    pub time: f32,
    /// Any other fields authored on the event
    #[serde(flatten)]
    pub extras: IndexMap<String, serde_json::Value>,
}

impl AnimEvent {
    /// Create an event with no extra fields
    pub fn new(name: impl Into<String>, time: f32) -> Self {
        Self {
            name: name.into(),
            time,
            extras: IndexMap::new(),
        }
    }

    /// Attach an extra field
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }
}

/// Time-ordered, immutable list of timeline events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<AnimEvent>", into = "Vec<AnimEvent>")]
pub struct AnimEvents {
    events: Vec<AnimEvent>,
}

impl AnimEvents {
    /// Copy `events` and sort the copy by time.
    ///
    /// Events sharing a time may come out in any order.
    pub fn new(events: &[AnimEvent]) -> Self {
        let mut events = events.to_vec();
        events.sort_unstable_by(|a, b| a.time.total_cmp(&b.time));
        Self { events }
    }

    /// Events in ascending time order
    pub fn events(&self) -> &[AnimEvent] {
        &self.events
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether there are no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events with `start <= time < end`
    pub fn in_range(&self, start: f32, end: f32) -> impl Iterator<Item = &AnimEvent> {
        let first = self.events.partition_point(|e| e.time < start);
        self.events[first..].iter().take_while(move |e| e.time < end)
    }
}

impl From<Vec<AnimEvent>> for AnimEvents {
    fn from(events: Vec<AnimEvent>) -> Self {
        Self::new(&events)
    }
}

impl From<AnimEvents> for Vec<AnimEvent> {
    fn from(events: AnimEvents) -> Self {
        events.events
    }
}
