// SPDX-License-Identifier: MIT OR Apache-2.0
//! A sorted array that tolerates insertion and removal while it is being
//! looped over.
//!
//! The code driving a frame loop owns [`SortedLoopArray::loop_index`]: it sets
//! it to 0, visits `items()[loop_index]`, increments, and resets it to -1 when
//! done. Callbacks invoked from inside the loop may call
//! [`insert`](SortedLoopArray::insert) and [`remove`](SortedLoopArray::remove),
//! which shift `loop_index` so the loop neither skips nor repeats an element.
//!
//! [`sort`](SortedLoopArray::sort) keeps the visited element under the cursor,
//! but if that element moves to an earlier index, a plain incrementing loop
//! visits some elements twice in the same pass. Do not sort mid-loop.

/// Sort key of an element
pub type SortKey<T> = fn(&T) -> f64;

/// Array kept in ascending key order, safe to mutate during iteration
#[derive(Debug, Clone)]
pub struct SortedLoopArray<T> {
    items: Vec<T>,
    key: SortKey<T>,
    /// Index of the element being visited, or -1 outside a loop
    pub loop_index: isize,
}

impl<T: PartialEq> SortedLoopArray<T> {
    /// Create an empty array ordered by `key`
    pub fn new(key: SortKey<T>) -> Self {
        Self {
            items: Vec::new(),
            key,
            loop_index: -1,
        }
    }

    /// Elements in order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Mutable elements. Changing a key through this breaks the ordering
    /// until the next [`sort`](Self::sort).
    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the array is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Element under the cursor
    pub fn current(&self) -> Option<&T> {
        usize::try_from(self.loop_index)
            .ok()
            .and_then(|index| self.items.get(index))
    }

    /// Insert after every element with a key `<=` the new one
    pub fn insert(&mut self, item: T) {
        let key = (self.key)(&item);
        let position = self.items.partition_point(|e| (self.key)(e) <= key);
        self.items.insert(position, item);

        if self.loop_index >= position as isize {
            self.loop_index += 1;
        }
    }

    /// Push to the end without checking the order. The caller guarantees
    /// the key is not smaller than the last one.
    pub fn append(&mut self, item: T) {
        self.items.push(item);
    }

    /// Remove the first element equal to `item`. Returns whether one was
    /// found.
    pub fn remove(&mut self, item: &T) -> bool {
        let Some(index) = self.items.iter().position(|e| e == item) else {
            return false;
        };
        self.items.remove(index);

        if self.loop_index >= index as isize {
            self.loop_index -= 1;
        }
        true
    }

    /// Re-sort every element, keeping the cursor on the element it was on
    pub fn sort(&mut self) {
        let key = self.key;
        let mut order: Vec<usize> = (0..self.items.len()).collect();
        order.sort_by(|&a, &b| key(&self.items[a]).total_cmp(&key(&self.items[b])));

        if let Ok(current) = usize::try_from(self.loop_index) {
            if let Some(position) = order.iter().position(|&index| index == current) {
                self.loop_index = position as isize;
            }
        }

        let mut slots: Vec<Option<T>> = self.items.drain(..).map(Some).collect();
        self.items = order
            .iter()
            .filter_map(|&index| slots[index].take())
            .collect();
    }
}
