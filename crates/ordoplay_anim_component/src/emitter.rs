// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed observer lists.

use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Handle returned by [`EventEmitter::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Listener<E> {
    id: ListenerId,
    once: bool,
    handler: Handler<E>,
}

impl<E> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            once: self.once,
            handler: self.handler.clone(),
        }
    }
}

/// A list of handlers for events of type `E`.
///
/// Clones share the same list, so a handler may hold a clone and subscribe or
/// unsubscribe while an event is being dispatched. Such changes apply from the
/// next [`fire`](Self::fire) on.
pub struct EventEmitter<E> {
    listeners: Arc<Mutex<Vec<Listener<E>>>>,
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl<E> EventEmitter<E> {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every event
    pub fn on(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        self.subscribe(handler, false)
    }

    /// Call `handler` for the next event only
    pub fn once(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        self.subscribe(handler, true)
    }

    /// Unsubscribe. Returns whether the listener was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Whether any listener is registered
    pub fn has_listeners(&self) -> bool {
        !self.listeners.lock().is_empty()
    }

    /// Dispatch `event` to the listeners registered right now
    pub fn fire(&self, event: &E) {
        let snapshot = {
            let mut listeners = self.listeners.lock();
            let snapshot = listeners.clone();
            listeners.retain(|l| !l.once);
            snapshot
        };

        for listener in &snapshot {
            (listener.handler)(event);
        }
    }

    fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static, once: bool) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.lock().push(Listener {
            id,
            once,
            handler: Arc::new(handler),
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_on_off_once() {
        let emitter = EventEmitter::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let sum = total.clone();
        let id = emitter.on(move |v| {
            sum.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let count = total.clone();
        emitter.once(move |_| {
            count.fetch_add(100, Ordering::SeqCst);
        });

        emitter.fire(&1);
        emitter.fire(&2);
        assert_eq!(total.load(Ordering::SeqCst), 103);

        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        emitter.fire(&5);
        assert_eq!(total.load(Ordering::SeqCst), 103);
        assert!(!emitter.has_listeners());
    }

    #[test]
    fn test_changes_during_dispatch_apply_next_time() {
        let emitter = EventEmitter::<()>::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let second = {
            let calls = calls.clone();
            emitter.on(move |_| calls.lock().push("second"))
        };
        let first = {
            let calls = calls.clone();
            let inner = emitter.clone();
            emitter.on(move |_| {
                calls.lock().push("first");
                inner.off(second);
                let calls = calls.clone();
                inner.on(move |_| calls.lock().push("late"));
            })
        };

        emitter.fire(&());
        assert_eq!(*calls.lock(), vec!["second", "first"]);

        emitter.off(first);
        calls.lock().clear();
        emitter.fire(&());
        assert_eq!(*calls.lock(), vec!["late"]);
    }
}
