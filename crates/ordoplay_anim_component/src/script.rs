// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered per-frame script loops.
//!
//! Scripts declare the callbacks they implement once, at registration, and
//! are only placed in the loops they take part in. Each loop runs in
//! execution order over a [`SortedLoopArray`], so scripts can create and
//! destroy other scripts (or themselves) mid-frame without any script being
//! skipped or run twice.

use crate::emitter::{EventEmitter, ListenerId};
use crate::sorted_loop_array::SortedLoopArray;
use indexmap::IndexMap;
use ordoplay_anim_graph::ParameterError;
use uuid::Uuid;

/// Largest execution order handed out before live scripts are renumbered.
/// Orders stay exactly representable as `f64` sort keys below this.
pub const MAX_EXECUTION_ORDER: u64 = (1 << 53) - 1;

/// Unique identifier for a registered script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptId(Uuid);

impl ScriptId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ScriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which per-frame callbacks a script implements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Runs in the update loop
    pub update: bool,
    /// Runs in the post-update loop
    pub post_update: bool,
}

/// Error returned by a script callback
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Script-defined failure
    #[error("{0}")]
    Failed(String),

    /// An animation parameter could not be read or written
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// A behaviour driven by the [`ScriptRegistry`]
pub trait ScriptBehaviour: Send {
    /// Name used in logs and events
    fn name(&self) -> &str;

    /// Callbacks this script takes part in
    fn capabilities(&self) -> Capabilities;

    /// Called every frame when [`Capabilities::update`] is set
    fn update(&mut self, _dt: f32, _ctx: &mut ScriptContext) -> Result<(), ScriptError> {
        Ok(())
    }

    /// Called every frame after all updates when
    /// [`Capabilities::post_update`] is set
    fn post_update(&mut self, _dt: f32, _ctx: &mut ScriptContext) -> Result<(), ScriptError> {
        Ok(())
    }
}

enum ScriptCommand {
    Create(Box<dyn ScriptBehaviour>),
    Destroy(ScriptId),
}

/// Handle passed to a running callback. Requests are applied as soon as the
/// callback returns.
pub struct ScriptContext {
    id: ScriptId,
    commands: Vec<ScriptCommand>,
}

impl ScriptContext {
    fn new(id: ScriptId) -> Self {
        Self {
            id,
            commands: Vec::new(),
        }
    }

    /// Id of the running script
    pub fn id(&self) -> ScriptId {
        self.id
    }

    /// Register a new script after this callback
    pub fn create(&mut self, script: impl ScriptBehaviour + 'static) {
        self.commands.push(ScriptCommand::Create(Box::new(script)));
    }

    /// Destroy script `id` after this callback
    pub fn destroy(&mut self, id: ScriptId) {
        self.commands.push(ScriptCommand::Destroy(id));
    }

    /// Destroy the running script after this callback
    pub fn destroy_self(&mut self) {
        self.destroy(self.id);
    }
}

/// Monotonic source of execution orders
#[derive(Debug, Clone)]
pub struct ExecutionOrder {
    counter: u64,
    limit: u64,
}

impl Default for ExecutionOrder {
    fn default() -> Self {
        Self::with_limit(MAX_EXECUTION_ORDER)
    }
}

impl ExecutionOrder {
    /// Counter starting at 0 with the default limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter starting at 0 that is exhausted past `limit`
    pub fn with_limit(limit: u64) -> Self {
        Self { counter: 0, limit }
    }

    /// Take the next order
    pub fn next(&mut self) -> u64 {
        let order = self.counter;
        self.counter = self.counter.saturating_add(1);
        order
    }

    /// Whether the counter passed its limit
    pub fn exhausted(&self) -> bool {
        self.counter > self.limit
    }

    /// Continue counting from `counter`
    pub fn restart(&mut self, counter: u64) {
        self.counter = counter;
    }
}

/// Something that happened to a registered script
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptEvent {
    /// A script was registered
    Created {
        /// Script id
        id: ScriptId,
        /// Script name
        name: String,
    },
    /// A script was removed
    Destroyed {
        /// Script id
        id: ScriptId,
        /// Script name
        name: String,
    },
    /// A callback failed and the script was disabled
    Error {
        /// Script id
        id: ScriptId,
        /// Script name
        name: String,
        /// Error text
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LoopEntry {
    id: ScriptId,
    order: u64,
}

fn loop_order(entry: &LoopEntry) -> f64 {
    entry.order as f64
}

struct ScriptSlot {
    behaviour: Box<dyn ScriptBehaviour>,
    capabilities: Capabilities,
    order: u64,
    enabled: bool,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Update,
    PostUpdate,
}

/// Owns scripts and runs their update and post-update loops
pub struct ScriptRegistry {
    scripts: IndexMap<ScriptId, ScriptSlot>,
    update_list: SortedLoopArray<LoopEntry>,
    post_update_list: SortedLoopArray<LoopEntry>,
    execution_order: ExecutionOrder,
    emitter: EventEmitter<ScriptEvent>,
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        Self::new(ExecutionOrder::new())
    }
}

impl std::fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("scripts", &self.scripts.len())
            .field("execution_order", &self.execution_order)
            .finish_non_exhaustive()
    }
}

impl ScriptRegistry {
    /// Create an empty registry drawing orders from `execution_order`
    pub fn new(execution_order: ExecutionOrder) -> Self {
        Self {
            scripts: IndexMap::new(),
            update_list: SortedLoopArray::new(loop_order),
            post_update_list: SortedLoopArray::new(loop_order),
            execution_order,
            emitter: EventEmitter::new(),
        }
    }

    /// Register `script` after every existing one
    pub fn register(&mut self, script: impl ScriptBehaviour + 'static) -> ScriptId {
        self.register_boxed(Box::new(script))
    }

    fn register_boxed(&mut self, behaviour: Box<dyn ScriptBehaviour>) -> ScriptId {
        if self.execution_order.exhausted() {
            self.renumber();
        }

        let id = ScriptId::new();
        let order = self.execution_order.next();
        let capabilities = behaviour.capabilities();
        let entry = LoopEntry { id, order };
        if capabilities.update {
            self.update_list.insert(entry);
        }
        if capabilities.post_update {
            self.post_update_list.insert(entry);
        }

        let name = behaviour.name().to_string();
        tracing::debug!("Registered script {} ({}) at order {}", name, id, order);
        self.scripts.insert(
            id,
            ScriptSlot {
                behaviour,
                capabilities,
                order,
                enabled: true,
            },
        );
        self.emitter.fire(&ScriptEvent::Created { id, name });
        id
    }

    /// Remove script `id`. Returns whether it existed.
    pub fn destroy(&mut self, id: ScriptId) -> bool {
        let Some(slot) = self.scripts.shift_remove(&id) else {
            return false;
        };

        let entry = LoopEntry {
            id,
            order: slot.order,
        };
        if slot.capabilities.update {
            self.update_list.remove(&entry);
        }
        if slot.capabilities.post_update {
            self.post_update_list.remove(&entry);
        }

        let name = slot.behaviour.name().to_string();
        tracing::debug!("Destroyed script {} ({})", name, id);
        self.emitter.fire(&ScriptEvent::Destroyed { id, name });
        true
    }

    /// Whether script `id` is registered
    pub fn contains(&self, id: ScriptId) -> bool {
        self.scripts.contains_key(&id)
    }

    /// Number of registered scripts
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether no script is registered
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Current execution order of script `id`
    pub fn execution_order(&self, id: ScriptId) -> Option<u64> {
        self.scripts.get(&id).map(|slot| slot.order)
    }

    /// Whether script `id` runs
    pub fn enabled(&self, id: ScriptId) -> bool {
        self.scripts.get(&id).is_some_and(|slot| slot.enabled)
    }

    /// Enable or disable script `id`
    pub fn set_enabled(&mut self, id: ScriptId, enabled: bool) {
        if let Some(slot) = self.scripts.get_mut(&id) {
            slot.enabled = enabled;
        }
    }

    /// Subscribe to script events
    pub fn on(&self, handler: impl Fn(&ScriptEvent) + Send + Sync + 'static) -> ListenerId {
        self.emitter.on(handler)
    }

    /// Unsubscribe
    pub fn off(&self, id: ListenerId) -> bool {
        self.emitter.off(id)
    }

    /// Run every update callback in execution order
    pub fn update(&mut self, dt: f32) {
        self.run_loop(Phase::Update, dt);
    }

    /// Run every post-update callback in execution order
    pub fn post_update(&mut self, dt: f32) {
        self.run_loop(Phase::PostUpdate, dt);
    }

    fn list_mut(&mut self, phase: Phase) -> &mut SortedLoopArray<LoopEntry> {
        match phase {
            Phase::Update => &mut self.update_list,
            Phase::PostUpdate => &mut self.post_update_list,
        }
    }

    fn run_loop(&mut self, phase: Phase, dt: f32) {
        self.list_mut(phase).loop_index = 0;
        while let Some(entry) = self.list_mut(phase).current().copied() {
            self.call(entry.id, phase, dt);
            self.list_mut(phase).loop_index += 1;
        }
        self.list_mut(phase).loop_index = -1;
    }

    fn call(&mut self, id: ScriptId, phase: Phase, dt: f32) {
        let Some(slot) = self.scripts.get_mut(&id) else {
            return;
        };
        if !slot.enabled {
            return;
        }

        let mut ctx = ScriptContext::new(id);
        let result = match phase {
            Phase::Update => slot.behaviour.update(dt, &mut ctx),
            Phase::PostUpdate => slot.behaviour.post_update(dt, &mut ctx),
        };

        if let Err(e) = result {
            let name = slot.behaviour.name().to_string();
            tracing::error!("Script {} failed: {}; disabling it", name, e);
            slot.enabled = false;
            self.emitter.fire(&ScriptEvent::Error {
                id,
                name,
                message: e.to_string(),
            });
        }

        for command in ctx.commands {
            match command {
                ScriptCommand::Create(behaviour) => {
                    self.register_boxed(behaviour);
                }
                ScriptCommand::Destroy(target) => {
                    self.destroy(target);
                }
            }
        }
    }

    /// Give live scripts contiguous orders from 0, keeping their sequence
    fn renumber(&mut self) {
        self.scripts.sort_by(|_, a, _, b| a.order.cmp(&b.order));
        for (order, slot) in self.scripts.values_mut().enumerate() {
            slot.order = order as u64;
        }

        for list in [&mut self.update_list, &mut self.post_update_list] {
            for entry in list.items_mut() {
                if let Some(slot) = self.scripts.get(&entry.id) {
                    entry.order = slot.order;
                }
            }
        }

        let live = self.scripts.len() as u64;
        self.execution_order.restart(live);
        tracing::info!("Renumbered {} scripts", live);
    }
}
