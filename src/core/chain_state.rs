use std::sync::RwLock;

use once_cell::sync::Lazy;

/// Read-only view of the chain-state singleton (SPEC_FULL.md §4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChainStateView {
    pub slot: Option<u64>,
    pub parent: Option<u64>,
    pub root: Option<u64>,
    pub last_slot_at_ms: Option<i64>,
}

/// Partial update carried by a slot notification. Absent fields are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotEvent {
    pub slot: Option<u64>,
    pub parent: Option<u64>,
    pub root: Option<u64>,
}

#[derive(Debug, Default)]
struct Inner {
    slot: Option<u64>,
    parent: Option<u64>,
    root: Option<u64>,
    last_slot_at_ms: Option<i64>,
}

/// Process-wide chain state. Obtained via [`ChainState::global`].
pub struct ChainState {
    inner: RwLock<Inner>,
}

static GLOBAL: Lazy<ChainState> = Lazy::new(ChainState::new);

impl ChainState {
    fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn global() -> &'static ChainState {
        &GLOBAL
    }

    /// Applies a (possibly partial) slot notification, coercing fields that are
    /// present and leaving the rest untouched.
    pub fn update_from_slot_event(&self, event: SlotEvent) {
        let mut guard = self.inner.write().expect("chain state lock poisoned");
        if event.slot.is_some() {
            guard.slot = event.slot;
        }
        if event.parent.is_some() {
            guard.parent = event.parent;
        }
        if event.root.is_some() {
            guard.root = event.root;
        }
        guard.last_slot_at_ms = Some(now_ms());
    }

    pub fn get(&self) -> ChainStateView {
        let guard = self.inner.read().expect("chain state lock poisoned");
        ChainStateView {
            slot: guard.slot,
            parent: guard.parent,
            root: guard.root,
            last_slot_at_ms: guard.last_slot_at_ms,
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
