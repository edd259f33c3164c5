//! Structured protocol state (§3) — 14 opaque simple components plus a
//! `services` map.
//!
//! The internals of each simple component (validator sets, entropy pools,
//! Safrole ticket state, …) belong to the full JAM state-transition
//! function, which is out of scope here (§1). Each component is carried as
//! an opaque, component-tagged byte blob the way `compute_types::TaskSubmit`
//! in the daemon workspace treats its JSON payload as opaque cargo the
//! transport never needs to interpret. `ServiceAccount` is the one place
//! this crate looks inside the box, because the state converter must be
//! able to enumerate its storage/preimage sub-maps to produce shape-C keys.

use std::collections::BTreeMap;

use jam_wire::{Hash, ServiceId};

use crate::key::ComponentId;

/// An opaque simple component — its bytes are whatever the component's own
/// codec (out of scope here) produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Component(pub Vec<u8>);

/// A service account: base fields, a storage map, preimage blobs by hash,
/// and preimage-lookup timestamps keyed by `(hash, length)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceAccount {
    /// Hash of the service's code.
    pub code_hash: Hash,
    /// Account balance, in the protocol's base unit.
    pub balance: u64,
    /// Minimum gas the service requires for on-transfer invocation.
    pub min_item_gas: u64,
    /// Minimum gas the service requires for on-accumulate invocation.
    pub min_memo_gas: u64,
    /// Bytes/items footprint accounting.
    pub footprint_bytes: u64,
    pub footprint_items: u32,
    /// Slot this account was created at.
    pub created_at: u32,
    /// Parent service id, if this account was spun off from another.
    pub parent_service: Option<ServiceId>,

    pub storage: BTreeMap<Vec<u8>, Vec<u8>>,
    pub preimages: BTreeMap<Hash, Vec<u8>>,
    /// Lookup timestamps keyed by `(preimage hash, declared length)`.
    pub preimage_lookups: BTreeMap<(Hash, u32), Vec<u32>>,
}

impl ServiceAccount {
    pub fn new(code_hash: Hash) -> Self {
        Self {
            code_hash,
            ..Default::default()
        }
    }
}

/// The full structured protocol state: 14 simple components plus services.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructuredState {
    pub components: BTreeMap<ComponentId, Component>,
    pub services: BTreeMap<ServiceId, ServiceAccount>,
    /// Ancestry seeded from `Initialize` when the `ANCESTRY` feature is
    /// negotiated (§4.6). Not itself one of the 14 numbered components —
    /// it augments `RecentHistory` rather than replacing it, since the
    /// real protocol's recent-history component already carries a window
    /// of ancestors and this harness does not model that window's exact
    /// shape (§1: STF internals out of scope).
    pub ancestry: Vec<jam_wire::AncestryItem>,
}

impl StructuredState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_component(&mut self, id: ComponentId, bytes: Vec<u8>) {
        self.components.insert(id, Component(bytes));
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }
}
