//! The external state-transition function boundary (§1, §4.6). The full JAM
//! STF — cryptography, VRFs, the accumulation VM, validator rotation — is
//! out of scope for this core; it is consumed here through one narrow
//! trait, the way `summit_services::ChunkService` lets `ServiceDispatcher`
//! stay ignorant of what a chunk handler actually does with its payload.

use jam_state::StructuredState;
use jam_wire::message::Block;

/// A pure `(state, block) -> new_state` step. Implementations may reject a
/// block by returning `Err` with a short, human-readable reason; the reason
/// is surfaced verbatim in a wire `Error("Block import failed: <reason>")`.
pub trait Stf: Send + Sync {
    fn apply(&self, state: &StructuredState, block: &Block) -> Result<StructuredState, String>;
}

/// Minimal default STF used when no conformance implementation is wired in.
///
/// It advances the `TimeSlot` component to the block's slot and appends an
/// ancestry entry, which is enough to exercise fork handling and root
/// divergence in tests without modeling any real protocol semantics.
pub struct ReferenceStf {
    /// Ancestry entries retained; matches the window a real `RecentHistory`
    /// component would bound. Older entries are dropped, oldest first.
    pub ancestry_window: usize,
}

impl Default for ReferenceStf {
    fn default() -> Self {
        Self { ancestry_window: 32 }
    }
}

impl Stf for ReferenceStf {
    fn apply(&self, state: &StructuredState, block: &Block) -> Result<StructuredState, String> {
        let mut next = state.clone();

        next.set_component(
            jam_state::ComponentId::TimeSlot,
            block.header.slot.to_le_bytes().to_vec(),
        );

        next.ancestry.push(jam_wire::AncestryItem {
            header_hash: block.header.header_hash(),
            slot: block.header.slot,
        });
        if next.ancestry.len() > self.ancestry_window {
            let overflow = next.ancestry.len() - self.ancestry_window;
            next.ancestry.drain(0..overflow);
        }

        Ok(next)
    }
}
