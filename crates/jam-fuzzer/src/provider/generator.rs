//! The generator provider (§4.8) — owns a reference structured state and a
//! deterministic PRNG seeded by the session seed, and drives both the next
//! block and the locally expected root from it.

use jam_state::{flatten, ComponentId, StructuredState};
use jam_target::{ReferenceStf, Stf};
use jam_wire::message::{Block, Header};
use jam_wire::Params;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{BlockProvider, Genesis, Transition};

/// Builds a deterministic genesis state sized by `params` — an empty
/// validator/core ledger plus one demo service, enough to exercise shape
/// A, B, and C keys from block zero.
fn genesis_state(params: &Params) -> StructuredState {
    let mut state = StructuredState::new();
    state.set_component(ComponentId::AuthPools, Vec::new());
    state.set_component(ComponentId::AuthQueue, Vec::new());
    state.set_component(ComponentId::RecentHistory, Vec::new());
    state.set_component(ComponentId::SafroleState, Vec::new());
    state.set_component(ComponentId::Judgements, Vec::new());
    state.set_component(ComponentId::EntropyPool, [0u8; 32].to_vec());
    state.set_component(ComponentId::ValidatorQueue, params.validator_count.to_le_bytes().to_vec());
    state.set_component(ComponentId::CurrentValidators, params.validator_count.to_le_bytes().to_vec());
    state.set_component(ComponentId::PreviousValidators, params.validator_count.to_le_bytes().to_vec());
    state.set_component(ComponentId::AvailabilityAssignments, params.core_count.to_le_bytes().to_vec());
    state.set_component(ComponentId::TimeSlot, 0u32.to_le_bytes().to_vec());
    state.set_component(ComponentId::PrivilegedServices, Vec::new());
    state.set_component(ComponentId::ActivityStatistics, Vec::new());
    state.set_component(ComponentId::AccumulationQueue, Vec::new());

    let mut demo = jam_state::ServiceAccount::new([0x42; 32]);
    demo.balance = 1_000_000;
    demo.storage.insert(b"genesis".to_vec(), b"seed".to_vec());
    state.services.insert(0, demo);

    state
}

pub struct GeneratorProvider {
    reference_state: StructuredState,
    stf: ReferenceStf,
    rng: StdRng,
    last_header: Header,
    remaining_blocks: usize,
}

impl GeneratorProvider {
    pub fn new(seed: u64, num_blocks: usize, params: &Params) -> Self {
        Self {
            reference_state: genesis_state(params),
            stf: ReferenceStf::default(),
            rng: StdRng::seed_from_u64(seed),
            last_header: Header {
                parent: [0u8; 32],
                slot: 0,
                opaque: Vec::new(),
            },
            remaining_blocks: num_blocks,
        }
    }
}

impl BlockProvider for GeneratorProvider {
    fn genesis(&self) -> Genesis {
        let dict = flatten(&self.reference_state);
        Genesis {
            header: self.last_header.clone(),
            keyvals: dict.to_wire(),
        }
    }

    fn next(&mut self) -> Option<Transition> {
        if self.remaining_blocks == 0 {
            return None;
        }
        self.remaining_blocks -= 1;

        let parent = self.last_header.header_hash();
        let slot = self.last_header.slot + 1;
        let extrinsic_len = self.rng.gen_range(0..64);
        let extrinsic: Vec<u8> = (0..extrinsic_len).map(|_| self.rng.r#gen()).collect();

        let header = Header {
            parent,
            slot,
            opaque: Vec::new(),
        };
        let block = Block { header, extrinsic };

        let next_state = self
            .stf
            .apply(&self.reference_state, &block)
            .expect("the reference STF never rejects its own generated blocks");
        let dict = flatten(&next_state);
        let expected_root = dict.root();

        self.reference_state = next_state;
        self.last_header = block.header.clone();

        Some(Transition {
            block,
            expected_root,
            expected_dictionary: Some(dict),
        })
    }
}
