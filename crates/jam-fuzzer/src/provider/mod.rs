//! Pluggable block sources (§4.8): a generator that carries its own
//! reference state, or a trace replayer reading pre-recorded transitions.
//! Both are synchronous — neither does I/O per step, so this stays a plain
//! trait rather than pulling in an async-trait dependency the rest of the
//! workspace doesn't otherwise need.

pub mod generator;
pub mod trace;

use jam_state::MerklizationDictionary;
use jam_wire::message::{Block, Header, KeyValue};
use jam_wire::Hash;

pub use generator::GeneratorProvider;
pub use trace::TraceProvider;

/// The genesis a provider hands to `fuzzer.set_state`.
pub struct Genesis {
    pub header: Header,
    pub keyvals: Vec<KeyValue>,
}

/// One `(block, expected_state_root)` pair. `expected_dictionary` is the
/// full local dump behind `expected_root`, carried along so a mismatch
/// report can include it without recomputing state out of band; trace
/// files that don't record a post-state dump leave it `None`.
pub struct Transition {
    pub block: Block,
    pub expected_root: Hash,
    pub expected_dictionary: Option<MerklizationDictionary>,
}

pub trait BlockProvider {
    fn genesis(&self) -> Genesis;
    /// `None` ends the run — the provider is exhausted, not errored.
    fn next(&mut self) -> Option<Transition>;
}
