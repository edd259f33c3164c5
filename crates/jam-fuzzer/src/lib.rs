//! The fuzzer side of the conformance harness: the client, pluggable block
//! providers, the session runner, and the JSON report writer.

pub mod client;
pub mod error;
pub mod provider;
pub mod report;
pub mod runner;

pub use client::{compare_state_roots, FuzzerClient, FuzzerPhase, ImportOutcome};
pub use error::FuzzerError;
pub use provider::{BlockProvider, GeneratorProvider, Genesis, TraceProvider, Transition};
pub use runner::{FuzzResult, Mismatch};
