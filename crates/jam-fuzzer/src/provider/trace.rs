//! The trace-replay provider (§4.8) — loads an ordered sequence of
//! pre-recorded `(pre_state, block, post_state)` transitions from disk and
//! replays them, using the recorded roots as the oracle instead of an STF.

use std::path::Path;

use jam_wire::message::{Block, Header, KeyValue};
use jam_wire::Hash;
use serde::{Deserialize, Serialize};

use super::{BlockProvider, Genesis, Transition};
use crate::error::FuzzerError;

#[derive(Debug, Serialize, Deserialize)]
struct RawHeader {
    parent: String,
    slot: u32,
    opaque: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawBlock {
    header: RawHeader,
    extrinsic: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawKeyValue {
    key: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawGenesis {
    header: RawHeader,
    keyvals: Vec<RawKeyValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawTransition {
    block: RawBlock,
    expected_root: String,
    /// Optional full post-state dump, for mismatch reports to include a
    /// local dictionary alongside the target's. Absent in traces recorded
    /// before this was added.
    #[serde(default)]
    post_keyvals: Option<Vec<RawKeyValue>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawTraceFile {
    genesis: RawGenesis,
    transitions: Vec<RawTransition>,
}

fn decode_hash(hex_str: &str) -> Result<Hash, FuzzerError> {
    let bytes = hex::decode(hex_str).map_err(|e| {
        FuzzerError::Message(jam_wire::MessageError::InvalidFormat(format!(
            "bad hex in trace file: {e}"
        )))
    })?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        FuzzerError::Message(jam_wire::MessageError::InvalidFormat(format!(
            "expected a 32-byte hash, got {} bytes",
            bytes.len()
        )))
    })
}

fn decode_key(hex_str: &str) -> Result<[u8; 31], FuzzerError> {
    let bytes = hex::decode(hex_str).map_err(|e| {
        FuzzerError::Message(jam_wire::MessageError::InvalidFormat(format!(
            "bad hex in trace file: {e}"
        )))
    })?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        FuzzerError::Message(jam_wire::MessageError::InvalidFormat(format!(
            "expected a 31-byte key, got {} bytes",
            bytes.len()
        )))
    })
}

fn decode_header(raw: RawHeader) -> Result<Header, FuzzerError> {
    Ok(Header {
        parent: decode_hash(&raw.parent)?,
        slot: raw.slot,
        opaque: hex::decode(&raw.opaque).map_err(|e| {
            FuzzerError::Message(jam_wire::MessageError::InvalidFormat(format!(
                "bad hex in trace file: {e}"
            )))
        })?,
    })
}

pub struct TraceProvider {
    genesis_header: Header,
    genesis_keyvals: Vec<KeyValue>,
    transitions: std::vec::IntoIter<RawTransition>,
}

impl TraceProvider {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FuzzerError> {
        let text = std::fs::read_to_string(path)?;
        let raw: RawTraceFile = serde_json::from_str(&text)?;

        let genesis_header = decode_header(raw.genesis.header)?;
        let mut genesis_keyvals = Vec::with_capacity(raw.genesis.keyvals.len());
        for kv in raw.genesis.keyvals {
            genesis_keyvals.push(KeyValue {
                key: decode_key(&kv.key)?,
                value: hex::decode(&kv.value).map_err(|e| {
                    FuzzerError::Message(jam_wire::MessageError::InvalidFormat(format!(
                        "bad hex in trace file: {e}"
                    )))
                })?,
            });
        }

        Ok(Self {
            genesis_header,
            genesis_keyvals,
            transitions: raw.transitions.into_iter(),
        })
    }
}

impl BlockProvider for TraceProvider {
    fn genesis(&self) -> Genesis {
        Genesis {
            header: self.genesis_header.clone(),
            keyvals: self.genesis_keyvals.clone(),
        }
    }

    fn next(&mut self) -> Option<Transition> {
        let raw = self.transitions.next()?;
        let header = decode_header(raw.block.header).ok()?;
        let extrinsic = hex::decode(&raw.block.extrinsic).ok()?;
        let expected_root = decode_hash(&raw.expected_root).ok()?;

        let expected_dictionary = raw.post_keyvals.and_then(|entries| {
            let mut keyvals = Vec::with_capacity(entries.len());
            for kv in entries {
                keyvals.push(KeyValue {
                    key: decode_key(&kv.key).ok()?,
                    value: hex::decode(&kv.value).ok()?,
                });
            }
            jam_state::MerklizationDictionary::from_wire(keyvals).ok()
        });

        Some(Transition {
            block: Block { header, extrinsic },
            expected_root,
            expected_dictionary,
        })
    }
}
