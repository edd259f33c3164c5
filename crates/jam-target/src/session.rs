//! The target state machine (§4.6) — owns one structured state, one
//! optional pending import result, and the fork-detection trail.

use jam_state::{rebuild, StructuredState};
use jam_wire::message::{AncestryItem, Block, Header, KeyValue, PeerInfo, Version};
use jam_wire::{Hash, Message, FEATURE_ANCESTRY, IMPLEMENTED_FEATURES};

use crate::error::TargetError;
use crate::stf::Stf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    Initial,
    HandshakeComplete,
    Ready,
    ShuttingDown,
}

/// The uncommitted output of the most recent successful `ImportBlock`.
struct PendingImport {
    state: StructuredState,
    root: Hash,
}

pub struct TargetSession {
    phase: TargetPhase,
    negotiated_features: u32,
    structured_state: Option<StructuredState>,
    current_state_root: Option<Hash>,
    pending: Option<PendingImport>,
    last_block_hash: Option<Hash>,
    last_block_parent: Option<Hash>,
    last_block_state_root: Option<Hash>,
    stf: Box<dyn Stf>,
    app_name: String,
    app_version: Version,
    jam_version: Version,
}

enum ForkKind {
    First,
    Sequential,
    Fork,
}

impl TargetSession {
    pub fn new(stf: Box<dyn Stf>, app_name: impl Into<String>, app_version: Version) -> Self {
        Self {
            phase: TargetPhase::Initial,
            negotiated_features: 0,
            structured_state: None,
            current_state_root: None,
            pending: None,
            last_block_hash: None,
            last_block_parent: None,
            last_block_state_root: None,
            stf,
            app_name: app_name.into(),
            app_version,
            jam_version: Version {
                major: 0,
                minor: 6,
                patch: 7,
            },
        }
    }

    pub fn phase(&self) -> TargetPhase {
        self.phase
    }

    pub fn is_shutting_down(&self) -> bool {
        self.phase == TargetPhase::ShuttingDown
    }

    pub fn on_peer_info(&mut self, remote: PeerInfo) -> Result<Message, TargetError> {
        if !matches!(self.phase, TargetPhase::Initial | TargetPhase::HandshakeComplete) {
            return Err(TargetError::UnexpectedMessage);
        }
        self.negotiated_features = remote.fuzz_features & IMPLEMENTED_FEATURES;
        self.phase = TargetPhase::HandshakeComplete;
        Ok(Message::PeerInfo(PeerInfo {
            fuzz_version: remote.fuzz_version,
            fuzz_features: IMPLEMENTED_FEATURES,
            jam_version: self.jam_version,
            app_version: self.app_version,
            app_name: self.app_name.clone(),
        }))
    }

    pub fn on_initialize(
        &mut self,
        header: Header,
        keyvals: Vec<KeyValue>,
        ancestry: Vec<AncestryItem>,
    ) -> Result<Message, TargetError> {
        if !matches!(self.phase, TargetPhase::HandshakeComplete | TargetPhase::Ready) {
            return Err(TargetError::HandshakeNotComplete);
        }
        // The genesis header carries no fork-trail seed of its own — the
        // trail starts empty and the first `ImportBlock` is always treated
        // as `ForkKind::First` regardless of what it declares as parent.
        let _ = header;

        self.pending = None;
        self.last_block_hash = None;
        self.last_block_parent = None;
        self.last_block_state_root = None;

        let dict = jam_state::from_wire(keyvals)?;
        let root = dict.root();
        let mut state = rebuild(&dict)?;
        if self.negotiated_features & FEATURE_ANCESTRY != 0 {
            state.ancestry = ancestry;
        }

        self.structured_state = Some(state);
        self.current_state_root = Some(root);
        self.last_block_state_root = Some(root);
        self.phase = TargetPhase::Ready;

        Ok(Message::StateRoot(root))
    }

    pub fn on_import_block(&mut self, block: Block) -> Result<Message, TargetError> {
        if self.phase != TargetPhase::Ready {
            return Err(TargetError::StateNotReady);
        }

        let block_hash = block.header.header_hash();
        let fork_kind = match self.last_block_hash {
            None => ForkKind::First,
            Some(last_hash) if block.header.parent == last_hash => ForkKind::Sequential,
            _ => match self.last_block_parent {
                Some(last_parent) if block.header.parent == last_parent => ForkKind::Fork,
                _ => {
                    return Ok(Message::Error(
                        "Invalid parent hash: not last block or parent".to_string(),
                    ))
                }
            },
        };

        match fork_kind {
            ForkKind::Sequential => {
                if let Some(pending) = self.pending.take() {
                    self.structured_state = Some(pending.state);
                    self.last_block_state_root = Some(pending.root);
                }
            }
            ForkKind::Fork => {
                if self.pending.take().is_some() {
                    self.current_state_root = self.last_block_state_root;
                }
            }
            ForkKind::First => {}
        }

        self.last_block_hash = Some(block_hash);
        self.last_block_parent = Some(block.header.parent);

        let committed = self
            .structured_state
            .as_ref()
            .expect("Ready phase implies structured_state is set");

        match self.stf.apply(committed, &block) {
            Ok(next_state) => {
                let root = jam_state::flatten(&next_state).root();
                self.pending = Some(PendingImport {
                    state: next_state,
                    root,
                });
                self.current_state_root = Some(root);
                Ok(Message::StateRoot(root))
            }
            Err(reason) => Ok(Message::Error(format!("Block import failed: {reason}"))),
        }
    }

    pub fn on_get_state(&mut self, _header_hash: Hash) -> Result<Message, TargetError> {
        if self.phase != TargetPhase::Ready {
            return Err(TargetError::StateNotReady);
        }
        let view = match &self.pending {
            Some(pending) => &pending.state,
            None => self
                .structured_state
                .as_ref()
                .expect("Ready phase implies structured_state is set"),
        };
        let keyvals = jam_state::flatten(view).to_wire();
        Ok(Message::State(keyvals))
    }

    pub fn on_kill(&mut self) {
        self.phase = TargetPhase::ShuttingDown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stf::ReferenceStf;
    use jam_state::flatten;
    use jam_wire::Block as WireBlock;

    fn genesis_state() -> StructuredState {
        let mut state = StructuredState::new();
        for id in jam_state::ALL_COMPONENTS {
            state.set_component(id, vec![0]);
        }
        state
    }

    fn session() -> TargetSession {
        TargetSession::new(
            Box::new(ReferenceStf::default()),
            "test-target",
            Version {
                major: 0,
                minor: 1,
                patch: 0,
            },
        )
    }

    fn peer_info() -> PeerInfo {
        PeerInfo {
            fuzz_version: 1,
            fuzz_features: jam_wire::FEATURE_FORK | jam_wire::FEATURE_ANCESTRY,
            jam_version: Version {
                major: 0,
                minor: 6,
                patch: 0,
            },
            app_version: Version {
                major: 1,
                minor: 0,
                patch: 0,
            },
            app_name: "fuzzer".to_string(),
        }
    }

    fn block(parent: Hash, slot: u32) -> WireBlock {
        WireBlock {
            header: Header {
                parent,
                slot,
                opaque: Vec::new(),
            },
            extrinsic: Vec::new(),
        }
    }

    #[test]
    fn peer_info_negotiates_features_and_advances_phase() {
        let mut s = session();
        let reply = s.on_peer_info(peer_info()).unwrap();
        assert_eq!(s.phase(), TargetPhase::HandshakeComplete);
        match reply {
            Message::PeerInfo(info) => {
                assert_eq!(info.fuzz_features, IMPLEMENTED_FEATURES)
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn initialize_out_of_phase_fails() {
        let mut s = session();
        let dict = flatten(&genesis_state());
        let err = s
            .on_initialize(
                Header {
                    parent: [0; 32],
                    slot: 0,
                    opaque: vec![],
                },
                dict.to_wire(),
                vec![],
            )
            .unwrap_err();
        assert!(matches!(err, TargetError::HandshakeNotComplete));
    }

    #[test]
    fn import_block_matches_locally_computed_root() {
        let mut s = session();
        s.on_peer_info(peer_info()).unwrap();
        let genesis = genesis_state();
        let dict = flatten(&genesis);
        let genesis_root = dict.root();
        let reply = s
            .on_initialize(
                Header {
                    parent: [0; 32],
                    slot: 0,
                    opaque: vec![],
                },
                dict.to_wire(),
                vec![],
            )
            .unwrap();
        assert_eq!(reply, Message::StateRoot(genesis_root));

        let b1 = block([0; 32], 1);
        let expected = flatten(
            &ReferenceStf::default()
                .apply(&genesis, &b1)
                .unwrap(),
        )
        .root();
        let reply = s.on_import_block(b1).unwrap();
        assert_eq!(reply, Message::StateRoot(expected));
    }

    #[test]
    fn sibling_block_rewinds_to_the_last_committed_root() {
        let mut s = session();
        s.on_peer_info(peer_info()).unwrap();
        let genesis = genesis_state();
        let dict = flatten(&genesis);
        s.on_initialize(
            Header {
                parent: [0; 32],
                slot: 0,
                opaque: vec![],
            },
            dict.to_wire(),
            vec![],
        )
        .unwrap();

        let b1 = block([0; 32], 1);
        s.on_import_block(b1).unwrap();

        let b1_sibling = block([0; 32], 2);
        let expected = flatten(&ReferenceStf::default().apply(&genesis, &b1_sibling).unwrap()).root();
        let reply = s.on_import_block(b1_sibling).unwrap();
        assert_eq!(reply, Message::StateRoot(expected));
    }

    #[test]
    fn invalid_parent_yields_wire_error_and_stays_ready() {
        let mut s = session();
        s.on_peer_info(peer_info()).unwrap();
        let dict = flatten(&genesis_state());
        s.on_initialize(
            Header {
                parent: [0; 32],
                slot: 0,
                opaque: vec![],
            },
            dict.to_wire(),
            vec![],
        )
        .unwrap();

        let bogus = block([0xFF; 32], 1);
        let reply = s.on_import_block(bogus).unwrap();
        assert!(matches!(reply, Message::Error(_)));
        assert_eq!(s.phase(), TargetPhase::Ready);
    }

    #[test]
    fn get_state_returns_the_pending_merged_view_when_present() {
        let mut s = session();
        s.on_peer_info(peer_info()).unwrap();
        let genesis = genesis_state();
        let dict = flatten(&genesis);
        s.on_initialize(
            Header {
                parent: [0; 32],
                slot: 0,
                opaque: vec![],
            },
            dict.to_wire(),
            vec![],
        )
        .unwrap();

        let b1 = block([0; 32], 1);
        let expected_root = flatten(&ReferenceStf::default().apply(&genesis, &b1).unwrap()).root();
        s.on_import_block(b1).unwrap();

        let reply = s.on_get_state([0; 32]).unwrap();
        match reply {
            Message::State(items) => {
                let dict = jam_state::from_wire(items).unwrap();
                assert_eq!(dict.root(), expected_root);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }
}
