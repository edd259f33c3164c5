//! The tagged union of protocol messages and their canonical byte encoding.
//!
//! Encoding is hand-rolled rather than `serde_json` because §4.2 requires a
//! bit-exact canonical byte order between implementations, not merely a
//! readable interchange format. One tag byte identifies the variant, then
//! the payload follows in field order: fixed-width integers little-endian,
//! strings and blobs length-prefixed with a u32 LE count.

use std::convert::TryInto;

use crate::Hash;

/// Feature bit: fork-aware block import is negotiated.
pub const FEATURE_FORK: u32 = 0x01;
/// Feature bit: ancestry seeding on `Initialize` is negotiated.
pub const FEATURE_ANCESTRY: u32 = 0x02;
/// Features this build implements. Negotiated with the peer by bitwise AND.
pub const IMPLEMENTED_FEATURES: u32 = FEATURE_FORK | FEATURE_ANCESTRY;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("unknown message tag: 0x{0:02x}")]
    UnknownMessage(u8),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

fn invalid(msg: impl Into<String>) -> MessageError {
    MessageError::InvalidFormat(msg.into())
}

/// Protocol version triple, used for both `jam_version` and `app_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

/// One entry of a `State` message: a 31-byte trie key and its value bytes.
pub type TrieKey = [u8; 31];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: TrieKey,
    pub value: Vec<u8>,
}

/// One entry of an `Initialize` ancestry list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AncestryItem {
    pub header_hash: Hash,
    pub slot: u32,
}

/// Block header. The fields this crate needs (parent linkage, time slot) are
/// modeled; everything else the real JAM header carries (VRF outputs, seal,
/// extrinsic-root commitments) is out of scope here (§1) and passed through
/// as an opaque blob so a real STF implementation can still consume it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub parent: Hash,
    pub slot: u32,
    pub opaque: Vec<u8>,
}

impl Header {
    /// `blake2b_256` of the canonical encoding — the header hash used for
    /// fork detection and `AncestryItem`/`GetState` arguments.
    pub fn header_hash(&self) -> Hash {
        crate::hash::blake2b_256(&self.encode())
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + 4 + 4 + self.opaque.len());
        buf.extend_from_slice(&self.parent);
        buf.extend_from_slice(&self.slot.to_le_bytes());
        write_blob(&mut buf, &self.opaque);
        buf
    }

    fn decode(r: &mut Reader) -> Result<Self, MessageError> {
        let parent = r.hash()?;
        let slot = r.u32()?;
        let opaque = r.blob()?;
        Ok(Header {
            parent,
            slot,
            opaque,
        })
    }
}

/// A proposed block: a header plus an opaque extrinsic blob. Extrinsic
/// contents are interpreted only by the external STF (§1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub extrinsic: Vec<u8>,
}

impl Block {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.header.encode();
        write_blob(&mut buf, &self.extrinsic);
        buf
    }

    fn decode(r: &mut Reader) -> Result<Self, MessageError> {
        let header = Header::decode(r)?;
        let extrinsic = r.blob()?;
        Ok(Block { header, extrinsic })
    }
}

/// Handshake peer descriptor, carried by the `PeerInfo` variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub fuzz_version: u8,
    pub fuzz_features: u32,
    pub jam_version: Version,
    pub app_version: Version,
    pub app_name: String,
}

/// The tagged union of protocol messages (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    PeerInfo(PeerInfo),
    Initialize {
        header: Header,
        keyvals: Vec<KeyValue>,
        ancestry: Vec<AncestryItem>,
    },
    StateRoot(Hash),
    ImportBlock(Block),
    GetState {
        header_hash: Hash,
    },
    State(Vec<KeyValue>),
    Error(String),
    Kill,
}

const TAG_PEER_INFO: u8 = 0;
const TAG_INITIALIZE: u8 = 1;
const TAG_STATE_ROOT: u8 = 2;
const TAG_IMPORT_BLOCK: u8 = 3;
const TAG_GET_STATE: u8 = 4;
const TAG_STATE: u8 = 5;
const TAG_ERROR: u8 = 6;
const TAG_KILL: u8 = 7;

impl Message {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Message::PeerInfo(info) => {
                buf.push(TAG_PEER_INFO);
                buf.push(info.fuzz_version);
                buf.extend_from_slice(&info.fuzz_features.to_le_bytes());
                write_version(&mut buf, info.jam_version);
                write_version(&mut buf, info.app_version);
                write_string(&mut buf, &info.app_name);
            }
            Message::Initialize {
                header,
                keyvals,
                ancestry,
            } => {
                buf.push(TAG_INITIALIZE);
                buf.extend_from_slice(&header.encode());
                write_keyvals(&mut buf, keyvals);
                buf.extend_from_slice(&(ancestry.len() as u32).to_le_bytes());
                for item in ancestry {
                    buf.extend_from_slice(&item.header_hash);
                    buf.extend_from_slice(&item.slot.to_le_bytes());
                }
            }
            Message::StateRoot(root) => {
                buf.push(TAG_STATE_ROOT);
                buf.extend_from_slice(root);
            }
            Message::ImportBlock(block) => {
                buf.push(TAG_IMPORT_BLOCK);
                buf.extend_from_slice(&block.encode());
            }
            Message::GetState { header_hash } => {
                buf.push(TAG_GET_STATE);
                buf.extend_from_slice(header_hash);
            }
            Message::State(items) => {
                buf.push(TAG_STATE);
                write_keyvals(&mut buf, items);
            }
            Message::Error(msg) => {
                buf.push(TAG_ERROR);
                write_string(&mut buf, msg);
            }
            Message::Kill => {
                buf.push(TAG_KILL);
            }
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let mut r = Reader::new(bytes);
        let tag = r.u8()?;
        let message = match tag {
            TAG_PEER_INFO => {
                let fuzz_version = r.u8()?;
                let fuzz_features = r.u32()?;
                let jam_version = read_version(&mut r)?;
                let app_version = read_version(&mut r)?;
                let app_name = r.string()?;
                Message::PeerInfo(PeerInfo {
                    fuzz_version,
                    fuzz_features,
                    jam_version,
                    app_version,
                    app_name,
                })
            }
            TAG_INITIALIZE => {
                let header = Header::decode(&mut r)?;
                let keyvals = read_keyvals(&mut r)?;
                let count = r.u32()?;
                let mut ancestry = Vec::with_capacity((count as usize).min(r.remaining()));
                for _ in 0..count {
                    let header_hash = r.hash()?;
                    let slot = r.u32()?;
                    ancestry.push(AncestryItem { header_hash, slot });
                }
                Message::Initialize {
                    header,
                    keyvals,
                    ancestry,
                }
            }
            TAG_STATE_ROOT => Message::StateRoot(r.hash()?),
            TAG_IMPORT_BLOCK => Message::ImportBlock(Block::decode(&mut r)?),
            TAG_GET_STATE => Message::GetState {
                header_hash: r.hash()?,
            },
            TAG_STATE => Message::State(read_keyvals(&mut r)?),
            TAG_ERROR => Message::Error(r.string()?),
            TAG_KILL => Message::Kill,
            other => return Err(MessageError::UnknownMessage(other)),
        };
        if !r.is_empty() {
            return Err(invalid(format!(
                "{} trailing bytes after decoding a complete message",
                r.remaining()
            )));
        }
        Ok(message)
    }
}

// ── Encoding helpers ──────────────────────────────────────────────────────────

fn write_version(buf: &mut Vec<u8>, v: Version) {
    buf.push(v.major);
    buf.push(v.minor);
    buf.push(v.patch);
}

fn read_version(r: &mut Reader) -> Result<Version, MessageError> {
    Ok(Version {
        major: r.u8()?,
        minor: r.u8()?,
        patch: r.u8()?,
    })
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_blob(buf, s.as_bytes());
}

fn write_blob(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn write_keyvals(buf: &mut Vec<u8>, items: &[KeyValue]) {
    buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
    for kv in items {
        buf.extend_from_slice(&kv.key);
        write_blob(buf, &kv.value);
    }
}

fn read_keyvals(r: &mut Reader) -> Result<Vec<KeyValue>, MessageError> {
    let count = r.u32()?;
    let mut items = Vec::with_capacity((count as usize).min(r.remaining()));
    for _ in 0..count {
        let key = r.trie_key()?;
        let value = r.blob()?;
        items.push(KeyValue { key, value });
    }
    Ok(items)
}

/// A cursor over an immutable byte slice with bounds-checked reads.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MessageError> {
        if self.remaining() < n {
            return Err(invalid(format!(
                "expected {n} more bytes, found {}",
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, MessageError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, MessageError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn hash(&mut self) -> Result<Hash, MessageError> {
        Ok(self.take(32)?.try_into().unwrap())
    }

    fn trie_key(&mut self) -> Result<TrieKey, MessageError> {
        Ok(self.take(31)?.try_into().unwrap())
    }

    fn blob(&mut self) -> Result<Vec<u8>, MessageError> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn string(&mut self) -> Result<String, MessageError> {
        let bytes = self.blob()?;
        String::from_utf8(bytes).map_err(|e| invalid(format!("invalid UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            parent: [0x11; 32],
            slot: 7,
            opaque: vec![1, 2, 3],
        }
    }

    fn assert_round_trips(m: Message) {
        let encoded = m.encode();
        let decoded = Message::decode(&encoded).expect("decode");
        assert_eq!(decoded, m);
    }

    #[test]
    fn peer_info_round_trips() {
        assert_round_trips(Message::PeerInfo(PeerInfo {
            fuzz_version: 1,
            fuzz_features: FEATURE_FORK | FEATURE_ANCESTRY,
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
            app_name: "jamzig-fuzzer".to_string(),
        }));
    }

    #[test]
    fn initialize_round_trips_with_empty_and_nonempty_state() {
        assert_round_trips(Message::Initialize {
            header: sample_header(),
            keyvals: vec![],
            ancestry: vec![],
        });
        assert_round_trips(Message::Initialize {
            header: sample_header(),
            keyvals: vec![KeyValue {
                key: [0x22; 31],
                value: vec![9, 9, 9],
            }],
            ancestry: vec![AncestryItem {
                header_hash: [0x33; 32],
                slot: 1,
            }],
        });
    }

    #[test]
    fn state_root_round_trips() {
        assert_round_trips(Message::StateRoot([0xAA; 32]));
    }

    #[test]
    fn import_block_round_trips() {
        assert_round_trips(Message::ImportBlock(Block {
            header: sample_header(),
            extrinsic: vec![4, 5, 6, 7],
        }));
    }

    #[test]
    fn get_state_round_trips() {
        assert_round_trips(Message::GetState {
            header_hash: [0x44; 32],
        });
    }

    #[test]
    fn state_round_trips_with_zero_one_and_many_items() {
        assert_round_trips(Message::State(vec![]));
        assert_round_trips(Message::State(vec![KeyValue {
            key: [1; 31],
            value: vec![],
        }]));
        let many: Vec<KeyValue> = (0..20u8)
            .map(|i| KeyValue {
                key: [i; 31],
                value: vec![i; i as usize],
            })
            .collect();
        assert_round_trips(Message::State(many));
    }

    #[test]
    fn error_round_trips() {
        assert_round_trips(Message::Error("Invalid parent hash: not last block or parent".to_string()));
    }

    #[test]
    fn kill_round_trips() {
        assert_round_trips(Message::Kill);
    }

    #[test]
    fn unknown_tag_fails() {
        let err = Message::decode(&[0xFF]).unwrap_err();
        assert!(matches!(err, MessageError::UnknownMessage(0xFF)));
    }

    #[test]
    fn trailing_bytes_fail() {
        let mut encoded = Message::Kill.encode();
        encoded.push(0);
        let err = Message::decode(&encoded).unwrap_err();
        assert!(matches!(err, MessageError::InvalidFormat(_)));
    }

    #[test]
    fn truncated_payload_fails() {
        let encoded = Message::StateRoot([0u8; 32]).encode();
        let err = Message::decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, MessageError::InvalidFormat(_)));
    }
}
