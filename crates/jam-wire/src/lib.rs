//! Wire-level types shared by the target and the fuzzer: frame I/O, the
//! message codec, BLAKE2b hashing, and the runtime parameter profiles.
//!
//! Every field, every byte order, every reserved bit here is part of the
//! protocol. Changing the message codec after two implementations have
//! agreed on it is a breaking change.

pub mod frame;
pub mod hash;
pub mod message;
pub mod params;

/// A 32-byte hash — used for state roots, header hashes, and service
/// preimage hashes alike.
pub type Hash = [u8; 32];

/// A 32-byte state root (same representation as `Hash`, kept as a distinct
/// alias for readability at call sites).
pub type StateRoot = Hash;

/// A protocol service identifier.
pub type ServiceId = u32;

/// A protocol time slot.
pub type TimeSlot = u32;

pub use frame::{read_frame, write_frame, FrameError, MAX_MESSAGE_SIZE};
pub use message::{
    AncestryItem, Block, Header, KeyValue, Message, MessageError, PeerInfo, TrieKey, Version,
    FEATURE_ANCESTRY, FEATURE_FORK, IMPLEMENTED_FEATURES,
};
pub use params::{Params, ParamsError, ParamsProfile};
