//! State-key constructor (§4.3) — deterministic 31-byte trie keys.
//!
//! Three shapes, matching spec.md exactly:
//!
//! - **A** (component): `component_id` in byte 0, zero padding.
//! - **B** (service base): tag byte 255, service id interleaved into the odd
//!   byte positions.
//! - **C** (service + hash): service id interleaved with a BLAKE2b-256 hash
//!   of a prefix-tagged prehash.
//!
//! Spec.md §9 flags that an earlier, un-hashed interleaving scheme existed
//! in the source this was distilled from and is legacy — only shape C as
//! specified here is implemented.

use jam_wire::hash::blake2b_256;
use jam_wire::{Hash, ServiceId, TrieKey};

/// Tag byte for shape B (service base account keys). Reserved by spec.md
/// §4.3; never a valid `ComponentId` discriminant.
pub const SERVICE_BASE_TAG: u8 = 255;

/// One of the 14 numbered simple components a shape-A key addresses.
///
/// Exact protocol semantics for each component belong to the greypaper;
/// this crate treats every component as an opaque blob (`jam_state::component`)
/// and only needs a stable, unique id per component to build shape-A keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ComponentId {
    AuthPools = 1,
    AuthQueue = 2,
    RecentHistory = 3,
    SafroleState = 4,
    Judgements = 5,
    EntropyPool = 6,
    ValidatorQueue = 7,
    CurrentValidators = 8,
    PreviousValidators = 9,
    AvailabilityAssignments = 10,
    TimeSlot = 11,
    PrivilegedServices = 12,
    ActivityStatistics = 13,
    AccumulationQueue = 14,
}

pub const ALL_COMPONENTS: [ComponentId; 14] = [
    ComponentId::AuthPools,
    ComponentId::AuthQueue,
    ComponentId::RecentHistory,
    ComponentId::SafroleState,
    ComponentId::Judgements,
    ComponentId::EntropyPool,
    ComponentId::ValidatorQueue,
    ComponentId::CurrentValidators,
    ComponentId::PreviousValidators,
    ComponentId::AvailabilityAssignments,
    ComponentId::TimeSlot,
    ComponentId::PrivilegedServices,
    ComponentId::ActivityStatistics,
    ComponentId::AccumulationQueue,
];

#[derive(Debug, thiserror::Error)]
pub enum ComponentIdError {
    #[error("component id {0} is out of range 1..=14, or is the reserved service-base tag 255")]
    OutOfRange(u8),
}

impl TryFrom<u8> for ComponentId {
    type Error = ComponentIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        for c in ALL_COMPONENTS {
            if c as u8 == value {
                return Ok(c);
            }
        }
        Err(ComponentIdError::OutOfRange(value))
    }
}

/// Shape A: a component key. Byte 0 is `component_id`, bytes 1..30 are zero.
pub fn component_key(component: ComponentId) -> TrieKey {
    let mut key = [0u8; 31];
    key[0] = component as u8;
    key
}

/// Shape B: a service base-account key. Byte 0 is 255; the service id's
/// little-endian bytes are interleaved into bytes 1, 3, 5, 7.
pub fn service_base_key(service_id: ServiceId) -> TrieKey {
    let mut key = [0u8; 31];
    key[0] = SERVICE_BASE_TAG;
    let id_bytes = service_id.to_le_bytes();
    key[1] = id_bytes[0];
    key[3] = id_bytes[1];
    key[5] = id_bytes[2];
    key[7] = id_bytes[3];
    key
}

/// Shape C: a service-plus-hash key.
///
/// `a = blake2b_256(prefix ‖ prehash)`. The service id's little-endian
/// bytes occupy positions 0, 2, 4, 6; `a`'s first four bytes occupy
/// positions 1, 3, 5, 7; the remaining 23 bytes of `a` (`a[4..27]`) occupy
/// positions 8..31.
fn service_hash_key(service_id: ServiceId, prefix: [u8; 4], prehash: &[u8]) -> TrieKey {
    let mut preimage = Vec::with_capacity(4 + prehash.len());
    preimage.extend_from_slice(&prefix);
    preimage.extend_from_slice(prehash);
    let a: Hash = blake2b_256(&preimage);

    let mut key = [0u8; 31];
    let id_bytes = service_id.to_le_bytes();
    key[0] = id_bytes[0];
    key[2] = id_bytes[1];
    key[4] = id_bytes[2];
    key[6] = id_bytes[3];
    key[1] = a[0];
    key[3] = a[1];
    key[5] = a[2];
    key[7] = a[3];
    key[8..31].copy_from_slice(&a[4..27]);
    key
}

/// Shape C specialization: a service's storage entry, keyed by the raw
/// storage key bytes. `prefix = LE(u32::MAX)`.
pub fn storage_key(service_id: ServiceId, storage_key_bytes: &[u8]) -> TrieKey {
    service_hash_key(service_id, u32::MAX.to_le_bytes(), storage_key_bytes)
}

/// Shape C specialization: a service's preimage blob, keyed by the 32-byte
/// preimage hash. `prefix = LE(u32::MAX - 1)`.
pub fn preimage_blob_key(service_id: ServiceId, preimage_hash: &Hash) -> TrieKey {
    service_hash_key(service_id, (u32::MAX - 1).to_le_bytes(), preimage_hash)
}

/// Shape C specialization: a preimage-lookup timestamp entry, keyed by
/// `(hash, length)`. `prefix = LE(length)`.
pub fn preimage_lookup_key(service_id: ServiceId, preimage_hash: &Hash, length: u32) -> TrieKey {
    service_hash_key(service_id, length.to_le_bytes(), preimage_hash)
}
