//! The state converter (§4.5) — the two-way bridge between structured state
//! and the flat dictionary/wire form.
//!
//! `flatten` is unambiguous: every simple component and every service
//! sub-entry has one designated key shape. `rebuild` has to work backwards
//! from a flat `{key → bytes}` map, and shape C keys are, by construction,
//! a BLAKE2b-256 hash of their originating storage key / preimage hash —
//! not invertible from the key bytes alone. To make `rebuild(flatten(s)) =
//! s` hold as a real equality (not just an approximate one), flatten embeds
//! a small self-describing envelope in the *value* of every shape-C entry:
//! a category tag followed by the raw key material the category needs.
//! Shape A/B vs. shape C is then told apart structurally, the way the
//! construction in §4.3 already guarantees: shape A/B keys have their
//! non-tag bytes fixed at zero, and a colliding shape-C key would need its
//! BLAKE2b output to land on that all-zero pattern by chance — the same
//! negligible-probability assumption the interleaving scheme itself runs on.

use std::collections::BTreeMap;

use jam_wire::{Hash, KeyValue, ServiceId, TrieKey};

use crate::component::{Component, ServiceAccount, StructuredState};
use crate::dictionary::MerklizationDictionary;
use crate::key::{
    component_key, preimage_blob_key, preimage_lookup_key, service_base_key, storage_key,
    ComponentId, SERVICE_BASE_TAG,
};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("incomplete state: missing required component {0:?}")]
    IncompleteState(ComponentId),
}

fn invalid(msg: impl Into<String>) -> ConvertError {
    ConvertError::InvalidFormat(msg.into())
}

const CATEGORY_STORAGE: u8 = 0;
const CATEGORY_PREIMAGE_BLOB: u8 = 1;
const CATEGORY_PREIMAGE_LOOKUP: u8 = 2;

/// Flatten a structured state into a Merklization dictionary.
pub fn flatten(state: &StructuredState) -> MerklizationDictionary {
    let mut dict = MerklizationDictionary::new();

    for (id, component) in &state.components {
        dict.put(component_key(*id), component.0.clone());
    }

    for (service_id, account) in &state.services {
        dict.put(service_base_key(*service_id), encode_account_base(account));

        for (raw_key, value) in &account.storage {
            let mut payload = vec![CATEGORY_STORAGE];
            payload.extend_from_slice(&(raw_key.len() as u32).to_le_bytes());
            payload.extend_from_slice(raw_key);
            payload.extend_from_slice(value);
            dict.put(storage_key(*service_id, raw_key), payload);
        }

        for (hash, blob) in &account.preimages {
            let mut payload = vec![CATEGORY_PREIMAGE_BLOB];
            payload.extend_from_slice(hash);
            payload.extend_from_slice(blob);
            dict.put(preimage_blob_key(*service_id, hash), payload);
        }

        for ((hash, length), timestamps) in &account.preimage_lookups {
            let mut payload = vec![CATEGORY_PREIMAGE_LOOKUP];
            payload.extend_from_slice(hash);
            payload.extend_from_slice(&length.to_le_bytes());
            payload.extend_from_slice(&(timestamps.len() as u32).to_le_bytes());
            for ts in timestamps {
                payload.extend_from_slice(&ts.to_le_bytes());
            }
            dict.put(preimage_lookup_key(*service_id, hash, *length), payload);
        }
    }

    dict
}

/// Rebuild a structured state from a Merklization dictionary.
pub fn rebuild(dict: &MerklizationDictionary) -> Result<StructuredState, ConvertError> {
    let mut state = StructuredState::new();

    for (key, value) in dict.iter_sorted() {
        match classify(key) {
            Shape::Component(id) => {
                state.components.insert(id, Component(value.clone()));
            }
            Shape::ServiceBase(service_id) => {
                let account = decode_account_base(value)?;
                state
                    .services
                    .entry(service_id)
                    .and_modify(|a| merge_base(a, &account))
                    .or_insert(account);
            }
            Shape::ServiceSub(service_id) => {
                apply_service_sub_entry(&mut state, service_id, value)?;
            }
        }
    }

    for id in crate::key::ALL_COMPONENTS {
        if !state.components.contains_key(&id) {
            return Err(ConvertError::IncompleteState(id));
        }
    }

    Ok(state)
}

enum Shape {
    Component(ComponentId),
    ServiceBase(ServiceId),
    ServiceSub(ServiceId),
}

fn classify(key: &TrieKey) -> Shape {
    let looks_like_a_or_b_tail = key[2] == 0 && key[4] == 0 && key[6] == 0 && key[8..31].iter().all(|&b| b == 0);

    if key[0] == SERVICE_BASE_TAG && looks_like_a_or_b_tail {
        let service_id = u32::from_le_bytes([key[1], key[3], key[5], key[7]]);
        return Shape::ServiceBase(service_id);
    }

    if key[1..].iter().all(|&b| b == 0) {
        if let Ok(id) = ComponentId::try_from(key[0]) {
            return Shape::Component(id);
        }
    }

    let service_id = u32::from_le_bytes([key[0], key[2], key[4], key[6]]);
    Shape::ServiceSub(service_id)
}

fn apply_service_sub_entry(
    state: &mut StructuredState,
    service_id: ServiceId,
    value: &[u8],
) -> Result<(), ConvertError> {
    if value.is_empty() {
        return Err(invalid("empty shape-C entry"));
    }
    let account = state
        .services
        .entry(service_id)
        .or_insert_with(|| ServiceAccount::new([0u8; 32]));

    match value[0] {
        CATEGORY_STORAGE => {
            let key_len = read_u32(value, 1)? as usize;
            let key_start: usize = 5;
            let key_end = key_start
                .checked_add(key_len)
                .ok_or_else(|| invalid("storage key length overflow"))?;
            let raw_key = value
                .get(key_start..key_end)
                .ok_or_else(|| invalid("truncated storage entry"))?
                .to_vec();
            let raw_value = value[key_end..].to_vec();
            account.storage.insert(raw_key, raw_value);
        }
        CATEGORY_PREIMAGE_BLOB => {
            let hash: Hash = value
                .get(1..33)
                .ok_or_else(|| invalid("truncated preimage blob entry"))?
                .try_into()
                .unwrap();
            account.preimages.insert(hash, value[33..].to_vec());
        }
        CATEGORY_PREIMAGE_LOOKUP => {
            let hash: Hash = value
                .get(1..33)
                .ok_or_else(|| invalid("truncated preimage lookup entry"))?
                .try_into()
                .unwrap();
            let length = read_u32(value, 33)?;
            let count = read_u32(value, 37)? as usize;
            let mut timestamps = Vec::with_capacity(count.min(value.len().saturating_sub(41) / 4));
            let mut pos = 41;
            for _ in 0..count {
                timestamps.push(read_u32(value, pos)?);
                pos += 4;
            }
            account.preimage_lookups.insert((hash, length), timestamps);
        }
        other => return Err(invalid(format!("unknown shape-C category byte {other}"))),
    }
    Ok(())
}

fn read_u32(buf: &[u8], at: usize) -> Result<u32, ConvertError> {
    let slice = buf
        .get(at..at + 4)
        .ok_or_else(|| invalid("truncated u32 field"))?;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn merge_base(into: &mut ServiceAccount, from: &ServiceAccount) {
    into.code_hash = from.code_hash;
    into.balance = from.balance;
    into.min_item_gas = from.min_item_gas;
    into.min_memo_gas = from.min_memo_gas;
    into.footprint_bytes = from.footprint_bytes;
    into.footprint_items = from.footprint_items;
    into.created_at = from.created_at;
    into.parent_service = from.parent_service;
}

fn encode_account_base(account: &ServiceAccount) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&account.code_hash);
    buf.extend_from_slice(&account.balance.to_le_bytes());
    buf.extend_from_slice(&account.min_item_gas.to_le_bytes());
    buf.extend_from_slice(&account.min_memo_gas.to_le_bytes());
    buf.extend_from_slice(&account.footprint_bytes.to_le_bytes());
    buf.extend_from_slice(&account.footprint_items.to_le_bytes());
    buf.extend_from_slice(&account.created_at.to_le_bytes());
    match account.parent_service {
        Some(id) => {
            buf.push(1);
            buf.extend_from_slice(&id.to_le_bytes());
        }
        None => buf.push(0),
    }
    buf
}

fn decode_account_base(buf: &[u8]) -> Result<ServiceAccount, ConvertError> {
    if buf.len() < 32 + 8 + 8 + 8 + 8 + 4 + 4 + 1 {
        return Err(invalid("truncated service base entry"));
    }
    let code_hash: Hash = buf[0..32].try_into().unwrap();
    let balance = u64::from_le_bytes(buf[32..40].try_into().unwrap());
    let min_item_gas = u64::from_le_bytes(buf[40..48].try_into().unwrap());
    let min_memo_gas = u64::from_le_bytes(buf[48..56].try_into().unwrap());
    let footprint_bytes = u64::from_le_bytes(buf[56..64].try_into().unwrap());
    let footprint_items = u32::from_le_bytes(buf[64..68].try_into().unwrap());
    let created_at = u32::from_le_bytes(buf[68..72].try_into().unwrap());
    let has_parent = buf[72];
    let parent_service = match has_parent {
        0 => None,
        1 => Some(u32::from_le_bytes(
            buf.get(73..77)
                .ok_or_else(|| invalid("truncated parent_service field"))?
                .try_into()
                .unwrap(),
        )),
        other => return Err(invalid(format!("invalid has_parent byte: {other}"))),
    };
    Ok(ServiceAccount {
        code_hash,
        balance,
        min_item_gas,
        min_memo_gas,
        footprint_bytes,
        footprint_items,
        created_at,
        parent_service,
        storage: BTreeMap::new(),
        preimages: BTreeMap::new(),
        preimage_lookups: BTreeMap::new(),
    })
}

/// `Dictionary ↔ ordered sequence<KeyValue>` for the wire.
pub fn to_wire(dict: &MerklizationDictionary) -> Vec<KeyValue> {
    dict.to_wire()
}

pub fn from_wire(items: Vec<KeyValue>) -> Result<MerklizationDictionary, crate::dictionary::DictionaryError> {
    MerklizationDictionary::from_wire(items)
}
