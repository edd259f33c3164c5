//! Protocol state: the 31-byte trie key scheme, the Merklization dictionary,
//! structured state types, and the converter between them.

pub mod component;
pub mod convert;
pub mod dictionary;
pub mod key;

pub use component::{Component, ServiceAccount, StructuredState};
pub use convert::{flatten, from_wire, rebuild, to_wire, ConvertError};
pub use dictionary::{DictionaryError, MerklizationDictionary};
pub use key::{ComponentId, ComponentIdError, ALL_COMPONENTS, SERVICE_BASE_TAG};
