//! The JSON report (§6) written after a run: `version`, `test_config`,
//! `results`, and — on divergence — the mismatch detail with both
//! dictionaries dumped as sorted `[key_hex, value_hex]` pairs.

use jam_state::MerklizationDictionary;
use serde::Serialize;

use crate::runner::FuzzResult;

const REPORT_VERSION: &str = "1.0";

#[derive(Serialize)]
pub struct Report {
    pub version: &'static str,
    pub test_config: TestConfig,
    pub results: Results,
}

#[derive(Serialize)]
pub struct TestConfig {
    pub seed: u64,
    pub blocks: usize,
    pub params_type: String,
}

#[derive(Serialize)]
pub struct Results {
    pub blocks_processed: usize,
    pub state_mismatches: usize,
    pub protocol_violations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<MismatchReport>,
}

#[derive(Serialize)]
pub struct MismatchReport {
    pub block_number: usize,
    pub reported_state_root: String,
    pub target_computed_root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_dictionary: Option<Vec<(String, String)>>,
    pub target_dictionary: Vec<(String, String)>,
}

fn dump_sorted(dict: &MerklizationDictionary) -> Vec<(String, String)> {
    dict.iter_sorted()
        .map(|(key, value)| (hex::encode(key), hex::encode(value)))
        .collect()
}

pub fn build(result: &FuzzResult, requested_blocks: usize, params_type: &str) -> Report {
    let protocol_violations = result.err.clone().into_iter().collect();

    let mismatch = result.mismatch.as_ref().map(|m| MismatchReport {
        block_number: m.block_number,
        reported_state_root: hex::encode(m.reported_state_root),
        target_computed_root: hex::encode(m.target_computed_root),
        local_dictionary: m.local_dictionary.as_ref().map(dump_sorted),
        target_dictionary: dump_sorted(&m.target_dictionary),
    });

    Report {
        version: REPORT_VERSION,
        test_config: TestConfig {
            seed: result.seed,
            blocks: requested_blocks,
            params_type: params_type.to_string(),
        },
        results: Results {
            blocks_processed: result.blocks_processed,
            state_mismatches: usize::from(result.mismatch.is_some()),
            protocol_violations,
            mismatch,
        },
    }
}
