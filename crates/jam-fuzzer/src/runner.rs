//! The session runner (§4.8, §2.9) — binds a provider to a fuzzer client,
//! compares roots each block, and produces a `FuzzResult`.

use jam_state::MerklizationDictionary;
use jam_wire::message::Version;
use jam_wire::Hash;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::client::{compare_state_roots, FuzzerClient, ImportOutcome};
use crate::error::FuzzerError;
use crate::provider::BlockProvider;

/// A divergence between the locally expected state and the target's.
pub struct Mismatch {
    pub block_number: usize,
    pub reported_state_root: Hash,
    pub local_dictionary: Option<MerklizationDictionary>,
    pub target_dictionary: MerklizationDictionary,
    pub target_computed_root: Hash,
}

pub struct FuzzResult {
    pub seed: u64,
    pub blocks_processed: usize,
    pub success: bool,
    pub mismatch: Option<Mismatch>,
    pub err: Option<String>,
}

impl FuzzResult {
    fn ok(seed: u64, blocks_processed: usize) -> Self {
        Self {
            seed,
            blocks_processed,
            success: true,
            mismatch: None,
            err: None,
        }
    }

    fn failed(seed: u64, blocks_processed: usize, err: impl Into<String>) -> Self {
        Self {
            seed,
            blocks_processed,
            success: false,
            mismatch: None,
            err: Some(err.into()),
        }
    }
}

/// Run one provider against one connected target to completion.
///
/// Transport and codec failures propagate as `Err` (§7: "never retried").
/// Import failures and root divergences are captured in the returned
/// `FuzzResult` instead, so the caller always gets a report to serialize.
pub async fn run<S>(
    fuzzer: &mut FuzzerClient<S>,
    provider: &mut dyn BlockProvider,
    seed: u64,
) -> Result<FuzzResult, FuzzerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fuzzer
        .handshake(
            1,
            "jam-conformance-fuzzer",
            Version {
                major: 0,
                minor: 1,
                patch: 0,
            },
        )
        .await?;

    let genesis = provider.genesis();
    let genesis_dict = MerklizationDictionary::from_wire(genesis.keyvals.clone())?;
    let local_genesis_root = genesis_dict.root();
    let genesis_header_hash = genesis.header.header_hash();

    let target_genesis_root = fuzzer.set_state(genesis.header, genesis.keyvals).await?;
    if !compare_state_roots(&target_genesis_root, &local_genesis_root) {
        let err = FuzzerError::InitialStateRootMismatch {
            expected: hex::encode(local_genesis_root),
            actual: hex::encode(target_genesis_root),
        };

        let keyvals = fuzzer.get_state(genesis_header_hash).await?;
        let target_dictionary = MerklizationDictionary::from_wire(keyvals)?;
        let target_computed_root = target_dictionary.root();

        return Ok(FuzzResult {
            seed,
            blocks_processed: 0,
            success: false,
            mismatch: Some(Mismatch {
                block_number: 0,
                reported_state_root: target_genesis_root,
                local_dictionary: Some(genesis_dict),
                target_dictionary,
                target_computed_root,
            }),
            err: Some(err.to_string()),
        });
    }

    let mut blocks_processed = 0usize;
    while let Some(transition) = provider.next() {
        let header_hash = transition.block.header.header_hash();
        let outcome = fuzzer.send_block(transition.block).await?;

        match outcome {
            ImportOutcome::ImportError(reason) => {
                return Ok(FuzzResult::failed(
                    seed,
                    blocks_processed,
                    format!("block import failed: {reason}"),
                ));
            }
            ImportOutcome::Success(target_root) => {
                if compare_state_roots(&target_root, &transition.expected_root) {
                    blocks_processed += 1;
                    continue;
                }

                let keyvals = fuzzer.get_state(header_hash).await?;
                let target_dictionary = MerklizationDictionary::from_wire(keyvals)?;
                let target_computed_root = target_dictionary.root();

                return Ok(FuzzResult {
                    seed,
                    blocks_processed,
                    success: false,
                    mismatch: Some(Mismatch {
                        block_number: blocks_processed,
                        reported_state_root: target_root,
                        local_dictionary: transition.expected_dictionary,
                        target_dictionary,
                        target_computed_root,
                    }),
                    err: None,
                });
            }
        }
    }

    Ok(FuzzResult::ok(seed, blocks_processed))
}
