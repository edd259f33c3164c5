//! End-to-end conformance-protocol tests driving a `TargetSession` and a
//! `FuzzerClient` against each other over an in-process `tokio::io::duplex`
//! stream.
//!
//! A real run is two separate processes joined by a Unix socket; these
//! tests skip the process boundary and drive both session types directly
//! against a paired in-memory stream, since it's the protocol exchange —
//! not process lifecycle — that's under test here.

use anyhow::Result;
use jam_fuzzer::{runner, FuzzerClient, GeneratorProvider, ImportOutcome};
use jam_state::{flatten, from_wire, ServiceAccount, StructuredState};
use jam_target::{dispatch, ReferenceStf, Stf, TargetSession};
use jam_wire::{Block, Header, Message, Params};
use tokio::io::{AsyncWriteExt, DuplexStream};

fn app_version() -> jam_wire::Version {
    jam_wire::Version {
        major: 1,
        minor: 0,
        patch: 0,
    }
}

fn genesis_state() -> StructuredState {
    let mut state = StructuredState::new();
    for id in jam_state::ALL_COMPONENTS {
        state.set_component(id, vec![0]);
    }
    let mut account = ServiceAccount::new([0x01; 32]);
    account.balance = 500;
    account.storage.insert(b"k".to_vec(), b"v".to_vec());
    state.services.insert(1, account);
    state
}

fn header(parent: [u8; 32], slot: u32) -> Header {
    Header {
        parent,
        slot,
        opaque: Vec::new(),
    }
}

fn block(parent: [u8; 32], slot: u32) -> Block {
    Block {
        header: header(parent, slot),
        extrinsic: Vec::new(),
    }
}

/// Drives one target session to completion over its half of a duplex pair,
/// mirroring `jam_target::run_session` without requiring a `UnixStream`.
async fn run_target_session(mut server: DuplexStream) {
    let mut session = TargetSession::new(
        Box::new(ReferenceStf::default()),
        "conformance-target",
        app_version(),
    );
    loop {
        let payload = match jam_wire::read_frame(&mut server).await {
            Ok(p) => p,
            Err(_) => return,
        };
        let message = match Message::decode(&payload) {
            Ok(m) => m,
            Err(_) => return,
        };
        match dispatch(&mut session, message) {
            Ok(Some(reply)) => {
                if jam_wire::write_frame(&mut server, &reply.encode())
                    .await
                    .is_err()
                {
                    return;
                }
                if session.is_shutting_down() {
                    return;
                }
            }
            Ok(None) => return,
            Err(_) => return,
        }
    }
}

fn paired_streams() -> (DuplexStream, DuplexStream) {
    tokio::io::duplex(4 * 1024 * 1024)
}

#[tokio::test]
async fn handshake_success_negotiates_features_and_advances_phase() -> Result<()> {
    let (client_stream, server_stream) = paired_streams();
    let target = tokio::spawn(run_target_session(server_stream));

    let mut client = FuzzerClient::new(client_stream, 1);
    let remote = client.handshake(1, "jamzig-fuzzer", app_version()).await?;
    assert_eq!(remote.fuzz_features, jam_wire::IMPLEMENTED_FEATURES);
    assert_eq!(remote.app_name, "conformance-target");

    client.kill().await?;
    target.await?;
    Ok(())
}

#[tokio::test]
async fn initialize_then_single_block_matches_the_locally_computed_root() -> Result<()> {
    let (client_stream, server_stream) = paired_streams();
    let target = tokio::spawn(run_target_session(server_stream));

    let mut client = FuzzerClient::new(client_stream, 2);
    client.handshake(1, "jamzig-fuzzer", app_version()).await?;

    let genesis = genesis_state();
    let dict = flatten(&genesis);
    let root0 = client
        .set_state(header([0; 32], 0), dict.to_wire())
        .await?;
    assert_eq!(root0, dict.root());

    let b1 = block([0; 32], 1);
    let expected = flatten(&ReferenceStf::default().apply(&genesis, &b1).unwrap()).root();

    match client.send_block(b1).await? {
        ImportOutcome::Success(root) => assert_eq!(root, expected),
        ImportOutcome::ImportError(msg) => panic!("unexpected import error: {msg}"),
    }

    client.kill().await?;
    target.await?;
    Ok(())
}

#[tokio::test]
async fn sibling_block_rewinds_cleanly_to_the_genesis_derived_root() -> Result<()> {
    let (client_stream, server_stream) = paired_streams();
    let target = tokio::spawn(run_target_session(server_stream));

    let mut client = FuzzerClient::new(client_stream, 3);
    client.handshake(1, "jamzig-fuzzer", app_version()).await?;

    let genesis = genesis_state();
    let dict = flatten(&genesis);
    client
        .set_state(header([0; 32], 0), dict.to_wire())
        .await?;

    client.send_block(block([0; 32], 1)).await?;

    let sibling = block([0; 32], 2);
    let expected_sibling_root =
        flatten(&ReferenceStf::default().apply(&genesis, &sibling).unwrap()).root();

    match client.send_block(sibling).await? {
        ImportOutcome::Success(root) => assert_eq!(root, expected_sibling_root),
        ImportOutcome::ImportError(msg) => panic!("unexpected import error: {msg}"),
    }

    client.kill().await?;
    target.await?;
    Ok(())
}

#[tokio::test]
async fn invalid_parent_hash_is_reported_without_ending_the_session() -> Result<()> {
    let (client_stream, server_stream) = paired_streams();
    let target = tokio::spawn(run_target_session(server_stream));

    let mut client = FuzzerClient::new(client_stream, 4);
    client.handshake(1, "jamzig-fuzzer", app_version()).await?;
    let dict = flatten(&genesis_state());
    client
        .set_state(header([0; 32], 0), dict.to_wire())
        .await?;

    let bogus = block([0xAB; 32], 1);
    match client.send_block(bogus).await? {
        ImportOutcome::ImportError(msg) => assert!(msg.contains("Invalid parent hash")),
        ImportOutcome::Success(_) => panic!("expected an error for an invalid parent"),
    }

    // The session is still usable after a rejected import.
    match client.send_block(block([0; 32], 1)).await? {
        ImportOutcome::Success(_) => {}
        ImportOutcome::ImportError(msg) => panic!("unexpected import error: {msg}"),
    }

    client.kill().await?;
    target.await?;
    Ok(())
}

#[tokio::test]
async fn get_state_returns_a_dictionary_whose_root_matches_the_reported_root() -> Result<()> {
    let (client_stream, server_stream) = paired_streams();
    let target = tokio::spawn(run_target_session(server_stream));

    let mut client = FuzzerClient::new(client_stream, 5);
    client.handshake(1, "jamzig-fuzzer", app_version()).await?;
    let genesis = genesis_state();
    let dict = flatten(&genesis);
    client
        .set_state(header([0; 32], 0), dict.to_wire())
        .await?;

    let b1 = block([0; 32], 1);
    let header_hash = b1.header.header_hash();
    let reported_root = match client.send_block(b1).await? {
        ImportOutcome::Success(root) => root,
        ImportOutcome::ImportError(msg) => panic!("unexpected import error: {msg}"),
    };

    let keyvals = client.get_state(header_hash).await?;
    let returned_dict = from_wire(keyvals)?;
    assert_eq!(returned_dict.root(), reported_root);

    client.kill().await?;
    target.await?;
    Ok(())
}

#[tokio::test]
async fn oversize_length_prefix_ends_the_target_session_without_a_panic() -> Result<()> {
    let (mut client_stream, server_stream) = paired_streams();
    let target = tokio::spawn(run_target_session(server_stream));

    let bad_len = jam_wire::MAX_MESSAGE_SIZE + 1;
    client_stream.write_all(&bad_len.to_le_bytes()).await?;
    drop(client_stream);

    target.await?;
    Ok(())
}

#[tokio::test]
async fn a_full_generator_run_reports_success_with_no_mismatch() -> Result<()> {
    let (client_stream, server_stream) = paired_streams();
    let target = tokio::spawn(run_target_session(server_stream));

    let mut client = FuzzerClient::new(client_stream, 99);
    let params = Params::tiny();
    let mut provider = GeneratorProvider::new(99, 10, &params);

    let result = runner::run(&mut client, &mut provider, 99).await?;
    assert!(result.success, "run failed: {:?}", result.err);
    assert_eq!(result.blocks_processed, 10);
    assert!(result.mismatch.is_none());

    client.kill().await?;
    target.await?;
    Ok(())
}

#[tokio::test]
async fn kill_before_any_other_message_ends_the_target_session_cleanly() -> Result<()> {
    let (mut client_stream, server_stream) = paired_streams();
    let target = tokio::spawn(run_target_session(server_stream));

    jam_wire::write_frame(&mut client_stream, &Message::Kill.encode()).await?;
    drop(client_stream);

    target.await?;
    Ok(())
}
