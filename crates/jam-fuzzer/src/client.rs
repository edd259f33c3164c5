//! The fuzzer client (§4.7) — the driver side of the protocol. Operations
//! mirror the target's message handlers; each transitions the client phase
//! on the expected response or fails on an unexpected variant.

use jam_wire::message::{Block, Header, KeyValue, PeerInfo, Version};
use jam_wire::{read_frame, write_frame, Hash, Message, FEATURE_ANCESTRY, FEATURE_FORK};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::FuzzerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzerPhase {
    Connected,
    HandshakeComplete,
    StateInitialized,
}

/// Outcome of `send_block` (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Success(Hash),
    ImportError(String),
}

pub struct FuzzerClient<S> {
    stream: S,
    phase: FuzzerPhase,
    rng: StdRng,
}

impl<S> FuzzerClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// `stream` must already be connected — the `Initial -> Connected`
    /// transition happens at the transport layer, before this type exists.
    pub fn new(stream: S, seed: u64) -> Self {
        Self {
            stream,
            phase: FuzzerPhase::Connected,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn phase(&self) -> FuzzerPhase {
        self.phase
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    async fn roundtrip(&mut self, message: Message) -> Result<Message, FuzzerError> {
        write_frame(&mut self.stream, &message.encode()).await?;
        let payload = read_frame(&mut self.stream).await?;
        Ok(Message::decode(&payload)?)
    }

    pub async fn handshake(
        &mut self,
        fuzz_version: u8,
        app_name: &str,
        app_version: Version,
    ) -> Result<PeerInfo, FuzzerError> {
        if self.phase != FuzzerPhase::Connected {
            return Err(FuzzerError::UnexpectedMessage);
        }
        let request = Message::PeerInfo(PeerInfo {
            fuzz_version,
            fuzz_features: FEATURE_FORK | FEATURE_ANCESTRY,
            jam_version: Version {
                major: 0,
                minor: 6,
                patch: 0,
            },
            app_version,
            app_name: app_name.to_string(),
        });
        match self.roundtrip(request).await? {
            Message::PeerInfo(remote) => {
                self.phase = FuzzerPhase::HandshakeComplete;
                Ok(remote)
            }
            _ => Err(FuzzerError::UnexpectedHandshakeResponse),
        }
    }

    pub async fn set_state(
        &mut self,
        header: Header,
        keyvals: Vec<KeyValue>,
    ) -> Result<Hash, FuzzerError> {
        if self.phase != FuzzerPhase::HandshakeComplete {
            return Err(FuzzerError::UnexpectedMessage);
        }
        let request = Message::Initialize {
            header,
            keyvals,
            ancestry: Vec::new(),
        };
        match self.roundtrip(request).await? {
            Message::StateRoot(root) => {
                self.phase = FuzzerPhase::StateInitialized;
                Ok(root)
            }
            _ => Err(FuzzerError::UnexpectedMessage),
        }
    }

    pub async fn send_block(&mut self, block: Block) -> Result<ImportOutcome, FuzzerError> {
        if self.phase != FuzzerPhase::StateInitialized {
            return Err(FuzzerError::UnexpectedMessage);
        }
        match self.roundtrip(Message::ImportBlock(block)).await? {
            Message::StateRoot(root) => Ok(ImportOutcome::Success(root)),
            Message::Error(msg) => Ok(ImportOutcome::ImportError(msg)),
            _ => Err(FuzzerError::UnexpectedMessage),
        }
    }

    pub async fn get_state(&mut self, header_hash: Hash) -> Result<Vec<KeyValue>, FuzzerError> {
        if self.phase != FuzzerPhase::StateInitialized {
            return Err(FuzzerError::UnexpectedMessage);
        }
        match self.roundtrip(Message::GetState { header_hash }).await? {
            Message::State(items) => Ok(items),
            _ => Err(FuzzerError::UnexpectedMessage),
        }
    }

    pub async fn kill(&mut self) -> Result<(), FuzzerError> {
        write_frame(&mut self.stream, &Message::Kill.encode()).await?;
        Ok(())
    }
}

/// `(a == b)` byte-wise (§4.7).
pub fn compare_state_roots(a: &Hash, b: &Hash) -> bool {
    a == b
}
