//! Fuzzer-side error kinds (§7). Phase and codec errors surface to the
//! caller as a returned `Result`, never a silent drop.

#[derive(Debug, thiserror::Error)]
pub enum FuzzerError {
    #[error(transparent)]
    Frame(#[from] jam_wire::FrameError),
    #[error(transparent)]
    Message(#[from] jam_wire::MessageError),
    #[error(transparent)]
    Dictionary(#[from] jam_state::DictionaryError),
    #[error("unexpected handshake response")]
    UnexpectedHandshakeResponse,
    #[error("unexpected message for the current phase")]
    UnexpectedMessage,
    #[error("initial state root mismatch: expected {expected}, got {actual}")]
    InitialStateRootMismatch { expected: String, actual: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
