//! Target-side error kinds (§7). Transport and codec failures terminate the
//! connection; phase failures do too (the target surfaces them as a dropped
//! connection, not a wire `Error`, per §7's "target surfaces as a dropped
//! connection" rule — only `BlockImportFailed` is wire-visible).

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error(transparent)]
    Frame(#[from] jam_wire::FrameError),
    #[error(transparent)]
    Message(#[from] jam_wire::MessageError),
    #[error(transparent)]
    Dictionary(#[from] jam_state::DictionaryError),
    #[error(transparent)]
    Convert(#[from] jam_state::ConvertError),
    #[error("handshake not complete")]
    HandshakeNotComplete,
    #[error("state not ready")]
    StateNotReady,
    #[error("unexpected message for the current phase")]
    UnexpectedMessage,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
