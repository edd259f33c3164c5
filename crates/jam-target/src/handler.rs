//! Dispatches one decoded `Message` to a `TargetSession` and produces the
//! response to write back, mirroring `ServiceDispatcher::dispatch` in the
//! daemon this core's message loop is modeled on.

use jam_wire::Message;

use crate::error::TargetError;
use crate::session::TargetSession;

/// `None` means the connection should close without a reply (`Kill`).
pub fn dispatch(session: &mut TargetSession, message: Message) -> Result<Option<Message>, TargetError> {
    match message {
        Message::PeerInfo(info) => session.on_peer_info(info).map(Some),
        Message::Initialize {
            header,
            keyvals,
            ancestry,
        } => session.on_initialize(header, keyvals, ancestry).map(Some),
        Message::ImportBlock(block) => session.on_import_block(block).map(Some),
        Message::GetState { header_hash } => session.on_get_state(header_hash).map(Some),
        Message::Kill => {
            session.on_kill();
            Ok(None)
        }
        Message::StateRoot(_) | Message::State(_) | Message::Error(_) => {
            Err(TargetError::UnexpectedMessage)
        }
    }
}
