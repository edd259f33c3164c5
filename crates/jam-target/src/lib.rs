//! The target side of the conformance harness: the session state machine,
//! its message dispatch, and the pluggable state-transition boundary.

pub mod error;
pub mod handler;
pub mod session;
pub mod stf;

pub use error::TargetError;
pub use handler::dispatch;
pub use session::{TargetPhase, TargetSession};
pub use stf::{ReferenceStf, Stf};

use jam_wire::{read_frame, write_frame, Message};
use tokio::io::{AsyncRead, AsyncWrite};

/// Run the session loop over one connected stream until `Kill` or EOF.
///
/// Mirrors the cooperative, single-connection message loop of §5: every
/// suspension point is a frame read or write, and the server always
/// replies before reading the next message.
pub async fn run_session<S>(stream: &mut S, session: &mut TargetSession) -> Result<(), TargetError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let payload = match read_frame(stream).await {
            Ok(payload) => payload,
            Err(jam_wire::FrameError::UnexpectedEndOfStream) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let message = Message::decode(&payload)?;
        tracing::debug!(?message, "received message");

        match dispatch(session, message)? {
            Some(reply) => {
                write_frame(stream, &reply.encode()).await?;
                if session.is_shutting_down() {
                    return Ok(());
                }
            }
            None => return Ok(()),
        }
    }
}
