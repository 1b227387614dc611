//! Per-connection handler.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::commands::ReplySink;
use crate::config::Settings;
use crate::error::{ProtocolErrorKind, ServerError};
use crate::processor::CommandProcessor;
use crate::protocol::{read_json, write_json, CommandRequest, Reply};

use super::ReplyRouter;

/// Handle a single client connection.
///
/// Requests are read in order and each one is processed on its own task, so
/// a slow command never blocks the next request. At most
/// `limits.max_pending_requests` requests run at once; reading pauses until
/// one finishes. Replies are written by a dedicated writer task in
/// completion order.
///
/// The idle timeout only closes a connection with no request in flight, so
/// every accepted request can still deliver its reply.
pub async fn handle_connection(
    stream: TcpStream,
    settings: Arc<Settings>,
    processor: Arc<CommandProcessor>,
    router: Arc<ReplyRouter>,
) -> Result<(), ServerError> {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let (mut reader, mut writer) = stream.into_split();

    let (client_id, mut replies) = router.register();
    info!(client_id, peer = %peer, "Client connected");

    let socket_timeout = Duration::from_secs(settings.limits.socket_timeout_seconds);
    let writer_task = tokio::spawn(async move {
        while let Some(reply) = replies.recv().await {
            if let Err(e) = write_json(&mut writer, &reply, socket_timeout).await {
                warn!(client_id, error = %e, "Failed to write reply");
                break;
            }
        }
    });

    let max_pending = settings.limits.max_pending_requests;
    let pending = Arc::new(Semaphore::new(max_pending));
    let in_flight = || max_pending - pending.available_permits();

    let result = loop {
        match timeout(socket_timeout, reader.readable()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => break Err(ServerError::Io(e)),
            Err(_) if in_flight() > 0 => {
                debug!(
                    client_id,
                    in_flight = in_flight(),
                    "Connection idle with requests in flight"
                );
                continue;
            }
            Err(_) => {
                warn!(client_id, "Connection timed out");
                break Ok(());
            }
        }

        let request: CommandRequest = match read_json(
            &mut reader,
            settings.limits.max_message_size,
            socket_timeout,
        )
        .await
        {
            Ok(request) => request,
            Err(ServerError::Protocol {
                kind: ProtocolErrorKind::ConnectionClosed,
            }) => {
                debug!(client_id, "Client disconnected");
                break Ok(());
            }
            Err(ServerError::Protocol {
                kind: ProtocolErrorKind::ConnectionTimeout,
            }) => {
                // Stalled inside a frame; the stream cannot be resynchronized.
                warn!(client_id, "Connection timed out mid-frame");
                break Ok(());
            }
            Err(
                e @ ServerError::Protocol {
                    kind: ProtocolErrorKind::InvalidMessageFormat { .. },
                },
            ) => {
                // The frame was consumed whole, so the stream is still in sync.
                warn!(client_id, error = %e, "Malformed request");
                let reply = Reply::failure("", "", client_id, e.to_string());
                if let Err(e) = router.send_reply(reply) {
                    debug!(client_id, error = %e, "Could not report malformed request");
                }
                continue;
            }
            Err(e) => break Err(e),
        };

        debug!(
            client_id,
            command = request.command_name().unwrap_or_default(),
            device = %request.device_name,
            "Received request"
        );

        let permit = match Arc::clone(&pending).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break Ok(()),
        };
        let processor = Arc::clone(&processor);
        tokio::spawn(async move {
            let _permit = permit;
            processor.handle(request, client_id).await;
        });
    };

    router.unregister(client_id);
    // Dropping the last sender ends the writer once queued replies are flushed.
    if let Err(e) = writer_task.await {
        warn!(client_id, error = %e, "Reply writer task failed");
    }
    info!(client_id, "Client connection closed");

    result
}
