use anyhow::{Context, Result};
use padsync_common::protocol::jsonrpc::{RequestId, Response, RpcError, INVALID_REQUEST};
use serde_json::json;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::{info, info_span, warn, Instrument};

use crate::rpc::methods::{handle_raw_request, RpcServerState};
use crate::rpc::trace::{trace_id_from_raw_request, with_trace_id_scope};

/// Largest request line accepted, newline excluded. Edits on big documents
/// arrive as a single changeset, so this is generous.
pub const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

/// Serves JSON-RPC 2.0 on `listener` until `shutdown` fires. Framing is
/// newline-delimited JSON. Open connections keep running until their
/// clients hang up.
pub async fn serve_unix_until_shutdown(
    listener: UnixListener,
    state: RpcServerState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted.context("failed to accept unix rpc connection")?;
                spawn_connection(stream, state.clone());
            }
            _ = shutdown.recv() => {
                info!("rpc server received shutdown");
                return Ok(());
            }
        }
    }
}

fn spawn_connection(stream: tokio::net::UnixStream, state: RpcServerState) {
    tokio::spawn(async move {
        if let Err(error) = serve_connection(stream, state).await {
            warn!(?error, "unix rpc connection failed");
        }
    });
}

enum Frame {
    Eof,
    Line,
    /// The line was longer than the limit and has been skipped.
    Oversized,
}

/// Handle a single RPC stream. Each non-blank request line yields one
/// response line, in order.
pub async fn serve_connection<IO>(stream: IO, state: RpcServerState) -> Result<()>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    serve_connection_with_limit(stream, state, MAX_REQUEST_BYTES).await
}

async fn serve_connection_with_limit<IO>(stream: IO, state: RpcServerState, limit: usize) -> Result<()>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = io::split(stream);
    let mut reader = BufReader::new(read_half);
    let mut request_line = Vec::new();

    loop {
        request_line.clear();
        let response = match read_frame(&mut reader, &mut request_line, limit).await? {
            Frame::Eof => return Ok(()),
            Frame::Oversized => {
                warn!(limit, "rejected oversized rpc request");
                Response::error(
                    RequestId::Null,
                    RpcError::new(INVALID_REQUEST, "Request too large").with_data(json!({ "limit": limit })),
                )
            }
            Frame::Line => {
                if request_line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let trace_id = trace_id_from_raw_request(&request_line);
                let span = info_span!("rpc", trace_id = %trace_id);
                with_trace_id_scope(trace_id, handle_raw_request(&request_line, &state))
                    .instrument(span)
                    .await
            }
        };

        let mut encoded = serde_json::to_vec(&response).context("failed to serialize json-rpc response")?;
        encoded.push(b'\n');
        write_half.write_all(&encoded).await.context("failed to write json-rpc response")?;
        write_half.flush().await.context("failed to flush json-rpc response")?;
    }
}

/// Reads one newline-terminated frame into `line`, without the line ending.
/// Never buffers more than `limit` bytes of a single line.
async fn read_frame<R>(reader: &mut R, line: &mut Vec<u8>, limit: usize) -> Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut oversized = false;
    loop {
        let available = reader.fill_buf().await.context("failed to read json-rpc request")?;
        if available.is_empty() {
            // A final line without a newline still counts.
            return Ok(match (oversized, line.is_empty()) {
                (true, _) => Frame::Oversized,
                (false, true) => Frame::Eof,
                (false, false) => Frame::Line,
            });
        }

        let (chunk, done) = match available.iter().position(|byte| *byte == b'\n') {
            Some(newline) => (&available[..newline], Some(newline + 1)),
            None => (available, None),
        };
        if !oversized {
            if line.len() + chunk.len() > limit {
                oversized = true;
                line.clear();
            } else {
                line.extend_from_slice(chunk);
            }
        }
        let consumed = done.unwrap_or(available.len());
        reader.consume(consumed);

        if done.is_some() {
            if oversized {
                return Ok(Frame::Oversized);
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(Frame::Line);
        }
    }
}
