use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};
use weave_config::WeaveConfig;
use weave_core::{Result, WeaveError};
use weave_wire::{ErrorCode, ErrorResponse, Request, Response};

use crate::synth;

/// Fixed channel count this worker's synthetic images are produced in.
const CHANNELS: u32 = 3;

/// Drives one accepted connection to completion: reads frames, decodes
/// requests, and writes back a response or error frame, strictly serially,
/// until the peer closes the stream or a framing error ends it early.
pub async fn handle_connection(mut stream: UnixStream, peer_uid: u32, cfg: Arc<WeaveConfig>) {
    debug!(peer_uid, "handling connection");
    loop {
        let frame = match read_frame(&mut stream, cfg.worker.recv_timeout_secs).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(peer_uid, "peer closed connection");
                break;
            }
            Err(e) => {
                warn!(peer_uid, error = %e, "failed to read frame, closing connection");
                break;
            }
        };

        let response = match weave_wire::decode_request(&frame) {
            Ok(request) => build_response(&request, &cfg),
            Err(e) => {
                debug!(peer_uid, error = %e, "rejecting malformed request");
                build_error_frame(0, &e)
            }
        };

        if let Err(e) = write_frame(&mut stream, &response, cfg.worker.send_timeout_secs).await {
            warn!(peer_uid, error = %e, "failed to write response, closing connection");
            break;
        }
    }
}

fn build_response(request: &Request, _cfg: &WeaveConfig) -> Vec<u8> {
    let image_data = synth::generate(
        request.params.seed,
        request.params.width,
        request.params.height,
        CHANNELS,
    );
    let response = Response {
        request_id: request.request_id,
        status: 200,
        generation_time_ms: 0,
        image_width: request.params.width,
        image_height: request.params.height,
        channels: CHANNELS,
        image_data,
    };
    match weave_wire::encode_response(&response) {
        Ok(bytes) => bytes,
        Err(e) => build_error_frame(request.request_id, &e),
    }
}

fn build_error_frame(request_id: u64, err: &WeaveError) -> Vec<u8> {
    let error_response = ErrorResponse {
        request_id,
        status: err.wire_status(),
        error_code: classify(err),
        error_msg: err.to_string(),
    };
    weave_wire::encode_error(&error_response).unwrap_or_else(|_| {
        let fallback = ErrorResponse {
            request_id,
            status: 500,
            error_code: ErrorCode::Internal,
            error_msg: "internal error while building error frame".into(),
        };
        weave_wire::encode_error(&fallback).expect("fallback error frame always encodes")
    })
}

fn classify(err: &WeaveError) -> ErrorCode {
    match err {
        WeaveError::Truncated
        | WeaveError::InvalidMagic
        | WeaveError::UnsupportedVersion
        | WeaveError::InvalidModelId => ErrorCode::Protocol,
        WeaveError::InvalidDimensions
        | WeaveError::InvalidSteps
        | WeaveError::InvalidCfg
        | WeaveError::InvalidPrompt
        | WeaveError::TooLarge => ErrorCode::Validation,
        WeaveError::OutOfMemory => ErrorCode::OutOfMemory,
        WeaveError::OperationTimedOut | WeaveError::TimeoutFailed(_) => ErrorCode::Timeout,
        _ => ErrorCode::Internal,
    }
}

/// Reads one frame off `stream`: one byte to distinguish a clean close from
/// a live peer, then the rest of the header, then exactly `payload_len`
/// more bytes. Returns `Ok(None)` only for a close at a frame boundary.
/// `recv_timeout_secs` is the configured per-direction receive timeout; `0`
/// disables it entirely, per the socket layer's own no-clear-on-zero rule.
async fn read_frame(stream: &mut UnixStream, recv_timeout_secs: u64) -> Result<Option<Vec<u8>>> {
    let mut header = vec![0u8; weave_wire::HEADER_LEN];

    let n = weave_socket::with_timeout_secs(recv_timeout_secs, stream.read(&mut header[..1])).await?;
    if n == 0 {
        return Ok(None);
    }
    weave_socket::with_timeout_secs(recv_timeout_secs, stream.read_exact(&mut header[1..])).await?;

    let frame_len = weave_wire::peek_frame_len(&header)?;
    let mut frame = vec![0u8; frame_len];
    frame[..weave_wire::HEADER_LEN].copy_from_slice(&header);
    weave_socket::with_timeout_secs(recv_timeout_secs, stream.read_exact(&mut frame[weave_wire::HEADER_LEN..]))
        .await?;

    Ok(Some(frame))
}

async fn write_frame(stream: &mut UnixStream, bytes: &[u8], send_timeout_secs: u64) -> Result<()> {
    weave_socket::with_timeout_secs(send_timeout_secs, stream.write_all(bytes)).await
}
