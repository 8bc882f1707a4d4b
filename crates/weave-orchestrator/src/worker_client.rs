use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use weave_core::Result;
use weave_wire::{GenerationParams, Response};

/// One-shot connection to the worker: connect, send a single generate
/// request, read back exactly one response or error frame, then drop.
/// The worker handles requests strictly serially, so there is no benefit
/// to holding the connection open across prompts from this side either.
pub struct WorkerClient {
    socket_path: std::path::PathBuf,
    recv_timeout_secs: u64,
    send_timeout_secs: u64,
}

impl WorkerClient {
    pub fn new(socket_path: std::path::PathBuf, recv_timeout_secs: u64, send_timeout_secs: u64) -> Self {
        Self {
            socket_path,
            recv_timeout_secs,
            send_timeout_secs,
        }
    }

    pub async fn generate(
        &self,
        request_id: u64,
        params: GenerationParams,
        clip_l: &[u8],
        clip_g: &[u8],
        t5: &[u8],
    ) -> Result<Response> {
        let request_bytes = weave_wire::encode_request(request_id, params, clip_l, clip_g, t5)?;

        let mut stream = UnixStream::connect(&self.socket_path).await?;
        weave_socket::with_timeout_secs(self.send_timeout_secs, stream.write_all(&request_bytes)).await?;

        let frame = read_frame(&mut stream, self.recv_timeout_secs).await?;
        match weave_wire::decode_response(&frame) {
            Ok(response) => Ok(response),
            Err(_) => {
                let error = weave_wire::decode_error(&frame)?;
                Err(weave_core::WeaveError::RequestFailed(error.status as u16))
            }
        }
    }
}

async fn read_frame(stream: &mut UnixStream, recv_timeout_secs: u64) -> Result<Vec<u8>> {
    let mut header = vec![0u8; weave_wire::HEADER_LEN];
    weave_socket::with_timeout_secs(recv_timeout_secs, stream.read_exact(&mut header)).await?;

    let frame_len = weave_wire::peek_frame_len(&header)?;
    let mut frame = vec![0u8; frame_len];
    frame[..weave_wire::HEADER_LEN].copy_from_slice(&header);
    weave_socket::with_timeout_secs(recv_timeout_secs, stream.read_exact(&mut frame[weave_wire::HEADER_LEN..]))
        .await?;

    Ok(frame)
}
