use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use weave_core::WeaveError;

/// The four ASCII bytes `WEVE`.
pub const MAGIC: u32 = 0x5745_5645;
pub const VERSION: u16 = 1;
/// Largest frame (header + payload) either side will accept.
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;
/// The single model this wire version supports.
pub const MODEL_ID_SUPPORTED: u32 = 0;

/// Length in bytes of the common frame header (magic, version, msg_type,
/// payload_len, reserved) shared by every frame type.
pub const HEADER_LEN: usize = 16;
const REQUEST_PREFIX_LEN: usize = 12;
const PARAM_BLOCK_LEN: usize = 48;
const RESPONSE_FIXED_LEN: usize = 32;
const ERROR_FIXED_LEN: usize = 18;

const WIDTH_HEIGHT_MIN: u32 = 64;
const WIDTH_HEIGHT_MAX: u32 = 2048;
const STEPS_MIN: u32 = 1;
const STEPS_MAX: u32 = 100;
const CFG_MIN: f32 = 0.0;
const CFG_MAX: f32 = 20.0;

/// Maximum byte length of any single prompt-encoder slice. Not specified
/// numerically by the source protocol description; chosen generously for
/// the three supported text encoders (CLIP-L, CLIP-G, T5) and enforced
/// identically for all three.
pub const PROMPT_SLICE_MAX_LEN: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Request,
    Response,
    Error,
}

impl MsgType {
    fn wire_value(self) -> u16 {
        match self {
            MsgType::Request => 1,
            MsgType::Response => 2,
            MsgType::Error => 0xFF,
        }
    }
}

/// An (offset, length) pair naming a slice of the prompt buffer. Slices may
/// alias one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptSlice {
    pub offset: u32,
    pub length: u32,
}

/// The 48-byte fixed parameter block of a generate request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f32,
    pub seed: i64,
}

impl GenerationParams {
    /// Clamps `width`, `height`, `steps`, and `cfg_scale` into this wire
    /// version's valid bounds in place, returning the names of whichever
    /// fields were out of range. `seed` is unconstrained at the wire level
    /// and is left untouched. Callers that build a request from loosely
    /// coerced LLM tool-call output can use the returned list to surface a
    /// warning before ever encoding the request, rather than waiting on
    /// the worker to reject it.
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let mut adjusted = Vec::new();
        let clamped_width = round_to_valid_dimension(self.width);
        if clamped_width != self.width {
            self.width = clamped_width;
            adjusted.push("width");
        }
        let clamped_height = round_to_valid_dimension(self.height);
        if clamped_height != self.height {
            self.height = clamped_height;
            adjusted.push("height");
        }
        let clamped_steps = self.steps.clamp(STEPS_MIN, STEPS_MAX);
        if clamped_steps != self.steps {
            self.steps = clamped_steps;
            adjusted.push("steps");
        }
        let clamped_cfg = self.cfg_scale.clamp(CFG_MIN, CFG_MAX);
        if clamped_cfg != self.cfg_scale || self.cfg_scale.is_nan() {
            self.cfg_scale = if self.cfg_scale.is_nan() { CFG_MIN } else { clamped_cfg };
            adjusted.push("cfg_scale");
        }
        adjusted
    }
}

/// A fully decoded, fully validated generate request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub request_id: u64,
    pub params: GenerationParams,
    clip_l: PromptSlice,
    clip_g: PromptSlice,
    t5: PromptSlice,
    prompt_buffer: Vec<u8>,
}

impl Request {
    pub fn clip_l(&self) -> &[u8] {
        slice_of(&self.prompt_buffer, self.clip_l)
    }

    pub fn clip_g(&self) -> &[u8] {
        slice_of(&self.prompt_buffer, self.clip_g)
    }

    pub fn t5(&self) -> &[u8] {
        slice_of(&self.prompt_buffer, self.t5)
    }
}

fn slice_of(buf: &[u8], s: PromptSlice) -> &[u8] {
    &buf[s.offset as usize..(s.offset + s.length) as usize]
}

/// A decoded generate response (msg_type = 2).
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub request_id: u64,
    pub status: u32,
    pub generation_time_ms: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub channels: u32,
    pub image_data: Vec<u8>,
}

/// The small enumerated taxonomy carried in an error frame's `error_code`
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Protocol = 1,
    Validation = 2,
    Gpu = 3,
    Timeout = 4,
    OutOfMemory = 5,
    Internal = 6,
}

impl ErrorCode {
    fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => ErrorCode::Protocol,
            2 => ErrorCode::Validation,
            3 => ErrorCode::Gpu,
            4 => ErrorCode::Timeout,
            5 => ErrorCode::OutOfMemory,
            6 => ErrorCode::Internal,
            _ => return None,
        })
    }
}

/// A decoded error frame (msg_type = 0xFF).
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub request_id: u64,
    pub status: u32,
    pub error_code: ErrorCode,
    pub error_msg: String,
}

struct Header {
    payload_len: u32,
}

/// Reads and validates the 16-byte common header for the expected
/// `msg_type`. `bytes` may contain trailing data beyond the frame.
fn read_header(bytes: &[u8], expected: MsgType) -> Result<Header, WeaveError> {
    if bytes.len() < HEADER_LEN {
        return Err(WeaveError::Truncated);
    }
    let mut cur = Cursor::new(bytes);
    let magic = cur.read_u32::<BigEndian>().unwrap();
    if magic != MAGIC {
        return Err(WeaveError::InvalidMagic);
    }
    let version = cur.read_u16::<BigEndian>().unwrap();
    if version != VERSION {
        return Err(WeaveError::UnsupportedVersion);
    }
    let msg_type = cur.read_u16::<BigEndian>().unwrap();
    if msg_type != expected.wire_value() {
        return Err(WeaveError::Internal(format!(
            "unexpected msg_type {msg_type:#x} on this decode path"
        )));
    }
    let payload_len = cur.read_u32::<BigEndian>().unwrap();
    if payload_len > MAX_MESSAGE_SIZE - HEADER_LEN as u32 {
        return Err(WeaveError::TooLarge);
    }
    let reserved = cur.read_u32::<BigEndian>().unwrap();
    if reserved != 0 {
        return Err(WeaveError::Internal("reserved header field is nonzero".into()));
    }
    if bytes.len() < HEADER_LEN + payload_len as usize {
        return Err(WeaveError::Truncated);
    }
    Ok(Header { payload_len })
}

/// Reads only magic/version/payload_len from a frame's leading bytes,
/// returning the total frame length (header + payload) without committing
/// to a `msg_type`. Callers reading a frame off a stream use this to know
/// how many more bytes to read before a full `decode_*` can run.
pub fn peek_frame_len(header: &[u8]) -> Result<usize, WeaveError> {
    if header.len() < HEADER_LEN {
        return Err(WeaveError::Truncated);
    }
    let mut cur = Cursor::new(header);
    let magic = cur.read_u32::<BigEndian>().unwrap();
    if magic != MAGIC {
        return Err(WeaveError::InvalidMagic);
    }
    let version = cur.read_u16::<BigEndian>().unwrap();
    if version != VERSION {
        return Err(WeaveError::UnsupportedVersion);
    }
    let _msg_type = cur.read_u16::<BigEndian>().unwrap();
    let payload_len = cur.read_u32::<BigEndian>().unwrap();
    if payload_len > MAX_MESSAGE_SIZE - HEADER_LEN as u32 {
        return Err(WeaveError::TooLarge);
    }
    Ok(HEADER_LEN + payload_len as usize)
}

fn write_header(out: &mut Vec<u8>, msg_type: MsgType, payload_len: u32) {
    out.write_u32::<BigEndian>(MAGIC).unwrap();
    out.write_u16::<BigEndian>(VERSION).unwrap();
    out.write_u16::<BigEndian>(msg_type.wire_value()).unwrap();
    out.write_u32::<BigEndian>(payload_len).unwrap();
    out.write_u32::<BigEndian>(0).unwrap(); // reserved
}

fn validate_dimension(v: u32) -> bool {
    (WIDTH_HEIGHT_MIN..=WIDTH_HEIGHT_MAX).contains(&v) && v % 64 == 0
}

/// Clamps to the valid range, then rounds to the nearest multiple of 64.
fn round_to_valid_dimension(v: u32) -> u32 {
    let clamped = v.clamp(WIDTH_HEIGHT_MIN, WIDTH_HEIGHT_MAX);
    let rounded = ((clamped + 32) / 64) * 64;
    rounded.clamp(WIDTH_HEIGHT_MIN, WIDTH_HEIGHT_MAX)
}

fn validate_slice(s: PromptSlice, buffer_len: usize) -> Result<(), WeaveError> {
    let length = s.length as usize;
    if length == 0 || length > PROMPT_SLICE_MAX_LEN {
        return Err(WeaveError::InvalidPrompt);
    }
    let offset = s.offset as usize;
    if offset > buffer_len {
        return Err(WeaveError::InvalidPrompt);
    }
    if length > buffer_len - offset {
        return Err(WeaveError::InvalidPrompt);
    }
    Ok(())
}

/// Decodes a generate request (msg_type = 1). Never reads
/// outside `bytes`, never panics on adversarial input.
pub fn decode_request(bytes: &[u8]) -> Result<Request, WeaveError> {
    let header = read_header(bytes, MsgType::Request)?;
    let payload = &bytes[HEADER_LEN..HEADER_LEN + header.payload_len as usize];

    if payload.len() < REQUEST_PREFIX_LEN + PARAM_BLOCK_LEN {
        return Err(WeaveError::Truncated);
    }

    let mut cur = Cursor::new(payload);
    let request_id = cur.read_u64::<BigEndian>().unwrap();
    let model_id = cur.read_u32::<BigEndian>().unwrap();
    if model_id != MODEL_ID_SUPPORTED {
        return Err(WeaveError::InvalidModelId);
    }

    let width = cur.read_u32::<BigEndian>().unwrap();
    let height = cur.read_u32::<BigEndian>().unwrap();
    let steps = cur.read_u32::<BigEndian>().unwrap();
    let cfg_scale = cur.read_f32::<BigEndian>().unwrap();
    let seed = cur.read_i64::<BigEndian>().unwrap();
    let clip_l = PromptSlice {
        offset: cur.read_u32::<BigEndian>().unwrap(),
        length: cur.read_u32::<BigEndian>().unwrap(),
    };
    let clip_g = PromptSlice {
        offset: cur.read_u32::<BigEndian>().unwrap(),
        length: cur.read_u32::<BigEndian>().unwrap(),
    };
    let t5 = PromptSlice {
        offset: cur.read_u32::<BigEndian>().unwrap(),
        length: cur.read_u32::<BigEndian>().unwrap(),
    };

    if !validate_dimension(width) || !validate_dimension(height) {
        return Err(WeaveError::InvalidDimensions);
    }
    if !(STEPS_MIN..=STEPS_MAX).contains(&steps) {
        return Err(WeaveError::InvalidSteps);
    }
    if cfg_scale.is_nan() || cfg_scale.is_infinite() || !(CFG_MIN..=CFG_MAX).contains(&cfg_scale) {
        return Err(WeaveError::InvalidCfg);
    }

    let prompt_buffer = payload[REQUEST_PREFIX_LEN + PARAM_BLOCK_LEN..].to_vec();
    validate_slice(clip_l, prompt_buffer.len())?;
    validate_slice(clip_g, prompt_buffer.len())?;
    validate_slice(t5, prompt_buffer.len())?;

    Ok(Request {
        request_id,
        params: GenerationParams {
            width,
            height,
            steps,
            cfg_scale,
            seed,
        },
        clip_l,
        clip_g,
        t5,
        prompt_buffer,
    })
}

/// Encodes a generate request. The inverse of [`decode_request`]; used by
/// the orchestrator side of the connection.
pub fn encode_request(
    request_id: u64,
    params: GenerationParams,
    clip_l: &[u8],
    clip_g: &[u8],
    t5: &[u8],
) -> Result<Vec<u8>, WeaveError> {
    if !validate_dimension(params.width) || !validate_dimension(params.height) {
        return Err(WeaveError::InvalidDimensions);
    }
    if !(STEPS_MIN..=STEPS_MAX).contains(&params.steps) {
        return Err(WeaveError::InvalidSteps);
    }
    if params.cfg_scale.is_nan()
        || params.cfg_scale.is_infinite()
        || !(CFG_MIN..=CFG_MAX).contains(&params.cfg_scale)
    {
        return Err(WeaveError::InvalidCfg);
    }
    for slice in [clip_l, clip_g, t5] {
        if slice.is_empty() || slice.len() > PROMPT_SLICE_MAX_LEN {
            return Err(WeaveError::InvalidPrompt);
        }
    }

    // Prompt buffer is the concatenation of the three slices in order; they
    // do not alias on encode (the decoder permits aliasing, the encoder
    // does not need to produce it).
    let mut prompt_buffer = Vec::with_capacity(clip_l.len() + clip_g.len() + t5.len());
    let clip_l_slice = PromptSlice {
        offset: 0,
        length: clip_l.len() as u32,
    };
    prompt_buffer.extend_from_slice(clip_l);
    let clip_g_slice = PromptSlice {
        offset: prompt_buffer.len() as u32,
        length: clip_g.len() as u32,
    };
    prompt_buffer.extend_from_slice(clip_g);
    let t5_slice = PromptSlice {
        offset: prompt_buffer.len() as u32,
        length: t5.len() as u32,
    };
    prompt_buffer.extend_from_slice(t5);

    let payload_len = REQUEST_PREFIX_LEN + PARAM_BLOCK_LEN + prompt_buffer.len();
    if HEADER_LEN + payload_len > MAX_MESSAGE_SIZE as usize {
        return Err(WeaveError::TooLarge);
    }

    let mut out = Vec::with_capacity(HEADER_LEN + payload_len);
    write_header(&mut out, MsgType::Request, payload_len as u32);
    out.write_u64::<BigEndian>(request_id).unwrap();
    out.write_u32::<BigEndian>(MODEL_ID_SUPPORTED).unwrap();
    out.write_u32::<BigEndian>(params.width).unwrap();
    out.write_u32::<BigEndian>(params.height).unwrap();
    out.write_u32::<BigEndian>(params.steps).unwrap();
    out.write_f32::<BigEndian>(params.cfg_scale).unwrap();
    out.write_i64::<BigEndian>(params.seed).unwrap();
    for slice in [clip_l_slice, clip_g_slice, t5_slice] {
        out.write_u32::<BigEndian>(slice.offset).unwrap();
        out.write_u32::<BigEndian>(slice.length).unwrap();
    }
    out.extend_from_slice(&prompt_buffer);
    Ok(out)
}

/// Encodes a generate response (msg_type = 2).
pub fn encode_response(resp: &Response) -> Result<Vec<u8>, WeaveError> {
    if resp.status != 200 {
        return Err(WeaveError::Internal(
            "encode_response requires status == 200; use encode_error otherwise".into(),
        ));
    }
    if resp.channels != 3 && resp.channels != 4 {
        return Err(WeaveError::InvalidDimensions);
    }
    if !validate_dimension(resp.image_width) || !validate_dimension(resp.image_height) {
        return Err(WeaveError::InvalidDimensions);
    }

    let pixels = (resp.image_width as u64)
        .checked_mul(resp.image_height as u64)
        .ok_or(WeaveError::InvalidDimensions)?;
    if pixels > u32::MAX as u64 {
        return Err(WeaveError::InvalidDimensions);
    }
    let expected_len = pixels
        .checked_mul(resp.channels as u64)
        .ok_or(WeaveError::InvalidDimensions)?;
    if expected_len > u32::MAX as u64 {
        return Err(WeaveError::InvalidDimensions);
    }
    if resp.image_data.len() as u64 != expected_len {
        return Err(WeaveError::InvalidDimensions);
    }

    let payload_len = RESPONSE_FIXED_LEN + resp.image_data.len();
    if HEADER_LEN + payload_len > MAX_MESSAGE_SIZE as usize {
        return Err(WeaveError::TooLarge);
    }

    let mut out = Vec::with_capacity(HEADER_LEN + payload_len);
    write_header(&mut out, MsgType::Response, payload_len as u32);
    out.write_u64::<BigEndian>(resp.request_id).unwrap();
    out.write_u32::<BigEndian>(resp.status).unwrap();
    out.write_u32::<BigEndian>(resp.generation_time_ms).unwrap();
    out.write_u32::<BigEndian>(resp.image_width).unwrap();
    out.write_u32::<BigEndian>(resp.image_height).unwrap();
    out.write_u32::<BigEndian>(resp.channels).unwrap();
    out.write_u32::<BigEndian>(resp.image_data.len() as u32)
        .unwrap();
    out.extend_from_slice(&resp.image_data);
    Ok(out)
}

/// Decodes a generate response. The inverse of [`encode_response`]; used by
/// the orchestrator side of the connection.
pub fn decode_response(bytes: &[u8]) -> Result<Response, WeaveError> {
    let header = read_header(bytes, MsgType::Response)?;
    let payload = &bytes[HEADER_LEN..HEADER_LEN + header.payload_len as usize];
    if payload.len() < RESPONSE_FIXED_LEN {
        return Err(WeaveError::Truncated);
    }

    let mut cur = Cursor::new(payload);
    let request_id = cur.read_u64::<BigEndian>().unwrap();
    let status = cur.read_u32::<BigEndian>().unwrap();
    let generation_time_ms = cur.read_u32::<BigEndian>().unwrap();
    let image_width = cur.read_u32::<BigEndian>().unwrap();
    let image_height = cur.read_u32::<BigEndian>().unwrap();
    let channels = cur.read_u32::<BigEndian>().unwrap();
    let image_data_len = cur.read_u32::<BigEndian>().unwrap() as usize;

    if status != 200 {
        return Err(WeaveError::Internal("response status must be 200".into()));
    }
    if channels != 3 && channels != 4 {
        return Err(WeaveError::InvalidDimensions);
    }
    let remaining = &payload[RESPONSE_FIXED_LEN..];
    if remaining.len() != image_data_len {
        return Err(WeaveError::InvalidDimensions);
    }
    let pixels = (image_width as u64).saturating_mul(image_height as u64);
    let expected = pixels.saturating_mul(channels as u64);
    if expected != image_data_len as u64 {
        return Err(WeaveError::InvalidDimensions);
    }

    Ok(Response {
        request_id,
        status,
        generation_time_ms,
        image_width,
        image_height,
        channels,
        image_data: remaining.to_vec(),
    })
}

/// Encodes an error frame (msg_type = 0xFF).
pub fn encode_error(err: &ErrorResponse) -> Result<Vec<u8>, WeaveError> {
    if err.status != 400 && err.status != 500 {
        return Err(WeaveError::Internal(
            "error frame status must be 400 or 500".into(),
        ));
    }
    if err.error_msg.len() > u16::MAX as usize {
        return Err(WeaveError::TooLarge);
    }

    let payload_len = ERROR_FIXED_LEN + err.error_msg.len();

    if HEADER_LEN + payload_len > MAX_MESSAGE_SIZE as usize {
        return Err(WeaveError::TooLarge);
    }

    let mut out = Vec::with_capacity(HEADER_LEN + payload_len);
    write_header(&mut out, MsgType::Error, payload_len as u32);
    out.write_u64::<BigEndian>(err.request_id).unwrap();
    out.write_u32::<BigEndian>(err.status).unwrap();
    out.write_u32::<BigEndian>(err.error_code as u32).unwrap();
    out.write_u16::<BigEndian>(err.error_msg.len() as u16)
        .unwrap();
    out.extend_from_slice(err.error_msg.as_bytes());
    Ok(out)
}

/// Decodes an error frame.
pub fn decode_error(bytes: &[u8]) -> Result<ErrorResponse, WeaveError> {
    let header = read_header(bytes, MsgType::Error)?;
    let payload = &bytes[HEADER_LEN..HEADER_LEN + header.payload_len as usize];
    if payload.len() < ERROR_FIXED_LEN {
        return Err(WeaveError::Truncated);
    }

    let mut cur = Cursor::new(payload);
    let request_id = cur.read_u64::<BigEndian>().unwrap();
    let status = cur.read_u32::<BigEndian>().unwrap();
    let error_code_raw = cur.read_u32::<BigEndian>().unwrap();
    let error_msg_len = cur.read_u16::<BigEndian>().unwrap() as usize;

    let error_code = ErrorCode::from_u32(error_code_raw)
        .ok_or_else(|| WeaveError::Internal("unknown error_code".into()))?;

    let remaining = &payload[ERROR_FIXED_LEN..];
    if remaining.len() != error_msg_len {
        return Err(WeaveError::Truncated);
    }
    let error_msg = String::from_utf8(remaining.to_vec())
        .map_err(|e| WeaveError::Internal(format!("error_msg is not valid UTF-8: {e}")))?;

    Ok(ErrorResponse {
        request_id,
        status,
        error_code,
        error_msg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> GenerationParams {
        GenerationParams {
            width: 512,
            height: 512,
            steps: 28,
            cfg_scale: 7.0,
            seed: 0,
        }
    }

    #[test]
    fn peek_frame_len_matches_full_request_length() {
        let prompt = b"a cat in space";
        let bytes = encode_request(12345, sample_params(), prompt, prompt, prompt).unwrap();
        assert_eq!(peek_frame_len(&bytes[..HEADER_LEN]).unwrap(), bytes.len());
    }

    #[test]
    fn peek_frame_len_reports_truncated_on_short_header() {
        assert!(matches!(peek_frame_len(&[0u8; 8]), Err(WeaveError::Truncated)));
    }

    #[test]
    fn sanitize_clamps_out_of_range_fields_and_reports_them() {
        let mut params = GenerationParams {
            width: 40,
            height: 4000,
            steps: 0,
            cfg_scale: f32::NAN,
            seed: -1,
        };
        let adjusted = params.sanitize();
        assert_eq!(adjusted, vec!["width", "height", "steps", "cfg_scale"]);
        assert_eq!(params.width, WIDTH_HEIGHT_MIN);
        assert_eq!(params.height, WIDTH_HEIGHT_MAX);
        assert_eq!(params.steps, STEPS_MIN);
        assert_eq!(params.cfg_scale, CFG_MIN);
        assert_eq!(params.seed, -1);
    }

    #[test]
    fn sanitize_is_a_no_op_for_in_range_params() {
        let mut params = sample_params();
        let adjusted = params.sanitize();
        assert!(adjusted.is_empty());
        assert_eq!(params, sample_params());
    }

    #[test]
    fn happy_request_roundtrip_matches_scenario_1() {
        let prompt = b"a cat in space";
        let bytes = encode_request(12345, sample_params(), prompt, prompt, prompt).unwrap();
        let req = decode_request(&bytes).unwrap();
        assert_eq!(req.request_id, 12345);
        assert_eq!(req.params.width, 512);
        assert_eq!(req.params.height, 512);
        assert_eq!(req.params.steps, 28);
        assert_eq!(req.params.cfg_scale, 7.0);
        assert_eq!(req.params.seed, 0);
        assert_eq!(req.clip_l(), prompt);
        assert_eq!(req.clip_g(), prompt);
        assert_eq!(req.t5(), prompt);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let bytes = [0u8; 10];
        assert!(matches!(decode_request(&bytes), Err(WeaveError::Truncated)));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = encode_request(1, sample_params(), b"x", b"x", b"x").unwrap();
        bytes[0] = 0;
        assert!(matches!(decode_request(&bytes), Err(WeaveError::InvalidMagic)));
    }

    #[test]
    fn bad_version_is_rejected() {
        let mut bytes = encode_request(1, sample_params(), b"x", b"x", b"x").unwrap();
        bytes[5] = 9; // version low byte
        assert!(matches!(
            decode_request(&bytes),
            Err(WeaveError::UnsupportedVersion)
        ));
    }

    #[test]
    fn dimension_boundaries() {
        let mut p = sample_params();
        p.width = 64;
        p.height = 64;
        let bytes = encode_request(1, p, b"x", b"x", b"x").unwrap();
        assert!(decode_request(&bytes).is_ok());

        p.width = 2048;
        p.height = 2048;
        let bytes = encode_request(1, p, b"x", b"x", b"x").unwrap();
        assert!(decode_request(&bytes).is_ok());

        p.width = 63;
        assert!(matches!(
            encode_request(1, p, b"x", b"x", b"x"),
            Err(WeaveError::InvalidDimensions)
        ));

        p.width = 2112;
        assert!(matches!(
            encode_request(1, p, b"x", b"x", b"x"),
            Err(WeaveError::InvalidDimensions)
        ));
    }

    #[test]
    fn steps_boundaries() {
        let mut p = sample_params();
        p.steps = 1;
        assert!(encode_request(1, p, b"x", b"x", b"x").is_ok());
        p.steps = 100;
        assert!(encode_request(1, p, b"x", b"x", b"x").is_ok());
        p.steps = 0;
        assert!(matches!(
            encode_request(1, p, b"x", b"x", b"x"),
            Err(WeaveError::InvalidSteps)
        ));
        p.steps = 101;
        assert!(matches!(
            encode_request(1, p, b"x", b"x", b"x"),
            Err(WeaveError::InvalidSteps)
        ));
    }

    #[test]
    fn cfg_boundaries_and_nan_inf() {
        let mut p = sample_params();
        p.cfg_scale = 0.0;
        assert!(encode_request(1, p, b"x", b"x", b"x").is_ok());
        p.cfg_scale = 20.0;
        assert!(encode_request(1, p, b"x", b"x", b"x").is_ok());
        p.cfg_scale = -0.1;
        assert!(matches!(
            encode_request(1, p, b"x", b"x", b"x"),
            Err(WeaveError::InvalidCfg)
        ));
        p.cfg_scale = 20.1;
        assert!(matches!(
            encode_request(1, p, b"x", b"x", b"x"),
            Err(WeaveError::InvalidCfg)
        ));
        p.cfg_scale = f32::NAN;
        assert!(matches!(
            encode_request(1, p, b"x", b"x", b"x"),
            Err(WeaveError::InvalidCfg)
        ));
        p.cfg_scale = f32::INFINITY;
        assert!(matches!(
            encode_request(1, p, b"x", b"x", b"x"),
            Err(WeaveError::InvalidCfg)
        ));
        p.cfg_scale = f32::NEG_INFINITY;
        assert!(matches!(
            encode_request(1, p, b"x", b"x", b"x"),
            Err(WeaveError::InvalidCfg)
        ));
    }

    #[test]
    fn prompt_offset_length_exactly_at_buffer_end_accepts() {
        // Hand-build a request where clip_l spans the entire 5-byte buffer.
        let params = sample_params();
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u64.to_be_bytes());
        payload.extend_from_slice(&MODEL_ID_SUPPORTED.to_be_bytes());
        payload.extend_from_slice(&params.width.to_be_bytes());
        payload.extend_from_slice(&params.height.to_be_bytes());
        payload.extend_from_slice(&params.steps.to_be_bytes());
        payload.extend_from_slice(&params.cfg_scale.to_be_bytes());
        payload.extend_from_slice(&params.seed.to_be_bytes());
        // clip_l = whole buffer (offset 0, length 5) — exactly at the end.
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&5u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&5u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&5u32.to_be_bytes());
        payload.extend_from_slice(b"hello");

        let mut frame = Vec::new();
        write_header(&mut frame, MsgType::Request, payload.len() as u32);
        frame.extend_from_slice(&payload);
        assert!(decode_request(&frame).is_ok());

        // One byte greater than the buffer must reject.
        let mut payload2 = payload.clone();
        // Overwrite clip_l length (bytes 28..32) to 6, one past the buffer.
        payload2[28..32].copy_from_slice(&6u32.to_be_bytes());
        let mut frame2 = Vec::new();
        write_header(&mut frame2, MsgType::Request, payload2.len() as u32);
        frame2.extend_from_slice(&payload2);
        assert!(matches!(
            decode_request(&frame2),
            Err(WeaveError::InvalidPrompt)
        ));
    }

    #[test]
    fn response_roundtrip_and_length_invariant() {
        let resp = Response {
            request_id: 42,
            status: 200,
            generation_time_ms: 1500,
            image_width: 64,
            image_height: 64,
            channels: 3,
            image_data: vec![0u8; 64 * 64 * 3],
        };
        let bytes = encode_response(&resp).unwrap();
        assert_eq!(bytes.len(), 16 + 16 + 16 + resp.image_data.len());
        let decoded = decode_response(&bytes).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn encode_response_rejects_channel_mismatch_length() {
        let resp = Response {
            request_id: 1,
            status: 200,
            generation_time_ms: 0,
            image_width: 64,
            image_height: 64,
            channels: 3,
            image_data: vec![0u8; 10], // wrong length
        };
        assert!(matches!(
            encode_response(&resp),
            Err(WeaveError::InvalidDimensions)
        ));
    }

    #[test]
    fn width_height_channels_overflow_rejects_encode() {
        let resp = Response {
            request_id: 1,
            status: 200,
            generation_time_ms: 0,
            image_width: 2048,
            image_height: 2048,
            channels: 4,
            // Real u32::MAX overflow scenarios aren't reachable with in-range
            // dimensions; this case exercises the exact-length check instead,
            // which is the practically reachable half of the same guard.
            image_data: vec![0u8; 2048 * 2048 * 4 - 1],
        };
        assert!(matches!(
            encode_response(&resp),
            Err(WeaveError::InvalidDimensions)
        ));
    }

    #[test]
    fn error_frame_roundtrip() {
        let err = ErrorResponse {
            request_id: 7,
            status: 400,
            error_code: ErrorCode::Validation,
            error_msg: "cfg_scale out of range".into(),
        };
        let bytes = encode_error(&err).unwrap();
        let decoded = decode_error(&bytes).unwrap();
        assert_eq!(decoded, err);
    }

    #[test]
    fn error_frame_zero_request_id_for_undecodable_request() {
        let err = ErrorResponse {
            request_id: 0,
            status: 400,
            error_code: ErrorCode::Protocol,
            error_msg: "bad magic".into(),
        };
        let bytes = encode_error(&err).unwrap();
        let decoded = decode_error(&bytes).unwrap();
        assert_eq!(decoded.request_id, 0);
    }

    #[test]
    fn decoder_never_panics_on_adversarial_payload_len() {
        // Claims a huge payload_len but supplies no data for it.
        let mut frame = Vec::new();
        write_header(&mut frame, MsgType::Request, u32::MAX - 16);
        assert!(matches!(decode_request(&frame), Err(WeaveError::TooLarge)));
    }

    #[test]
    fn model_id_mismatch_rejected() {
        let params = sample_params();
        let mut bytes = encode_request(1, params, b"x", b"x", b"x").unwrap();
        // model_id occupies payload bytes [8..12) -> frame bytes [24..28).
        bytes[24..28].copy_from_slice(&1u32.to_be_bytes());
        assert!(matches!(
            decode_request(&bytes),
            Err(WeaveError::InvalidModelId)
        ));
    }
}
