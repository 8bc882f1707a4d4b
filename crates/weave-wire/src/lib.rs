//! # weave-wire
//!
//! The length-framed binary protocol spoken between the orchestrator and the
//! GPU compute worker over a Unix domain socket (see `weave-socket`).
//!
//! Every function here is total and side-effect-free: no I/O, no logging,
//! no allocation beyond the returned value. That makes the codec trivially
//! fuzzable and safe to call from both sides of the connection.

mod codec;

pub use codec::{
    ErrorCode, ErrorResponse, GenerationParams, HEADER_LEN, MAGIC, MAX_MESSAGE_SIZE,
    MODEL_ID_SUPPORTED, MsgType, PromptSlice, Request, Response, VERSION, decode_error,
    decode_request, decode_response, encode_error, encode_request, encode_response,
    peek_frame_len,
};
