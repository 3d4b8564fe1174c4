//! The wire codec seam. spec.md §1 lists "JSON/Avro codecs" as an external
//! collaborator assumed available; `fns-rpc` depends only on the
//! [`Codec`] trait, with [`JsonCodec`] as the concrete stand-in used by
//! the bundled loopback transport and the test suite (spec.md §6: "Bodies
//! use a single agreed codec... implementations pick one and stay
//! consistent").

use fns_core::{FnsError, RequestBody, ResponseBody};

pub trait Codec: Send + Sync + 'static {
    fn encode_request(&self, body: &RequestBody) -> Result<Vec<u8>, FnsError>;
    fn decode_request(&self, bytes: &[u8]) -> Result<RequestBody, FnsError>;
    fn encode_response(&self, body: &ResponseBody) -> Result<Vec<u8>, FnsError>;
    fn decode_response(&self, bytes: &[u8]) -> Result<ResponseBody, FnsError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode_request(&self, body: &RequestBody) -> Result<Vec<u8>, FnsError> {
        serde_json::to_vec(body).map_err(|e| FnsError::InvalidBody {
            reason: format!("encode request body failed: {e}"),
        })
    }

    fn decode_request(&self, bytes: &[u8]) -> Result<RequestBody, FnsError> {
        serde_json::from_slice(bytes).map_err(|e| FnsError::InvalidBody {
            reason: format!("decode request body failed: {e}"),
        })
    }

    fn encode_response(&self, body: &ResponseBody) -> Result<Vec<u8>, FnsError> {
        serde_json::to_vec(body).map_err(|e| FnsError::InvalidBody {
            reason: format!("encode response body failed: {e}"),
        })
    }

    fn decode_response(&self, bytes: &[u8]) -> Result<ResponseBody, FnsError> {
        serde_json::from_slice(bytes).map_err(|e| FnsError::InvalidBody {
            reason: format!("decode response body failed: {e}"),
        })
    }
}
