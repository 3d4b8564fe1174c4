//! `BarrierValue`: the tagged byte encoding stored under
//! `fns/barrier/<key>` (spec.md §3, §6). First byte is the state tag
//! (`X` pending, `T` success, `F` failure, `G` forgotten); second byte is
//! the subtag (`N` nil success, `V` encoded value, `C` coded error, `S`
//! string error); the remainder is opaque payload.
//!
//! Kept as a small sum type with explicit encode/decode per spec.md §9
//! ("a rewrite should model it as a small sum type"), rather than the
//! zero-copy tagged buffer the source used.

use fns_core::FnsError;
use serde::{Deserialize, Serialize};

const TAG_PENDING: u8 = b'X';
const TAG_SUCCESS: u8 = b'T';
const TAG_FAILURE: u8 = b'F';
const TAG_FORGOTTEN: u8 = b'G';

const SUB_NIL: u8 = b'N';
const SUB_VALUE: u8 = b'V';
const SUB_CODED_ERROR: u8 = b'C';
const SUB_STRING_ERROR: u8 = b'S';

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodedErrorPayload {
    pub code: String,
    pub message: String,
}

#[derive(Clone, Debug)]
pub enum BarrierValue {
    /// A computation is in flight; no result is available yet.
    Pending,
    /// `fn` completed with no meaningful payload (unit-like success).
    SuccessNil,
    /// `fn` completed with a JSON-encoded value.
    SuccessValue(Vec<u8>),
    /// `fn` failed with a structured, coded error.
    FailureCoded(CodedErrorPayload),
    /// `fn` failed with only a display string (no stable code).
    FailureString(String),
    /// `Forget` overwrote the prior state; any in-flight poller must
    /// restart its election.
    Forgotten,
}

impl BarrierValue {
    /// Monotonic state position (spec.md §3 invariant (d): `X → (T|F) → G`).
    fn rank(&self) -> u8 {
        match self {
            BarrierValue::Pending => 0,
            BarrierValue::SuccessNil | BarrierValue::SuccessValue(_) => 1,
            BarrierValue::FailureCoded(_) | BarrierValue::FailureString(_) => 1,
            BarrierValue::Forgotten => 2,
        }
    }

    /// `true` if moving from `self` to `next` would regress the state
    /// machine. Used defensively in tests and the cluster barrier's
    /// "restart on forgotten" handling.
    pub fn would_regress(&self, next: &BarrierValue) -> bool {
        next.rank() < self.rank()
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            BarrierValue::Pending => vec![TAG_PENDING],
            BarrierValue::SuccessNil => vec![TAG_SUCCESS, SUB_NIL],
            BarrierValue::SuccessValue(bytes) => {
                let mut out = Vec::with_capacity(2 + bytes.len());
                out.push(TAG_SUCCESS);
                out.push(SUB_VALUE);
                out.extend_from_slice(bytes);
                out
            }
            BarrierValue::FailureCoded(payload) => {
                let mut out = vec![TAG_FAILURE, SUB_CODED_ERROR];
                out.extend_from_slice(&serde_json::to_vec(payload).unwrap_or_default());
                out
            }
            BarrierValue::FailureString(message) => {
                let mut out = vec![TAG_FAILURE, SUB_STRING_ERROR];
                out.extend_from_slice(message.as_bytes());
                out
            }
            BarrierValue::Forgotten => vec![TAG_FORGOTTEN, SUB_NIL],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FnsError> {
        let tag = *bytes
            .first()
            .ok_or_else(|| FnsError::warning("empty barrier value"))?;
        match tag {
            TAG_PENDING => Ok(BarrierValue::Pending),
            TAG_FORGOTTEN => Ok(BarrierValue::Forgotten),
            TAG_SUCCESS => {
                let sub = *bytes
                    .get(1)
                    .ok_or_else(|| FnsError::warning("truncated barrier value"))?;
                let payload = &bytes[2..];
                match sub {
                    SUB_NIL => Ok(BarrierValue::SuccessNil),
                    SUB_VALUE => Ok(BarrierValue::SuccessValue(payload.to_vec())),
                    _ => Err(FnsError::warning("unknown success subtag")),
                }
            }
            TAG_FAILURE => {
                let sub = *bytes
                    .get(1)
                    .ok_or_else(|| FnsError::warning("truncated barrier value"))?;
                let payload = &bytes[2..];
                match sub {
                    SUB_CODED_ERROR => {
                        let coded: CodedErrorPayload = serde_json::from_slice(payload)
                            .map_err(|e| FnsError::warning(format!("bad coded error: {e}")))?;
                        Ok(BarrierValue::FailureCoded(coded))
                    }
                    SUB_STRING_ERROR => {
                        let message = String::from_utf8_lossy(payload).into_owned();
                        Ok(BarrierValue::FailureString(message))
                    }
                    _ => Err(FnsError::warning("unknown failure subtag")),
                }
            }
            _ => Err(FnsError::warning("unknown barrier value tag")),
        }
    }

    pub fn is_forgotten(&self) -> bool {
        matches!(self, BarrierValue::Forgotten)
    }

    pub fn is_decided(&self) -> bool {
        matches!(
            self,
            BarrierValue::SuccessNil
                | BarrierValue::SuccessValue(_)
                | BarrierValue::FailureCoded(_)
                | BarrierValue::FailureString(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_is_identity_for_every_variant() {
        let samples = vec![
            BarrierValue::Pending,
            BarrierValue::SuccessNil,
            BarrierValue::SuccessValue(b"42".to_vec()),
            BarrierValue::FailureCoded(CodedErrorPayload {
                code: "fns.not_found".into(),
                message: "missing".into(),
            }),
            BarrierValue::FailureString("boom".into()),
            BarrierValue::Forgotten,
        ];
        for sample in samples {
            let encoded = sample.encode();
            let decoded = BarrierValue::decode(&encoded).unwrap();
            assert_eq!(sample.encode(), decoded.encode());
        }
    }

    #[test]
    fn success_value_tag_matches_spec_example() {
        let value = BarrierValue::SuccessValue(b"42".to_vec());
        assert_eq!(value.encode(), b"TV42");
    }

    #[test]
    fn state_machine_never_regresses_from_forgotten() {
        let forgotten = BarrierValue::Forgotten;
        assert!(forgotten.would_regress(&BarrierValue::Pending));
        assert!(forgotten.would_regress(&BarrierValue::SuccessNil));
    }
}
