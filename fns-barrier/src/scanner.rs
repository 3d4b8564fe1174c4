//! Result delivery for a successful barrier call (spec.md §4.4 "Result
//! delivery").
//!
//! The source's `Scanner` abstraction juggled three cases because Go's
//! `interface{}` result type needed a runtime-assignability fallback. In a
//! statically-typed Rust API the caller already names the target type at
//! the call site, so cases (a) and (c) collapse into "the caller asked for
//! `Vec<u8>`" vs. "the caller asked for a `Deserialize` type", and case
//! (b) is simply what [`scan_json`] does. Both are kept as free functions
//! rather than a single blanket trait to avoid the overlapping-impl
//! problem a generic `Scanner<T>` runs into once `Vec<u8>` is itself
//! JSON-decodable.

use fns_core::FnsError;
use serde::de::DeserializeOwned;

/// Case (a): the caller wants the raw stored bytes, untouched.
pub fn scan_raw(raw: &[u8]) -> Vec<u8> {
    raw.to_vec()
}

/// Cases (b)/(c): JSON-decode the stored bytes into a structured target.
pub fn scan_json<T: DeserializeOwned>(raw: &[u8]) -> Result<T, FnsError> {
    serde_json::from_slice(raw).map_err(|err| FnsError::warning(format!("scan failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, PartialEq, Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn raw_scan_passes_bytes_through() {
        assert_eq!(scan_raw(b"hello"), b"hello".to_vec());
    }

    #[test]
    fn json_scan_decodes_structured_target() {
        let point: Point = scan_json(br#"{"x":1,"y":2}"#).unwrap();
        assert_eq!(point, Point { x: 1, y: 2 });
    }
}
