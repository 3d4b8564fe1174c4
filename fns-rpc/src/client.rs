//! Client side of the remote call envelope: `Fn.Handle` (spec.md §4.3).
//!
//! This module is deliberately free of any `Endpoint`/`Fn` struct — those
//! live in `fns-manager`, which owns the error window and health flag a
//! real call updates. What this module owns is the wire mechanics: build
//! headers, sign, dial, decode, map statuses to `FnsError`.

use fns_core::{headers, status, FnsError, RequestBody, RequestOptions, TransportClient};

use crate::codec::Codec;
use crate::signature::sign;

/// Everything needed to perform one remote call, independent of the
/// `Endpoint`/`Fn` bookkeeping the caller layers on top.
pub struct RemoteCallRequest<'a> {
    pub service: &'a str,
    pub fn_name: &'a str,
    pub body: RequestBody,
    pub options: &'a RequestOptions,
}

/// Performs one remote call over `client` and returns the decoded
/// response data on success, or the `FnsError` the caller should surface
/// (spec.md §4.3 "Client side").
///
/// Refuses up front unless `options.internal` is set — `Handle` is only
/// ever invoked once the endpoint manager has already decided this call
/// must cross the wire; a non-internal call reaching here is a caller
/// bug, not a recoverable condition.
pub async fn call(
    client: &dyn TransportClient,
    codec: &dyn Codec,
    secret: &[u8],
    req: RemoteCallRequest<'_>,
) -> Result<Vec<u8>, FnsError> {
    if !req.options.internal {
        return Err(FnsError::warning(
            "Fn::handle invoked on a non-internal call context",
        ));
    }

    let encoded_body = codec.encode_request(&req.body)?;
    let signature = sign(secret, &encoded_body);

    let mut entry = fns_core::Entry {
        path: format!("/{}/{}", req.service, req.fn_name),
        body: encoded_body,
        headers: Vec::new(),
    };
    entry.set_header(headers::CONTENT_TYPE, headers::CONTENT_TYPE_VALUE);
    entry.set_header(headers::SIGNATURE, signature);
    if let Some(id) = &req.options.id {
        entry.set_header(headers::ENDPOINT_ID, id.clone());
    }
    if let Some(device_id) = &req.options.device_id {
        entry.set_header(headers::DEVICE_ID, device_id.clone());
    }
    if let Some(device_ip) = &req.options.device_ip {
        entry.set_header(headers::DEVICE_IP, device_ip.clone());
    }
    if let Some(request_id) = &req.options.request_id {
        entry.set_header(headers::REQUEST_ID, request_id.clone());
    }
    if let Some(token) = &req.options.token {
        entry.set_header(headers::AUTHORIZATION, token.clone());
    }
    if let Some(constraint) = req.options.version_for(req.service) {
        entry.set_header(headers::REQUEST_VERSIONS, constraint.to_string());
    }
    for (name, value) in &req.options.passthrough_headers {
        entry.set_header(name.clone(), value.clone());
    }

    let response = match client.call(entry).await {
        Ok(response) => response,
        Err(_) => {
            return Err(FnsError::Unavailable {
                reason: "transport call failed".to_string(),
            });
        }
    };

    decode_response(codec, response)
}

fn decode_response(
    codec: &dyn Codec,
    response: fns_core::TransportResponse,
) -> Result<Vec<u8>, FnsError> {
    match response.status {
        status::OK => {
            let body = codec.decode_response(&response.entry.body)?;
            if body.succeed {
                Ok(body.data)
            } else {
                Err(decode_error_payload(&body.data))
            }
        }
        status::UNAVAILABLE => Err(FnsError::Unavailable {
            reason: "remote endpoint returned 503".to_string(),
        }),
        status::TOO_MANY_REQUESTS => Err(FnsError::TooManyRequests {
            reason: "remote endpoint returned 429".to_string(),
        }),
        status::TOO_EARLY => Err(FnsError::TooEarly {
            reason: "remote endpoint returned 425".to_string(),
        }),
        status::CODE_ERROR => Err(decode_error_payload(&response.entry.body)),
        status::INTERNAL_FAILURE => Err(FnsError::warning(format!(
            "remote internal failure: {}",
            String::from_utf8_lossy(&response.entry.body)
        ))),
        other => Err(FnsError::Unavailable {
            reason: format!("unexpected remote status {other}"),
        }),
    }
}

/// Decodes a `CodeError`-shaped JSON payload; falls back to a plain
/// display-string error (spec.md §4.4's `FC`/`FS` barrier subtags mirror
/// the same two shapes, so the decode logic is intentionally identical in
/// spirit).
fn decode_error_payload(data: &[u8]) -> FnsError {
    #[derive(serde::Deserialize)]
    struct CodeErrorWire {
        code: String,
        message: String,
    }

    match serde_json::from_slice::<CodeErrorWire>(data) {
        Ok(wire) => FnsError::Coded {
            code: wire.code,
            message: wire.message,
        },
        Err(_) => FnsError::Coded {
            code: "fns.warning".to_string(),
            message: String::from_utf8_lossy(data).into_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fns_core::{Entry, TransportResponse};
    use std::sync::Mutex;

    struct StaticClient {
        response: Mutex<Option<TransportResponse>>,
    }

    #[async_trait]
    impl TransportClient for StaticClient {
        async fn call(&self, _request: Entry) -> Result<TransportResponse, FnsError> {
            Ok(self.response.lock().unwrap().take().unwrap())
        }

        async fn health_check(&self) -> bool {
            true
        }

        async fn close(&self) {}
    }

    fn options() -> RequestOptions {
        RequestOptions {
            internal: true,
            device_id: Some("device-1".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn refuses_non_internal_calls() {
        let client = StaticClient {
            response: Mutex::new(None),
        };
        let err = call(
            &client,
            &crate::JsonCodec,
            b"secret",
            RemoteCallRequest {
                service: "math",
                fn_name: "add",
                body: RequestBody::default(),
                options: &RequestOptions::default(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FnsError::Warning { .. }));
    }

    #[tokio::test]
    async fn success_status_decodes_the_response_data() {
        let body = fns_core::ResponseBody::success(b"3".to_vec());
        let entry = Entry {
            path: String::new(),
            headers: Vec::new(),
            body: serde_json::to_vec(&body).unwrap(),
        };
        let client = StaticClient {
            response: Mutex::new(Some(TransportResponse {
                status: status::OK,
                entry,
            })),
        };

        let data = call(
            &client,
            &crate::JsonCodec,
            b"secret",
            RemoteCallRequest {
                service: "math",
                fn_name: "add",
                body: RequestBody::default(),
                options: &options(),
            },
        )
        .await
        .unwrap();
        assert_eq!(data, b"3");
    }

    #[tokio::test]
    async fn status_503_maps_to_unavailable() {
        let client = StaticClient {
            response: Mutex::new(Some(TransportResponse {
                status: status::UNAVAILABLE,
                entry: Entry::default(),
            })),
        };
        let err = call(
            &client,
            &crate::JsonCodec,
            b"secret",
            RemoteCallRequest {
                service: "math",
                fn_name: "add",
                body: RequestBody::default(),
                options: &options(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FnsError::Unavailable { .. }));
        assert!(err.marks_unhealthy());
    }

    #[tokio::test]
    async fn status_429_maps_to_too_many_requests() {
        let client = StaticClient {
            response: Mutex::new(Some(TransportResponse {
                status: status::TOO_MANY_REQUESTS,
                entry: Entry::default(),
            })),
        };
        let err = call(
            &client,
            &crate::JsonCodec,
            b"secret",
            RemoteCallRequest {
                service: "math",
                fn_name: "add",
                body: RequestBody::default(),
                options: &options(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FnsError::TooManyRequests { .. }));
    }

    #[tokio::test]
    async fn status_555_decodes_a_coded_error_body() {
        let payload = serde_json::json!({"code": "app.domain.failed", "message": "bad input"});
        let client = StaticClient {
            response: Mutex::new(Some(TransportResponse {
                status: status::CODE_ERROR,
                entry: Entry {
                    path: String::new(),
                    headers: Vec::new(),
                    body: serde_json::to_vec(&payload).unwrap(),
                },
            })),
        };
        let err = call(
            &client,
            &crate::JsonCodec,
            b"secret",
            RemoteCallRequest {
                service: "math",
                fn_name: "add",
                body: RequestBody::default(),
                options: &options(),
            },
        )
        .await
        .unwrap_err();
        match err {
            FnsError::Coded { code, message } => {
                assert_eq!(code, "app.domain.failed");
                assert_eq!(message, "bad input");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_marks_endpoint_unavailable() {
        struct FailingClient;
        #[async_trait]
        impl TransportClient for FailingClient {
            async fn call(&self, _request: Entry) -> Result<TransportResponse, FnsError> {
                Err(FnsError::warning("connection reset"))
            }
            async fn health_check(&self) -> bool {
                false
            }
            async fn close(&self) {}
        }

        let err = call(
            &FailingClient,
            &crate::JsonCodec,
            b"secret",
            RemoteCallRequest {
                service: "math",
                fn_name: "add",
                body: RequestBody::default(),
                options: &options(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FnsError::Unavailable { .. }));
    }
}
