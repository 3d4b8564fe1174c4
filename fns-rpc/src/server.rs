//! Server side of the remote call envelope: `InternalHandler` (spec.md
//! §4.3).
//!
//! `InternalHandler` is transport-agnostic (it implements
//! [`fns_core::RequestHandler`]) and endpoint-manager-agnostic: it calls
//! into whatever implements [`InboundHandler`], which `fns-manager`'s
//! endpoint manager does. That keeps `fns-rpc` below `fns-manager` in the
//! dependency order even though the server handler logically "calls the
//! local endpoints" per spec.md §4.3.

use std::sync::Arc;

use async_trait::async_trait;
use fns_core::{
    headers, status, CallContext, Entry, FnsError, RequestHandler, RequestOptions, ResponseBody,
    TransportResponse,
};
use semver::VersionReq;

use crate::codec::Codec;
use crate::signature::verify;

/// The seam `InternalHandler` calls into once a request has been
/// validated, verified, and decoded. `fns-manager`'s `EndpointManager`
/// implements this by delegating to `Request` with
/// `options.with_internal_request()`.
#[async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    async fn handle_internal(
        &self,
        ctx: CallContext,
        service: &str,
        fn_name: &str,
        param: Vec<u8>,
        options: RequestOptions,
    ) -> Result<Vec<u8>, FnsError>;
}

pub struct InternalHandler<C: Codec> {
    secret: Vec<u8>,
    codec: C,
    sink: Arc<dyn InboundHandler>,
}

impl<C: Codec> InternalHandler<C> {
    pub fn new(secret: impl Into<Vec<u8>>, codec: C, sink: Arc<dyn InboundHandler>) -> Self {
        Self {
            secret: secret.into(),
            codec,
            sink,
        }
    }

    async fn handle_entry(&self, request: Entry) -> Result<Vec<u8>, FnsError> {
        let (service, fn_name) = request
            .service_and_fn()
            .ok_or_else(|| FnsError::InvalidPath {
                reason: format!("expected /<service>/<fn>, got {:?}", request.path),
            })?;

        let content_type = request.header(headers::CONTENT_TYPE);
        if content_type != Some(headers::CONTENT_TYPE_VALUE) {
            return Err(FnsError::InvalidBody {
                reason: format!("unexpected content-type: {content_type:?}"),
            });
        }

        let signature = request
            .header(headers::SIGNATURE)
            .ok_or(FnsError::SignatureLost)?;
        if !verify(&self.secret, &request.body, signature) {
            return Err(FnsError::SignatureUnverified);
        }

        let device_id = request
            .header(headers::DEVICE_ID)
            .ok_or(FnsError::DeviceIdRequired)?
            .to_string();

        let body = self.codec.decode_request(&request.body)?;

        let mut options = RequestOptions {
            id: request.header(headers::ENDPOINT_ID).map(str::to_string),
            device_id: Some(device_id),
            device_ip: request.header(headers::DEVICE_IP).map(str::to_string),
            request_id: request.header(headers::REQUEST_ID).map(str::to_string),
            token: request.header(headers::AUTHORIZATION).map(str::to_string),
            ..RequestOptions::default()
        }
        .with_internal_request();

        if let Some(raw) = request.header(headers::REQUEST_VERSIONS) {
            let constraint = raw.parse::<VersionReq>().map_err(|e| {
                FnsError::InvalidRequestVersions {
                    reason: format!("malformed request-versions header: {e}"),
                }
            })?;
            options.versions.insert(service.to_string(), constraint);
        }

        options.passthrough_headers = request
            .headers
            .iter()
            .filter(|(name, _)| headers::is_passthrough(name))
            .cloned()
            .collect();

        let ctx = CallContext {
            context_user_values: body.context_user_values.clone(),
            trace_id: request.header(headers::REQUEST_ID).map(str::to_string),
            ..CallContext::default()
        };

        self.sink
            .handle_internal(ctx, service, fn_name, body.params, options)
            .await
    }
}

#[async_trait]
impl<C: Codec> RequestHandler for InternalHandler<C> {
    async fn handle(&self, request: Entry) -> TransportResponse {
        let trace_id = request.header(headers::REQUEST_ID).map(str::to_string);
        match self.handle_entry(request).await {
            Ok(data) => {
                let mut body = ResponseBody::success(data);
                if let Some(trace_id) = trace_id {
                    body = body.with_span(trace_id);
                }
                encode_response(&self.codec, status::OK, body)
            }
            Err(err) => error_response(&self.codec, err),
        }
    }
}

/// Maps a handler-level `FnsError` to the response envelope the client
/// side understands: validation failures surface as a decoded `CodeError`
/// body under status 555, everything else degrades to a `Warning`-shaped
/// coded error under the same status (spec.md §4.3's own statuses 425,
/// 429, 503, 666 are raised by the *transport* layer that wraps real
/// network failures; a handler that completes its own validation always
/// replies in-band with 555 so the client-side decode path is uniform).
fn error_response<C: Codec>(codec: &C, err: FnsError) -> TransportResponse {
    let payload = serde_json::json!({"code": err.code(), "message": err.to_string()});
    let data = match serde_json::to_vec(&payload) {
        Ok(bytes) => bytes,
        Err(_) => {
            // Encoding failure degrades to a Warning body (spec.md §4.3:
            // "encoding failures degrade to an encoded error body with
            // succeed=false").
            return encode_response(
                codec,
                status::CODE_ERROR,
                ResponseBody::failure(b"encode endpoint response failed".to_vec()),
            );
        }
    };
    encode_response(codec, status::CODE_ERROR, ResponseBody::failure(data))
}

fn encode_response<C: Codec>(codec: &C, status: u16, body: ResponseBody) -> TransportResponse {
    match codec.encode_response(&body) {
        Ok(encoded) => TransportResponse {
            status,
            entry: Entry {
                path: String::new(),
                headers: Vec::new(),
                body: encoded,
            },
        },
        Err(_) => TransportResponse {
            status: fns_core::status::CODE_ERROR,
            entry: Entry {
                path: String::new(),
                headers: Vec::new(),
                body: b"encode endpoint response failed".to_vec(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::signature::sign;
    use fns_core::RequestBody;

    struct EchoSink;

    #[async_trait]
    impl InboundHandler for EchoSink {
        async fn handle_internal(
            &self,
            _ctx: CallContext,
            _service: &str,
            _fn_name: &str,
            param: Vec<u8>,
            _options: RequestOptions,
        ) -> Result<Vec<u8>, FnsError> {
            Ok(param)
        }
    }

    fn signed_entry(secret: &[u8], path: &str, body: &RequestBody) -> Entry {
        let codec = JsonCodec;
        let encoded = codec.encode_request(body).unwrap();
        let mut entry = Entry {
            path: path.to_string(),
            headers: Vec::new(),
            body: encoded.clone(),
        };
        entry.set_header(headers::CONTENT_TYPE, headers::CONTENT_TYPE_VALUE);
        entry.set_header(headers::SIGNATURE, sign(secret, &encoded));
        entry.set_header(headers::DEVICE_ID, "device-1");
        entry
    }

    #[tokio::test]
    async fn valid_request_reaches_the_sink_and_echoes_params() {
        let handler =
            InternalHandler::new(b"secret".to_vec(), JsonCodec, Arc::new(EchoSink));
        let body = RequestBody {
            context_user_values: vec![],
            params: b"hello".to_vec(),
        };
        let response = handler
            .handle(signed_entry(b"secret", "/math/add", &body))
            .await;
        assert_eq!(response.status, status::OK);
        let decoded: ResponseBody = serde_json::from_slice(&response.entry.body).unwrap();
        assert!(decoded.succeed);
        assert_eq!(decoded.data, b"hello");
    }

    #[tokio::test]
    async fn missing_device_id_is_rejected() {
        let handler =
            InternalHandler::new(b"secret".to_vec(), JsonCodec, Arc::new(EchoSink));
        let body = RequestBody::default();
        let codec = JsonCodec;
        let encoded = codec.encode_request(&body).unwrap();
        let mut entry = Entry {
            path: "/math/add".to_string(),
            headers: Vec::new(),
            body: encoded.clone(),
        };
        entry.set_header(headers::CONTENT_TYPE, headers::CONTENT_TYPE_VALUE);
        entry.set_header(headers::SIGNATURE, sign(b"secret", &encoded));

        let response = handler.handle(entry).await;
        assert_eq!(response.status, status::CODE_ERROR);
        let decoded: ResponseBody = serde_json::from_slice(&response.entry.body).unwrap();
        assert!(!decoded.succeed);
        let payload: serde_json::Value = serde_json::from_slice(&decoded.data).unwrap();
        assert_eq!(payload["code"], "fns.device_id_required");
    }

    #[tokio::test]
    async fn tampered_body_is_rejected_before_the_sink_runs() {
        let handler =
            InternalHandler::new(b"secret".to_vec(), JsonCodec, Arc::new(EchoSink));
        let body = RequestBody {
            context_user_values: vec![],
            params: b"hello".to_vec(),
        };
        let mut entry = signed_entry(b"secret", "/math/add", &body);
        entry.body.push(0xff);

        let response = handler.handle(entry).await;
        assert_eq!(response.status, status::CODE_ERROR);
        let decoded: ResponseBody = serde_json::from_slice(&response.entry.body).unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&decoded.data).unwrap();
        assert_eq!(payload["code"], "fns.signature_unverified");
    }

    #[tokio::test]
    async fn malformed_path_is_rejected() {
        let handler =
            InternalHandler::new(b"secret".to_vec(), JsonCodec, Arc::new(EchoSink));
        let mut entry = signed_entry(b"secret", "math-add", &RequestBody::default());
        entry.path = "math-add".to_string();

        let response = handler.handle(entry).await;
        assert_eq!(response.status, status::CODE_ERROR);
        let decoded: ResponseBody = serde_json::from_slice(&response.entry.body).unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&decoded.data).unwrap();
        assert_eq!(payload["code"], "fns.invalid_path");
    }
}
