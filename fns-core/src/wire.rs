//! The remote call wire envelope (spec.md §3, §4.3).

use serde::{Deserialize, Serialize};

/// Reserved attachment key used to propagate a trace span alongside a
/// response.
pub const SPAN_ATTACHMENT_KEY: &str = "span";

/// `RequestBody = {contextUserValues: [(key, value)], params}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RequestBody {
    pub context_user_values: Vec<(String, String)>,
    /// Already-encoded payload; the concrete codec is an external
    /// collaborator, so this stays opaque bytes here.
    pub params: Vec<u8>,
}

/// `ResponseBody = {succeed, data, attachments: [(key, value)]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseBody {
    pub succeed: bool,
    /// Encoded return value on success, encoded error on failure.
    pub data: Vec<u8>,
    pub attachments: Vec<(String, String)>,
}

impl ResponseBody {
    pub fn success(data: Vec<u8>) -> Self {
        Self {
            succeed: true,
            data,
            attachments: Vec::new(),
        }
    }

    pub fn failure(data: Vec<u8>) -> Self {
        Self {
            succeed: false,
            data,
            attachments: Vec::new(),
        }
    }

    pub fn with_span(mut self, span_id: impl Into<String>) -> Self {
        self.attachments
            .push((SPAN_ATTACHMENT_KEY.to_string(), span_id.into()));
        self
    }

    pub fn span(&self) -> Option<&str> {
        self.attachments
            .iter()
            .find(|(k, _)| k == SPAN_ATTACHMENT_KEY)
            .map(|(_, v)| v.as_str())
    }
}

/// The HTTP-like transport's minimal request/response pair, independent of
/// any concrete transport library. A dialer hands one of these to its
/// handler and gets one back; headers are an ordered association list so
/// case-sensitivity and duplicate handling stay with the caller. `path` is
/// always `/<service>/<fn>` (spec.md §4.3); the method is implicitly POST
/// so it isn't modeled as a field.
#[derive(Clone, Debug, Default)]
pub struct Entry {
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Entry {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Splits `/<service>/<fn>` into its two segments. `None` for any path
    /// that doesn't have exactly that shape (spec.md §4.3 server-side
    /// `ErrInvalidPath`).
    pub fn service_and_fn(&self) -> Option<(&str, &str)> {
        let trimmed = self.path.strip_prefix('/')?;
        let mut parts = trimmed.splitn(2, '/');
        let service = parts.next()?;
        let fn_name = parts.next()?;
        if service.is_empty() || fn_name.is_empty() || fn_name.contains('/') {
            return None;
        }
        Some((service, fn_name))
    }
}
