use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Handler-specific key/value fields of a request or response body.
pub type Fields = Map<String, Value>;

/// A decoded request. `requestId` and `requestType` are mandatory strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_id: String,
    pub request_type: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Request {
    pub fn decode(raw: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw)
    }

    /// A string field of the request body, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// A successful response. Serialises `requestId` and `requestType` first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub request_id: String,
    pub request_type: String,
    #[serde(flatten)]
    pub body: Fields,
}

impl Response {
    /// Merge the request's correlation fields into a handler body.
    pub fn for_request(request: &Request, body: Fields) -> Self {
        Self {
            request_id: request.request_id.clone(),
            request_type: request.request_type.clone(),
            body,
        }
    }
}

/// Why a request produced an [`ErrorReply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    DecodeError,
    UnsupportedRequestType,
    InvalidRequest,
}

/// Reply sent in place of a [`Response`] when a request cannot be served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,
    pub error: ErrorKind,
    pub message: String,
}

/// Result of dispatching one payload on a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Response),
    UnsupportedType {
        request_id: String,
        request_type: String,
    },
    InvalidRequest {
        request_id: String,
        request_type: String,
        reason: String,
    },
    /// The payload was not a request. No correlation fields are echoed.
    DecodeError { raw: String },
}

impl Outcome {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Outcome::Success(response) => Some(&response.request_id),
            Outcome::UnsupportedType { request_id, .. }
            | Outcome::InvalidRequest { request_id, .. } => Some(request_id),
            Outcome::DecodeError { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The single reply this outcome is answered with.
    pub fn to_wire(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Outcome::Success(response) => serde_json::to_vec(response),
            Outcome::UnsupportedType {
                request_id,
                request_type,
            } => serde_json::to_vec(&ErrorReply {
                request_id: Some(request_id.clone()),
                request_type: Some(request_type.clone()),
                error: ErrorKind::UnsupportedRequestType,
                message: format!("Unsupported request type: {}", request_type),
            }),
            Outcome::InvalidRequest {
                request_id,
                request_type,
                reason,
            } => serde_json::to_vec(&ErrorReply {
                request_id: Some(request_id.clone()),
                request_type: Some(request_type.clone()),
                error: ErrorKind::InvalidRequest,
                message: reason.clone(),
            }),
            Outcome::DecodeError { .. } => serde_json::to_vec(&ErrorReply {
                request_id: None,
                request_type: None,
                error: ErrorKind::DecodeError,
                message: "Payload is not a request object with requestId and requestType"
                    .to_string(),
            }),
        }
    }
}
