use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RegistryError;

/// Request line could not be parsed as a request object
pub const PARSE_ERROR: &str = "parse_error";
/// No handler exists for the requested method
pub const UNKNOWN_METHOD: &str = "unknown_method";

/// Correlates a response with its request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    // Failure first: a missing `data` would otherwise decode as null
    Failure { kind: String, message: String },
    Success { data: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Option<RequestId>,
    pub success: bool,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    #[inline]
    pub fn success(id: Option<RequestId>, data: Value) -> Self {
        Self {
            id,
            success: true,
            body: ResponseBody::Success { data },
        }
    }

    #[inline]
    pub fn failure(id: Option<RequestId>, kind: &str, message: String) -> Self {
        Self {
            id,
            success: false,
            body: ResponseBody::Failure {
                kind: kind.to_string(),
                message,
            },
        }
    }

    #[inline]
    pub fn from_error(id: Option<RequestId>, error: &RegistryError) -> Self {
        Self::failure(id, error.kind(), error.to_string())
    }

    /// Wire kind of a failed response
    #[inline]
    pub fn kind(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Success { .. } => None,
            ResponseBody::Failure { kind, .. } => Some(kind),
        }
    }

    #[inline]
    pub fn data(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Success { data } => Some(data),
            ResponseBody::Failure { .. } => None,
        }
    }
}
