//! Typed helpers for the service's conventional message shapes.
//!
//! The session treats payloads as opaque JSON. These types cover the shape
//! the service expects so callers don't have to build it by hand:
//!
//! ```json
//! { "meta": { "path": "/search", "method": "GET" }, "body": { "query": "mr" } }
//! ```
//!
//! and the response envelope `{ "status": 0, "body": ... }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request verbs used by the service.
pub mod method {
    pub const GET: &str = "GET";
    pub const POST: &str = "POST";
    pub const DELETE: &str = "DELETE";
}

/// Routing information of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub path: String,
    pub method: String,
}

/// A request in the service's envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub meta: RequestMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Ask the server to keep the connection open after answering.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub connection_alive: bool,
}

impl Request {
    /// Create a request without a body.
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            meta: RequestMeta {
                path: path.into(),
                method: method.into(),
            },
            body: None,
            connection_alive: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(path, method::GET)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(path, method::POST)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(path, method::DELETE)
    }

    /// Attach a body.
    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the keep-alive flag.
    pub fn connection_alive(mut self, alive: bool) -> Self {
        self.connection_alive = alive;
        self
    }
}

/// Status codes carried in the response envelope (serialized as integers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ResponseStatus {
    Ok,
    Processing,
    NotFound,
    BadRequest,
    InternalServerError,
}

impl ResponseStatus {
    /// True for `Ok`.
    pub fn is_success(self) -> bool {
        self == Self::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Processing => "Processing",
            Self::NotFound => "Not Found",
            Self::BadRequest => "Bad Request",
            Self::InternalServerError => "Internal Server Error",
        }
    }
}

impl std::fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ResponseStatus> for u8 {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::Ok => 0,
            ResponseStatus::Processing => 1,
            ResponseStatus::NotFound => 2,
            ResponseStatus::BadRequest => 3,
            ResponseStatus::InternalServerError => 4,
        }
    }
}

impl TryFrom<u8> for ResponseStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Processing),
            2 => Ok(Self::NotFound),
            3 => Ok(Self::BadRequest),
            4 => Ok(Self::InternalServerError),
            other => Err(format!("invalid response status {}", other)),
        }
    }
}

/// A response in the service's envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: ResponseStatus,
    #[serde(default)]
    pub body: Value,
}

impl Response {
    /// Decode the body as `T`.
    pub fn body_as<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = Request::get("/search").body(json!({ "query": "mr" }));

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "meta": { "path": "/search", "method": "GET" },
                "body": { "query": "mr" },
            })
        );
    }

    #[test]
    fn test_request_keep_alive_flag() {
        let request = Request::delete("/file").connection_alive(true);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["connectionAlive"], json!(true));
        assert_eq!(value["meta"]["method"], json!("DELETE"));
        assert!(value.get("body").is_none());
    }

    #[test]
    fn test_request_parses_without_optional_fields() {
        let request: Request =
            serde_json::from_value(json!({ "meta": { "path": "/add", "method": "POST" } }))
                .unwrap();
        assert_eq!(request, Request::post("/add"));
    }

    #[test]
    fn test_response_status_codes() {
        let response: Response =
            serde_json::from_value(json!({ "status": 2, "body": "missing" })).unwrap();
        assert_eq!(response.status, ResponseStatus::NotFound);
        assert_eq!(response.status.to_string(), "Not Found");
        assert!(!response.status.is_success());

        let encoded = serde_json::to_value(Response {
            status: ResponseStatus::InternalServerError,
            body: Value::Null,
        })
        .unwrap();
        assert_eq!(encoded["status"], json!(4));
    }

    #[test]
    fn test_response_rejects_unknown_status() {
        let result = serde_json::from_value::<Response>(json!({ "status": 9, "body": null }));
        assert!(result.is_err());
    }

    #[test]
    fn test_response_body_as() {
        let response: Response =
            serde_json::from_value(json!({ "status": 0, "body": ["a.txt", "b.txt"] })).unwrap();
        let files: Vec<String> = response.body_as().unwrap();
        assert_eq!(files, vec!["a.txt", "b.txt"]);
    }
}
