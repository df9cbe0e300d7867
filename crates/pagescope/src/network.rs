//! Network call records pushed by the network interceptor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One completed request observed in the document
///
/// Built from the interceptor's `{status, responseURL, response}` payload.
/// Fields that are missing or of the wrong type are simply absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkCallRecord {
    /// HTTP status code
    pub status: Option<i64>,
    /// Final URL of the response
    pub response_url: Option<String>,
    /// Raw response body
    pub response: Option<Value>,
}

impl NetworkCallRecord {
    /// Build a record from a raw payload
    ///
    /// Returns `None` only when the payload is not an object at all.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let object = payload.as_object()?;
        let status = object.get("status").and_then(|v| {
            v.as_i64().or_else(|| {
                v.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
                    .map(|f| {
                        #[allow(clippy::cast_possible_truncation)]
                        let code = f as i64;
                        code
                    })
            })
        });
        let response_url = object
            .get("responseURL")
            .and_then(Value::as_str)
            .map(str::to_string);
        let response = object.get("response").filter(|v| !v.is_null()).cloned();
        Some(Self {
            status,
            response_url,
            response,
        })
    }

    fn response_text(&self) -> String {
        match &self.response {
            None => String::from("-"),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

impl fmt::Display for NetworkCallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self
            .status
            .map_or_else(|| String::from("-"), |s| s.to_string());
        writeln!(f, "Status      : {status}")?;
        writeln!(
            f,
            "responseURL : {}",
            self.response_url.as_deref().unwrap_or("-")
        )?;
        write!(f, "response    : {}", self.response_text())
    }
}
