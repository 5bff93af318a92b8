//! The host's ajax response envelope: `{ "success": bool, "data": ... }`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AjaxEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
}

impl AjaxEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
        }
    }

    /// Failure carrying `{ "message": ... }`.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: json!({ "message": message.into() }),
        }
    }

    /// Serialize a handler result into an envelope.
    pub fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result.and_then(|data| Ok(serde_json::to_value(data)?)) {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e.to_string()),
        }
    }

    /// Failure message, if any.
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    /// Unwrap the payload of a successful envelope.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        if !self.success {
            let message = self.message().unwrap_or("request failed").to_string();
            return Err(Error::transport(message));
        }
        serde_json::from_value(self.data)
            .map_err(|e| Error::protocol(format!("unexpected payload: {}", e)))
    }
}
