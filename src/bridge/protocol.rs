use crate::error::{Error, WidgetResult};
use crate::service::WidgetEvent;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One request line from the UI
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Reply to a request, matched by `id`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub id: Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(id: Value, data: Value) -> Self {
        Self {
            id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(id: Value, error: &Error) -> Self {
        Self::failure_message(id, error.to_string())
    }

    pub fn failure_message(id: Value, message: String) -> Self {
        Self {
            id,
            ok: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Anything written to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Response(Response),
    Event(WidgetEvent),
}

/// Parse one line; a malformed line still gets a reply with whatever id it had
pub fn parse_request(line: &str) -> Result<Request, Response> {
    serde_json::from_str::<Request>(line).map_err(|e| {
        let id = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|v| v.get("id").cloned())
            .unwrap_or(Value::Null);
        Response::failure_message(id, format!("Invalid request: {}", e))
    })
}

/// Decode params; a missing value reads as an empty object
pub fn params<T: DeserializeOwned>(params: Value) -> WidgetResult<T> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| Error::Serialization(format!("Invalid params: {}", e)))
}

pub fn encode(message: &Outgoing) -> WidgetResult<String> {
    Ok(serde_json::to_string(message)?)
}
