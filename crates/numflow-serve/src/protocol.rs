//! WebSocket protocol message types
//!
//! Every frame is a JSON text message tagged by `type`.

use numflow::{EvalError, Value};
use serde::{Deserialize, Serialize};

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Compile and run source in the connection's session
    Run { id: u64, source: String },
    /// Evaluate source and bind its value under `name`
    Define { name: String, source: String },
    /// Help text of a registry entry
    Help { name: String },
    /// This worker's position in the worker pool
    Locality,
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Result {
        id: u64,
        value: WireValue,
    },
    Defined {
        name: String,
    },
    Help {
        name: String,
        text: Option<String>,
    },
    Locality {
        worker: usize,
        workers: usize,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        message: String,
        #[serde(default)]
        backtrace: Vec<String>,
    },
}

impl ServerMessage {
    pub fn error(id: Option<u64>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            id,
            message: message.into(),
            backtrace: Vec::new(),
        }
    }

    /// Error response carrying the call stack of a failed evaluation
    pub fn eval_error(id: Option<u64>, err: &EvalError) -> Self {
        ServerMessage::Error {
            id,
            message: err.to_string(),
            backtrace: err.trace.lines(),
        }
    }
}

/// A [`Value`] as it travels over the wire. Functions cannot be sent, only
/// described.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WireValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<f64>),
    Function { name: String, arity: usize },
}

impl From<&Value> for WireValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Nil => WireValue::Nil,
            Value::Bool(b) => WireValue::Bool(*b),
            Value::Int(n) => WireValue::Int(*n),
            Value::Float(x) => WireValue::Float(*x),
            Value::Str(s) => WireValue::Str(s.to_string()),
            Value::Array(items) => WireValue::Array(items.to_vec()),
            Value::Function(f) => WireValue::Function {
                name: f.name().to_string(),
                arity: f.arity(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_tagged() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"run","id":7,"source":"1 + 2"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Run {
                id: 7,
                source: "1 + 2".into()
            }
        );
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"locality"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Locality);
    }

    #[test]
    fn values_serialize_by_kind() {
        let json = serde_json::to_value(ServerMessage::Result {
            id: 1,
            value: WireValue::from(&Value::from(vec![1.0, 2.5])),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "result", "id": 1, "value": {"kind": "array", "value": [1.0, 2.5]}})
        );
        let nil = serde_json::to_value(WireValue::Nil).unwrap();
        assert_eq!(nil, serde_json::json!({"kind": "nil"}));
    }

    #[test]
    fn errors_without_id_omit_it() {
        let json = serde_json::to_string(&ServerMessage::error(None, "bad frame")).unwrap();
        assert_eq!(json, r#"{"type":"error","message":"bad frame","backtrace":[]}"#);
    }
}
