use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{
    DEFAULT_FAILURE_MESSAGE, DEFAULT_FORBIDDEN_MESSAGE, DEFAULT_SERVER_FAULT_MESSAGE,
    DEFAULT_UNAUTHENTICATED_MESSAGE,
};

pub const CODE_SUCCESS: i64 = 200;
pub const CODE_UNAUTHORIZED: i64 = 401;
pub const CODE_FORBIDDEN: i64 = 403;
pub const CODE_SERVER_ERROR: i64 = 500;

/// Uniform `{ code, message, data }` wrapper used by every API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: Some("ok".to_string()),
            data: Some(data),
        }
    }

    pub fn failure(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data: None,
        }
    }
}

/// Classified result of a single HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Unauthenticated(String),
    Forbidden(String),
    ServerFault(String),
    Failed { code: Option<i64>, message: String },
}

/// Reads `{ code, message }` out of a body if it has the envelope shape.
fn envelope_parts(body: Option<&Value>) -> Option<(i64, Option<String>)> {
    let obj = body?.as_object()?;
    let code = obj.get("code")?.as_i64()?;
    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    Some((code, message))
}

fn body_message(body: Option<&Value>) -> Option<String> {
    body?
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Classify a response by transport status first, then by envelope code.
///
/// A 2xx body without an envelope is passed through unchanged.
pub fn classify(status: StatusCode, body: Option<Value>) -> Outcome {
    let envelope = envelope_parts(body.as_ref());

    if status.is_success() {
        let Some((code, message)) = envelope else {
            return Outcome::Success(body.unwrap_or(Value::Null));
        };

        return match code {
            CODE_SUCCESS => {
                let data = body
                    .and_then(|mut b| b.as_object_mut().and_then(|o| o.remove("data")))
                    .unwrap_or(Value::Null);
                Outcome::Success(data)
            }
            CODE_UNAUTHORIZED => Outcome::Unauthenticated(
                message.unwrap_or_else(|| DEFAULT_UNAUTHENTICATED_MESSAGE.to_string()),
            ),
            CODE_FORBIDDEN => {
                Outcome::Forbidden(message.unwrap_or_else(|| DEFAULT_FORBIDDEN_MESSAGE.to_string()))
            }
            CODE_SERVER_ERROR => Outcome::ServerFault(
                message.unwrap_or_else(|| DEFAULT_SERVER_FAULT_MESSAGE.to_string()),
            ),
            other => Outcome::Failed {
                code: Some(other),
                message: message.unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            },
        };
    }

    let message = body_message(body.as_ref());
    let envelope_code = envelope.map(|(code, _)| code);

    if status == StatusCode::UNAUTHORIZED || envelope_code == Some(CODE_UNAUTHORIZED) {
        return Outcome::Unauthenticated(
            message.unwrap_or_else(|| DEFAULT_UNAUTHENTICATED_MESSAGE.to_string()),
        );
    }

    match status {
        StatusCode::FORBIDDEN => {
            Outcome::Forbidden(message.unwrap_or_else(|| DEFAULT_FORBIDDEN_MESSAGE.to_string()))
        }
        StatusCode::INTERNAL_SERVER_ERROR => {
            Outcome::ServerFault(message.unwrap_or_else(|| DEFAULT_SERVER_FAULT_MESSAGE.to_string()))
        }
        _ => Outcome::Failed {
            code: Some(envelope_code.unwrap_or(i64::from(status.as_u16()))),
            message: message
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
        },
    }
}
