//! Wire records exchanged with the agent.
//!
//! Every frame holds a single JSON object. Requests carry `id`, `method`, `args`
//! (and optionally `kwargs`), responses carry `id` and either `result` or
//! `error`, notifications are requests without an `id` (a `null` id counts as
//! absent).

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use strum_macros::{Display, EnumString, IntoStaticStr};

pub type RequestId = u64;

/// Method vocabulary understood by qdb agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum Method {
    // ------------------------------------ frontend -> agent ---------------------------------------
    #[strum(serialize = "do_set_breakpoint")]
    SetBreakpoint,
    #[strum(serialize = "do_clear_breakpoint")]
    ClearBreakpoint,
    #[strum(serialize = "do_clear_file_breakpoints")]
    ClearFileBreakpoints,
    #[strum(serialize = "do_step")]
    Step,
    #[strum(serialize = "do_next")]
    Next,
    #[strum(serialize = "do_return")]
    StepReturn,
    #[strum(serialize = "do_continue")]
    Continue,
    #[strum(serialize = "do_jump")]
    Jump,
    #[strum(serialize = "interrupt")]
    Interrupt,
    #[strum(serialize = "do_quit")]
    Quit,
    #[strum(serialize = "set_params")]
    SetParams,
    #[strum(serialize = "do_exec")]
    Exec,
    #[strum(serialize = "do_eval")]
    Eval,
    #[strum(serialize = "do_where")]
    Where,
    #[strum(serialize = "do_environment")]
    Environment,
    #[strum(serialize = "run")]
    Run,

    // ------------------------------------ agent -> frontend ---------------------------------------
    #[strum(serialize = "startup")]
    Startup,
    #[strum(serialize = "interaction")]
    Interaction,
    #[strum(serialize = "write")]
    Write,
    #[strum(serialize = "exception")]
    Exception,
    #[strum(serialize = "readline")]
    Readline,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// True for commands that let the agent leave the current interaction.
    pub fn resumes_execution(self) -> bool {
        matches!(
            self,
            Method::Step | Method::Next | Method::StepReturn | Method::Continue | Method::Jump
        )
    }
}

/// Error reported by the agent in place of a result.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Agents send either a bare string or an object with `message` and `code`.
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(message) => RemoteError::new(message),
            Value::Object(mut obj) => {
                let code = obj.get("code").and_then(Value::as_i64);
                let message = match obj.remove("message") {
                    Some(Value::String(message)) => message,
                    Some(other) => other.to_string(),
                    None => Value::Object(obj).to_string(),
                };
                RemoteError { code, message }
            }
            other => RemoteError::new(other.to_string()),
        }
    }
}

/// Frame payload that could not be turned into a [`Record`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub struct DecodeError {
    /// Id of the request a broken response answers, if it could be recovered.
    pub id: Option<RequestId>,
    /// Id of a broken request sent by the peer, it still expects an answer.
    pub request_id: Option<RequestId>,
    pub reason: String,
}

impl DecodeError {
    fn new(id: Option<RequestId>, reason: impl Into<String>) -> Self {
        Self {
            id,
            request_id: None,
            reason: reason.into(),
        }
    }

    fn request(request_id: Option<RequestId>, reason: impl Into<String>) -> Self {
        Self {
            id: None,
            request_id,
            reason: reason.into(),
        }
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.id, self.request_id) {
            (Some(id), _) => write!(f, "malformed response (id {id}): {}", self.reason),
            (None, Some(id)) => write!(f, "malformed request (id {id}): {}", self.reason),
            (None, None) => write!(f, "malformed record: {}", self.reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Request {
        id: RequestId,
        method: String,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
    Notification {
        method: String,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    },
    Response {
        id: RequestId,
        outcome: Result<Value, RemoteError>,
    },
}

fn kwargs_of(kwargs: &Map<String, Value>) -> Option<&Map<String, Value>> {
    (!kwargs.is_empty()).then_some(kwargs)
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kwargs: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a RemoteError>,
}

impl Record {
    pub fn request(id: RequestId, method: Method, args: Vec<Value>) -> Self {
        Record::Request {
            id,
            method: method.to_string(),
            args,
            kwargs: Map::new(),
        }
    }

    pub fn notification(method: Method, args: Vec<Value>) -> Self {
        Record::Notification {
            method: method.to_string(),
            args,
            kwargs: Map::new(),
        }
    }

    pub fn response(id: RequestId, result: Value) -> Self {
        Record::Response {
            id,
            outcome: Ok(result),
        }
    }

    pub fn error_response(id: RequestId, error: RemoteError) -> Self {
        Record::Response {
            id,
            outcome: Err(error),
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let envelope = match self {
            Record::Request {
                id,
                method,
                args,
                kwargs,
            } => Envelope {
                id: Some(*id),
                method: Some(method),
                args: Some(args),
                kwargs: kwargs_of(kwargs),
                result: None,
                error: None,
            },
            Record::Notification {
                method,
                args,
                kwargs,
            } => Envelope {
                id: None,
                method: Some(method),
                args: Some(args),
                kwargs: kwargs_of(kwargs),
                result: None,
                error: None,
            },
            Record::Response { id, outcome } => Envelope {
                id: Some(*id),
                method: None,
                args: None,
                kwargs: None,
                result: outcome.as_ref().ok(),
                error: outcome.as_ref().err(),
            },
        };
        serde_json::to_vec(&envelope)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_slice(buf).map_err(|e| DecodeError::new(None, e.to_string()))?;
        let Value::Object(mut obj) = value else {
            return Err(DecodeError::new(None, "record is not an object"));
        };

        let id = match obj.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(
                n.as_u64()
                    .ok_or_else(|| DecodeError::new(None, format!("invalid id {n}")))?,
            ),
            Some(other) => return Err(DecodeError::new(None, format!("invalid id {other}"))),
        };

        match obj.remove("method") {
            Some(Value::String(method)) => {
                let args = match obj.remove("args") {
                    None | Some(Value::Null) => vec![],
                    Some(Value::Array(args)) => args,
                    Some(_) => return Err(DecodeError::request(id, "`args` is not a list")),
                };
                let kwargs = match obj.remove("kwargs") {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(kwargs)) => kwargs,
                    Some(_) => return Err(DecodeError::request(id, "`kwargs` is not a mapping")),
                };

                Ok(match id {
                    Some(id) => Record::Request {
                        id,
                        method,
                        args,
                        kwargs,
                    },
                    None => Record::Notification {
                        method,
                        args,
                        kwargs,
                    },
                })
            }
            Some(_) => Err(DecodeError::request(id, "`method` is not a string")),
            None => {
                let id = id.ok_or_else(|| DecodeError::new(None, "response without id"))?;
                match (obj.remove("result"), obj.remove("error")) {
                    (_, Some(error)) if !error.is_null() => Ok(Record::Response {
                        id,
                        outcome: Err(RemoteError::from_value(error)),
                    }),
                    (Some(result), _) => Ok(Record::response(id, result)),
                    (None, _) => Err(DecodeError::new(
                        Some(id),
                        "response carries neither result nor error",
                    )),
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_method_wire_names() {
        assert_eq!(Method::SetBreakpoint.as_str(), "do_set_breakpoint");
        assert_eq!(Method::StepReturn.as_str(), "do_return");
        assert_eq!(Method::from_str("interaction").unwrap(), Method::Interaction);
        assert!(Method::from_str("do_something_else").is_err());
        assert!(Method::Jump.resumes_execution());
        assert!(!Method::SetBreakpoint.resumes_execution());
    }

    #[test]
    fn test_request_shape() {
        let rec = Record::request(7, Method::Jump, vec![json!(12)]);
        let value: Value = serde_json::from_slice(&rec.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"id": 7, "method": "do_jump", "args": [12]}));
    }

    #[test]
    fn test_notification_has_null_id() {
        let rec = Record::notification(Method::Interrupt, vec![]);
        let value: Value = serde_json::from_slice(&rec.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"id": null, "method": "interrupt", "args": []}));
    }

    #[test]
    fn test_decode_agent_notification() {
        let frame = br#"{"id": null, "method": "interaction",
            "args": ["/tmp/a.py", 10, "x = 1\n"], "kwargs": {"call_stack": []}}"#;
        let Record::Notification {
            method,
            args,
            kwargs,
        } = Record::decode(frame).unwrap()
        else {
            panic!("notification expected");
        };
        assert_eq!(method, "interaction");
        assert_eq!(args, vec![json!("/tmp/a.py"), json!(10), json!("x = 1\n")]);
        assert_eq!(kwargs.get("call_stack"), Some(&json!([])));
    }

    #[test]
    fn test_decode_responses() {
        assert_eq!(
            Record::decode(br#"{"id": 3, "result": null, "error": null}"#).unwrap(),
            Record::response(3, Value::Null)
        );

        let rec = Record::decode(br#"{"id": 4, "error": {"code": 2, "message": "boom"}}"#);
        assert_eq!(
            rec.unwrap(),
            Record::error_response(
                4,
                RemoteError {
                    code: Some(2),
                    message: "boom".to_string()
                }
            )
        );

        let rec = Record::decode(br#"{"id": 5, "error": "bad line"}"#).unwrap();
        assert_eq!(rec, Record::error_response(5, RemoteError::new("bad line")));
    }

    #[test]
    fn test_decode_errors_keep_id_when_possible() {
        let err = Record::decode(br#"{"id": 9, "unexpected": true}"#).unwrap_err();
        assert_eq!(err.id, Some(9));

        // a broken request keeps its id apart, it must not fail our own request
        let err = Record::decode(br#"{"id": 10, "method": "write", "args": 5}"#).unwrap_err();
        assert_eq!(err.id, None);
        assert_eq!(err.request_id, Some(10));

        let err = Record::decode(br#"{"method": 5}"#).unwrap_err();
        assert_eq!((err.id, err.request_id), (None, None));

        let err = Record::decode(b"{\"id\": 11, \"resu").unwrap_err();
        assert_eq!(err.id, None);

        let err = Record::decode(b"[1, 2]").unwrap_err();
        assert_eq!(err.id, None);
    }
}
