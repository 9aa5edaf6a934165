use crate::board::BoardExamError;
use crate::builder::ValidationError;
use crate::calc::CalcError;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roles::Role;
use rusqlite::Connection;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    /// Storage and IO failures keep the full anyhow context chain.
    pub fn from_anyhow(code: &'static str, e: anyhow::Error) -> Self {
        Self::new(code, format!("{e:#}"))
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ValidationError> for HandlerErr {
    fn from(e: ValidationError) -> Self {
        Self {
            code: "validation_failed",
            message: e.to_string(),
            details: e.details(),
        }
    }
}

impl From<BoardExamError> for HandlerErr {
    fn from(e: BoardExamError) -> Self {
        let details = match &e {
            BoardExamError::NotTerminalGrade(g) => Some(json!({ "grade": g })),
        };
        Self {
            code: "validation_failed",
            message: e.to_string(),
            details,
        }
    }
}

impl From<CalcError> for HandlerErr {
    fn from(e: CalcError) -> Self {
        Self {
            code: "bad_params",
            message: e.message,
            details: e.details,
        }
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerErr>;

pub fn respond(req: &Request, result: HandlerResult) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::debug!(method = %req.method, code = e.code, message = %e.message, "request failed");
            e.response(&req.id)
        }
    }
}

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{key}")))
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing or non-integer params.{key}")))
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing or non-numeric params.{key}")))
}

/// Missing and `null` are both `None`; any other non-string is rejected.
pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, HandlerErr> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("params.{key} must be a string"))),
    }
}

pub fn optional_bool(req: &Request, key: &str) -> Result<bool, HandlerErr> {
    match req.params.get(key) {
        None => Ok(false),
        Some(v) if v.is_null() => Ok(false),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerErr::bad_params(format!("params.{key} must be a boolean"))),
    }
}

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

/// Open workspace plus the bound caller identity.
pub fn session(state: &AppState) -> Result<(&Connection, &str), HandlerErr> {
    let conn = db_conn(state)?;
    let caller = state
        .caller
        .as_deref()
        .ok_or_else(|| HandlerErr::new("no_caller", "set the session caller first"))?;
    Ok((conn, caller))
}

pub fn caller_role(conn: &Connection, caller: &str) -> Result<Role, HandlerErr> {
    db::role_get(conn, caller).map_err(|e| HandlerErr::from_anyhow("db_query_failed", e))
}

pub fn forbidden(role: Role, action: &str) -> HandlerErr {
    HandlerErr {
        code: "forbidden",
        message: format!("{action} is not permitted for role {}", role.as_str()),
        details: Some(json!({ "role": role.as_str() })),
    }
}

pub fn to_value<T: serde::Serialize>(v: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(v).map_err(|e| HandlerErr::new("internal", e.to_string()))
}
