use crate::db;
use crate::ipc::helpers::{caller_role, required_str, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, _req: &Request) -> HandlerResult {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "caller": state.caller,
    }))
}

/// Opens (creating if needed) the workspace database and makes it current.
pub fn select_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    tracing::info!(workspace = %path.to_string_lossy(), "workspace selected");
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> HandlerResult {
    let path = PathBuf::from(required_str(req, "path")?);
    select_workspace(state, &path).map_err(|e| HandlerErr::from_anyhow("db_open_failed", e))?;
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

fn handle_session_set_caller(state: &mut AppState, req: &Request) -> HandlerResult {
    let identity = required_str(req, "identity")?;
    let role = match state.db.as_ref() {
        Some(conn) => Some(caller_role(conn, &identity)?),
        None => None,
    };
    tracing::info!(caller = %identity, "session caller set");
    state.caller = Some(identity.clone());
    Ok(json!({
        "identity": identity,
        "role": role.map(|r| r.as_str()),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        "session.setCaller" => handle_session_set_caller(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
