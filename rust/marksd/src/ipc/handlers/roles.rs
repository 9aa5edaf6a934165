use crate::db;
use crate::ipc::helpers::{
    caller_role, forbidden, optional_str, required_str, respond, session, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::roles::{can_assign, Role};
use serde_json::json;

fn handle_roles_assign(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, caller) = session(state)?;
    let identity = required_str(req, "identity")?;
    let raw_role = required_str(req, "role")?;
    let role = Role::parse(&raw_role)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {raw_role}")))?;

    let admins = db::admin_count(conn).map_err(|e| HandlerErr::from_anyhow("db_query_failed", e))?;
    let current = caller_role(conn, caller)?;
    if !can_assign(current, admins > 0) {
        return Err(forbidden(current, "assigning roles"));
    }
    db::role_assign(conn, &identity, role)
        .map_err(|e| HandlerErr::from_anyhow("db_update_failed", e))?;
    tracing::info!(by = %caller, identity = %identity, role = role.as_str(), "role assigned");
    Ok(json!({ "identity": identity, "role": role.as_str() }))
}

fn handle_roles_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, caller) = session(state)?;
    let identity = optional_str(req, "identity")?.unwrap_or_else(|| caller.to_string());
    let role = caller_role(conn, &identity)?;
    Ok(json!({ "identity": identity, "role": role.as_str() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "roles.assign" => handle_roles_assign(state, req),
        "roles.get" => handle_roles_get(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
