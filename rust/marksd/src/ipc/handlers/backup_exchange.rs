use crate::backup;
use crate::db;
use crate::exchange::{self, ExportData, ExportType};
use crate::ipc::helpers::{
    caller_role, forbidden, optional_str, required_str, respond, session, to_value, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_exchange_export(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, caller) = session(state)?;
    let export_type = match optional_str(req, "exportType")? {
        None => ExportType::FullExport,
        Some(raw) => ExportType::parse(raw.trim())
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown exportType: {raw}")))?,
    };
    let role = caller_role(conn, caller)?;

    // Only admins see other owners' data.
    let data = if role.can_import() {
        exchange::build_export(conn, export_type)
    } else {
        exchange::build_owner_export(conn, caller)
    }
    .map_err(|e| HandlerErr::from_anyhow("db_query_failed", e))?;

    let owners = data.academic_entries.academic_entries.len();
    match optional_str(req, "outPath")? {
        Some(out) if !out.trim().is_empty() => {
            let path = PathBuf::from(out.trim());
            exchange::write_export_file(&path, &data).map_err(|e| HandlerErr {
                code: "io_failed",
                message: format!("{e:#}"),
                details: Some(json!({ "path": path.to_string_lossy() })),
            })?;
            Ok(json!({
                "exportType": export_type.as_str(),
                "path": path.to_string_lossy(),
                "owners": owners,
            }))
        }
        _ => Ok(json!({
            "exportType": export_type.as_str(),
            "owners": owners,
            "data": to_value(&data)?,
        })),
    }
}

fn handle_exchange_import(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, caller) = session(state)?;
    let role = caller_role(conn, caller)?;
    if !role.can_import() {
        return Err(forbidden(role, "importing data"));
    }

    let data: ExportData = match (req.params.get("data"), optional_str(req, "inPath")?) {
        (Some(raw), _) if !raw.is_null() => serde_json::from_value(raw.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid params.data: {e}")))?,
        (_, Some(in_path)) => {
            let path = PathBuf::from(in_path.trim());
            if !path.is_file() {
                return Err(HandlerErr {
                    code: "not_found",
                    message: "export file not found".to_string(),
                    details: Some(json!({ "path": path.to_string_lossy() })),
                });
            }
            exchange::read_export_file(&path).map_err(|e| HandlerErr::from_anyhow("bad_params", e))?
        }
        _ => return Err(HandlerErr::bad_params("params.data or params.inPath is required")),
    };

    let summary = exchange::apply_import(conn, &data)
        .map_err(|e| HandlerErr::from_anyhow("db_insert_failed", e))?;
    to_value(&summary)
}

fn workspace_param(state: &AppState, req: &Request) -> Result<PathBuf, HandlerErr> {
    optional_str(req, "workspacePath")?
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

/// A bundle carries every owner's data and the roles table, so an open
/// workspace requires an admin caller. Before any workspace is open there
/// is no role data to check against.
fn require_admin_for_bundle(state: &AppState, action: &str) -> Result<(), HandlerErr> {
    if state.db.is_none() {
        return Ok(());
    }
    let (conn, caller) = session(state)?;
    let role = caller_role(conn, caller)?;
    if !role.can_import() {
        return Err(forbidden(role, action));
    }
    Ok(())
}

fn handle_backup_export_workspace_bundle(state: &mut AppState, req: &Request) -> HandlerResult {
    require_admin_for_bundle(state, "exporting a workspace bundle")?;
    let out_path = required_str(req, "outPath")?;
    let workspace_path = workspace_param(state, req)?;

    if let Some(conn) = state.db.as_ref() {
        let _ = conn.execute_batch("PRAGMA wal_checkpoint(FULL)");
    }

    let out = PathBuf::from(&out_path);
    let export = backup::export_workspace_bundle(&workspace_path, &out).map_err(|e| HandlerErr {
        code: "io_failed",
        message: format!("{e:#}"),
        details: Some(json!({ "path": out_path })),
    })?;

    Ok(json!({
        "path": out_path,
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
        "dbSha256": export.db_sha256,
    }))
}

fn handle_backup_import_workspace_bundle(state: &mut AppState, req: &Request) -> HandlerResult {
    require_admin_for_bundle(state, "restoring a workspace bundle")?;
    let in_path = required_str(req, "inPath")?;
    let workspace_path = workspace_param(state, req)?;

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(HandlerErr {
            code: "not_found",
            message: "bundle file not found".to_string(),
            details: Some(json!({ "path": in_path })),
        });
    }

    // Drop open handle before replacing file.
    state.db = None;
    let imported = backup::import_workspace_bundle(&src, &workspace_path);

    // Reopen whatever is on disk now, restored or not.
    let conn = db::open_db(&workspace_path).map_err(|e| HandlerErr::from_anyhow("db_open_failed", e))?;
    state.workspace = Some(workspace_path.clone());
    state.db = Some(conn);

    let import = imported.map_err(|e| HandlerErr {
        code: "io_failed",
        message: format!("{e:#}"),
        details: Some(json!({ "path": src.to_string_lossy() })),
    })?;
    Ok(json!({
        "workspacePath": workspace_path.to_string_lossy(),
        "bundleFormatDetected": import.bundle_format_detected,
        "checksumVerified": import.checksum_verified,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "exchange.export" => handle_exchange_export(state, req),
        "exchange.import" => handle_exchange_import(state, req),
        "backup.exportWorkspaceBundle" => handle_backup_export_workspace_bundle(state, req),
        "backup.importWorkspaceBundle" => handle_backup_import_workspace_bundle(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
