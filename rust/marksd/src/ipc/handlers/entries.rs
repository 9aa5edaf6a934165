use crate::builder::{build_entry, EntryRequest};
use crate::calc::{combined_by_grade, filter_entries, EntryFilter};
use crate::db;
use crate::entry::AcademicEntry;
use crate::ipc::helpers::{
    caller_role, forbidden, required_i64, respond, session, to_value, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use serde_json::json;

fn parse_entry_request(req: &Request) -> Result<EntryRequest, HandlerErr> {
    serde_json::from_value(req.params.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid entry params: {e}")))
}

fn owner_entries(state: &AppState) -> Result<Vec<AcademicEntry>, HandlerErr> {
    let (conn, caller) = session(state)?;
    db::entries_for_owner(conn, caller).map_err(|e| HandlerErr::from_anyhow("db_query_failed", e))
}

fn entries_value(entries: Vec<&AcademicEntry>) -> HandlerResult {
    Ok(json!({ "entries": to_value(&entries)? }))
}

fn handle_entries_build(_state: &mut AppState, req: &Request) -> HandlerResult {
    let request = parse_entry_request(req)?;
    let entry = build_entry(&request, Utc::now())?;
    Ok(json!({ "entry": to_value(&entry)? }))
}

fn handle_entries_add(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, caller) = session(state)?;
    let role = caller_role(conn, caller)?;
    if !role.can_write_own() {
        return Err(forbidden(role, "recording marks"));
    }
    let request = parse_entry_request(req)?;
    let entry = build_entry(&request, Utc::now())?;
    let stored = db::entry_append(conn, caller, &entry)
        .map_err(|e| HandlerErr::from_anyhow("db_insert_failed", e))?;
    tracing::info!(
        owner = %caller,
        entry_id = %stored.id,
        grade = stored.grade,
        term = stored.term,
        "entry recorded"
    );
    Ok(json!({ "entry": to_value(&stored)? }))
}

fn handle_entries_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let entries = owner_entries(state)?;
    entries_value(entries.iter().collect())
}

fn handle_entries_list_by_grade(state: &mut AppState, req: &Request) -> HandlerResult {
    let grade = required_i64(req, "grade")?;
    let entries = owner_entries(state)?;
    let filter = EntryFilter {
        grade: Some(grade),
        ..Default::default()
    };
    entries_value(filter_entries(&entries, &filter))
}

fn handle_entries_list_by_grade_and_term(state: &mut AppState, req: &Request) -> HandlerResult {
    let grade = required_i64(req, "grade")?;
    let term = required_i64(req, "term")?;
    let entries = owner_entries(state)?;
    let filter = EntryFilter {
        grade: Some(grade),
        term: Some(term),
        section: None,
    };
    entries_value(filter_entries(&entries, &filter))
}

fn handle_entries_combined_by_grade(state: &mut AppState, req: &Request) -> HandlerResult {
    let grade = required_i64(req, "grade")?;
    let entries = owner_entries(state)?;
    to_value(&combined_by_grade(&entries, grade))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "entries.build" => handle_entries_build(state, req),
        "entries.add" => handle_entries_add(state, req),
        "entries.list" => handle_entries_list(state, req),
        "entries.listByGrade" => handle_entries_list_by_grade(state, req),
        "entries.listByGradeAndTerm" => handle_entries_list_by_grade_and_term(state, req),
        "entries.combinedByGrade" => handle_entries_combined_by_grade(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
