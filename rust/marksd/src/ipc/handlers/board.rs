use crate::board::{compute_board_exam, BoardExamError};
use crate::builder::{resolve_context, validate_marks};
use crate::db;
use crate::ipc::helpers::{
    caller_role, forbidden, optional_str, required_i64, respond, session, to_value, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::policy::{is_terminal_grade, BOARD_EXAM_TERM};
use crate::subjects::SubjectMarks;
use serde_json::json;

fn parse_marks(req: &Request) -> Result<SubjectMarks, HandlerErr> {
    let Some(raw) = req.params.get("marks") else {
        return Err(HandlerErr::bad_params("missing params.marks"));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid params.marks: {e}")))
}

/// Board grade, context and marks, range-checked before any summing.
fn checked_submission(req: &Request) -> Result<(i64, SubjectMarks), HandlerErr> {
    let grade = required_i64(req, "grade")?;
    if !is_terminal_grade(grade) {
        return Err(BoardExamError::NotTerminalGrade(grade).into());
    }
    let stream = optional_str(req, "stream")?;
    let subgroup = optional_str(req, "subgroup")?;
    let marks = parse_marks(req)?;

    let ctx = resolve_context(grade, BOARD_EXAM_TERM, &stream, &subgroup)?;
    validate_marks(&ctx, &marks)?;
    Ok((ctx.grade, marks))
}

fn handle_board_compute(_state: &mut AppState, req: &Request) -> HandlerResult {
    let (grade, marks) = checked_submission(req)?;
    let result = compute_board_exam(grade, &marks)?;
    to_value(&result)
}

fn handle_board_submit(state: &mut AppState, req: &Request) -> HandlerResult {
    let (conn, caller) = session(state)?;
    let role = caller_role(conn, caller)?;
    if !role.can_write_own() {
        return Err(forbidden(role, "submitting board results"));
    }
    let (grade, marks) = checked_submission(req)?;
    let result = compute_board_exam(grade, &marks)?;
    db::board_result_put(conn, caller, &result)
        .map_err(|e| HandlerErr::from_anyhow("db_insert_failed", e))?;
    tracing::info!(
        owner = %caller,
        grade,
        total = result.board_exam_total,
        max = result.max_marks,
        "board result stored"
    );
    to_value(&result)
}

fn handle_board_get(state: &mut AppState, _req: &Request) -> HandlerResult {
    let (conn, caller) = session(state)?;
    let result = db::board_result_get(conn, caller)
        .map_err(|e| HandlerErr::from_anyhow("db_query_failed", e))?;
    Ok(json!({ "result": to_value(&result)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "boardExam.compute" => handle_board_compute(state, req),
        "boardExam.submit" => handle_board_submit(state, req),
        "boardExam.get" => handle_board_get(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
