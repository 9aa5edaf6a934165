use crate::curriculum;
use crate::db;
use crate::grading::{badge_tier, letter_grade, nine_scale_grade, BadgeStyle};
use crate::ipc::helpers::{
    db_conn, optional_bool, optional_str, required_f64, required_i64, required_str, respond,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::policy;
use crate::subjects::{Subject, SubjectRole};
use rusqlite::Connection;
use serde_json::json;

const BADGE_STYLE_KEY: &str = "grading.badgeStyle";

fn parse_subject(raw: &str) -> Result<Subject, HandlerErr> {
    Subject::parse(raw).ok_or_else(|| HandlerErr::bad_params(format!("unknown subject: {raw}")))
}

fn handle_policy_max_marks(_state: &mut AppState, req: &Request) -> HandlerResult {
    let grade = required_i64(req, "grade")?;
    let is_board_exam = optional_bool(req, "isBoardExam")?;
    let role = match (optional_str(req, "subject")?, optional_str(req, "role")?) {
        (Some(s), _) => parse_subject(&s)?.role(),
        (None, Some(r)) => SubjectRole::parse(&r)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {r}")))?,
        (None, None) => return Err(HandlerErr::bad_params("params.subject or params.role is required")),
    };
    Ok(json!({
        "maxMarks": policy::max_marks_for(grade, role, is_board_exam),
        "config": policy::max_marks_config(grade, is_board_exam),
    }))
}

fn handle_policy_term_max_marks(_state: &mut AppState, req: &Request) -> HandlerResult {
    let grade = required_i64(req, "grade")?;
    let is_board_exam = optional_bool(req, "isBoardExam")?;
    let Some(raw) = req.params.get("subjects").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("params.subjects must be an array"));
    };
    let mut subjects = Vec::with_capacity(raw.len());
    for v in raw {
        let Some(s) = v.as_str() else {
            return Err(HandlerErr::bad_params("params.subjects must contain strings"));
        };
        subjects.push(parse_subject(s)?);
    }
    Ok(json!({
        "termMaxMarks": policy::term_max_marks(&subjects, grade, is_board_exam),
    }))
}

fn handle_curriculum_subjects(_state: &mut AppState, req: &Request) -> HandlerResult {
    let grade = required_i64(req, "grade")?;
    let stream = optional_str(req, "stream")?;
    let subgroup = optional_str(req, "subgroup")?;
    let subjects = curriculum::valid_subjects(grade, stream.as_deref(), subgroup.as_deref());
    let rows: Vec<serde_json::Value> = subjects
        .iter()
        .map(|s| {
            json!({
                "subject": s.key(),
                "name": s.display_name(),
                "elective": stream
                    .as_deref()
                    .map(|st| curriculum::is_elective(st, *s))
                    .unwrap_or(false),
            })
        })
        .collect();
    let streams: Vec<serde_json::Value> = if grade >= curriculum::SENIOR_GRADE {
        curriculum::STREAMS
            .iter()
            .map(|st| {
                json!({
                    "name": st.name,
                    "subgroups": st.subgroups.iter().map(|g| g.name).collect::<Vec<_>>(),
                })
            })
            .collect()
    } else {
        Vec::new()
    };
    Ok(json!({ "subjects": rows, "streams": streams }))
}

fn load_badge_style(conn: Option<&Connection>) -> Result<BadgeStyle, HandlerErr> {
    let Some(conn) = conn else {
        return Ok(BadgeStyle::default());
    };
    let saved = db::settings_get_json(conn, BADGE_STYLE_KEY)
        .map_err(|e| HandlerErr::from_anyhow("db_query_failed", e))?;
    // Unrecognised stored values fall back to the default style.
    Ok(saved
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(BadgeStyle::parse)
        .unwrap_or_default())
}

fn handle_grading_letter(state: &mut AppState, req: &Request) -> HandlerResult {
    let marks = required_f64(req, "marks")?;
    let max_marks = required_f64(req, "maxMarks")?;
    let style = load_badge_style(state.db.as_ref())?;
    let letter = letter_grade(marks, max_marks);
    Ok(json!({
        "grade": letter,
        "badge": badge_tier(letter, style),
    }))
}

fn handle_grading_nine_scale(_state: &mut AppState, req: &Request) -> HandlerResult {
    let marks = required_f64(req, "marks")?;
    let max_marks = required_f64(req, "maxMarks")?;
    Ok(json!({ "grade": nine_scale_grade(marks, max_marks) }))
}

fn handle_badge_style_get(state: &mut AppState, _req: &Request) -> HandlerResult {
    let style = load_badge_style(Some(db_conn(state)?))?;
    Ok(json!({ "style": style.as_str() }))
}

fn handle_badge_style_set(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = db_conn(state)?;
    let raw = required_str(req, "style")?;
    let style = BadgeStyle::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown badge style: {raw}")))?;
    db::settings_set_json(conn, BADGE_STYLE_KEY, &json!(style.as_str()))
        .map_err(|e| HandlerErr::from_anyhow("db_update_failed", e))?;
    Ok(json!({ "style": style.as_str() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "policy.maxMarks" => handle_policy_max_marks(state, req),
        "policy.termMaxMarks" => handle_policy_term_max_marks(state, req),
        "curriculum.subjects" => handle_curriculum_subjects(state, req),
        "grading.letter" => handle_grading_letter(state, req),
        "grading.nineScale" => handle_grading_nine_scale(state, req),
        "settings.badgeStyle.get" => handle_badge_style_get(state, req),
        "settings.badgeStyle.set" => handle_badge_style_set(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
