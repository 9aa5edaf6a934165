use crate::calc::{self, parse_entry_filters, EntryFilter};
use crate::db;
use crate::entry::AcademicEntry;
use crate::ipc::helpers::{respond, session, to_value, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn filtered_entries(state: &AppState, req: &Request) -> Result<(Vec<AcademicEntry>, EntryFilter), HandlerErr> {
    let filter = parse_entry_filters(req.params.get("filters"))?;
    let (conn, caller) = session(state)?;
    let entries = db::entries_for_owner(conn, caller)
        .map_err(|e| HandlerErr::from_anyhow("db_query_failed", e))?;
    Ok((entries, filter))
}

fn handle_subject_stats(state: &mut AppState, req: &Request) -> HandlerResult {
    let (entries, filter) = filtered_entries(state, req)?;
    let rows = calc::filter_entries(&entries, &filter);
    let stats = calc::subject_statistics(rows.iter().copied());
    Ok(json!({
        "filters": to_value(&filter)?,
        "entryCount": rows.len(),
        "subjects": to_value(&stats)?,
    }))
}

fn handle_grade_aggregates(state: &mut AppState, req: &Request) -> HandlerResult {
    let (entries, filter) = filtered_entries(state, req)?;
    let rows = calc::filter_entries(&entries, &filter);
    let aggregates: Vec<serde_json::Value> = calc::grade_aggregates(rows.iter().copied())
        .into_iter()
        .map(|(grade, agg)| {
            json!({
                "grade": grade,
                "term1Percentage": agg.term1_percentage,
                "term2Percentage": agg.term2_percentage,
                "combinedOverallPercentage": agg.combined_overall_percentage,
            })
        })
        .collect();
    Ok(json!({ "grades": aggregates }))
}

fn handle_overview(state: &mut AppState, req: &Request) -> HandlerResult {
    let (entries, filter) = filtered_entries(state, req)?;
    let rows = calc::filter_entries(&entries, &filter);
    to_value(&calc::overview(rows.iter().copied()))
}

fn handle_nine_scale_cards(state: &mut AppState, req: &Request) -> HandlerResult {
    let (entries, filter) = filtered_entries(state, req)?;
    let rows = calc::filter_entries(&entries, &filter);
    let cards = calc::nine_scale_cards(rows.iter().copied());
    Ok(json!({ "cards": to_value(&cards)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "analytics.subjectStats" => handle_subject_stats(state, req),
        "analytics.gradeAggregates" => handle_grade_aggregates(state, req),
        "analytics.overview" => handle_overview(state, req),
        "analytics.nineScaleCards" => handle_nine_scale_cards(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
