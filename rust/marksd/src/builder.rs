use crate::curriculum::{self, SENIOR_GRADE};
use crate::entry::AcademicEntry;
use crate::grading::{letter_grade, nine_scale_grade, percentage};
use crate::policy::{is_board_exam_term, is_terminal_grade, max_marks_config, BOARD_EXAM_TERM};
use crate::subjects::{Subject, SubjectMarks};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("grade must be between 1 and 12 (got {0})")]
    InvalidGrade(i64),
    #[error("term {term} is not valid for grade {grade}")]
    InvalidTerm { grade: i64, term: i64 },
    #[error("stream and subgroup are required for grades 11-12")]
    MissingStream,
    #[error("unknown stream: {0}")]
    UnknownStream(String),
    #[error("unknown subgroup {subgroup} for stream {stream}")]
    UnknownSubgroup { stream: String, subgroup: String },
    #[error("stream/subgroup only apply to grades 11-12")]
    UnexpectedStream,
    #[error("at least one subject mark is required")]
    NoMarks,
    #[error("{} is not offered in this grade/stream", .0.display_name())]
    SubjectNotOffered(Subject),
    #[error("marks for {} must be between 0 and {max} (got {mark})", .subject.display_name())]
    MarkOutOfRange { subject: Subject, mark: i64, max: u32 },
}

impl ValidationError {
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ValidationError::InvalidGrade(g) => Some(json!({ "grade": g })),
            ValidationError::InvalidTerm { grade, term } => {
                Some(json!({ "grade": grade, "term": term }))
            }
            ValidationError::UnknownStream(s) => Some(json!({ "stream": s })),
            ValidationError::UnknownSubgroup { stream, subgroup } => {
                Some(json!({ "stream": stream, "subgroup": subgroup }))
            }
            ValidationError::SubjectNotOffered(s) => Some(json!({ "subject": s.key() })),
            ValidationError::MarkOutOfRange { subject, mark, max } => Some(json!({
                "subject": subject.key(),
                "mark": mark,
                "min": 0,
                "max": max,
            })),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    pub grade: i64,
    pub term: i64,
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub subgroup: Option<String>,
    #[serde(default)]
    pub marks: SubjectMarks,
}

/// Resolved grade/term/stream context a set of marks is checked against.
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    pub grade: i64,
    pub term: i64,
    pub stream: Option<String>,
    pub subgroup: Option<String>,
    pub is_board_exam: bool,
    pub valid_subjects: Vec<Subject>,
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Checks grade, term and stream/subgroup, and canonicalises stream names.
pub fn resolve_context(
    grade: i64,
    term: i64,
    stream: &Option<String>,
    subgroup: &Option<String>,
) -> Result<SubmissionContext, ValidationError> {
    if !(1..=12).contains(&grade) {
        return Err(ValidationError::InvalidGrade(grade));
    }
    let term_ok = term == 1 || term == 2 || (is_terminal_grade(grade) && term >= BOARD_EXAM_TERM);
    if !term_ok {
        return Err(ValidationError::InvalidTerm { grade, term });
    }

    let (stream, subgroup) = if grade >= SENIOR_GRADE {
        let (Some(st), Some(sg)) = (non_blank(stream), non_blank(subgroup)) else {
            return Err(ValidationError::MissingStream);
        };
        let Some(found) = curriculum::find_stream(st) else {
            return Err(ValidationError::UnknownStream(st.to_string()));
        };
        let Some(group) = found.find_subgroup(sg) else {
            return Err(ValidationError::UnknownSubgroup {
                stream: found.name.to_string(),
                subgroup: sg.to_string(),
            });
        };
        (Some(found.name.to_string()), Some(group.name.to_string()))
    } else {
        if non_blank(stream).is_some() || non_blank(subgroup).is_some() {
            return Err(ValidationError::UnexpectedStream);
        }
        (None, None)
    };

    let valid_subjects = curriculum::valid_subjects(grade, stream.as_deref(), subgroup.as_deref());
    Ok(SubmissionContext {
        grade,
        term,
        is_board_exam: is_board_exam_term(grade, term),
        stream,
        subgroup,
        valid_subjects,
    })
}

/// Every mark must belong to an offered subject and sit in `0..=max`.
pub fn validate_marks(ctx: &SubmissionContext, marks: &SubjectMarks) -> Result<(), ValidationError> {
    if marks.is_empty() {
        return Err(ValidationError::NoMarks);
    }
    let config = max_marks_config(ctx.grade, ctx.is_board_exam);
    for (subject, mark) in marks.iter() {
        if !ctx.valid_subjects.contains(&subject) {
            return Err(ValidationError::SubjectNotOffered(subject));
        }
        let max = config.for_role(subject.role());
        if mark < 0 || mark > i64::from(max) {
            return Err(ValidationError::MarkOutOfRange { subject, mark, max });
        }
    }
    Ok(())
}

pub fn build_entry(req: &EntryRequest, now: DateTime<Utc>) -> Result<AcademicEntry, ValidationError> {
    let ctx = resolve_context(req.grade, req.term, &req.stream, &req.subgroup)?;
    validate_marks(&ctx, &req.marks)?;

    let config = max_marks_config(ctx.grade, ctx.is_board_exam);
    let term_max_marks: i64 = req
        .marks
        .iter()
        .map(|(s, _)| i64::from(config.for_role(s.role())))
        .sum();
    let term_total_marks = req.marks.total();

    let subjects9: BTreeMap<Subject, u8> = req
        .marks
        .iter()
        .map(|(s, m)| (s, nine_scale_grade(m as f64, f64::from(config.for_role(s.role())))))
        .collect();

    let entry = AcademicEntry {
        id: Uuid::new_v4().to_string(),
        grade: ctx.grade,
        term: ctx.term,
        stream: ctx.stream,
        subgroup: ctx.subgroup,
        subjects: req.marks.clone(),
        subjects9,
        term_max_marks,
        max_marks_per_subject: i64::from(config.regular_subject_max),
        computer_max_marks: i64::from(config.computer_max),
        ai_max_marks: i64::from(config.ai_max),
        term_total_marks,
        term_percentage: percentage(term_total_marks as f64, term_max_marks as f64),
        grade_text: letter_grade(term_total_marks as f64, term_max_marks as f64).to_string(),
        timestamp: now,
    };
    tracing::debug!(
        grade = entry.grade,
        term = entry.term,
        total = entry.term_total_marks,
        max = entry.term_max_marks,
        "entry built"
    );
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn grade5_request() -> EntryRequest {
        EntryRequest {
            grade: 5,
            term: 1,
            marks: SubjectMarks::new()
                .with(Subject::Math, 55)
                .with(Subject::English, 48)
                .with(Subject::Computer, 18),
            ..Default::default()
        }
    }

    #[test]
    fn derives_totals_and_freezes_policy() {
        let e = build_entry(&grade5_request(), at()).expect("build");
        assert_eq!(e.term_max_marks, 60 + 60 + 20);
        assert_eq!(e.term_total_marks, 121);
        assert!((e.term_percentage - 121.0 * 100.0 / 140.0).abs() < 1e-9);
        assert_eq!(e.grade_text, "A");
        assert_eq!(e.max_marks_per_subject, 60);
        assert_eq!(e.computer_max_marks, 20);
        assert_eq!(e.ai_max_marks, 0);
        assert_eq!(e.subjects9.get(&Subject::Math), Some(&9));
        assert_eq!(e.subjects9.get(&Subject::Computer), Some(&8));
        assert_eq!(e.timestamp, at());
    }

    #[test]
    fn identical_inputs_give_identical_derived_fields() {
        let a = build_entry(&grade5_request(), at()).expect("build a");
        let b = build_entry(&grade5_request(), at()).expect("build b");
        assert_ne!(a.id, b.id);
        assert_eq!(a.term_total_marks, b.term_total_marks);
        assert_eq!(a.term_percentage, b.term_percentage);
        assert_eq!(a.grade_text, b.grade_text);
        assert_eq!(a.subjects9, b.subjects9);
    }

    #[test]
    fn rejects_mark_above_policy_max() {
        let mut req = grade5_request();
        req.marks.insert(Subject::Computer, 21);
        let e = build_entry(&req, at()).unwrap_err();
        assert_eq!(
            e,
            ValidationError::MarkOutOfRange { subject: Subject::Computer, mark: 21, max: 20 }
        );
        let d = e.details().expect("details");
        assert_eq!(d["subject"], "computer");
        assert_eq!(d["max"], 20);
    }

    #[test]
    fn rejects_negative_marks() {
        let mut req = grade5_request();
        req.marks.insert(Subject::Math, -1);
        assert!(matches!(
            build_entry(&req, at()),
            Err(ValidationError::MarkOutOfRange { subject: Subject::Math, .. })
        ));
    }

    #[test]
    fn rejects_subject_outside_curriculum() {
        let mut req = grade5_request();
        req.marks.insert(Subject::Ai, 10);
        assert_eq!(
            build_entry(&req, at()).unwrap_err(),
            ValidationError::SubjectNotOffered(Subject::Ai)
        );
    }

    #[test]
    fn grade_and_term_bounds() {
        let mut req = grade5_request();
        req.grade = 13;
        assert_eq!(build_entry(&req, at()).unwrap_err(), ValidationError::InvalidGrade(13));

        let mut req = grade5_request();
        req.term = 8;
        assert_eq!(
            build_entry(&req, at()).unwrap_err(),
            ValidationError::InvalidTerm { grade: 5, term: 8 }
        );
    }

    #[test]
    fn senior_grades_need_stream_and_subgroup() {
        let req = EntryRequest {
            grade: 11,
            term: 1,
            stream: Some("Science".into()),
            marks: SubjectMarks::new().with(Subject::Physics, 70),
            ..Default::default()
        };
        assert_eq!(build_entry(&req, at()).unwrap_err(), ValidationError::MissingStream);

        let req = EntryRequest {
            subgroup: Some("CEBA".into()),
            ..req
        };
        assert!(matches!(
            build_entry(&req, at()),
            Err(ValidationError::UnknownSubgroup { .. })
        ));
    }

    #[test]
    fn junior_grades_reject_stream() {
        let mut req = grade5_request();
        req.stream = Some("Science".into());
        assert_eq!(build_entry(&req, at()).unwrap_err(), ValidationError::UnexpectedStream);
    }

    #[test]
    fn elective_counts_like_compulsory_subject() {
        let req = EntryRequest {
            grade: 12,
            term: 2,
            stream: Some("commerce".into()),
            subgroup: Some("seba".into()),
            marks: SubjectMarks::new()
                .with(Subject::Statistics, 60)
                .with(Subject::English, 70)
                .with(Subject::Pe, 80)
                .with(Subject::Math, 50),
        };
        let e = build_entry(&req, at()).expect("build");
        assert_eq!(e.stream.as_deref(), Some("Commerce"));
        assert_eq!(e.subgroup.as_deref(), Some("SEBA"));
        assert_eq!(e.term_max_marks, 320);
        assert_eq!(e.term_total_marks, 260);
        assert_eq!(e.computer_max_marks, 80);
    }

    #[test]
    fn board_term_uses_hundred_per_subject() {
        let req = EntryRequest {
            grade: 10,
            term: BOARD_EXAM_TERM,
            marks: SubjectMarks::new().with(Subject::Math, 95).with(Subject::Ai, 90),
            ..Default::default()
        };
        let e = build_entry(&req, at()).expect("build");
        assert_eq!(e.term_max_marks, 200);
        assert_eq!(e.ai_max_marks, 100);
        assert_eq!(e.grade_text, "A+");
    }

    #[test]
    fn empty_marks_are_rejected() {
        let mut req = grade5_request();
        req.marks = SubjectMarks::new();
        assert_eq!(build_entry(&req, at()).unwrap_err(), ValidationError::NoMarks);
    }
}
