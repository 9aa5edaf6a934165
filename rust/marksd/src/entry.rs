use crate::subjects::{Subject, SubjectMarks};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One submission for a (grade, term) pair.
///
/// Derived fields and the max-marks policy in force at build time are stored
/// alongside the raw marks, so later policy changes never alter how an old
/// entry reads. Entries are never edited; a correction is a new entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicEntry {
    pub id: String,
    pub grade: i64,
    pub term: i64,
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub subgroup: Option<String>,
    pub subjects: SubjectMarks,
    #[serde(default)]
    pub subjects9: BTreeMap<Subject, u8>,
    pub term_max_marks: i64,
    #[serde(default)]
    pub max_marks_per_subject: i64,
    pub computer_max_marks: i64,
    pub ai_max_marks: i64,
    pub term_total_marks: i64,
    pub term_percentage: f64,
    pub grade_text: String,
    pub timestamp: DateTime<Utc>,
}

impl AcademicEntry {
    /// Stream, or subgroup when no stream was recorded.
    pub fn section(&self) -> Option<&str> {
        self.stream.as_deref().or(self.subgroup.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardExamResult {
    pub board_exam_total: i64,
    pub max_marks: i64,
    pub percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn export_field_names_are_stable() {
        let entry = AcademicEntry {
            id: "e1".into(),
            grade: 5,
            term: 1,
            stream: None,
            subgroup: None,
            subjects: SubjectMarks::new().with(Subject::Computer, 18),
            subjects9: BTreeMap::from([(Subject::Computer, 8)]),
            term_max_marks: 20,
            max_marks_per_subject: 60,
            computer_max_marks: 20,
            ai_max_marks: 0,
            term_total_marks: 18,
            term_percentage: 90.0,
            grade_text: "A+".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        };
        let v = serde_json::to_value(&entry).expect("serialize");
        let obj = v.as_object().expect("object");
        for key in [
            "id",
            "grade",
            "term",
            "stream",
            "subgroup",
            "subjects",
            "subjects9",
            "termMaxMarks",
            "maxMarksPerSubject",
            "computerMaxMarks",
            "aiMaxMarks",
            "termTotalMarks",
            "termPercentage",
            "gradeText",
            "timestamp",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        let back: AcademicEntry = serde_json::from_value(v).expect("deserialize");
        assert_eq!(back, entry);
    }

    #[test]
    fn section_prefers_stream() {
        let raw = serde_json::json!({
            "id": "e2", "grade": 11, "term": 2, "subgroup": "PCMB",
            "subjects": {}, "termMaxMarks": 0, "computerMaxMarks": 80,
            "aiMaxMarks": 0, "termTotalMarks": 0, "termPercentage": 0.0,
            "gradeText": "N/A", "timestamp": "2025-01-02T03:04:05Z"
        });
        let entry: AcademicEntry = serde_json::from_value(raw).expect("deserialize");
        assert_eq!(entry.section(), Some("PCMB"));
        assert_eq!(entry.max_marks_per_subject, 0);
    }
}
