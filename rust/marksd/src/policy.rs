use crate::subjects::{Subject, SubjectRole};
use serde::Serialize;

/// First term number that denotes a board-exam submission for grades 10 and 12.
pub const BOARD_EXAM_TERM: i64 = 8;

/// Per-subject maximum marks for every role in one grade context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxMarksConfig {
    pub regular_subject_max: u32,
    pub computer_max: u32,
    pub ai_max: u32,
}

impl MaxMarksConfig {
    const fn new(regular_subject_max: u32, computer_max: u32, ai_max: u32) -> Self {
        Self {
            regular_subject_max,
            computer_max,
            ai_max,
        }
    }

    pub fn for_role(&self, role: SubjectRole) -> u32 {
        match role {
            SubjectRole::Regular => self.regular_subject_max,
            SubjectRole::Computer => self.computer_max,
            SubjectRole::Ai => self.ai_max,
        }
    }
}

struct GradeBand {
    first: i64,
    last: i64,
    config: MaxMarksConfig,
}

// Term-entry policy. Computer is not offered in 9 and 10.
const GRADE_BANDS: [GradeBand; 7] = [
    GradeBand { first: 1, last: 2, config: MaxMarksConfig::new(30, 20, 0) },
    GradeBand { first: 3, last: 4, config: MaxMarksConfig::new(50, 20, 0) },
    GradeBand { first: 5, last: 7, config: MaxMarksConfig::new(60, 20, 0) },
    GradeBand { first: 8, last: 8, config: MaxMarksConfig::new(80, 30, 0) },
    GradeBand { first: 9, last: 9, config: MaxMarksConfig::new(80, 0, 50) },
    GradeBand { first: 10, last: 10, config: MaxMarksConfig::new(80, 0, 50) },
    GradeBand { first: 11, last: 12, config: MaxMarksConfig::new(80, 80, 0) },
];

const BOARD_EXAM_CONFIG: MaxMarksConfig = MaxMarksConfig::new(100, 100, 100);

// Returned for grades outside 1..=12. Kept as a silent default: callers that
// pass a bad grade get plausible numbers rather than an error.
const FALLBACK_CONFIG: MaxMarksConfig = MaxMarksConfig::new(100, 100, 0);

pub fn is_terminal_grade(grade: i64) -> bool {
    grade == 10 || grade == 12
}

pub fn is_board_exam_term(grade: i64, term: i64) -> bool {
    is_terminal_grade(grade) && term >= BOARD_EXAM_TERM
}

pub fn max_marks_config(grade: i64, is_board_exam: bool) -> MaxMarksConfig {
    if is_board_exam && is_terminal_grade(grade) {
        return BOARD_EXAM_CONFIG;
    }
    match GRADE_BANDS
        .iter()
        .find(|b| grade >= b.first && grade <= b.last)
    {
        Some(band) => band.config,
        None => {
            tracing::debug!(grade, "grade outside policy table; using default max marks");
            FALLBACK_CONFIG
        }
    }
}

pub fn max_marks_for(grade: i64, role: SubjectRole, is_board_exam: bool) -> u32 {
    max_marks_config(grade, is_board_exam).for_role(role)
}

pub fn max_marks_for_subject(subject: Subject, grade: i64, is_board_exam: bool) -> u32 {
    max_marks_for(grade, subject.role(), is_board_exam)
}

pub fn term_max_marks(subjects: &[Subject], grade: i64, is_board_exam: bool) -> u32 {
    let config = max_marks_config(grade, is_board_exam);
    subjects.iter().map(|s| config.for_role(s.role())).sum()
}

/// Policy max for a subject of a stored entry, detecting board terms from the
/// term number. Used when the entry's own frozen maxima look wrong.
pub fn expected_max_marks(subject: Subject, grade: i64, term: i64) -> u32 {
    max_marks_for_subject(subject, grade, is_board_exam_term(grade, term))
}
