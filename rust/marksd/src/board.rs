use crate::entry::BoardExamResult;
use crate::grading::percentage;
use crate::policy::{max_marks_for_subject, is_terminal_grade};
use crate::subjects::{Subject, SubjectMarks};
use thiserror::Error;

/// Grade whose board submission lets AI stand in for a weak core subject.
pub const SUBSTITUTION_GRADE: i64 = 10;
const SUBSTITUTION_MAX_MARKS: i64 = 500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardExamError {
    #[error("grade {0} has no board exam (only grades 10 and 12)")]
    NotTerminalGrade(i64),
}

/// Math + science + social, with AI replacing the lowest of the three when
/// it is strictly higher. Ties keep the core subject.
pub fn core_total_with_substitution(math: i64, science: i64, social: i64, ai: i64) -> i64 {
    let core_total = math.saturating_add(science).saturating_add(social);
    let min_core = math.min(science).min(social);
    if ai > min_core {
        core_total.saturating_sub(min_core).saturating_add(ai)
    } else {
        core_total
    }
}

/// Board total for one candidate. Marks are assumed already range-checked.
pub fn compute_board_exam(grade: i64, marks: &SubjectMarks) -> Result<BoardExamResult, BoardExamError> {
    if !is_terminal_grade(grade) {
        return Err(BoardExamError::NotTerminalGrade(grade));
    }

    let (total, max_marks) = if grade == SUBSTITUTION_GRADE {
        let m = |s: Subject| marks.get(s).unwrap_or(0);
        let core = core_total_with_substitution(
            m(Subject::Math),
            m(Subject::Science),
            m(Subject::Social),
            m(Subject::Ai),
        );
        (
            m(Subject::English)
                .saturating_add(m(Subject::Kannada))
                .saturating_add(core),
            SUBSTITUTION_MAX_MARKS,
        )
    } else {
        let max: i64 = marks
            .iter()
            .map(|(s, _)| i64::from(max_marks_for_subject(s, grade, true)))
            .sum();
        (marks.total(), max)
    };

    let result = BoardExamResult {
        board_exam_total: total,
        max_marks,
        percentage: percentage(total as f64, max_marks as f64),
    };
    tracing::debug!(grade, total, max_marks, "board exam computed");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade10(math: i64, science: i64, social: i64, ai: i64) -> SubjectMarks {
        SubjectMarks::new()
            .with(Subject::English, 80)
            .with(Subject::Kannada, 75)
            .with(Subject::Math, math)
            .with(Subject::Science, science)
            .with(Subject::Social, social)
            .with(Subject::Ai, ai)
    }

    #[test]
    fn ai_replaces_weakest_core_subject() {
        assert_eq!(core_total_with_substitution(40, 60, 50, 70), 180);
        let r = compute_board_exam(10, &grade10(40, 60, 50, 70)).expect("grade 10");
        assert_eq!(r.board_exam_total, 335);
        assert_eq!(r.max_marks, 500);
        assert!((r.percentage - 67.0).abs() < 1e-9);
    }

    #[test]
    fn ai_not_used_when_it_does_not_help() {
        let r = compute_board_exam(10, &grade10(40, 60, 50, 30)).expect("grade 10");
        assert_eq!(r.board_exam_total, 305);
        assert!((r.percentage - 61.0).abs() < 1e-9);
    }

    #[test]
    fn tie_keeps_core_subject() {
        assert_eq!(core_total_with_substitution(40, 60, 50, 40), 150);
    }

    #[test]
    fn missing_grade10_marks_count_as_zero() {
        let marks = SubjectMarks::new().with(Subject::English, 90).with(Subject::Ai, 50);
        let r = compute_board_exam(10, &marks).expect("grade 10");
        // Core is 0+0+0, AI 50 replaces one zero.
        assert_eq!(r.board_exam_total, 140);
        assert_eq!(r.max_marks, 500);
    }

    #[test]
    fn grade12_sums_active_subjects() {
        let marks = SubjectMarks::new()
            .with(Subject::Physics, 70)
            .with(Subject::Chemistry, 65)
            .with(Subject::Math, 90)
            .with(Subject::Computer, 88)
            .with(Subject::English, 77);
        let r = compute_board_exam(12, &marks).expect("grade 12");
        assert_eq!(r.board_exam_total, 390);
        assert_eq!(r.max_marks, 500);
        assert!((r.percentage - 78.0).abs() < 1e-9);

        let empty = compute_board_exam(12, &SubjectMarks::new()).expect("grade 12");
        assert_eq!(empty.max_marks, 0);
        assert_eq!(empty.percentage, 0.0);
    }

    #[test]
    fn huge_marks_saturate_instead_of_overflowing() {
        let marks = SubjectMarks::new()
            .with(Subject::Math, i64::MAX)
            .with(Subject::English, 1);
        let r = compute_board_exam(12, &marks).expect("grade 12");
        assert_eq!(r.board_exam_total, i64::MAX);
        assert_eq!(core_total_with_substitution(i64::MAX, 1, 1, i64::MAX), i64::MAX);
    }

    #[test]
    fn other_grades_are_rejected() {
        assert_eq!(
            compute_board_exam(11, &SubjectMarks::new()),
            Err(BoardExamError::NotTerminalGrade(11))
        );
    }
}
