//! Which subjects a submission may carry for a grade and, in senior grades,
//! a stream/subgroup pair.

use crate::subjects::Subject;
use crate::subjects::Subject::*;

pub const SENIOR_GRADE: i64 = 11;

struct GradeSubjects {
    first: i64,
    last: i64,
    subjects: &'static [Subject],
}

const GRADE_SUBJECTS: [GradeSubjects; 4] = [
    GradeSubjects { first: 1, last: 2, subjects: &[Math, English, Hindi, Evs, Computer] },
    GradeSubjects { first: 3, last: 4, subjects: &[Math, English, Hindi, Science, Social, Computer] },
    GradeSubjects {
        first: 5,
        last: 8,
        subjects: &[Math, English, Hindi, Science, Social, Kannada, Computer],
    },
    GradeSubjects { first: 9, last: 10, subjects: &[Math, English, Science, Social, Kannada, Ai] },
];

pub struct Subgroup {
    pub name: &'static str,
    pub subjects: &'static [Subject],
}

pub struct Stream {
    pub name: &'static str,
    pub subgroups: &'static [Subgroup],
    pub electives: &'static [Subject],
}

pub static STREAMS: [Stream; 2] = [
    Stream {
        name: "Science",
        subgroups: &[
            Subgroup { name: "PCM Psych", subjects: &[Physics, Chemistry, Math, Psychology, English] },
            Subgroup { name: "PCMB", subjects: &[Physics, Chemistry, Biology, Math, English] },
            Subgroup { name: "PCMC", subjects: &[Physics, Chemistry, Math, Computer, English] },
        ],
        electives: &[Pe],
    },
    Stream {
        name: "Commerce",
        subgroups: &[
            Subgroup {
                name: "CEBA",
                subjects: &[Computer, Economics, BusinessStudies, Accountancy, English],
            },
            Subgroup {
                name: "SEBA",
                subjects: &[Statistics, Economics, BusinessStudies, Accountancy, English],
            },
            Subgroup {
                name: "MSBA",
                subjects: &[Management, Statistics, BusinessStudies, Accountancy, English],
            },
        ],
        electives: &[Pe, Math],
    },
];

pub fn find_stream(name: &str) -> Option<&'static Stream> {
    STREAMS.iter().find(|s| s.name.eq_ignore_ascii_case(name.trim()))
}

impl Stream {
    pub fn find_subgroup(&self, name: &str) -> Option<&'static Subgroup> {
        self.subgroups
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// Compulsory subjects for grades 1 to 10.
pub fn junior_subjects(grade: i64) -> &'static [Subject] {
    GRADE_SUBJECTS
        .iter()
        .find(|g| grade >= g.first && grade <= g.last)
        .map(|g| g.subjects)
        .unwrap_or(&[])
}

/// Base subgroup subjects followed by the stream's electives, without
/// duplicates. Unknown stream or subgroup yields an empty list.
pub fn senior_subjects(stream: &str, subgroup: &str) -> Vec<Subject> {
    let Some(st) = find_stream(stream) else {
        return Vec::new();
    };
    let Some(group) = st.find_subgroup(subgroup) else {
        return Vec::new();
    };
    let mut out: Vec<Subject> = group.subjects.to_vec();
    for e in st.electives {
        if !out.contains(e) {
            out.push(*e);
        }
    }
    out
}

pub fn is_elective(stream: &str, subject: Subject) -> bool {
    find_stream(stream)
        .map(|s| s.electives.contains(&subject))
        .unwrap_or(false)
}

/// Valid subject list for a submission context.
pub fn valid_subjects(grade: i64, stream: Option<&str>, subgroup: Option<&str>) -> Vec<Subject> {
    if grade >= SENIOR_GRADE {
        match (stream, subgroup) {
            (Some(st), Some(sg)) => senior_subjects(st, sg),
            _ => Vec::new(),
        }
    } else {
        junior_subjects(grade).to_vec()
    }
}
