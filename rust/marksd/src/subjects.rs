use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Subject {
    Math,
    English,
    Hindi,
    Evs,
    Science,
    Social,
    Kannada,
    Computer,
    Ai,
    Physics,
    Chemistry,
    Biology,
    Economics,
    BusinessStudies,
    Accountancy,
    Statistics,
    Management,
    Psychology,
    Pe,
}

/// Which column of the max-marks table a subject is scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubjectRole {
    Regular,
    Computer,
    Ai,
}

impl SubjectRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "regular" => Some(Self::Regular),
            "computer" => Some(Self::Computer),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }
}

impl Subject {
    pub const ALL: [Subject; 19] = [
        Subject::Math,
        Subject::English,
        Subject::Hindi,
        Subject::Evs,
        Subject::Science,
        Subject::Social,
        Subject::Kannada,
        Subject::Computer,
        Subject::Ai,
        Subject::Physics,
        Subject::Chemistry,
        Subject::Biology,
        Subject::Economics,
        Subject::BusinessStudies,
        Subject::Accountancy,
        Subject::Statistics,
        Subject::Management,
        Subject::Psychology,
        Subject::Pe,
    ];

    /// Wire key, as used in entry payloads and exports.
    pub fn key(self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::English => "english",
            Subject::Hindi => "hindi",
            Subject::Evs => "evs",
            Subject::Science => "science",
            Subject::Social => "social",
            Subject::Kannada => "kannada",
            Subject::Computer => "computer",
            Subject::Ai => "ai",
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::Economics => "economics",
            Subject::BusinessStudies => "businessStudies",
            Subject::Accountancy => "accountancy",
            Subject::Statistics => "statistics",
            Subject::Management => "management",
            Subject::Psychology => "psychology",
            Subject::Pe => "pe",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Subject::Math => "Math",
            Subject::English => "English",
            Subject::Hindi => "Hindi",
            Subject::Evs => "EVS",
            Subject::Science => "Science",
            Subject::Social => "Social",
            Subject::Kannada => "Kannada",
            Subject::Computer => "Computer",
            Subject::Ai => "AI",
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Biology => "Biology",
            Subject::Economics => "Economics",
            Subject::BusinessStudies => "Business Studies",
            Subject::Accountancy => "Accountancy",
            Subject::Statistics => "Statistics",
            Subject::Management => "Management",
            Subject::Psychology => "Psychology",
            Subject::Pe => "PE",
        }
    }

    pub fn role(self) -> SubjectRole {
        match self {
            Subject::Computer => SubjectRole::Computer,
            Subject::Ai => SubjectRole::Ai,
            _ => SubjectRole::Regular,
        }
    }

    /// Accepts either the wire key or the display name.
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        Subject::ALL
            .iter()
            .copied()
            .find(|s| s.key() == t || s.display_name().eq_ignore_ascii_case(t))
    }
}

/// Raw marks for the subjects taken in one submission.
///
/// Absent keys and explicit `null` both mean "not taken". Marks are kept as
/// signed integers so range checks can report negative input as a bound
/// violation instead of a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SubjectMarks(BTreeMap<Subject, i64>);

impl SubjectMarks {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(mut self, subject: Subject, mark: i64) -> Self {
        self.0.insert(subject, mark);
        self
    }

    #[cfg(test)]
    pub fn insert(&mut self, subject: Subject, mark: i64) {
        self.0.insert(subject, mark);
    }

    pub fn get(&self, subject: Subject) -> Option<i64> {
        self.0.get(&subject).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Subject, i64)> + '_ {
        self.0.iter().map(|(s, m)| (*s, *m))
    }

    pub fn total(&self) -> i64 {
        self.0.values().fold(0i64, |acc, m| acc.saturating_add(*m))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for SubjectMarks {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: BTreeMap<Subject, Option<i64>> = BTreeMap::deserialize(deserializer)?;
        Ok(SubjectMarks(
            raw.into_iter()
                .filter_map(|(s, m)| m.map(|m| (s, m)))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_serde() {
        for s in Subject::ALL {
            let v = serde_json::to_value(s).expect("serialize");
            assert_eq!(v.as_str(), Some(s.key()));
            assert_eq!(Subject::parse(s.key()), Some(s));
        }
    }

    #[test]
    fn parse_accepts_display_names() {
        assert_eq!(Subject::parse("Business Studies"), Some(Subject::BusinessStudies));
        assert_eq!(Subject::parse("evs"), Some(Subject::Evs));
        assert_eq!(Subject::parse("AI"), Some(Subject::Ai));
        assert_eq!(Subject::parse("woodwork"), None);
    }

    #[test]
    fn null_marks_mean_not_taken() {
        let marks: SubjectMarks =
            serde_json::from_str(r#"{"math": 40, "hindi": null, "businessStudies": 12}"#)
                .expect("parse marks");
        assert_eq!(marks.iter().count(), 2);
        assert_eq!(marks.get(Subject::Hindi), None);
        assert_eq!(marks.get(Subject::BusinessStudies), Some(12));
        assert_eq!(marks.total(), 52);

        let out = serde_json::to_value(&marks).expect("serialize");
        assert_eq!(out, serde_json::json!({"math": 40, "businessStudies": 12}));
    }

    #[test]
    fn unknown_subject_key_is_rejected() {
        let parsed: Result<SubjectMarks, _> = serde_json::from_str(r#"{"woodwork": 10}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn roles_follow_subject() {
        assert_eq!(Subject::Computer.role(), SubjectRole::Computer);
        assert_eq!(Subject::Ai.role(), SubjectRole::Ai);
        assert_eq!(Subject::Pe.role(), SubjectRole::Regular);
    }
}
