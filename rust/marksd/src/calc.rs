use crate::entry::AcademicEntry;
use crate::grading::{clamp_percent, nine_scale_grade, percentage};
use crate::policy::expected_max_marks;
use crate::subjects::{Subject, SubjectRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Stored per-subject maxima above this are treated as corrupt.
const MAX_PLAUSIBLE_SUBJECT_MAX: i64 = 150;

/// Rejected filter or query parameters.
#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryFilter {
    pub grade: Option<i64>,
    pub term: Option<i64>,
    pub section: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, e: &AcademicEntry) -> bool {
        let grade_ok = self.grade.map(|g| e.grade == g).unwrap_or(true);
        let term_ok = self.term.map(|t| e.term == t).unwrap_or(true);
        let section_ok = self
            .section
            .as_ref()
            .map(|sec| e.section().unwrap_or("") == sec)
            .unwrap_or(true);
        grade_ok && term_ok && section_ok
    }
}

fn parse_int_or_all(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<i64>, CalcError> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v)
            if v.as_str()
                .map(|s| s.eq_ignore_ascii_case("ALL"))
                .unwrap_or(false) =>
        {
            Ok(None)
        }
        Some(v) => match v.as_i64() {
            Some(n) => Ok(Some(n)),
            None => Err(CalcError::new(
                format!("filters.{key} must be integer or 'ALL'"),
            )),
        },
    }
}

pub fn parse_entry_filters(raw: Option<&serde_json::Value>) -> Result<EntryFilter, CalcError> {
    let Some(raw) = raw else {
        return Ok(EntryFilter::default());
    };
    if raw.is_null() {
        return Ok(EntryFilter::default());
    }
    let Some(obj) = raw.as_object() else {
        return Err(CalcError::new("filters must be an object"));
    };

    let grade = parse_int_or_all(obj, "grade")?;
    let term = parse_int_or_all(obj, "term")?;
    let section = match obj.get("section") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(CalcError::new(
                    "filters.section must be string or null",
                ));
            };
            let t = s.trim();
            if t.is_empty() || t.eq_ignore_ascii_case("ALL") {
                None
            } else {
                Some(t.to_string())
            }
        }
    };

    Ok(EntryFilter {
        grade,
        term,
        section,
    })
}

pub fn filter_entries<'a>(entries: &'a [AcademicEntry], filter: &EntryFilter) -> Vec<&'a AcademicEntry> {
    entries.iter().filter(|e| filter.matches(e)).collect()
}

/// Per-subject maximum for a stored entry.
///
/// The frozen field for the subject's role is used unless it is 0, equals
/// the whole-term maximum (the total was written into the per-subject slot),
/// or is implausibly large; then the current policy is consulted instead.
pub fn resolved_max_marks(entry: &AcademicEntry, subject: Subject) -> i64 {
    let stored = match subject.role() {
        SubjectRole::Computer => entry.computer_max_marks,
        SubjectRole::Ai => entry.ai_max_marks,
        SubjectRole::Regular => entry.max_marks_per_subject,
    };
    if stored == 0 || stored == entry.term_max_marks || stored > MAX_PLAUSIBLE_SUBJECT_MAX {
        let fallback = i64::from(expected_max_marks(subject, entry.grade, entry.term));
        tracing::debug!(
            entry_id = %entry.id,
            subject = subject.key(),
            stored,
            fallback,
            "stored max marks rejected; using policy"
        );
        return fallback;
    }
    stored
}

pub fn subject_percentage(entry: &AcademicEntry, subject: Subject) -> f64 {
    let Some(marks) = entry.subjects.get(subject) else {
        return 0.0;
    };
    percentage(marks as f64, resolved_max_marks(entry, subject) as f64)
}

fn compute_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStat {
    pub subject: Subject,
    pub subject_name: String,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub median: f64,
    pub average_marks: f64,
    pub count: usize,
}

#[derive(Default)]
struct SubjectSamples {
    percents: Vec<f64>,
    marks_sum: i64,
}

pub fn subject_statistics<'a, I>(entries: I) -> Vec<SubjectStat>
where
    I: IntoIterator<Item = &'a AcademicEntry>,
{
    let mut samples: HashMap<Subject, SubjectSamples> = HashMap::new();
    for e in entries {
        for (subject, marks) in e.subjects.iter() {
            let pct = subject_percentage(e, subject);
            let s = samples.entry(subject).or_default();
            s.percents.push(pct);
            s.marks_sum = s.marks_sum.saturating_add(marks);
        }
    }

    let mut stats: Vec<SubjectStat> = samples
        .into_iter()
        .filter(|(_, s)| !s.percents.is_empty())
        .map(|(subject, s)| {
            let count = s.percents.len();
            let highest = s.percents.iter().copied().fold(f64::MIN, f64::max);
            let lowest = s.percents.iter().copied().fold(f64::MAX, f64::min);
            SubjectStat {
                subject,
                subject_name: subject.display_name().to_string(),
                average: clamp_percent(mean(&s.percents).unwrap_or(0.0)),
                highest: clamp_percent(highest),
                lowest: clamp_percent(lowest),
                median: clamp_percent(compute_median(&s.percents)),
                average_marks: s.marks_sum as f64 / count as f64,
                count,
            }
        })
        .collect();
    stats.sort_by(|a, b| {
        a.subject_name
            .to_ascii_lowercase()
            .cmp(&b.subject_name.to_ascii_lowercase())
    });
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeAggregate {
    pub term1_percentage: Option<f64>,
    pub term2_percentage: Option<f64>,
    pub combined_overall_percentage: f64,
}

/// Term 1 / term 2 rollup per grade from stored term percentages. Board
/// submissions do not count towards either term.
pub fn grade_aggregates<'a, I>(entries: I) -> BTreeMap<i64, GradeAggregate>
where
    I: IntoIterator<Item = &'a AcademicEntry>,
{
    let mut by_grade: BTreeMap<i64, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for e in entries {
        let slot = by_grade.entry(e.grade).or_default();
        match e.term {
            1 => slot.0.push(e.term_percentage),
            2 => slot.1.push(e.term_percentage),
            _ => {}
        }
    }

    by_grade
        .into_iter()
        .map(|(grade, (t1, t2))| {
            let term1 = mean(&t1).map(clamp_percent);
            let term2 = mean(&t2).map(clamp_percent);
            let combined = match (term1, term2) {
                (Some(a), Some(b)) => (a + b) / 2.0,
                (Some(a), None) | (None, Some(a)) => a,
                (None, None) => 0.0,
            };
            (
                grade,
                GradeAggregate {
                    term1_percentage: term1,
                    term2_percentage: term2,
                    combined_overall_percentage: clamp_percent(combined),
                },
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_entries: usize,
    pub average_percentage: f64,
    pub highest_percentage: f64,
    pub lowest_percentage: f64,
}

pub fn overview<'a, I>(entries: I) -> Overview
where
    I: IntoIterator<Item = &'a AcademicEntry>,
{
    let percents: Vec<f64> = entries.into_iter().map(|e| e.term_percentage).collect();
    if percents.is_empty() {
        return Overview {
            total_entries: 0,
            average_percentage: 0.0,
            highest_percentage: 0.0,
            lowest_percentage: 0.0,
        };
    }
    Overview {
        total_entries: percents.len(),
        average_percentage: clamp_percent(mean(&percents).unwrap_or(0.0)),
        highest_percentage: clamp_percent(percents.iter().copied().fold(f64::MIN, f64::max)),
        lowest_percentage: clamp_percent(percents.iter().copied().fold(f64::MAX, f64::min)),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedByGrade {
    pub term1: Option<AcademicEntry>,
    pub term2: Option<AcademicEntry>,
    pub combined_total: i64,
    pub combined_average: f64,
}

/// Latest term 1 and term 2 entries of one grade side by side.
pub fn combined_by_grade(entries: &[AcademicEntry], grade: i64) -> CombinedByGrade {
    let latest = |term: i64| {
        entries
            .iter()
            .filter(|e| e.grade == grade && e.term == term)
            .max_by_key(|e| e.timestamp)
            .cloned()
    };
    let term1 = latest(1);
    let term2 = latest(2);

    let present: Vec<&AcademicEntry> = [term1.as_ref(), term2.as_ref()].into_iter().flatten().collect();
    let combined_total = present
        .iter()
        .fold(0i64, |acc, e| acc.saturating_add(e.term_total_marks));
    let percents: Vec<f64> = present.iter().map(|e| e.term_percentage).collect();

    CombinedByGrade {
        combined_total,
        combined_average: clamp_percent(mean(&percents).unwrap_or(0.0)),
        term1,
        term2,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NineScaleCard {
    pub subject: Subject,
    pub subject_name: String,
    pub grade: u8,
    pub marks: String,
    pub grade_level: i64,
    pub section: String,
    pub term: i64,
    pub timestamp: DateTime<Utc>,
}

/// One card per recorded subject mark, newest entries first.
pub fn nine_scale_cards<'a, I>(entries: I) -> Vec<NineScaleCard>
where
    I: IntoIterator<Item = &'a AcademicEntry>,
{
    let mut cards: Vec<NineScaleCard> = Vec::new();
    for e in entries {
        let section = e.section().unwrap_or("N/A");
        for (subject, marks) in e.subjects.iter() {
            let max = resolved_max_marks(e, subject);
            if max <= 0 {
                continue;
            }
            cards.push(NineScaleCard {
                subject,
                subject_name: subject.display_name().to_string(),
                grade: nine_scale_grade(marks as f64, max as f64),
                marks: format!("{marks}/{max}"),
                grade_level: e.grade,
                section: section.to_string(),
                term: e.term,
                timestamp: e.timestamp,
            });
        }
    }
    // Stable sort keeps subject order within an entry.
    cards.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    cards
}
