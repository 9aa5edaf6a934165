use serde::Serialize;

const LETTER_BANDS: [(f64, &str); 7] = [
    (90.0, "A+"),
    (85.0, "A"),
    (80.0, "B+"),
    (70.0, "B"),
    (60.0, "C"),
    (50.0, "D"),
    (40.0, "E"),
];

// Bands 1..=4 are 11/10/12/8 points wide.
const NINE_SCALE_BANDS: [(f64, u8); 9] = [
    (91.0, 9),
    (81.0, 8),
    (71.0, 7),
    (61.0, 6),
    (51.0, 5),
    (41.0, 4),
    (33.0, 3),
    (21.0, 2),
    (11.0, 1),
];

pub fn clamp_percent(p: f64) -> f64 {
    if p.is_nan() {
        return 0.0;
    }
    p.clamp(0.0, 100.0)
}

/// `marks * 100 / max_marks`, clamped to [0, 100]; 0 when there is no maximum.
pub fn percentage(marks: f64, max_marks: f64) -> f64 {
    if max_marks <= 0.0 {
        return 0.0;
    }
    clamp_percent(marks * 100.0 / max_marks)
}

/// Letter grade from the raw ratio. The ratio is not clamped, so corrupted
/// input above 100% lands in the top band.
pub fn letter_grade(marks: f64, max_marks: f64) -> &'static str {
    if max_marks == 0.0 {
        return "N/A";
    }
    let pct = marks * 100.0 / max_marks;
    LETTER_BANDS
        .iter()
        .find(|(min, _)| pct >= *min)
        .map(|(_, letter)| *letter)
        .unwrap_or("F")
}

pub fn nine_scale_grade(marks: f64, max_marks: f64) -> u8 {
    if max_marks == 0.0 {
        return 0;
    }
    let pct = marks * 100.0 / max_marks;
    NINE_SCALE_BANDS
        .iter()
        .find(|(min, _)| pct >= *min)
        .map(|(_, g)| *g)
        .unwrap_or(0)
}

/// Badge styling for an already classified letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BadgeTier {
    Primary,
    Secondary,
    Outline,
    Destructive,
}

/// `Compact` folds D into the outline tier alongside C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadgeStyle {
    #[default]
    Standard,
    Compact,
}

impl BadgeStyle {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Compact => "compact",
        }
    }
}

pub fn badge_tier(letter: &str, style: BadgeStyle) -> BadgeTier {
    match (letter, style) {
        ("A+" | "A", _) => BadgeTier::Primary,
        ("B+" | "B", _) => BadgeTier::Secondary,
        ("C", _) => BadgeTier::Outline,
        ("D", BadgeStyle::Compact) => BadgeTier::Outline,
        _ => BadgeTier::Destructive,
    }
}
