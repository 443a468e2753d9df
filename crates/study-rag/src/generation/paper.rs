//! Exam paper artifacts: naming, header rendering and legacy filename parsing

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::folder::papers_prefix;
use crate::types::study::PaperPreset;

/// Suffix of the metadata record stored next to each paper
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// `{folder}_{marks}marks_{YYYYMMDD_HHMMSS}[_{fraction}].txt`
static LEGACY_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<folder>.+)_(?P<marks>\d+)marks_(?P<ts>\d{8}_\d{6})(?:_(?P<frac>\d{1,9}))?\.txt$").unwrap()
});

/// File name for a paper generated at `created_at` (microsecond resolution)
pub fn paper_filename(folder: &str, marks: u32, created_at: DateTime<Utc>) -> String {
    format!(
        "{}_{}marks_{}.txt",
        folder,
        marks,
        created_at.format("%Y%m%d_%H%M%S_%6f")
    )
}

/// Timestamp for the next naming attempt, truncated to microseconds.
///
/// Always later than `previous`, so a retry after a name collision never
/// produces the same file name again.
pub fn next_paper_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}

/// Blob path of a paper in the user's papers directory
pub fn paper_path(user_id: &str, filename: &str) -> String {
    format!("{}{}", papers_prefix(user_id), filename)
}

/// Blob path of the sidecar metadata record for a paper
pub fn sidecar_path(paper_path: &str) -> String {
    format!("{}{}", paper_path, SIDECAR_SUFFIX)
}

/// Prefix the generated questions with the paper header
pub fn render_paper(preset: PaperPreset, folder: &str, body: &str, created_at: DateTime<Utc>) -> String {
    let rule = "=".repeat(60);
    format!(
        "{rule}\nSubject: {folder}\nTotal Marks: {marks}\nDuration: {duration}\nGenerated: {generated}\n{rule}\n\n{body}\n",
        rule = rule,
        folder = folder,
        marks = preset.marks(),
        duration = preset.duration_label(),
        generated = created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        body = body.trim()
    )
}

/// Paper details recovered from a legacy file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPaperName {
    pub folder: String,
    pub marks: u32,
    pub created_at: DateTime<Utc>,
}

/// Parse `{folder}_{marks}marks_{YYYYMMDD_HHMMSS[_ffffff]}.txt`
pub fn parse_legacy_filename(filename: &str) -> Option<LegacyPaperName> {
    let caps = LEGACY_NAME.captures(filename)?;
    let marks = caps["marks"].parse().ok()?;
    let naive = NaiveDateTime::parse_from_str(&caps["ts"], "%Y%m%d_%H%M%S").ok()?;

    let nanos = match caps.name("frac") {
        Some(frac) => {
            let digits = frac.as_str();
            format!("{:0<9}", digits).parse::<u32>().ok()?
        }
        None => 0,
    };
    let naive = naive.with_nanosecond(nanos)?;

    Some(LegacyPaperName {
        folder: caps["folder"].to_string(),
        marks,
        created_at: Utc.from_utc_datetime(&naive),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap() + chrono::Duration::microseconds(589_793)
    }

    #[test]
    fn test_paper_filename() {
        assert_eq!(paper_filename("ML", 20, at()), "ML_20marks_20250314_092653_589793.txt");
        assert_eq!(
            paper_path("u1", "ML_20marks_20250314_092653_589793.txt"),
            "u1/papers/ML_20marks_20250314_092653_589793.txt"
        );
        assert_eq!(sidecar_path("u1/papers/a.txt"), "u1/papers/a.txt.meta.json");
    }

    #[test]
    fn test_next_timestamp_always_advances() {
        let first = next_paper_timestamp(None);
        assert_eq!(first.nanosecond() % 1_000, 0);

        let future = Utc::now() + Duration::seconds(30);
        let future = future.trunc_subsecs(6);
        let next = next_paper_timestamp(Some(future));
        assert_eq!(next, future + Duration::microseconds(1));
        assert_ne!(paper_filename("ML", 20, future), paper_filename("ML", 20, next));
    }

    #[test]
    fn test_filename_round_trips_through_legacy_parser() {
        let name = paper_filename("Data_Mining", 60, at());
        let parsed = parse_legacy_filename(&name).unwrap();
        assert_eq!(parsed.folder, "Data_Mining");
        assert_eq!(parsed.marks, 60);
        assert_eq!(parsed.created_at, at());
    }

    #[test]
    fn test_legacy_without_fraction() {
        let parsed = parse_legacy_filename("Physics_20marks_20240101_120000.txt").unwrap();
        assert_eq!(parsed.created_at, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_legacy_rejects_other_names() {
        assert!(parse_legacy_filename("notes.txt").is_none());
        assert!(parse_legacy_filename("ML_20marks_20240101_120000.pdf").is_none());
        assert!(parse_legacy_filename("ML_20marks_20241301_120000.txt").is_none());
    }

    #[test]
    fn test_render_paper_header() {
        let text = render_paper(PaperPreset::Short, "ML", "  Section A\n1. Q  ", at());
        assert!(text.contains("Subject: ML"));
        assert!(text.contains("Total Marks: 20"));
        assert!(text.contains("Duration: 45 minutes"));
        assert!(text.contains("Generated: 2025-03-14 09:26:53 UTC"));
        assert!(text.ends_with("Section A\n1. Q\n"));
    }
}
