//! VFK extract head: structural checks and identity extraction.
//!
//! A VFK extract opens with a block of `&H...` header lines followed by
//! `&B.../&D...` data declarations. The first twelve lines carry everything
//! needed to decide whether the file is importable and which
//! (zoning, valid date) identity it represents.
//!
//! Checks are independent and all evaluated, so a single pass reports every
//! problem. Identity extraction runs only on a head with no problems; it
//! assumes well-formed lines as a precondition.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::VfkError;

/// Number of lines read from the top of an extract.
pub const HEAD_LINES: usize = 12;

/// Timestamp format used by the `&HPLATNOST` validity period.
const VALIDITY_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Sentinel for "point-in-time snapshot, no change records".
const NO_CHANGES_LINE: &str = "&HZMENY;0";

/// Identity of a valid extract: the zoning it covers and the date its data
/// is authoritative for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadIdentity {
    /// Zoning (cadastral territory) identifier, a string of digits
    pub zoning_id: String,
    /// Date the extract snapshot is valid for
    pub valid_date: NaiveDate,
}

/// Validation outcome for an extract head.
#[derive(Debug, Clone)]
pub struct HeadReport {
    /// Human-readable problems; empty means the head is valid
    pub problems: Vec<String>,
    /// Extracted identity, present exactly when `problems` is empty
    pub identity: Option<HeadIdentity>,
}

impl HeadReport {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Reads the first [`HEAD_LINES`] lines of an extract file.
///
/// A shorter file yields fewer lines; the checks then report whichever
/// header lines are missing.
pub fn read_head(path: &Path) -> Result<Vec<String>, VfkError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut head = Vec::with_capacity(HEAD_LINES);
    for line in reader.lines().take(HEAD_LINES) {
        head.push(line?.trim_end().to_string());
    }
    Ok(head)
}

/// Validates an extract head and, when valid, extracts its identity.
pub fn check_head(head: &[String]) -> HeadReport {
    let problems = head_problems(head);
    if !problems.is_empty() {
        return HeadReport {
            problems,
            identity: None,
        };
    }

    match extract_identity(head) {
        Ok(identity) => HeadReport {
            problems: Vec::new(),
            identity: Some(identity),
        },
        Err(e) => HeadReport {
            problems: vec![e.to_string()],
            identity: None,
        },
    }
}

/// Runs the structural checks. Each check is independent and all of them
/// are evaluated; a missing line yields that check's missing-line problem
/// and nothing else.
pub fn head_problems(head: &[String]) -> Vec<String> {
    let mut problems = Vec::new();

    match find_line(head, "&HVERZE;") {
        None => problems.push("Missing VFK version line".to_string()),
        Some(line) if !line.contains("\"6.") => {
            problems.push("VFK file version is not 6".to_string());
        }
        Some(_) => {}
    }

    match find_line(head, "&HCODEPAGE;") {
        None => problems.push("Missing VFK code page line".to_string()),
        Some(line) if !line.contains("\"UTF-8\"") => {
            problems.push("VFK file encoding is not UTF-8".to_string());
        }
        Some(_) => {}
    }

    match find_line(head, "&HSKUPINA;") {
        None => problems.push("Missing VFK group line".to_string()),
        Some(line) if !line.contains("\"VLST\"") => {
            problems.push("Group VLST not present in VFK file".to_string());
        }
        Some(_) => {}
    }

    match find_line(head, "&HPLATNOST;") {
        None => problems.push("Missing VFK validity period line".to_string()),
        Some(line) => match parse_validity(line) {
            None => problems.push("Unknown VFK validity period format".to_string()),
            Some((from, to)) if from != to => {
                problems.push("Validity timestamps of the VFK file do not match".to_string());
            }
            Some(_) => {}
        },
    }

    match find_line(head, "&HZMENY;") {
        None => problems.push("Missing VFK change indicator line".to_string()),
        Some(line) if line != NO_CHANGES_LINE => {
            problems.push(
                "VFK file contains change records, not valid data for a point in time".to_string(),
            );
        }
        Some(_) => {}
    }

    problems
}

/// Extracts the identity of a head that passed validation.
///
/// Precondition: the head has no problems. Absent or malformed lines are
/// still surfaced as errors rather than panics.
pub fn extract_identity(head: &[String]) -> Result<HeadIdentity, VfkError> {
    let valid_line =
        find_line(head, "&HPLATNOST;").ok_or(VfkError::MissingLine("&HPLATNOST"))?;
    let (from, _) = parse_validity(valid_line)
        .ok_or_else(|| VfkError::malformed("&HPLATNOST", "unparseable validity period"))?;

    let zoning_line = find_line(head, "&DKATUZE;").ok_or(VfkError::MissingLine("&DKATUZE"))?;
    let zoning_id = zoning_line
        .split(';')
        .nth(1)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| VfkError::malformed("&DKATUZE", "missing zoning id field"))?;

    Ok(HeadIdentity {
        zoning_id: zoning_id.to_string(),
        valid_date: from.date(),
    })
}

/// First head line starting with `prefix`, if any.
fn find_line<'a>(head: &'a [String], prefix: &str) -> Option<&'a str> {
    head.iter().map(String::as_str).find(|ln| ln.starts_with(prefix))
}

/// Parses `&HPLATNOST;"from";"to"` into its two timestamps.
///
/// Returns `None` on any shape or timestamp parse failure; the caller
/// decides whether that is a problem or an error.
fn parse_validity(line: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let (_, values) = line.split_once(';')?;
    let (from_raw, to_raw) = values.split_once(';')?;

    let from = parse_quoted_timestamp(from_raw)?;
    let to = parse_quoted_timestamp(to_raw)?;
    Some((from, to))
}

/// Parses one `"dd.mm.yyyy hh:mm:ss"` field, quotes required.
fn parse_quoted_timestamp(field: &str) -> Option<NaiveDateTime> {
    let inner = field.strip_prefix('"')?.strip_suffix('"')?;
    if inner.contains('"') || inner.contains(';') {
        return None;
    }
    NaiveDateTime::parse_from_str(inner, VALIDITY_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_head() -> Vec<String> {
        [
            "&HVFK",
            "&HVERZE;\"6.0\"",
            "&HVYTVORENO;\"01.07.2025 03:12:44\"",
            "&HPUVOD;\"ISKN\"",
            "&HCODEPAGE;\"UTF-8\"",
            "&HSKUPINA;\"NEMU\";\"VLST\"",
            "&HPLATNOST;\"01.07.2025 00:00:00\";\"01.07.2025 00:00:00\"",
            "&HZMENY;0",
            "&BKATUZE;KOD N6;NAZEV T48",
            "&DKATUZE;612065;\"Horní Heršpice\"",
            "&BTEL;ID N30;CISLO_TEL N6",
            "&DTEL;882898702;51",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn without_prefix(prefix: &str) -> Vec<String> {
        valid_head()
            .into_iter()
            .filter(|ln| !ln.starts_with(prefix))
            .collect()
    }

    fn replace_line(prefix: &str, replacement: &str) -> Vec<String> {
        valid_head()
            .into_iter()
            .map(|ln| {
                if ln.starts_with(prefix) {
                    replacement.to_string()
                } else {
                    ln
                }
            })
            .collect()
    }

    #[test]
    fn test_valid_head_has_no_problems_and_an_identity() {
        let report = check_head(&valid_head());
        assert!(report.is_valid(), "problems: {:?}", report.problems);

        let identity = report.identity.expect("identity on valid head");
        assert_eq!(identity.zoning_id, "612065");
        assert_eq!(
            identity.valid_date,
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
        );
    }

    #[test]
    fn test_each_missing_line_reports_only_its_own_problem() {
        let cases = [
            ("&HVERZE;", "Missing VFK version line"),
            ("&HCODEPAGE;", "Missing VFK code page line"),
            ("&HSKUPINA;", "Missing VFK group line"),
            ("&HPLATNOST;", "Missing VFK validity period line"),
            ("&HZMENY;", "Missing VFK change indicator line"),
        ];

        for (prefix, expected) in cases {
            let problems = head_problems(&without_prefix(prefix));
            assert_eq!(problems, vec![expected.to_string()], "prefix {prefix}");
        }
    }

    #[test]
    fn test_wrong_version_is_reported() {
        let head = replace_line("&HVERZE;", "&HVERZE;\"5.4\"");
        assert_eq!(head_problems(&head), vec!["VFK file version is not 6"]);
    }

    #[test]
    fn test_wrong_encoding_is_reported() {
        let head = replace_line("&HCODEPAGE;", "&HCODEPAGE;\"WE8ISO8859P2\"");
        assert_eq!(head_problems(&head), vec!["VFK file encoding is not UTF-8"]);
    }

    #[test]
    fn test_missing_vlst_group_is_reported() {
        let head = replace_line("&HSKUPINA;", "&HSKUPINA;\"NEMU\";\"JPVZ\"");
        assert_eq!(
            head_problems(&head),
            vec!["Group VLST not present in VFK file"]
        );
    }

    #[test]
    fn test_unequal_validity_timestamps_are_reported() {
        let head = replace_line(
            "&HPLATNOST;",
            "&HPLATNOST;\"01.07.2025 00:00:00\";\"02.07.2025 00:00:00\"",
        );
        assert_eq!(
            head_problems(&head),
            vec!["Validity timestamps of the VFK file do not match"]
        );
    }

    #[test]
    fn test_unparseable_validity_period_is_reported() {
        let head = replace_line("&HPLATNOST;", "&HPLATNOST;\"2025-07-01\"");
        assert_eq!(
            head_problems(&head),
            vec!["Unknown VFK validity period format"]
        );
    }

    #[test]
    fn test_change_extract_is_rejected() {
        // &HZMENY;1 marks a delta extract, not a snapshot
        let head = replace_line("&HZMENY;", "&HZMENY;1");
        let report = check_head(&head);
        assert_eq!(
            report.problems,
            vec!["VFK file contains change records, not valid data for a point in time"]
        );
        assert!(report.identity.is_none());
    }

    #[test]
    fn test_invalid_head_never_extracts_identity() {
        let report = check_head(&without_prefix("&HVERZE;"));
        assert!(!report.is_valid());
        assert!(report.identity.is_none());
    }

    #[test]
    fn test_missing_zoning_line_is_a_problem_not_a_panic() {
        let report = check_head(&without_prefix("&DKATUZE;"));
        assert_eq!(report.problems, vec!["Missing header line: &DKATUZE"]);
        assert!(report.identity.is_none());
    }

    #[test]
    fn test_empty_head_reports_every_missing_line() {
        let problems = head_problems(&[]);
        assert_eq!(problems.len(), 5);
        assert!(problems.iter().all(|p| p.starts_with("Missing")));
    }

    #[test]
    fn test_parse_validity_rejects_unquoted_timestamps() {
        assert!(parse_validity("&HPLATNOST;01.07.2025 00:00:00;\"01.07.2025 00:00:00\"").is_none());
        assert!(parse_validity("&HPLATNOST;\"01.07.2025\";\"01.07.2025\"").is_none());
        assert!(parse_validity("&HPLATNOST;").is_none());
    }
}
