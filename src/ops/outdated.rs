//! Parser for `poetry show --outdated` output.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static COLUMN_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +").expect("valid column separator"));

/// Marker column newer Poetry releases insert for packages missing from the
/// environment.
const NOT_INSTALLED_MARKER: &str = "(!)";

/// An installed package with a newer release available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutdatedEntry {
    pub name: String,
    pub current_version: String,
    pub latest_version: String,
}

/// Parse `show --outdated` rows into a map keyed by package name.
///
/// Rows with fewer than four columns are dropped. A later row for the same
/// name replaces an earlier one.
pub fn parse_outdated(text: &str) -> BTreeMap<String, OutdatedEntry> {
    let mut entries = BTreeMap::new();

    for line in text.lines() {
        let mut fields: Vec<&str> = COLUMN_SEPARATOR
            .split(line.trim())
            .filter(|f| !f.is_empty())
            .collect();
        if fields.get(1) == Some(&NOT_INSTALLED_MARKER) {
            fields.remove(1);
        }
        if fields.len() < 4 {
            continue;
        }

        let entry = OutdatedEntry {
            name: fields[0].to_string(),
            current_version: fields[1].to_string(),
            latest_version: fields[2].to_string(),
        };
        entries.insert(entry.name.clone(), entry);
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW_OUTDATED: &str = include_str!("../../tests/fixtures/show-outdated.txt");

    #[test]
    fn test_parse_outdated_fixture() {
        let entries = parse_outdated(SHOW_OUTDATED);

        assert_eq!(entries.len(), 4);
        assert_eq!(
            entries["boto3"],
            OutdatedEntry {
                name: "boto3".into(),
                current_version: "1.13.26".into(),
                latest_version: "1.14.38".into(),
            }
        );
        assert_eq!(entries["botocore"].latest_version, "1.17.38");
        assert_eq!(entries["docutils"].current_version, "0.15.2");
        assert_eq!(entries["docutils"].latest_version, "0.16");
        assert_eq!(entries["pydantic"].latest_version, "1.6.1");
    }

    #[test]
    fn test_short_rows_are_ignored() {
        let text = format!("{}\nshort 1.0\n", SHOW_OUTDATED);
        let entries = parse_outdated(&text);

        assert_eq!(entries.len(), 4);
        assert!(!entries.contains_key("short"));
    }

    #[test]
    fn test_last_row_wins() {
        let text = "foo 1.0 1.1 first\nfoo 1.0 2.0 second\n";
        assert_eq!(parse_outdated(text)["foo"].latest_version, "2.0");
    }

    #[test]
    fn test_not_installed_marker_is_skipped() {
        let entries = parse_outdated("requests (!) 2.24.0 2.25.1 Python HTTP for Humans.\n");
        assert_eq!(entries["requests"].current_version, "2.24.0");
        assert_eq!(entries["requests"].latest_version, "2.25.1");
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_outdated("").is_empty());
    }
}
