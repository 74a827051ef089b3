//! Parser for `poetry install --dry-run` output.
//!
//! The renderer is human-oriented, so this is a column scraper. Known
//! shapes, one per Poetry release line:
//!
//! ```text
//!   - Skipping six (1.15.0) Already installed                                      1.0
//!   - Installing attrs (19.3.0)                                                    1.0
//!   • Installing six (1.15.0): Skipped for the following reason: Already installed 1.1+
//!   • Installing attrs (19.3.0)                                                    1.1+
//! ```
//!
//! Splitting on single spaces puts the name at token 4 and the
//! parenthesized version at token 5 in every shape above.

use crate::core::package::Package;
use crate::core::requirement::Requirement;

const ALREADY_INSTALLED: &str = "Already installed";
const INSTALLING: &str = "Installing";
const CURRENT_PROJECT: &str = "Installing the current project";

const NAME_COLUMN: usize = 4;
const VERSION_COLUMN: usize = 5;

/// Packages reported by a dry-run install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DryRunReport {
    /// Packages the environment already has
    pub installed: Vec<Package>,
    /// Requirements the install would bring in
    pub to_install: Vec<Requirement>,
}

impl DryRunReport {
    /// Split into `(installed, to_install)`.
    pub fn into_parts(self) -> (Vec<Package>, Vec<Requirement>) {
        (self.installed, self.to_install)
    }
}

/// Parse dry-run output into installed packages and pending requirements.
///
/// Both lists keep first-seen order with duplicates removed. Lines too short
/// to hold a name and version column are skipped.
pub fn parse_dry_run(text: &str) -> DryRunReport {
    let mut report = DryRunReport::default();

    for line in text.lines().map(|l| l.trim_end_matches('\r')) {
        if !(line.ends_with(')') || line.ends_with(ALREADY_INSTALLED)) {
            continue;
        }
        if line.trim_start().starts_with(CURRENT_PROJECT) {
            continue;
        }

        let Some((name, version)) = name_and_version(line) else {
            tracing::debug!("skipping short dry-run line: {:?}", line);
            continue;
        };

        if line.contains(ALREADY_INSTALLED) {
            if let Ok(package) = Package::new(name, version) {
                push_unique(&mut report.installed, package);
            }
        } else if line.contains(INSTALLING) {
            if let Ok(requirement) = Requirement::pinned(name, &version) {
                push_unique(&mut report.to_install, requirement);
            }
        }
    }

    report
}

fn name_and_version(line: &str) -> Option<(&str, String)> {
    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() <= VERSION_COLUMN {
        return None;
    }

    let name = tokens[NAME_COLUMN];
    let version = tokens[VERSION_COLUMN].replace(['(', ')'], "");
    let version = version.trim_end_matches(':').to_string();

    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name, version))
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}
