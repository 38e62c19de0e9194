//! Folding per-category results into a single [`FetchOutcome`]

use crate::category::CURRENT_SCRIPT_VERSION;
use crate::error::CategoryError;
use crate::types::{Category, FetchOutcome};

/// Settled result of one category
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryReport {
    /// The category
    pub category: Category,
    /// Number of artifacts written, or why the category failed
    pub result: Result<usize, CategoryError>,
    /// Fetcher script version reported for this category, if the remote answered
    pub script_version: Option<u32>,
}

impl CategoryReport {
    /// A category that was fetched and written
    pub fn succeeded(category: Category, artifacts: usize, script_version: u32) -> Self {
        Self {
            category,
            result: Ok(artifacts),
            script_version: Some(script_version),
        }
    }

    /// A category that failed
    pub fn failed(category: Category, error: CategoryError) -> Self {
        Self {
            category,
            result: Err(error),
            script_version: None,
        }
    }
}

/// Compose the outcome of a fetch from its category reports
///
/// The result does not depend on the order of `reports`: they are sorted by
/// category before the messages are joined. `success` requires every report to
/// be a success.
pub fn aggregate(mut reports: Vec<CategoryReport>) -> FetchOutcome {
    reports.sort_by_key(|r| r.category);

    let mut errors = Vec::new();
    let mut infos = Vec::new();
    for report in &reports {
        match &report.result {
            Ok(artifacts) => infos.push(format!("{}: {} artifacts", report.category, artifacts)),
            Err(e) => errors.push(format!("{}: {}", report.category, e)),
        }
    }

    let outdated = reports
        .iter()
        .filter(|r| r.result.is_ok())
        .filter_map(|r| r.script_version)
        .filter(|v| *v < CURRENT_SCRIPT_VERSION)
        .min();
    if let Some(version) = outdated {
        infos.push(format!(
            "note: remote fetcher script version {} is outdated, current is {}",
            version, CURRENT_SCRIPT_VERSION
        ));
    }

    FetchOutcome {
        success: errors.is_empty(),
        validation_error: false,
        error: errors.join(", "),
        info: infos.join(", "),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_succeeded() {
        let outcome = aggregate(vec![
            CategoryReport::succeeded(Category::Triggers, 3, 2),
            CategoryReport::succeeded(Category::Scripts, 12, 2),
        ]);

        assert_eq!(
            outcome,
            FetchOutcome {
                success: true,
                validation_error: false,
                error: String::new(),
                info: "scripts: 12 artifacts, triggers: 3 artifacts".to_string(),
            }
        );
    }

    #[test]
    fn partial_failure_reports_both_sides() {
        let outcome = aggregate(vec![
            CategoryReport::succeeded(Category::Scripts, 5, 2),
            CategoryReport::failed(Category::Screens, CategoryError::Timeout),
        ]);

        assert!(!outcome.success);
        assert!(!outcome.validation_error);
        assert_eq!(outcome.error, "screens: timeout");
        assert_eq!(outcome.info, "scripts: 5 artifacts");
    }

    #[test]
    fn order_of_reports_does_not_matter() {
        let reports = vec![
            CategoryReport::failed(Category::ExtraTables, CategoryError::Auth("HTTP 401".into())),
            CategoryReport::succeeded(Category::Scripts, 1, 2),
            CategoryReport::failed(Category::Triggers, CategoryError::Cancelled),
            CategoryReport::succeeded(Category::ScheduledTasks, 4, 2),
        ];
        let mut reversed = reports.clone();
        reversed.reverse();

        assert_eq!(aggregate(reports), aggregate(reversed));
    }

    #[test]
    fn outdated_script_version_adds_a_note() {
        let outcome = aggregate(vec![
            CategoryReport::succeeded(Category::Scripts, 2, 1),
            CategoryReport::succeeded(Category::Triggers, 1, 1),
        ]);

        assert!(outcome.success);
        assert_eq!(
            outcome.info,
            "scripts: 2 artifacts, triggers: 1 artifacts, \
             note: remote fetcher script version 1 is outdated, current is 2"
        );
    }

    #[test]
    fn empty_reports_are_a_trivial_success() {
        let outcome = aggregate(Vec::new());
        assert!(outcome.success);
        assert!(outcome.error.is_empty());
        assert!(outcome.info.is_empty());
    }
}
