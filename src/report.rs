use crate::append::AppendReport;
use crate::compare::{ComparisonSummary, MatchTally};
use crate::loaders::LoaderComparison;
use chrono::Local;

const RULE: &str = "======================================================================";
const THIN_RULE: &str = "----------------------------------------------------------------------";

/// How many repeated in-scope ids the comparison summary lists.
const REPEATED_LISTED: usize = 20;

fn header(title: &str) -> String {
    format!(
        "{}\n{}\n{}\nGenerated: {}\n\n",
        RULE,
        title,
        RULE,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

pub fn product_tally_lines(tally: &MatchTally) -> String {
    format!(
        "  Product matches (TRUE): {}\n  Product non-matches (FALSE): {}\n  Empty RIM data: {}\n",
        tally.matched, tally.mismatched, tally.indeterminate
    )
}

pub fn comparison_summary(summary: &ComparisonSummary) -> String {
    let mut content = header("MVS UNIQUE IDS FOUND IN RIM");

    content.push_str("SUMMARY:\n");
    content.push_str(&format!("  Exported MVS Unique IDs: {}\n", summary.exported));
    content.push_str(&format!("  Found in RIM: {}\n", summary.found_in_rim));
    content.push_str(&format!("  Not found in RIM: {}\n", summary.not_found_in_rim));
    content.push_str(&format!("  Total MVS entries: {}\n", summary.total_mvs_rows));
    content.push_str(&product_tally_lines(&summary.products));
    content.push('\n');

    content.push_str("IN SCOPE:\n");
    content.push_str(&format!("  Unique IDs in scope: {}\n", summary.in_scope_ids));
    content.push_str(&format!("  MVS rows in scope: {}\n", summary.in_scope_rows));
    content.push_str(&format!(
        "  IDs appearing more than once: {}\n",
        summary.repeated_in_scope.len()
    ));

    if !summary.repeated_in_scope.is_empty() {
        content.push_str(&format!("\nTop {} repeated IDs:\n", REPEATED_LISTED));
        content.push_str(THIN_RULE);
        content.push('\n');
        for (i, (id, count)) in summary.repeated_in_scope.iter().take(REPEATED_LISTED).enumerate() {
            content.push_str(&format!("  {}. {}: appears {} times\n", i + 1, id, count));
        }
    }

    content
}

pub fn loader_summary(comparison: &LoaderComparison, window_start: &str, window_end: &str) -> String {
    let mut content = String::new();
    content.push_str(&format!("Migration date range: {} to {}\n\n", window_start, window_end));

    let sections = [
        (
            "RO expected to be created (Loader Create)",
            comparison.create_expected_rows,
            comparison.create_expected_ids,
            comparison.create_expected_unique,
        ),
        (
            "RO created in RIM (created & modified in range)",
            comparison.rim_created_rows,
            comparison.rim_created_ids,
            comparison.rim_created_unique,
        ),
        (
            "RO expected to be updated (Loader Update)",
            comparison.update_expected_rows,
            comparison.update_expected_ids,
            comparison.update_expected_unique,
        ),
        (
            "RO updated in RIM (modified in range, created before)",
            comparison.rim_updated_rows,
            comparison.rim_updated_ids,
            comparison.rim_updated_unique,
        ),
    ];

    for (title, rows, ids, unique) in sections {
        content.push_str(&format!(
            "{}:\n  Total rows: {}\n  Non-null/empty IDs: {}\n  Unique ID permutations: {}\n",
            title, rows, ids, unique
        ));
    }

    for (label, text) in [
        ("Create discrepancies", &comparison.create_discrepancies),
        ("Update discrepancies", &comparison.update_discrepancies),
    ] {
        if text.is_empty() {
            content.push_str(&format!("{}: none\n", label));
        } else {
            content.push_str(&format!("{}: {}\n", label, text));
        }
    }

    content
}

pub fn append_quality(report: &AppendReport) -> String {
    let mut content = header("MVS FILES APPEND QUALITY REPORT");

    let sum_rows = report.sum_of_file_rows();
    content.push_str("SUMMARY:\n");
    content.push_str(&format!("  Total files found: {}\n", report.files.len()));
    content.push_str(&format!("  Successfully processed: {}\n", report.files.len()));
    content.push_str(&format!("  Sum of individual file rows: {}\n", sum_rows));
    content.push_str(&format!("  Total rows in appended file: {}\n", report.total_rows));

    let difference = report.total_rows as i64 - sum_rows as i64;
    if difference == 0 {
        content.push_str("  SUCCESS: Row count validation: PASSED (no data loss/duplication)\n");
    } else if difference > 0 {
        content.push_str(&format!(
            "  WARNING: Row count validation: FAILED (+{} extra rows - possible duplication)\n",
            difference
        ));
    } else {
        content.push_str(&format!(
            "  ERROR: Row count validation: FAILED ({} missing rows - data loss detected)\n",
            difference
        ));
    }
    content.push('\n');

    content.push_str("FILE DETAILS:\n");
    content.push_str(THIN_RULE);
    content.push('\n');
    for file in &report.files {
        content.push_str(&format!(
            "File: {}\n  Rows: {}\n  Columns: {}\n\n",
            file.file_name, file.rows, file.columns.len()
        ));
    }

    let all_columns = report.all_columns();
    content.push_str("COLUMN ANALYSIS:\n");
    content.push_str(THIN_RULE);
    content.push('\n');
    content.push_str(&format!("Total unique columns found: {}\n", all_columns.len()));
    content.push_str(&format!(
        "Columns: {}\n",
        all_columns.into_iter().collect::<Vec<_>>().join(", ")
    ));

    content
}

pub fn extract_summary(record_count: usize, columns: &[String], elapsed_secs: f64) -> String {
    let mut content = header("RIM PROD DATA EXTRACTION REPORT");
    content.push_str("Object: regulatory_objective__rim\n");
    content.push_str(&format!("Execution time: {:.2} seconds\n\n", elapsed_secs));

    content.push_str("SUMMARY:\n");
    content.push_str(THIN_RULE);
    content.push('\n');
    content.push_str(&format!("Total records extracted: {}\n", record_count));
    content.push_str(&format!("Total columns: {}\n\n", columns.len()));

    content.push_str("COLUMNS EXTRACTED:\n");
    content.push_str(THIN_RULE);
    content.push('\n');
    for (i, column) in columns.iter().enumerate() {
        content.push_str(&format!("{:3}. {}\n", i + 1, column));
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_summary_lists_repeated_ids() {
        let summary = ComparisonSummary {
            exported: 2,
            found_in_rim: 1,
            not_found_in_rim: 1,
            total_mvs_rows: 3,
            repeated_in_scope: vec![("X1".to_string(), 2)],
            in_scope_ids: 1,
            in_scope_rows: 2,
            ..ComparisonSummary::default()
        };
        let text = comparison_summary(&summary);
        assert!(text.contains("Found in RIM: 1"));
        assert!(text.contains("  1. X1: appears 2 times"));
    }

    #[test]
    fn loader_summary_marks_clean_categories() {
        let comparison = LoaderComparison {
            create_expected_rows: 2,
            create_expected_ids: 2,
            create_expected_unique: 2,
            rim_created_rows: 2,
            rim_created_ids: 2,
            rim_created_unique: 2,
            update_expected_rows: 0,
            update_expected_ids: 0,
            update_expected_unique: 0,
            rim_updated_rows: 0,
            rim_updated_ids: 0,
            rim_updated_unique: 0,
            create_discrepancies: "Expected but not created: D".to_string(),
            update_discrepancies: String::new(),
        };
        let text = loader_summary(&comparison, "start", "end");
        assert!(text.contains("Create discrepancies: Expected but not created: D"));
        assert!(text.contains("Update discrepancies: none"));
    }
}
