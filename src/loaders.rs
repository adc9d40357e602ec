use crate::discrepancy::Discrepancies;
use crate::error::SchemaError;
use crate::index::{IdentifierIndex, IndexSpec};
use crate::models::ColumnConfig;
use crate::table::Table;
use crate::window::{ChangeKind, MigrationWindow};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

/// Row-level counters for one id column of one extract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub total_rows: usize,
    pub non_empty_ids: usize,
    /// Distinct trimmed id fields, pipe lists compared whole.
    pub unique_permutations: usize,
}

impl ExtractStats {
    pub fn of(table: &Table, id_column: &str) -> Result<Self, SchemaError> {
        let col = table.column(id_column)?;
        let mut permutations = BTreeSet::new();
        let mut non_empty_ids = 0;
        for row in 0..table.len() {
            let value = table.cell(row, col).trim();
            if !value.is_empty() {
                non_empty_ids += 1;
                permutations.insert(value);
            }
        }
        Ok(Self {
            total_rows: table.len(),
            non_empty_ids,
            unique_permutations: permutations.len(),
        })
    }
}

/// Loader expectations against what RIM shows for the migration window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoaderComparison {
    #[serde(rename = "Create_Expected_Total_Rows")]
    pub create_expected_rows: usize,
    #[serde(rename = "Create_Expected_NonNull_IDs")]
    pub create_expected_ids: usize,
    #[serde(rename = "Create_Expected_Unique_IDs")]
    pub create_expected_unique: usize,
    #[serde(rename = "RIM_Created_Total_Rows")]
    pub rim_created_rows: usize,
    #[serde(rename = "RIM_Created_NonNull_IDs")]
    pub rim_created_ids: usize,
    #[serde(rename = "RIM_Created_Unique_IDs")]
    pub rim_created_unique: usize,
    #[serde(rename = "Update_Expected_Total_Rows")]
    pub update_expected_rows: usize,
    #[serde(rename = "Update_Expected_NonNull_IDs")]
    pub update_expected_ids: usize,
    #[serde(rename = "Update_Expected_Unique_IDs")]
    pub update_expected_unique: usize,
    #[serde(rename = "RIM_Updated_Total_Rows")]
    pub rim_updated_rows: usize,
    #[serde(rename = "RIM_Updated_NonNull_IDs")]
    pub rim_updated_ids: usize,
    #[serde(rename = "RIM_Updated_Unique_IDs")]
    pub rim_updated_unique: usize,
    #[serde(rename = "Create_Discrepancies")]
    pub create_discrepancies: String,
    #[serde(rename = "Update_Discrepancies")]
    pub update_discrepancies: String,
}

/// Split the RIM extract into rows created and rows updated during the window.
pub fn split_by_change(
    rim: &Table,
    columns: &ColumnConfig,
    window: &MigrationWindow,
) -> Result<(Table, Table), SchemaError> {
    let created_col = rim.column(&columns.rim_created_date)?;
    let modified_col = rim.column(&columns.rim_modified_date)?;

    let kinds: Vec<Option<ChangeKind>> = (0..rim.len())
        .map(|row| window.classify(rim.cell(row, created_col), rim.cell(row, modified_col)))
        .collect();

    let created = rim.filter_rows(|row| kinds[row] == Some(ChangeKind::Created));
    let updated = rim.filter_rows(|row| kinds[row] == Some(ChangeKind::Updated));
    Ok((created, updated))
}

fn identifiers(table: &Table, id_column: &str) -> Result<BTreeSet<String>, SchemaError> {
    Ok(IdentifierIndex::build(table, &IndexSpec::new(id_column))?.identifiers())
}

pub fn compare_loaders(
    loader_create: &Table,
    loader_update: &Table,
    rim: &Table,
    columns: &ColumnConfig,
    window: &MigrationWindow,
) -> Result<LoaderComparison, SchemaError> {
    rim.column(&columns.rim_external_id)?;
    let (created, updated) = split_by_change(rim, columns, window)?;

    let create_expected = ExtractStats::of(loader_create, &columns.loader_create_id)?;
    let rim_created = ExtractStats::of(&created, &columns.rim_external_id)?;
    let update_expected = ExtractStats::of(loader_update, &columns.loader_update_id)?;
    let rim_updated = ExtractStats::of(&updated, &columns.rim_external_id)?;

    let create_discrepancies = Discrepancies::between(
        &identifiers(loader_create, &columns.loader_create_id)?,
        &identifiers(&created, &columns.rim_external_id)?,
    );
    let update_discrepancies = Discrepancies::between(
        &identifiers(loader_update, &columns.loader_update_id)?,
        &identifiers(&updated, &columns.rim_external_id)?,
    );

    info!(
        expected_not_created = create_discrepancies.expected_not_observed.len(),
        created_not_expected = create_discrepancies.observed_not_expected.len(),
        expected_not_updated = update_discrepancies.expected_not_observed.len(),
        updated_not_expected = update_discrepancies.observed_not_expected.len(),
        "compared loaders to RIM"
    );

    Ok(LoaderComparison {
        create_expected_rows: create_expected.total_rows,
        create_expected_ids: create_expected.non_empty_ids,
        create_expected_unique: create_expected.unique_permutations,
        rim_created_rows: rim_created.total_rows,
        rim_created_ids: rim_created.non_empty_ids,
        rim_created_unique: rim_created.unique_permutations,
        update_expected_rows: update_expected.total_rows,
        update_expected_ids: update_expected.non_empty_ids,
        update_expected_unique: update_expected.unique_permutations,
        rim_updated_rows: rim_updated.total_rows,
        rim_updated_ids: rim_updated.non_empty_ids,
        rim_updated_unique: rim_updated.unique_permutations,
        create_discrepancies: create_discrepancies.render_outcome("created"),
        update_discrepancies: update_discrepancies.render_outcome("updated"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::table;

    fn window() -> MigrationWindow {
        MigrationWindow::parse("2025-09-10T00:00:00.000Z", "2025-09-18T23:59:59.000Z").unwrap()
    }

    fn rim() -> Table {
        table(
            "RIM",
            &["external_id__c", "created_date__v", "modified_date__v"],
            &[
                &["A|B", "2025-09-11T08:00:00.000Z", "2025-09-11T09:00:00.000Z"],
                &["C", "2025-09-12T08:00:00.000Z", "2025-09-12T08:00:00.000Z"],
                &["U1", "2024-03-01T00:00:00.000Z", "2025-09-15T00:00:00.000Z"],
                &["OLD", "2024-03-01T00:00:00.000Z", "2024-04-01T00:00:00.000Z"],
                &["", "2025-09-12T08:00:00.000Z", "2025-09-12T08:00:00.000Z"],
            ],
        )
    }

    #[test]
    fn stats_count_rows_ids_and_permutations() {
        let t = table("loader", &["external_id__v"], &[&["A|B"], &[" A|B "], &[""], &["C"]]);
        let stats = ExtractStats::of(&t, "external_id__v").unwrap();
        assert_eq!(
            stats,
            ExtractStats {
                total_rows: 4,
                non_empty_ids: 3,
                unique_permutations: 2
            }
        );
    }

    #[test]
    fn compares_expected_against_window() {
        let create = table("RO Loader Create", &["external_id__v"], &[&["A|B"], &["D"]]);
        let update = table("RO Loader Update", &["external_id__c"], &[&["U1"]]);

        let result = compare_loaders(&create, &update, &rim(), &ColumnConfig::default(), &window()).unwrap();

        assert_eq!(result.create_expected_rows, 2);
        assert_eq!(result.rim_created_rows, 3);
        assert_eq!(result.rim_created_ids, 2);
        assert_eq!(result.rim_updated_rows, 1);
        assert_eq!(
            result.create_discrepancies,
            "Expected but not created: D | Created but not expected: C"
        );
        assert_eq!(result.update_discrepancies, "");
    }

    #[test]
    fn missing_date_column_fails() {
        let rim = table("RIM", &["external_id__c", "created_date__v"], &[]);
        let empty = table("loader", &["external_id__v", "external_id__c"], &[]);
        let err = compare_loaders(&empty, &empty, &rim, &ColumnConfig::default(), &window()).unwrap_err();
        assert_eq!(err.column, "modified_date__v");
    }
}
