use crate::error::SchemaError;
use crate::loaders::split_by_change;
use crate::models::ColumnConfig;
use crate::table::Table;
use crate::window::{parse_vault_timestamp, MigrationWindow};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedJoins {
    #[serde(rename = "External_ID")]
    pub external_id: String,
    #[serde(rename = "Registration_Joins")]
    pub registration_joins: usize,
    #[serde(rename = "Drug_Product_Joins")]
    pub drug_product_joins: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatedJoins {
    #[serde(rename = "External_ID")]
    pub external_id: String,
    #[serde(rename = "Total_Drug_Product_Joins")]
    pub total_drug_product_joins: usize,
    /// Joins that existed before the window and were touched during it.
    #[serde(rename = "Filtered_Drug_Product_Joins")]
    pub migrated_drug_product_joins: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinAnalysis {
    pub created: Vec<CreatedJoins>,
    pub updated: Vec<UpdatedJoins>,
}

/// Occurrences of each trimmed, non-blank value of `column`.
fn count_by(table: &Table, column: usize, mut keep: impl FnMut(usize) -> bool) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for row in 0..table.len() {
        let value = table.cell(row, column).trim();
        if value.is_empty() || !keep(row) {
            continue;
        }
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}

fn lookup(counts: &HashMap<String, usize>, id: &str) -> usize {
    counts.get(id.trim()).copied().unwrap_or(0)
}

pub fn analyse_joins(
    rim: &Table,
    registration_joins: &Table,
    drug_product_joins: &Table,
    columns: &ColumnConfig,
    window: &MigrationWindow,
) -> Result<JoinAnalysis, SchemaError> {
    let external_col = rim.column(&columns.rim_external_id)?;
    let id_col = rim.column(&columns.rim_record_id)?;
    let registration_col = registration_joins.column(&columns.registration_join_objective)?;
    let drug_col = drug_product_joins.column(&columns.drug_join_objective)?;
    let drug_created_col = drug_product_joins.column(&columns.rim_created_date)?;
    let drug_modified_col = drug_product_joins.column(&columns.rim_modified_date)?;

    let (created, updated) = split_by_change(rim, columns, window)?;

    let registration_counts = count_by(registration_joins, registration_col, |_| true);
    let drug_counts = count_by(drug_product_joins, drug_col, |_| true);
    let migrated_drug_counts = count_by(drug_product_joins, drug_col, |row| {
        let created_at = parse_vault_timestamp(drug_product_joins.cell(row, drug_created_col));
        let modified_at = parse_vault_timestamp(drug_product_joins.cell(row, drug_modified_col));
        window.is_before(created_at) && window.contains(modified_at)
    });

    let created: Vec<CreatedJoins> = (0..created.len())
        .map(|row| {
            let record_id = created.cell(row, id_col);
            CreatedJoins {
                external_id: created.cell(row, external_col).trim().to_string(),
                registration_joins: lookup(&registration_counts, record_id),
                drug_product_joins: lookup(&drug_counts, record_id),
            }
        })
        .collect();

    let updated: Vec<UpdatedJoins> = (0..updated.len())
        .map(|row| {
            let record_id = updated.cell(row, id_col);
            UpdatedJoins {
                external_id: updated.cell(row, external_col).trim().to_string(),
                total_drug_product_joins: lookup(&drug_counts, record_id),
                migrated_drug_product_joins: lookup(&migrated_drug_counts, record_id),
            }
        })
        .collect();

    info!(created = created.len(), updated = updated.len(), "analysed RIM joins");
    Ok(JoinAnalysis { created, updated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::table;

    #[test]
    fn counts_joins_for_created_and_updated() {
        let window = MigrationWindow::parse("2025-09-10T00:00:00Z", "2025-09-18T23:59:59Z").unwrap();
        let rim = table(
            "RIM",
            &["id", "external_id__c", "created_date__v", "modified_date__v"],
            &[
                &["V1", "A", "2025-09-11T00:00:00Z", "2025-09-11T00:00:00Z"],
                &["V2", "B", "2024-01-01T00:00:00Z", "2025-09-12T00:00:00Z"],
                &["V3", "C", "2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"],
            ],
        );
        let registrations = table(
            "Registration joins",
            &["regulatory_objective__rim"],
            &[&["V1"], &["V1"], &["V3"]],
        );
        let drugs = table(
            "Drug product joins",
            &["regulatory_objective__v", "created_date__v", "modified_date__v"],
            &[
                &["V1", "2025-09-11T00:00:00Z", "2025-09-11T00:00:00Z"],
                &["V2", "2024-01-01T00:00:00Z", "2025-09-12T00:00:00Z"],
                &["V2", "2025-09-12T00:00:00Z", "2025-09-12T00:00:00Z"],
            ],
        );

        let analysis = analyse_joins(&rim, &registrations, &drugs, &ColumnConfig::default(), &window).unwrap();

        assert_eq!(
            analysis.created,
            vec![CreatedJoins {
                external_id: "A".into(),
                registration_joins: 2,
                drug_product_joins: 1
            }]
        );
        assert_eq!(
            analysis.updated,
            vec![UpdatedJoins {
                external_id: "B".into(),
                total_drug_product_joins: 2,
                migrated_drug_product_joins: 1
            }]
        );
    }

    #[test]
    fn join_table_without_objective_column_fails() {
        let window = MigrationWindow::parse("2025-09-10", "2025-09-18").unwrap();
        let rim = table("RIM", &["id", "external_id__c", "created_date__v", "modified_date__v"], &[]);
        let registrations = table("Registration joins", &["registration"], &[]);
        let drugs = table("Drug product joins", &["regulatory_objective__v"], &[]);

        let err = analyse_joins(&rim, &registrations, &drugs, &ColumnConfig::default(), &window).unwrap_err();
        assert_eq!(err.table, "Registration joins");
    }
}
