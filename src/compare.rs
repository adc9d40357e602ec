//! Identifier and green-light comparison between the MVS extract, the loader
//! sheets and RIM, with the product match as a derived column.

use crate::error::SchemaError;
use crate::index::{IdentifierIndex, IndexSpec};
use crate::matcher::{match_product, Verdict};
use crate::models::{is_in_scope, ColumnConfig, ReconciliationRecord};
use crate::reconcile::{reconcile, ReconciledIdentifier};
use crate::table::Table;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

pub const LOADER_CREATE: &str = "loader_create";
pub const LOADER_UPDATE: &str = "loader_update";
pub const RIM: &str = "rim";

pub struct ComparisonInputs<'a> {
    pub mvs: &'a Table,
    pub loader_create: &'a Table,
    pub loader_update: &'a Table,
    pub rim: &'a Table,
    pub products: &'a Table,
}

fn loader_create_spec(columns: &ColumnConfig) -> IndexSpec {
    IndexSpec::new(&columns.loader_create_id).attribute(&columns.loader_create_greenlight)
}

fn loader_update_spec(columns: &ColumnConfig) -> IndexSpec {
    IndexSpec::new(&columns.loader_update_id).attribute(&columns.loader_update_greenlight)
}

fn rim_spec(columns: &ColumnConfig) -> IndexSpec {
    IndexSpec::new(&columns.rim_external_id)
        .attribute(&columns.rim_greenlight)
        .attribute(&columns.rim_product_family)
        .optional_attribute(&columns.rim_greenlight_date)
        .optional_attribute(&columns.rim_additional_info)
        .optional_attribute(&columns.rim_record_id)
}

fn mvs_spec(columns: &ColumnConfig) -> IndexSpec {
    IndexSpec::new(&columns.mvs_unique_id)
        .attribute(&columns.mvs_out_of_scope)
        .attribute(&columns.mvs_green_light)
        .attribute(&columns.mvs_molecule)
        .optional_attribute(&columns.mvs_implementation_rules)
        .optional_attribute(&columns.mvs_validation_date)
}

/// Index every comparison system, keyed by system name.
pub fn build_indices(
    inputs: &ComparisonInputs<'_>,
    columns: &ColumnConfig,
) -> Result<BTreeMap<String, IdentifierIndex>, SchemaError> {
    let mut indices = BTreeMap::new();
    indices.insert(
        LOADER_CREATE.to_string(),
        IdentifierIndex::build(inputs.loader_create, &loader_create_spec(columns))?,
    );
    indices.insert(
        LOADER_UPDATE.to_string(),
        IdentifierIndex::build(inputs.loader_update, &loader_update_spec(columns))?,
    );
    indices.insert(RIM.to_string(), IdentifierIndex::build(inputs.rim, &rim_spec(columns))?);
    Ok(indices)
}

/// Product id to product name. A repeated id keeps the last name listed.
pub fn product_names(products: &Table, columns: &ColumnConfig) -> Result<HashMap<String, String>, SchemaError> {
    let id_col = products.column(&columns.product_id)?;
    let name_col = products.column(&columns.product_name)?;

    let mut names = HashMap::new();
    for row in 0..products.len() {
        let id = products.cell(row, id_col).trim();
        let name = products.cell(row, name_col).trim();
        if id.is_empty() || name.is_empty() {
            continue;
        }
        names.insert(id.to_string(), name.to_string());
    }
    Ok(names)
}

fn to_record(
    reconciled: &ReconciledIdentifier,
    columns: &ColumnConfig,
    products: &HashMap<String, String>,
) -> ReconciliationRecord {
    let product_family = reconciled.attribute_in(RIM, &columns.rim_product_family);
    let rim_product_name = if product_family.is_empty() {
        String::new()
    } else {
        products.get(product_family).cloned().unwrap_or_default()
    };
    let molecule = reconciled.primary_attribute(&columns.mvs_molecule).to_string();
    let product_match = match_product(&molecule, &rim_product_name);

    ReconciliationRecord {
        unique_id: reconciled.identifier.clone(),
        out_of_scope: reconciled.primary_attribute(&columns.mvs_out_of_scope).to_string(),
        count_in_mvs: reconciled.primary_count,
        count_in_loader_create: reconciled.count_in(LOADER_CREATE),
        count_in_loader_update: reconciled.count_in(LOADER_UPDATE),
        count_in_rim: reconciled.count_in(RIM),
        found_in_rim: reconciled.found_in(RIM),
        green_light_mvs: reconciled.primary_attribute(&columns.mvs_green_light).to_string(),
        implementation_rules: reconciled
            .primary_attribute(&columns.mvs_implementation_rules)
            .to_string(),
        validation_date: reconciled.primary_attribute(&columns.mvs_validation_date).to_string(),
        greenlight_loader_create: reconciled
            .attribute_in(LOADER_CREATE, &columns.loader_create_greenlight)
            .to_string(),
        greenlight_loader_update: reconciled
            .attribute_in(LOADER_UPDATE, &columns.loader_update_greenlight)
            .to_string(),
        greenlight_rim: reconciled.attribute_in(RIM, &columns.rim_greenlight).to_string(),
        rim_greenlight_date: reconciled.attribute_in(RIM, &columns.rim_greenlight_date).to_string(),
        rim_additional_info: reconciled.attribute_in(RIM, &columns.rim_additional_info).to_string(),
        rim_record_id: reconciled.attribute_in(RIM, &columns.rim_record_id).to_string(),
        molecule,
        rim_product_name,
        product_match,
    }
}

/// Build the comparison report rows, sorted by MVS unique id.
pub fn compare(inputs: &ComparisonInputs<'_>, columns: &ColumnConfig) -> Result<Vec<ReconciliationRecord>, SchemaError> {
    let indices = build_indices(inputs, columns)?;
    let products = product_names(inputs.products, columns)?;
    let reconciled = reconcile(inputs.mvs, &mvs_spec(columns), &indices)?;

    let records: Vec<ReconciliationRecord> = reconciled
        .iter()
        .map(|r| to_record(r, columns, &products))
        .collect();

    info!(
        records = records.len(),
        products = products.len(),
        "built comparison records"
    );
    Ok(records)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchTally {
    pub matched: usize,
    pub mismatched: usize,
    pub indeterminate: usize,
}

impl MatchTally {
    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Match => self.matched += 1,
            Verdict::Mismatch => self.mismatched += 1,
            Verdict::Indeterminate => self.indeterminate += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.matched + self.mismatched + self.indeterminate
    }
}

/// Recompute `Product_Match` over an existing comparison table in place.
pub fn apply_product_match(
    table: &mut Table,
    molecule_column: &str,
    product_column: &str,
) -> Result<MatchTally, SchemaError> {
    let molecule_col = table.column(molecule_column)?;
    let product_col = table.column(product_column)?;

    let mut tally = MatchTally::default();
    let verdicts: Vec<String> = (0..table.len())
        .map(|row| {
            let verdict = match_product(table.cell(row, molecule_col), table.cell(row, product_col));
            tally.record(verdict);
            verdict.as_str().to_string()
        })
        .collect();

    table.set_column("Product_Match", verdicts);
    Ok(tally)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonSummary {
    pub exported: usize,
    pub found_in_rim: usize,
    pub not_found_in_rim: usize,
    pub total_mvs_rows: usize,
    pub products: MatchTally,
    pub in_scope_ids: usize,
    pub in_scope_rows: usize,
    /// In-scope ids appearing on more than one MVS row, most frequent first.
    pub repeated_in_scope: Vec<(String, usize)>,
}

impl ComparisonSummary {
    pub fn from_records(records: &[ReconciliationRecord]) -> Self {
        let mut summary = Self {
            exported: records.len(),
            ..Self::default()
        };

        for record in records {
            if record.found_in_rim {
                summary.found_in_rim += 1;
            } else {
                summary.not_found_in_rim += 1;
            }
            summary.total_mvs_rows += record.count_in_mvs;
            summary.products.record(record.product_match);

            if is_in_scope(&record.out_of_scope) {
                summary.in_scope_ids += 1;
                summary.in_scope_rows += record.count_in_mvs;
                if record.count_in_mvs > 1 {
                    summary
                        .repeated_in_scope
                        .push((record.unique_id.clone(), record.count_in_mvs));
                }
            }
        }

        summary
            .repeated_in_scope
            .sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        summary
    }
}
