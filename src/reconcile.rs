use crate::error::SchemaError;
use crate::index::{IdentifierIndex, IndexSpec};
use crate::table::Table;
use std::collections::BTreeMap;
use tracing::info;

/// Presence of one business identifier in one comparison system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemPresence {
    pub count: usize,
    pub attributes: BTreeMap<String, String>,
}

/// Everything known about one business identifier across all systems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledIdentifier {
    pub identifier: String,
    pub primary_count: usize,
    pub primary_attributes: BTreeMap<String, String>,
    pub systems: BTreeMap<String, SystemPresence>,
}

impl ReconciledIdentifier {
    pub fn primary_attribute(&self, name: &str) -> &str {
        self.primary_attributes.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn count_in(&self, system: &str) -> usize {
        self.systems.get(system).map(|s| s.count).unwrap_or(0)
    }

    pub fn found_in(&self, system: &str) -> bool {
        self.count_in(system) > 0
    }

    pub fn attribute_in(&self, system: &str, attribute: &str) -> &str {
        self.systems
            .get(system)
            .and_then(|s| s.attributes.get(attribute))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Join the primary table against every comparison index.
///
/// Primary rows are grouped by their trimmed business identifier (the whole
/// field, composite keys included); blank identifiers are skipped. Every row
/// counts, and each primary attribute takes the first non-blank value in its
/// group. Output is sorted ascending by identifier.
pub fn reconcile(
    primary: &Table,
    spec: &IndexSpec,
    indices: &BTreeMap<String, IdentifierIndex>,
) -> Result<Vec<ReconciledIdentifier>, SchemaError> {
    let columns = spec.resolve(primary)?;
    let attribute_names = spec.attribute_names();

    let mut grouped: BTreeMap<String, (usize, Vec<String>)> = BTreeMap::new();
    for row in 0..primary.len() {
        let id = primary.cell(row, columns.id).trim();
        if id.is_empty() {
            continue;
        }
        let values = columns.values(primary, row);
        let group = grouped
            .entry(id.to_string())
            .or_insert_with(|| (0, vec![String::new(); values.len()]));
        group.0 += 1;
        // each attribute keeps the first non-blank value of its group
        for (kept, value) in group.1.iter_mut().zip(values) {
            if kept.is_empty() {
                *kept = value;
            }
        }
    }

    let records: Vec<ReconciledIdentifier> = grouped
        .into_iter()
        .map(|(identifier, (primary_count, values))| {
            let primary_attributes = attribute_names.iter().cloned().zip(values).collect();

            let systems = indices
                .iter()
                .map(|(system, index)| {
                    let presence = match index.get(&identifier) {
                        Some(entry) => SystemPresence {
                            count: entry.count,
                            attributes: index
                                .attribute_names()
                                .iter()
                                .cloned()
                                .zip(entry.attributes.iter().cloned())
                                .collect(),
                        },
                        None => SystemPresence::default(),
                    };
                    (system.clone(), presence)
                })
                .collect();

            ReconciledIdentifier {
                identifier,
                primary_count,
                primary_attributes,
                systems,
            }
        })
        .collect();

    info!(
        table = primary.name(),
        rows = primary.len(),
        identifiers = records.len(),
        systems = indices.len(),
        "reconciled business identifiers"
    );
    Ok(records)
}
