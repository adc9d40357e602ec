//! Identifier indices over pipe-delimited identifier columns.
//!
//! Every source table in the migration carries its business identifiers as a
//! `|`-separated list. An index maps each atomic identifier to the number of
//! rows mentioning it and to the auxiliary values of the first such row.

use crate::error::SchemaError;
use crate::table::Table;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Atomic identifiers of one raw identifier field: split on `|`, trimmed, blanks dropped.
pub fn split_identifiers(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('|').map(str::trim).filter(|id| !id.is_empty())
}

/// An auxiliary column captured alongside the identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeColumn {
    pub name: String,
    pub required: bool,
}

/// Which columns of a table feed an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub id_column: String,
    pub attributes: Vec<AttributeColumn>,
}

impl IndexSpec {
    pub fn new(id_column: impl Into<String>) -> Self {
        Self {
            id_column: id_column.into(),
            attributes: Vec::new(),
        }
    }

    /// Capture a column that must be present.
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(AttributeColumn {
            name: name.into(),
            required: true,
        });
        self
    }

    /// Capture a column if present; absent columns read blank.
    pub fn optional_attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(AttributeColumn {
            name: name.into(),
            required: false,
        });
        self
    }

    /// Resolve column positions against a table once, up front.
    pub(crate) fn resolve(&self, table: &Table) -> Result<ResolvedColumns, SchemaError> {
        let id = table.column(&self.id_column)?;
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            let position = if attribute.required {
                Some(table.column(&attribute.name)?)
            } else {
                table.optional_column(&attribute.name)
            };
            attributes.push(position);
        }
        Ok(ResolvedColumns { id, attributes })
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.clone()).collect()
    }
}

pub(crate) struct ResolvedColumns {
    pub id: usize,
    pub attributes: Vec<Option<usize>>,
}

impl ResolvedColumns {
    /// Trimmed auxiliary values of one row, in declaration order.
    pub fn values(&self, table: &Table, row: usize) -> Vec<String> {
        self.attributes
            .iter()
            .map(|col| col.map(|c| table.cell(row, c).trim().to_string()).unwrap_or_default())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    pub count: usize,
    /// Values from the first row naming this identifier, aligned with the index's attribute names.
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierIndex {
    attribute_names: Vec<String>,
    entries: HashMap<String, IndexEntry>,
}

impl IdentifierIndex {
    /// Scan `table` in row order.
    ///
    /// An identifier repeated within one row is counted once per mention;
    /// auxiliary values are taken from the first row only.
    pub fn build(table: &Table, spec: &IndexSpec) -> Result<Self, SchemaError> {
        let columns = spec.resolve(table)?;
        let mut index = Self {
            attribute_names: spec.attribute_names(),
            entries: HashMap::new(),
        };

        for row in 0..table.len() {
            let raw = table.cell(row, columns.id);
            let mut values: Option<Vec<String>> = None;
            for id in split_identifiers(raw) {
                let entry = index.entries.entry(id.to_string()).or_insert_with(|| IndexEntry {
                    count: 0,
                    attributes: values.get_or_insert_with(|| columns.values(table, row)).clone(),
                });
                entry.count += 1;
            }
        }

        debug!(
            table = table.name(),
            column = %spec.id_column,
            identifiers = index.entries.len(),
            "built identifier index"
        );
        Ok(index)
    }

    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// Rows mentioning `id`; zero when absent.
    pub fn count(&self, id: &str) -> usize {
        self.entries.get(id).map(|e| e.count).unwrap_or(0)
    }

    /// First-seen value of `attribute` for `id`; blank when either is unknown.
    pub fn attribute(&self, id: &str, attribute: &str) -> &str {
        let Some(position) = self.attribute_names.iter().position(|a| a == attribute) else {
            return "";
        };
        self.entries
            .get(id)
            .and_then(|e| e.attributes.get(position))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn identifiers(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }
}
