use crate::error::SchemaError;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

/// An in-memory tabular extract: a header row plus string cells.
///
/// Cells that are missing (short rows) read as blank, which is how the
/// migration extracts represent absent values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Read a CSV file whose header is the first row.
    pub fn from_csv_path(name: impl Into<String>, path: &Path) -> Result<Self> {
        Self::from_csv_path_skipping(name, path, 0)
    }

    /// Read a CSV file, discarding `skip_rows` banner rows above the header.
    pub fn from_csv_path_skipping(name: impl Into<String>, path: &Path, skip_rows: usize) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;

        let mut records = reader.records().skip(skip_rows);

        let headers: Vec<String> = match records.next() {
            Some(record) => record
                .with_context(|| format!("Failed to read header of: {}", path.display()))?
                .iter()
                .map(|h| h.trim_start_matches('\u{feff}').to_string())
                .collect(),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        for record in records {
            let record = record.with_context(|| format!("Failed to read row of: {}", path.display()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        let table = Self::new(name, headers, rows);
        debug!(table = %table.name, rows = table.len(), columns = table.headers.len(), "read csv");
        Ok(table)
    }

    /// Build a table from flat string-keyed records, as returned by the remote query client.
    /// Columns appear in first-seen order across all records.
    pub fn from_records(name: impl Into<String>, records: &[BTreeMap<String, String>]) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| record.get(h).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        Self::new(name, headers, rows)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column that must exist.
    pub fn column(&self, name: &str) -> Result<usize, SchemaError> {
        self.optional_column(name)
            .ok_or_else(|| SchemaError::new(name, &self.name))
    }

    pub fn optional_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell value, blank when the row is shorter than the header.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Keep only the rows accepted by `keep`, preserving order.
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(usize) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(*i))
            .map(|(_, r)| r.clone())
            .collect();
        Table::new(self.name.clone(), self.headers.clone(), rows)
    }

    /// Add or replace a column with one value per row.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) {
        let width = self.headers.len();
        let position = match self.optional_column(name) {
            Some(p) => p,
            None => {
                self.headers.push(name.to_string());
                width
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            if row.len() <= position {
                row.resize(position + 1, String::new());
            }
            row[position] = value;
        }
    }

    /// Concatenate another table below this one. The column set becomes the
    /// union in first-seen order; cells for columns a table lacks are blank.
    pub fn append(&mut self, other: &Table) {
        for header in &other.headers {
            if !self.headers.contains(header) {
                self.headers.push(header.clone());
            }
        }

        let width = self.headers.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }

        let mapping: Vec<usize> = other
            .headers
            .iter()
            .filter_map(|h| self.optional_column(h))
            .collect();

        for (i, _) in other.rows.iter().enumerate() {
            let mut row = vec![String::new(); width];
            for (source_col, target_col) in mapping.iter().enumerate() {
                row[*target_col] = other.cell(i, source_col).to_string();
            }
            self.rows.push(row);
        }
    }

    /// A table holding only `columns`, in the order given.
    pub fn select(&self, columns: &[&str]) -> Result<Table, SchemaError> {
        let positions = columns
            .iter()
            .map(|c| self.column(c))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = (0..self.len())
            .map(|row| positions.iter().map(|&c| self.cell(row, c).to_string()).collect())
            .collect();
        Ok(Table::new(
            self.name.clone(),
            columns.iter().map(|c| c.to_string()).collect(),
            rows,
        ))
    }

    /// Left outer join on trimmed key values.
    ///
    /// Every row of `self` appears once per matching row of `right`, or once
    /// with blank right-hand cells when nothing matches; blank keys never
    /// match. Column names present on both sides get `_x` / `_y` suffixes.
    pub fn left_join(&self, left_key: &str, right: &Table, right_key: &str) -> Result<Table, SchemaError> {
        let left_col = self.column(left_key)?;
        let right_col = right.column(right_key)?;

        let mut matches: HashMap<&str, Vec<usize>> = HashMap::new();
        for row in 0..right.len() {
            let key = right.cell(row, right_col).trim();
            if !key.is_empty() {
                matches.entry(key).or_default().push(row);
            }
        }

        let suffixed = |name: &String, other: &[String], suffix: &str| {
            if other.contains(name) {
                format!("{}{}", name, suffix)
            } else {
                name.clone()
            }
        };
        let mut headers: Vec<String> = self
            .headers
            .iter()
            .map(|h| suffixed(h, &right.headers[..], "_x"))
            .collect();
        headers.extend(right.headers.iter().map(|h| suffixed(h, &self.headers[..], "_y")));

        let left_width = self.headers.len();
        let right_width = right.headers.len();
        let mut rows = Vec::with_capacity(self.len());
        for row in 0..self.len() {
            let left: Vec<String> = (0..left_width).map(|c| self.cell(row, c).to_string()).collect();
            match matches.get(self.cell(row, left_col).trim()) {
                Some(hits) => {
                    for &hit in hits {
                        let mut joined = left.clone();
                        joined.extend((0..right_width).map(|c| right.cell(hit, c).to_string()));
                        rows.push(joined);
                    }
                }
                None => {
                    let mut joined = left;
                    joined.resize(left_width + right_width, String::new());
                    rows.push(joined);
                }
            }
        }

        debug!(left = %self.name, right = %right.name, rows = rows.len(), "left join");
        Ok(Table::new(self.name.clone(), headers, rows))
    }

    /// Write the table as CSV, padding short rows to the header width.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.headers)?;
        for i in 0..self.rows.len() {
            let row: Vec<&str> = (0..self.headers.len()).map(|c| self.cell(i, c)).collect();
            csv_writer.write_record(&row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> Table {
    Table::new(
        name,
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_column_is_schema_error() {
        let t = table("RIM extract", &["id"], &[]);
        let err = t.column("external_id__c").unwrap_err();
        assert_eq!(err.column, "external_id__c");
        assert_eq!(err.table, "RIM extract");
    }

    #[test]
    fn short_rows_read_blank() {
        let t = table("t", &["a", "b"], &[&["1"]]);
        assert_eq!(t.cell(0, 0), "1");
        assert_eq!(t.cell(0, 1), "");
        assert_eq!(t.cell(5, 0), "");
    }

    #[test]
    fn append_unions_columns_in_first_seen_order() {
        let mut a = table("mvs", &["Unique ID", "Molecule"], &[&["A1", "aspirin"]]);
        let b = table("mvs", &["Unique ID", "Notes"], &[&["B1", "late"]]);
        a.append(&b);

        assert_eq!(a.headers(), &["Unique ID", "Molecule", "Notes"]);
        assert_eq!(a.rows()[0], vec!["A1", "aspirin", ""]);
        assert_eq!(a.rows()[1], vec!["B1", "", "late"]);
    }

    #[test]
    fn set_column_replaces_existing() {
        let mut t = table("t", &["a", "flag"], &[&["1", "x"], &["2"]]);
        t.set_column("flag", vec!["TRUE".into(), "".into()]);
        assert_eq!(t.headers().len(), 2);
        assert_eq!(t.cell(0, 1), "TRUE");
        assert_eq!(t.cell(1, 1), "");
    }

    #[test]
    fn from_records_collects_keys() {
        let mut first = BTreeMap::new();
        first.insert("id".to_string(), "1".to_string());
        let mut second = BTreeMap::new();
        second.insert("id".to_string(), "2".to_string());
        second.insert("name__v".to_string(), "RO-2".to_string());

        let t = Table::from_records("extract", &[first, second]);
        assert_eq!(t.headers(), &["id", "name__v"]);
        assert_eq!(t.cell(0, 1), "");
        assert_eq!(t.cell(1, 1), "RO-2");
    }

    #[test]
    fn reads_csv_after_banner_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "MVS export banner").unwrap();
        writeln!(file, "Unique ID,Molecule").unwrap();
        writeln!(file, "A1,aspirin").unwrap();
        writeln!(file, "A2").unwrap();

        let t = Table::from_csv_path_skipping("mvs", file.path(), 1).unwrap();
        assert_eq!(t.headers(), &["Unique ID", "Molecule"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.cell(1, 1), "");
    }

    #[test]
    fn left_join_repeats_matches_and_keeps_orphans() {
        let loader = table("loader", &["external_id__v", "id"], &[&["A", "L1"], &["B", "L2"], &["", "L3"]]);
        let links = table(
            "links",
            &["id", "regulatory_objective__rim", "registration_number"],
            &[&["J1", "A", "R1"], &["J2", "A", "R2"], &["J3", "", "R9"]],
        );

        let joined = loader.left_join("external_id__v", &links, "regulatory_objective__rim").unwrap();

        assert_eq!(
            joined.headers(),
            &["external_id__v", "id_x", "id_y", "regulatory_objective__rim", "registration_number"]
        );
        assert_eq!(joined.len(), 4);
        assert_eq!(joined.cell(0, 4), "R1");
        assert_eq!(joined.cell(1, 4), "R2");
        assert_eq!(joined.cell(2, 0), "B");
        assert_eq!(joined.cell(2, 4), "");
        assert_eq!(joined.cell(3, 1), "L3");
        assert_eq!(joined.cell(3, 2), "");
    }

    #[test]
    fn select_requires_every_column() {
        let t = table("registrations", &["id", "state__v", "extra"], &[&["R1", "Active", "x"]]);
        let picked = t.select(&["state__v", "id"]).unwrap();
        assert_eq!(picked.headers(), &["state__v", "id"]);
        assert_eq!(picked.cell(0, 1), "R1");

        let err = t.select(&["maintain_registration__c"]).unwrap_err();
        assert_eq!(err.column, "maintain_registration__c");
    }
}
