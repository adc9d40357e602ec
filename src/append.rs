use crate::table::Table;
use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub file_name: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendReport {
    pub files: Vec<FileStats>,
    pub total_rows: usize,
}

impl AppendReport {
    pub fn sum_of_file_rows(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }

    pub fn all_columns(&self) -> BTreeSet<String> {
        self.files.iter().flat_map(|f| f.columns.iter().cloned()).collect()
    }
}

/// CSV extracts directly inside `dir`, sorted by path.
pub fn discover_extracts(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Source directory not found: {}", dir.display()))? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Concatenate every extract into one table. An extract without data rows aborts.
pub fn append_extracts(files: &[PathBuf], skip_rows: usize) -> Result<(Table, AppendReport)> {
    if files.is_empty() {
        bail!("No extract files found");
    }

    let mut combined: Option<Table> = None;
    let mut report = AppendReport::default();

    for path in files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        println!("📄 Reading: {}", file_name);

        let table = Table::from_csv_path_skipping("MVS extract", path, skip_rows)?;
        if table.is_empty() {
            bail!("File is empty: {}", file_name);
        }

        report.files.push(FileStats {
            file_name,
            rows: table.len(),
            columns: table.headers().to_vec(),
        });

        match combined.as_mut() {
            Some(all) => all.append(&table),
            None => combined = Some(table),
        }
    }

    let combined = combined.context("No extract files found")?;
    report.total_rows = combined.len();
    info!(files = report.files.len(), rows = report.total_rows, "appended MVS extracts");
    Ok((combined, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn appends_in_name_order_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.csv", "banner\nUnique ID,Notes\nB1,late\n");
        write(dir.path(), "a.csv", "banner\nUnique ID,Molecule\nA1,aspirin\nA2,ibuprofen\n");
        write(dir.path(), "ignored.txt", "not an extract");

        let files = discover_extracts(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let (table, report) = append_extracts(&files, 1).unwrap();
        assert_eq!(table.headers(), &["Unique ID", "Molecule", "Notes"]);
        assert_eq!(table.cell(0, 0), "A1");
        assert_eq!(table.cell(2, 2), "late");
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.sum_of_file_rows(), 3);
        assert_eq!(report.all_columns().len(), 3);
    }

    #[test]
    fn empty_extract_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "empty.csv", "banner\nUnique ID,Molecule\n");
        let err = append_extracts(&[path], 1).unwrap_err();
        assert!(err.to_string().contains("empty.csv"));
    }
}
