use crate::models::LockRetry;
use crate::table::Table;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Whether an open failure means another program holds the file.
fn is_locked(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}

/// Create `path`, waiting per `policy` while it is locked, then hand it to `write`.
pub fn write_with_retry<F>(path: &Path, policy: &LockRetry, write: F) -> Result<()>
where
    F: FnOnce(BufWriter<File>) -> Result<()>,
{
    let file = open_with_retry(path, policy, &mut io::stdin().lock(), |p: &Path| File::create(p))?;
    write(BufWriter::new(file))
}

/// Open `path` with `open`, applying the lock policy. `operator` answers the prompt.
fn open_with_retry<R, O>(path: &Path, policy: &LockRetry, operator: &mut R, mut open: O) -> Result<File>
where
    R: BufRead,
    O: FnMut(&Path) -> io::Result<File>,
{
    let mut attempt: u32 = 0;
    loop {
        match open(path) {
            Ok(file) => return Ok(file),
            Err(e) if is_locked(&e) => {
                attempt += 1;
                println!("❌ File is locked: {}", path.display());
                match policy {
                    LockRetry::Prompt => {
                        println!("   Please close the file and press Enter to retry...");
                        let mut line = String::new();
                        let read = operator
                            .read_line(&mut line)
                            .context("Failed to read operator confirmation")?;
                        if read == 0 {
                            return Err(e).with_context(|| {
                                format!("File is locked and no operator is available: {}", path.display())
                            });
                        }
                    }
                    LockRetry::Bounded { attempts, delay_ms } => {
                        if attempt >= *attempts {
                            return Err(e).with_context(|| {
                                format!("File still locked after {} attempts: {}", attempt, path.display())
                            });
                        }
                        warn!(attempt, path = %path.display(), "output locked, retrying");
                        std::thread::sleep(Duration::from_millis(*delay_ms));
                    }
                }
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Could not write file: {}", path.display()));
            }
        }
    }
}

/// Serialize `records` as CSV with a header row taken from the record type.
pub fn write_records<T: Serialize>(path: &Path, records: &[T], policy: &LockRetry) -> Result<()> {
    write_with_retry(path, policy, |out| {
        let mut writer = csv::Writer::from_writer(out);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    })
    .with_context(|| format!("Failed to export: {}", path.display()))?;

    info!(path = %path.display(), rows = records.len(), "exported csv");
    Ok(())
}

pub fn write_table(path: &Path, table: &Table, policy: &LockRetry) -> Result<()> {
    write_with_retry(path, policy, |out| table.write_csv(out))
        .with_context(|| format!("Failed to export: {}", path.display()))?;

    info!(path = %path.display(), rows = table.len(), "exported csv");
    Ok(())
}

pub fn write_text(path: &Path, content: &str, policy: &LockRetry) -> Result<()> {
    write_with_retry(path, policy, |mut out| {
        out.write_all(content.as_bytes())?;
        out.flush()?;
        Ok(())
    })
    .with_context(|| format!("Failed to write report: {}", path.display()))?;

    info!(path = %path.display(), bytes = content.len(), "wrote report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        #[serde(rename = "ID")]
        id: String,
        #[serde(rename = "Count")]
        count: usize,
    }

    #[test]
    fn writes_serialized_records_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![
            Row { id: "A".into(), count: 2 },
            Row { id: "B".into(), count: 0 },
        ];

        write_records(&path, &rows, &LockRetry::Prompt).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "ID,Count\nA,2\nB,0\n");
    }

    #[test]
    fn missing_directory_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("out.txt");
        let policy = LockRetry::Bounded {
            attempts: 3,
            delay_ms: 0,
        };

        let err = write_text(&path, "x", &policy).unwrap_err();
        assert!(err.to_string().contains("Failed to write report"));
        assert!(format!("{:#}", err).contains("Could not write file"));
    }

    fn locked(_: &Path) -> io::Result<File> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    #[test]
    fn bounded_policy_gives_up_after_last_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let policy = LockRetry::Bounded {
            attempts: 2,
            delay_ms: 0,
        };
        let mut opens = 0;

        let err = open_with_retry(&path, &policy, &mut io::empty(), |p| {
            opens += 1;
            locked(p)
        })
        .unwrap_err();

        assert_eq!(opens, 2);
        assert!(err.to_string().contains("still locked after 2 attempts"));
    }

    #[test]
    fn bounded_policy_recovers_when_lock_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let policy = LockRetry::Bounded {
            attempts: 3,
            delay_ms: 0,
        };
        let mut opens = 0;

        let result = open_with_retry(&path, &policy, &mut io::empty(), |p| {
            opens += 1;
            if opens == 1 {
                locked(p)
            } else {
                File::create(p)
            }
        });

        assert!(result.is_ok());
        assert_eq!(opens, 2);
    }

    #[test]
    fn prompt_without_operator_fails_instead_of_spinning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let mut opens = 0;

        let err = open_with_retry(&path, &LockRetry::Prompt, &mut io::empty(), |p| {
            opens += 1;
            locked(p)
        })
        .unwrap_err();

        assert_eq!(opens, 1);
        assert!(err.to_string().contains("no operator is available"));
    }

    #[test]
    fn prompt_retries_after_operator_presses_enter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let mut operator = io::Cursor::new(b"\n".to_vec());
        let mut opens = 0;

        let result = open_with_retry(&path, &LockRetry::Prompt, &mut operator, |p| {
            opens += 1;
            if opens == 1 {
                locked(p)
            } else {
                File::create(p)
            }
        });

        assert!(result.is_ok());
        assert_eq!(opens, 2);
    }
}
