use chrono::{NaiveDate, NaiveDateTime};

/// Parse a Vault timestamp such as `2025-09-12T16:38:00.000Z`.
///
/// The trailing `Z` and fractional seconds are ignored; a bare date reads as
/// midnight. Anything else yields `None`.
pub fn parse_vault_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let mut value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(stripped) = value.strip_suffix('Z') {
        value = stripped;
    }
    if let Some((whole, _fraction)) = value.split_once('.') {
        value = whole;
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// How a target record changed during the migration window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created and last modified inside the window.
    Created,
    /// Modified inside the window, created before it started.
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl MigrationWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> anyhow::Result<Self> {
        let start_at = parse_vault_timestamp(start)
            .ok_or_else(|| anyhow::anyhow!("invalid migration window start: {}", start))?;
        let end_at = parse_vault_timestamp(end)
            .ok_or_else(|| anyhow::anyhow!("invalid migration window end: {}", end))?;
        if end_at < start_at {
            anyhow::bail!("migration window ends ({}) before it starts ({})", end, start);
        }
        Ok(Self::new(start_at, end_at))
    }

    /// Inclusive on both ends.
    pub fn contains(&self, at: Option<NaiveDateTime>) -> bool {
        at.map(|t| self.start <= t && t <= self.end).unwrap_or(false)
    }

    pub fn is_before(&self, at: Option<NaiveDateTime>) -> bool {
        at.map(|t| t < self.start).unwrap_or(false)
    }

    pub fn classify(&self, created: &str, modified: &str) -> Option<ChangeKind> {
        let created = parse_vault_timestamp(created);
        let modified = parse_vault_timestamp(modified);
        if !self.contains(modified) {
            return None;
        }
        if self.contains(created) {
            Some(ChangeKind::Created)
        } else if self.is_before(created) {
            Some(ChangeKind::Updated)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> MigrationWindow {
        MigrationWindow::parse("2025-09-10T00:00:00.000Z", "2025-09-18T23:59:59.000Z").unwrap()
    }

    #[test]
    fn parses_vault_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 9, 12)
            .unwrap()
            .and_hms_opt(16, 38, 0)
            .unwrap();
        assert_eq!(parse_vault_timestamp("2025-09-12T16:38:00.000Z"), Some(expected));
        assert_eq!(parse_vault_timestamp("2025-09-12T16:38:00"), Some(expected));
        assert_eq!(parse_vault_timestamp(" 2025-09-12 16:38:00 "), Some(expected));
        assert!(parse_vault_timestamp("2025-09-12").is_some());
        assert_eq!(parse_vault_timestamp(""), None);
        assert_eq!(parse_vault_timestamp("yesterday"), None);
    }

    #[test]
    fn classifies_created_and_updated() {
        let w = window();
        assert_eq!(
            w.classify("2025-09-12T10:00:00.000Z", "2025-09-13T10:00:00.000Z"),
            Some(ChangeKind::Created)
        );
        assert_eq!(
            w.classify("2024-01-01T00:00:00.000Z", "2025-09-18T23:59:59.000Z"),
            Some(ChangeKind::Updated)
        );
        assert_eq!(w.classify("2024-01-01T00:00:00.000Z", "2025-09-19T00:00:00.000Z"), None);
        assert_eq!(w.classify("", "2025-09-12T00:00:00.000Z"), None);
        assert_eq!(w.classify("2025-09-12T00:00:00.000Z", "not a date"), None);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let w = window();
        assert!(w.contains(parse_vault_timestamp("2025-09-10T00:00:00.000Z")));
        assert!(!w.contains(parse_vault_timestamp("2025-09-09T23:59:59.000Z")));
        assert!(!w.contains(None));
    }

    #[test]
    fn rejects_inverted_window() {
        assert!(MigrationWindow::parse("2025-09-18T00:00:00Z", "2025-09-10T00:00:00Z").is_err());
        assert!(MigrationWindow::parse("soon", "2025-09-10T00:00:00Z").is_err());
    }
}
