use std::collections::BTreeSet;

/// Identifiers that differ between what a loader expected and what the target shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discrepancies {
    pub expected_not_observed: BTreeSet<String>,
    pub observed_not_expected: BTreeSet<String>,
}

impl Discrepancies {
    pub fn between(expected: &BTreeSet<String>, observed: &BTreeSet<String>) -> Self {
        Self {
            expected_not_observed: expected.difference(observed).cloned().collect(),
            observed_not_expected: observed.difference(expected).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expected_not_observed.is_empty() && self.observed_not_expected.is_empty()
    }

    /// Render with explicit clause labels, e.g. `"Expected but not created"`.
    /// Empty sets drop their clause; no differences render as `""`.
    pub fn render(&self, missing_label: &str, unexpected_label: &str) -> String {
        let mut clauses = Vec::new();
        if !self.expected_not_observed.is_empty() {
            clauses.push(format!("{}: {}", missing_label, join(&self.expected_not_observed)));
        }
        if !self.observed_not_expected.is_empty() {
            clauses.push(format!("{}: {}", unexpected_label, join(&self.observed_not_expected)));
        }
        clauses.join(" | ")
    }

    /// Render for an outcome verb such as `created` or `updated`.
    pub fn render_outcome(&self, outcome: &str) -> String {
        let mut capitalized = outcome.to_string();
        if let Some(first) = capitalized.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        self.render(
            &format!("Expected but not {}", outcome),
            &format!("{} but not expected", capitalized),
        )
    }
}

fn join(ids: &BTreeSet<String>) -> String {
    ids.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
