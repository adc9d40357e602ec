//! Product/molecule consistency check between a free-text MVS molecule
//! description and a RIM product name.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Separators between molecules in MVS text, applied one after another.
const SOURCE_SEPARATORS: [&str; 5] = ["+", "/", ",", " and ", " & "];

/// Ester forms implied by base testosterone.
const TESTOSTERONE_ESTERS: [&str; 4] = ["decanoate", "isocaproate", "phenylpropionate", "propionate"];

const SPELLING_VARIANTS: [(&str, &str); 3] = [
    ("indometacin", "indomethacin"),
    ("tioguanine", "thioguanine"),
    ("sulfamethoxazole", "sulphamethoxazole"),
];

static SALT_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+(hydrochloride|hcl|sodium|acetate|phosphate|base|hydrobromide|calcium|decanoate)$")
        .expect("salt suffix pattern")
});

static PAREN_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("paren group pattern"));

static PAREN_WITH_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)").expect("paren strip pattern"));

/// Outcome of comparing a RIM product against MVS molecules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Match,
    Mismatch,
    /// Nothing on the RIM side to verify.
    Indeterminate,
}

impl Verdict {
    /// Tabular form used in every report: `TRUE`, `FALSE` or blank.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Match => "TRUE",
            Verdict::Mismatch => "FALSE",
            Verdict::Indeterminate => "",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn normalize_molecule(molecule: &str) -> String {
    let molecule = molecule.trim().to_lowercase();
    SPELLING_VARIANTS
        .iter()
        .find(|(variant, _)| *variant == molecule)
        .map(|(_, standard)| standard.to_string())
        .unwrap_or(molecule)
}

/// Molecules named by an MVS molecule field.
pub fn source_molecules(text: &str) -> BTreeSet<String> {
    let lowered = text.trim().to_lowercase();

    let mut parts = vec![lowered.as_str()];
    for separator in SOURCE_SEPARATORS {
        parts = parts.into_iter().flat_map(|p| p.split(separator)).collect();
    }

    parts
        .into_iter()
        .map(|part| SALT_SUFFIX.replace(part.trim(), "").trim().to_string())
        .filter(|part| !part.is_empty())
        .map(|part| normalize_molecule(&part))
        .collect()
}

/// Split on commas that are not inside parentheses.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Molecules named by a RIM product name. Parenthetical lists contribute each
/// item plus the name with the parentheses removed.
pub fn target_molecules(text: &str) -> Vec<String> {
    let lowered = text.trim().to_lowercase();
    let mut molecules = Vec::new();

    for part in split_top_level(&lowered) {
        let part = part.trim();
        if part.contains('(') && part.contains(')') {
            for group in PAREN_GROUP.captures_iter(part) {
                molecules.extend(
                    group[1]
                        .split(',')
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                        .map(str::to_string),
                );
            }
            let base = PAREN_WITH_SPACE.replace_all(part, "");
            let base = base.trim();
            if !base.is_empty() {
                molecules.push(base.to_string());
            }
        } else if !part.is_empty() {
            molecules.push(part.to_string());
        }
    }

    molecules
        .iter()
        .map(|m| normalize_molecule(m))
        .filter(|m| !m.is_empty())
        .collect()
}

/// Decide whether the RIM product `target` is supported by the MVS molecule text `source`.
///
/// Every RIM molecule must be a substring of some MVS molecule or contain one.
/// The substring test has no minimum length, so short tokens can match unrelated words.
pub fn match_product(source: &str, target: &str) -> Verdict {
    if target.trim().is_empty() {
        return Verdict::Indeterminate;
    }
    if source.trim().is_empty() {
        return Verdict::Mismatch;
    }

    let target_tokens = target_molecules(target);
    if target_tokens.is_empty() {
        return Verdict::Indeterminate;
    }
    let source_tokens = source_molecules(source);
    if source_tokens.is_empty() {
        return Verdict::Mismatch;
    }

    let has_testosterone = source_tokens.iter().any(|m| m.contains("testosterone"));

    let target_lower = target.to_lowercase();
    if has_testosterone && target_lower.contains("testosterone") && target_lower.contains('(') {
        return Verdict::Match;
    }

    for token in &target_tokens {
        if has_testosterone && TESTOSTERONE_ESTERS.contains(&token.as_str()) {
            continue;
        }
        let found = source_tokens
            .iter()
            .any(|m| m.contains(token.as_str()) || token.contains(m.as_str()));
        if !found {
            return Verdict::Mismatch;
        }
    }

    Verdict::Match
}
