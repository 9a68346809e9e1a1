//! Comparing two shortlists of proteins.

use crate::error::Result;
use std::collections::BTreeSet;
use std::path::Path;

/// Proteins found in only one of the lists, or in both. Sets are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlap {
    pub only_first: BTreeSet<String>,
    pub only_second: BTreeSet<String>,
    pub both: BTreeSet<String>,
}

/// Entries of a newline-separated list, trimmed and lower-cased.
pub fn normalize_list(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn compare_lists(first: &str, second: &str) -> Overlap {
    let first = normalize_list(first);
    let second = normalize_list(second);
    Overlap {
        only_first: first.difference(&second).cloned().collect(),
        only_second: second.difference(&first).cloned().collect(),
        both: first.intersection(&second).cloned().collect(),
    }
}

pub fn compare_files(first: &Path, second: &Path) -> Result<Overlap> {
    Ok(compare_lists(
        &std::fs::read_to_string(first)?,
        &std::fs::read_to_string(second)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_case_insensitively() {
        let overlap = compare_lists("Q5S007\nP62258 \n\n", "p62258\nO14976\n");
        assert_eq!(overlap.only_first, BTreeSet::from([String::from("q5s007")]));
        assert_eq!(overlap.only_second, BTreeSet::from([String::from("o14976")]));
        assert_eq!(overlap.both, BTreeSet::from([String::from("p62258")]));
    }
}
