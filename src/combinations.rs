//! Domain-combination membership columns.
//!
//! For every non-empty set of bait domains and every contact threshold, a 0/1
//! column records whether a model contacts all domains of the set at least
//! that often. A model is only flagged in the most specific sets it qualifies
//! for: a set is suppressed whenever one of its supersets also qualifies.

use crate::config::Domain;
use crate::error::Result;
use itertools::Itertools;
use polars::prelude::*;

/// Every non-empty subset of `domains`, largest first.
///
/// Subsets are generated by increasing size in lexicographic order of the
/// configured domain order, then the whole list is reversed.
pub fn domain_combinations(domains: &[Domain]) -> Vec<Vec<&Domain>> {
    let mut combinations: Vec<Vec<&Domain>> = (1..=domains.len())
        .flat_map(|size| domains.iter().combinations(size))
        .collect();
    combinations.reverse();
    combinations
}

/// `<d1>_<d2>..._MIN_<threshold>`
pub fn combination_column(combination: &[&Domain], threshold: i64) -> String {
    format!(
        "{}_MIN_{threshold}",
        combination.iter().map(|d| d.name.as_str()).join("_")
    )
}

fn is_superset(superset: &[&Domain], subset: &[&Domain]) -> bool {
    superset.len() > subset.len() && subset.iter().all(|d| superset.contains(d))
}

/// True where every domain of the combination has at least `threshold`
/// contacts. Null counts never qualify.
fn qualifies(combination: &[&Domain], threshold: i64) -> Expr {
    combination
        .iter()
        .map(|d| {
            col(d.contacts_column())
                .gt_eq(lit(threshold))
                .fill_null(lit(false))
        })
        .reduce(|acc, e| acc.and(e))
        .unwrap_or_else(|| lit(false))
}

/// Append one membership column per domain combination and threshold.
///
/// The `<domain>_contacts` columns must already be present.
pub fn add_combination_columns(
    df: DataFrame,
    domains: &[Domain],
    thresholds: &[i64],
) -> Result<DataFrame> {
    let combinations = domain_combinations(domains);
    let mut flags = Vec::with_capacity(combinations.len() * thresholds.len());
    for (i, combination) in combinations.iter().enumerate() {
        for &threshold in thresholds {
            let mut mask = qualifies(combination, threshold);
            for superset in combinations[..i]
                .iter()
                .filter(|s| is_superset(s, combination))
            {
                mask = mask.and(qualifies(superset, threshold).not());
            }
            flags.push(
                mask.cast(DataType::Int64)
                    .alias(combination_column(combination, threshold)),
            );
        }
    }
    Ok(df.lazy().with_columns(flags).collect()?)
}

/// Names of every membership column at one threshold, in column order.
pub fn combination_columns(domains: &[Domain], threshold: i64) -> Vec<String> {
    domain_combinations(domains)
        .iter()
        .map(|c| combination_column(c, threshold))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains() -> Vec<Domain> {
        vec![
            Domain::new("A", 1, 10),
            Domain::new("B", 11, 20),
            Domain::new("C", 21, 30),
        ]
    }

    fn flagged(df: &DataFrame, row: usize, threshold: i64) -> Vec<String> {
        combination_columns(&domains(), threshold)
            .into_iter()
            .filter(|name| {
                df.column(name).unwrap().i64().unwrap().get(row) == Some(1)
            })
            .collect()
    }

    #[test]
    fn combinations_are_largest_first() {
        let domains = domains();
        let names: Vec<String> = domain_combinations(&domains)
            .iter()
            .map(|c| combination_column(c, 1))
            .collect();
        assert_eq!(
            names,
            vec![
                "A_B_C_MIN_1",
                "B_C_MIN_1",
                "A_C_MIN_1",
                "A_B_MIN_1",
                "C_MIN_1",
                "B_MIN_1",
                "A_MIN_1"
            ]
        );
    }

    #[test]
    fn flags_the_most_specific_sets() {
        let df = df!(
            "A_contacts" => [Some(30i64), Some(30), Some(5), None, Some(25)],
            "B_contacts" => [Some(30i64), Some(30), Some(0), None, Some(0)],
            "C_contacts" => [Some(30i64), Some(0), Some(0), None, Some(25)],
        )
        .unwrap();
        let df = add_combination_columns(df, &domains(), &[1, 20]).unwrap();
        assert_eq!(df.width(), 3 + 7 * 2);

        assert_eq!(flagged(&df, 0, 1), vec!["A_B_C_MIN_1"]);
        assert_eq!(flagged(&df, 1, 20), vec!["A_B_MIN_20"]);
        assert_eq!(flagged(&df, 2, 1), vec!["A_MIN_1"]);
        assert!(flagged(&df, 2, 20).is_empty());
        assert!(flagged(&df, 3, 1).is_empty());
        assert_eq!(flagged(&df, 4, 20), vec!["A_C_MIN_20"]);
    }

    #[test]
    fn no_flagged_set_has_a_flagged_superset() {
        let df = df!(
            "A_contacts" => [0i64, 1, 2, 3, 50, 80, 19, 21],
            "B_contacts" => [80i64, 0, 21, 3, 50, 1, 20, 21],
            "C_contacts" => [1i64, 80, 20, 0, 50, 0, 21, 19],
        )
        .unwrap();
        let df = add_combination_columns(df, &domains(), &[1, 20, 80]).unwrap();
        let domains = domains();
        for threshold in [1, 20, 80] {
            for row in 0..df.height() {
                let sets: Vec<Vec<&Domain>> = domain_combinations(&domains)
                    .into_iter()
                    .filter(|c| {
                        let name = combination_column(c, threshold);
                        df.column(&name).unwrap().i64().unwrap().get(row) == Some(1)
                    })
                    .collect();
                for a in &sets {
                    for b in &sets {
                        assert!(!is_superset(a, b), "row {row} threshold {threshold}");
                    }
                }
            }
        }
    }
}
