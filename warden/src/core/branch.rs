//! Selection of a worker's isolated data branch.
//!
//! Worker branches are named `<kind>-<worker>-<suffix>` where the trailing
//! token is a creation timestamp. The most recent branch wins.

/// Branch kind used for polecat worker branches.
pub const POLECAT_BRANCH_KIND: &str = "polecat";

/// Prefix every candidate branch for `name` must contain.
pub fn branch_prefix(kind: &str, name: &str) -> String {
    format!("{kind}-{}-", name.to_lowercase())
}

/// Parse branch-store listing output into bare branch names.
///
/// The current branch is marked with a leading `*`.
pub fn parse_branch_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim_start_matches(['*', ' ']).trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pick the candidate containing `prefix` with the numerically largest
/// trailing `-<digits>` token.
///
/// Ties keep the first candidate encountered. When no candidate carries a
/// positive numeric token the first matching candidate is returned; when none
/// match, `None` (unresolved branch).
pub fn select_latest_branch<S: AsRef<str>>(candidates: &[S], prefix: &str) -> Option<String> {
    let mut matching = candidates
        .iter()
        .map(AsRef::as_ref)
        .filter(|branch| branch.contains(prefix));
    let mut best = matching.next()?;
    let mut max_ts = trailing_timestamp(best).unwrap_or(0);
    for branch in matching {
        if let Some(ts) = trailing_timestamp(branch)
            && ts > max_ts
        {
            max_ts = ts;
            best = branch;
        }
    }
    Some(best.to_string())
}

fn trailing_timestamp(branch: &str) -> Option<u64> {
    branch.rsplit('-').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_numerically_largest_suffix() {
        let candidates = ["w-a-100", "w-a-9999", "w-a-250"];
        assert_eq!(
            select_latest_branch(&candidates, "w-a-"),
            Some("w-a-9999".to_string())
        );
    }

    #[test]
    fn ignores_candidates_without_prefix() {
        let candidates = ["polecat-bob-900", "polecat-alice-100", "main"];
        let prefix = branch_prefix(POLECAT_BRANCH_KIND, "Alice");
        assert_eq!(prefix, "polecat-alice-");
        assert_eq!(
            select_latest_branch(&candidates, &prefix),
            Some("polecat-alice-100".to_string())
        );
    }

    #[test]
    fn unresolved_when_nothing_matches() {
        let candidates: [&str; 2] = ["main", "polecat-bob-1"];
        assert_eq!(select_latest_branch(&candidates, "polecat-alice-"), None);
    }

    #[test]
    fn ties_and_non_numeric_keep_first() {
        let candidates = ["p-x-draft", "p-x-5", "p-x-5b", "p-x-5"];
        assert_eq!(
            select_latest_branch(&candidates, "p-x-"),
            Some("p-x-5".to_string())
        );
        let only_words = ["p-x-draft", "p-x-final"];
        assert_eq!(
            select_latest_branch(&only_words, "p-x-"),
            Some("p-x-draft".to_string())
        );
    }

    #[test]
    fn parses_listing_with_current_marker() {
        let listing = "  main\n* polecat-alice-1700000000\n  polecat-alice-1700000500\n\n";
        assert_eq!(
            parse_branch_listing(listing),
            vec![
                "main".to_string(),
                "polecat-alice-1700000000".to_string(),
                "polecat-alice-1700000500".to_string(),
            ]
        );
    }
}
