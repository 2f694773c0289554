//! Canonical molecule steps and closure counting.
//!
//! Every worker is expected to walk through the same nine phases and close
//! each one in the task tracker. The tracker renders step labels with some
//! freedom of wording, so matching is case-insensitive substring containment.

/// Canonical molecule step names in execution order.
///
/// The length of this list is the `total` reported for every worker; consumers
/// parse the fixed-width progress indicator, so it must stay at nine entries.
pub const STEPS_ORDER: [&str; 9] = [
    "Load context",
    "Set up working branch",
    "Verify tests pass",
    "Implement",
    "Self-review",
    "Run tests",
    "Clean up",
    "Prepare work",
    "Submit work",
];

/// Short labels printed under the human-readable drift report.
pub const STEP_LEGEND: &str =
    "①load ②branch ③preflight ④implement ⑤review ⑥test ⑦cleanup ⑧prepare ⑨submit";

/// Closure state of rendered step labels, kept in rendered order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepStatuses {
    entries: Vec<(String, bool)>,
}

impl StepStatuses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a label. A repeated label keeps its position and takes the latest state.
    pub fn insert(&mut self, label: impl Into<String>, closed: bool) {
        let label = label.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == label) {
            Some(entry) => entry.1 = closed,
            None => self.entries.push((label, closed)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries
            .iter()
            .map(|(label, closed)| (label.as_str(), *closed))
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for StepStatuses {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        let mut statuses = StepStatuses::new();
        for (label, closed) in iter {
            statuses.insert(label, closed);
        }
        statuses
    }
}

/// True if the first rendered label containing `step_name` is closed.
///
/// Short canonical names (e.g. "Implement") match any label containing the
/// word; that looseness is existing behavior and is kept as-is.
pub fn match_step(step_name: &str, statuses: &StepStatuses) -> bool {
    let needle = step_name.to_lowercase();
    statuses
        .iter()
        .find(|(label, _)| label.to_lowercase().contains(&needle))
        .is_some_and(|(_, closed)| closed)
}

/// Count canonical steps that are closed in `statuses`.
pub fn count_closed_steps(statuses: &StepStatuses) -> usize {
    STEPS_ORDER
        .iter()
        .filter(|step| match_step(step, statuses))
        .count()
}

/// Fixed-width progress indicator: `●` per closed step, `○` for the rest.
pub fn progress_bar(closed: usize, total: usize) -> String {
    (0..total)
        .map(|i| if i < closed { '●' } else { '○' })
        .collect()
}

/// Truncate to one decimal place (toward zero, not statistical rounding).
pub fn round_to_1(value: f64) -> f64 {
    (value * 10.0).trunc() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_statuses() -> StepStatuses {
        [
            ("Load context and start", true),
            ("Set up working branch", true),
            ("Verify tests pass (precheck)", false),
            ("Implement the feature", false),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn match_step_uses_case_insensitive_containment() {
        let statuses = sample_statuses();
        let cases = [
            ("Load context", true),
            ("Set up working branch", true),
            ("Verify tests pass", false),
            ("Implement", false),
            ("Self-review", false),
        ];
        for (step, want) in cases {
            assert_eq!(match_step(step, &statuses), want, "step {step}");
        }
        let shouting: StepStatuses = [("LOAD CONTEXT", true)].into_iter().collect();
        assert!(match_step("Load context", &shouting));
    }

    #[test]
    fn match_step_first_matching_label_decides() {
        let statuses: StepStatuses = [("Run tests (lint)", false), ("Run tests", true)]
            .into_iter()
            .collect();
        assert!(!match_step("Run tests", &statuses));
    }

    #[test]
    fn count_closed_steps_all_and_none() {
        let all: StepStatuses = STEPS_ORDER.iter().map(|step| (*step, true)).collect();
        assert_eq!(count_closed_steps(&all), 9);

        let none: StepStatuses = [("Load context", false), ("Set up working branch", false)]
            .into_iter()
            .collect();
        assert_eq!(count_closed_steps(&none), 0);

        assert_eq!(count_closed_steps(&StepStatuses::new()), 0);
    }

    #[test]
    fn round_to_1_truncates() {
        let cases = [(12.34, 12.3), (0.0, 0.0), (5.99, 5.9), (100.05, 100.0)];
        for (input, want) in cases {
            assert_eq!(round_to_1(input), want, "input {input}");
        }
    }

    #[test]
    fn steps_order_is_stable() {
        assert_eq!(STEPS_ORDER.len(), 9);
        assert_eq!(STEPS_ORDER[0], "Load context");
        assert_eq!(STEPS_ORDER[8], "Submit work");
    }

    #[test]
    fn progress_bar_is_fixed_width() {
        assert_eq!(progress_bar(3, 9), "●●●○○○○○○");
        assert_eq!(progress_bar(0, 9).chars().count(), 9);
    }

    #[test]
    fn repeated_label_keeps_position_and_updates_state() {
        let mut statuses = StepStatuses::new();
        statuses.insert("Clean up", false);
        statuses.insert("Submit work", false);
        statuses.insert("Clean up", true);
        let labels: Vec<(&str, bool)> = statuses.iter().collect();
        assert_eq!(labels, vec![("Clean up", true), ("Submit work", false)]);
    }
}
