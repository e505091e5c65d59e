//! Grouping of finished outcomes for packaging and reporting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pipeline::ProcessingOutcome;

/// Group outcomes by category, keeping their relative order within each group.
pub fn group_by_category(
    outcomes: &[ProcessingOutcome],
) -> BTreeMap<String, Vec<ProcessingOutcome>> {
    let mut groups: BTreeMap<String, Vec<ProcessingOutcome>> = BTreeMap::new();
    for outcome in outcomes {
        groups
            .entry(outcome.category.clone())
            .or_default()
            .push(outcome.clone());
    }
    groups
}

/// Per-category summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    /// Mean confidence, 0-100
    pub average_confidence: f64,
}

pub fn category_stats(outcomes: &[ProcessingOutcome]) -> BTreeMap<String, CategoryStats> {
    let mut totals: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for outcome in outcomes {
        let entry = totals.entry(outcome.category.clone()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += outcome.confidence;
    }

    totals
        .into_iter()
        .map(|(category, (count, sum))| {
            (
                category,
                CategoryStats {
                    count,
                    average_confidence: sum / count as f64,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn outcome(index: usize, category: &str, confidence: f64) -> ProcessingOutcome {
        ProcessingOutcome {
            original_index: index,
            file_name: format!("file-{index}.pdf"),
            category: category.to_string(),
            confidence,
            score: 0,
            extracted_text: String::new(),
            failed: false,
            error_message: None,
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn test_groups_preserve_relative_order() {
        let outcomes = vec![
            outcome(0, "Invoices", 40.0),
            outcome(1, "Receipts", 20.0),
            outcome(2, "Invoices", 60.0),
            outcome(3, "Errors", 0.0),
            outcome(4, "Invoices", 10.0),
        ];

        let groups = group_by_category(&outcomes);

        assert_eq!(groups.len(), 3);
        let invoices: Vec<usize> = groups["Invoices"].iter().map(|o| o.original_index).collect();
        assert_eq!(invoices, vec![0, 2, 4]);
        assert_eq!(groups["Receipts"].len(), 1);
        assert_eq!(groups["Errors"][0].original_index, 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_by_category(&[]).is_empty());
        assert!(category_stats(&[]).is_empty());
    }

    #[test]
    fn test_category_stats() {
        let outcomes = vec![
            outcome(0, "Invoices", 40.0),
            outcome(1, "Invoices", 60.0),
            outcome(2, "Payroll", 30.0),
        ];

        let stats = category_stats(&outcomes);

        assert_eq!(
            stats["Invoices"],
            CategoryStats {
                count: 2,
                average_confidence: 50.0
            }
        );
        assert_eq!(stats["Payroll"].count, 1);
        assert_eq!(stats["Payroll"].average_confidence, 30.0);
    }
}
