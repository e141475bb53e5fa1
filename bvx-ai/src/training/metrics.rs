//! Validation metrics
//!
//! Confusion matrix rows are true labels and columns are predictions, both
//! in [`Label`] index order.

use crate::types::Label;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: Label,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Validation samples whose true label is `label`
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub confusion: [[usize; Label::COUNT]; Label::COUNT],
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl EvaluationReport {
    /// Score `predicted` against `truth`; pairs beyond the shorter slice are ignored
    pub fn compute(truth: &[Label], predicted: &[Label]) -> Self {
        let mut confusion = [[0usize; Label::COUNT]; Label::COUNT];
        for (t, p) in truth.iter().zip(predicted) {
            confusion[t.index()][p.index()] += 1;
        }

        let total: usize = confusion.iter().flatten().sum();
        let correct: usize = (0..Label::COUNT).map(|i| confusion[i][i]).sum();

        let per_class = Label::ALL
            .iter()
            .map(|&label| {
                let i = label.index();
                let tp = confusion[i][i];
                let predicted_as: usize = (0..Label::COUNT).map(|r| confusion[r][i]).sum();
                let support: usize = confusion[i].iter().sum();
                let precision = ratio(tp, predicted_as);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        Self {
            accuracy: ratio(correct, total),
            per_class,
            confusion,
        }
    }

    /// Metrics for `label`
    pub fn class(&self, label: Label) -> Option<&ClassMetrics> {
        self.per_class.iter().find(|m| m.label == label)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {:.4}", self.accuracy)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.label.as_str(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows = true, cols = predicted):")?;
        for row in &self.confusion {
            let cells: Vec<String> = row.iter().map(|c| format!("{:>6}", c)).collect();
            writeln!(f, "[{} ]", cells.join(""))?;
        }
        Ok(())
    }
}
