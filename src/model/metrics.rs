//! Classification Metrics
//!
//! Accuracy, per-class precision/recall/F1 and feature-importance ranking
//! reported after training.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scores for one finishing position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: u32,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Held-out evaluation of a classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Compare predictions with the true labels for every class in `classes`
pub fn evaluate(y_true: &[u32], y_pred: &[u32], classes: &[u32]) -> ClassificationReport {
    let total = y_true.len().min(y_pred.len());
    let pairs = || y_true.iter().zip(y_pred.iter());

    let correct = pairs().filter(|(t, p)| t == p).count();

    let per_class: Vec<ClassMetrics> = classes
        .iter()
        .map(|&label| {
            let tp = pairs().filter(|(t, p)| **t == label && **p == label).count();
            let predicted = pairs().filter(|(_, p)| **p == label).count();
            let support = pairs().filter(|(t, _)| **t == label).count();

            let precision = ratio(tp, predicted);
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

    let n_classes = per_class.len().max(1) as f64;
    let macro_avg = AverageMetrics {
        precision: per_class.iter().map(|c| c.precision).sum::<f64>() / n_classes,
        recall: per_class.iter().map(|c| c.recall).sum::<f64>() / n_classes,
        f1: per_class.iter().map(|c| c.f1).sum::<f64>() / n_classes,
    };

    let support_total: usize = per_class.iter().map(|c| c.support).sum();
    let weighted = |f: fn(&ClassMetrics) -> f64| {
        if support_total == 0 {
            0.0
        } else {
            per_class.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / support_total as f64
        }
    };
    let weighted_avg = AverageMetrics {
        precision: weighted(|c| c.precision),
        recall: weighted(|c| c.recall),
        f1: weighted(|c| c.f1),
    };

    ClassificationReport {
        accuracy: ratio(correct, total),
        per_class,
        macro_avg,
        weighted_avg,
        support: total,
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.per_class {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1, self.support
            )?;
        }
        Ok(())
    }
}

/// Pair feature names with importances, most important first
pub fn rank_importances(names: &[String], importances: &[f64]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = names
        .iter()
        .cloned()
        .zip(importances.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}
