//! Exponential survival curves for the cohort chart.
//!
//! A student with score `s` is modelled as `P(t) = 100 * e^(-λt)` with
//! `λ = s / 100 * 0.15` and `t` in weeks. Probabilities are clamped to
//! `0..=100` and rounded to two decimals.

use crate::models::{RiskSnapshot, SurvivalCurve};

pub const SURVIVAL_WEEKS: u32 = 12;
pub const COHORT_LABEL: &str = "Promedio Salón";

const DECAY_PER_POINT: f64 = 0.15 / 100.0;
const MAX_CURVES: usize = 8;
const SHOW_ALL_UP_TO: usize = 10;

fn decay_rate(score: f64) -> f64 {
    score * DECAY_PER_POINT
}

/// Probabilities for weeks `0..=weeks`.
pub fn survival_curve(score: f64, weeks: u32) -> Vec<f64> {
    let lambda = decay_rate(score);
    (0..=weeks)
        .map(|week| {
            let probability = (100.0 * (-lambda * week as f64).exp()).clamp(0.0, 100.0);
            (probability * 100.0).round() / 100.0
        })
        .collect()
}

/// Curve for the mean score of the cohort, `None` for an empty cohort.
pub fn cohort_curve(snapshots: &[RiskSnapshot], weeks: u32) -> Option<SurvivalCurve> {
    if snapshots.is_empty() {
        return None;
    }
    let mean = snapshots.iter().map(RiskSnapshot::score).sum::<f64>() / snapshots.len() as f64;
    Some(SurvivalCurve {
        label: COHORT_LABEL.to_string(),
        risk_score: mean,
        probabilities: survival_curve(mean, weeks),
    })
}

/// Students drawn for the chart, highest score first. Small cohorts are
/// shown whole; larger ones are sampled every `n / 8` students, at most 8.
pub fn representative_students(snapshots: &[RiskSnapshot]) -> Vec<&RiskSnapshot> {
    let mut ordered: Vec<&RiskSnapshot> = snapshots.iter().collect();
    ordered.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if ordered.len() <= SHOW_ALL_UP_TO {
        return ordered;
    }

    let step = ordered.len() / MAX_CURVES;
    ordered.into_iter().step_by(step).take(MAX_CURVES).collect()
}

/// Curves for the representative students followed by the cohort average.
pub fn survival_curves(snapshots: &[RiskSnapshot], weeks: u32) -> Vec<SurvivalCurve> {
    let mut curves: Vec<SurvivalCurve> = representative_students(snapshots)
        .into_iter()
        .map(|snapshot| SurvivalCurve {
            label: snapshot.student_name.clone(),
            risk_score: snapshot.score(),
            probabilities: survival_curve(snapshot.score(), weeks),
        })
        .collect();
    curves.extend(cohort_curve(snapshots, weeks));
    curves
}
