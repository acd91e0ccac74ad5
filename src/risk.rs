use tracing::debug;

use crate::models::{
    FactorBreakdown, RiskLevel, RiskSnapshot, Trajectory, TrajectoryPrediction, Urgency,
};

/// Lowest score of the critical band.
pub const CRITICAL_THRESHOLD: f64 = 81.0;
/// Sub-scores strictly above this count as critical factors.
pub const FACTOR_THRESHOLD: f64 = 50.0;
/// Students further than this from critical are left out of the ranking.
pub const RANKING_HORIZON_DAYS: u32 = 60;
pub const MAX_PRIORITY: u8 = 10;

const DAYS_PER_WEEK: f64 = 7.0;

const ACTION_IMMEDIATE: &str = "Intervención inmediata requerida";
const ACTION_48_HOURS: &str = "Plan de intervención en 48 horas";
const ACTION_WEEKLY_PLAN: &str = "Monitoreo semanal y plan preventivo";
const ACTION_FORTNIGHTLY: &str = "Seguimiento quincenal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoreBand {
    Critical,
    High,
    Moderate,
    Regular,
    Low,
}

impl ScoreBand {
    fn of(score: f64) -> Self {
        if score >= CRITICAL_THRESHOLD {
            ScoreBand::Critical
        } else if score >= 66.0 {
            ScoreBand::High
        } else if score >= 51.0 {
            ScoreBand::Moderate
        } else if score >= 31.0 {
            ScoreBand::Regular
        } else {
            ScoreBand::Low
        }
    }

    /// Score points lost per week when nobody intervenes.
    fn weekly_decline(self) -> Option<f64> {
        match self {
            ScoreBand::High => Some(2.0),
            ScoreBand::Moderate => Some(1.5),
            ScoreBand::Regular => Some(1.0),
            ScoreBand::Critical | ScoreBand::Low => None,
        }
    }

    fn trajectory(self) -> Trajectory {
        match self {
            ScoreBand::Critical => Trajectory::Critical,
            ScoreBand::High | ScoreBand::Moderate => Trajectory::Declining,
            ScoreBand::Regular | ScoreBand::Low => Trajectory::Stable,
        }
    }

    fn urgency(self) -> Urgency {
        match self {
            ScoreBand::Critical => Urgency::Immediate,
            ScoreBand::High => Urgency::High,
            ScoreBand::Moderate => Urgency::Medium,
            ScoreBand::Regular | ScoreBand::Low => Urgency::Low,
        }
    }

    fn priority_weight(self) -> u8 {
        match self {
            ScoreBand::Critical => 5,
            ScoreBand::High => 4,
            ScoreBand::Moderate => 3,
            ScoreBand::Regular => 2,
            ScoreBand::Low => 1,
        }
    }
}

/// Days until `score` reaches the critical band, rounded half away from zero.
/// Zero is reserved for the critical band itself.
fn days_to_critical(score: f64, band: ScoreBand) -> Option<u32> {
    if band == ScoreBand::Critical {
        return Some(0);
    }
    let rate = band.weekly_decline()?;
    let days = ((CRITICAL_THRESHOLD - score) / rate * DAYS_PER_WEEK).round();
    Some(days.max(1.0) as u32)
}

fn factor_findings(breakdown: &FactorBreakdown) -> Vec<(String, &'static str)> {
    let checks = [
        (
            breakdown.academic,
            "Riesgo académico alto",
            "Reforzamiento académico urgente",
        ),
        (
            breakdown.emotional,
            "Estado emocional preocupante",
            "Sesión con orientación psicológica",
        ),
        (
            breakdown.attendance,
            "Asistencia deficiente",
            "Monitoreo de asistencia semanal",
        ),
        (
            breakdown.engagement,
            "Bajo compromiso",
            "Actividades de motivación y engagement",
        ),
    ];

    checks
        .into_iter()
        .filter(|(value, _, _)| *value > FACTOR_THRESHOLD)
        .map(|(value, label, action)| (format!("{label} ({}%)", value.round() as i64), action))
        .collect()
}

/// Composite 1..=10 rank from score band, factor count and urgency.
pub fn intervention_priority(score: f64, factor_count: usize, urgency: Urgency) -> u8 {
    let band = ScoreBand::of(score).priority_weight();
    let factors = factor_count.min(3) as u8;
    let urgency = match urgency {
        Urgency::Immediate => 2,
        Urgency::High => 1,
        Urgency::Medium | Urgency::Low => 0,
    };
    (band + factors + urgency).min(MAX_PRIORITY)
}

/// Projects a single snapshot onto its trajectory towards critical risk.
pub fn estimate(snapshot: &RiskSnapshot) -> TrajectoryPrediction {
    let score = snapshot.score();
    let band = ScoreBand::of(score);

    let implied = RiskLevel::from_score(score);
    if implied != snapshot.risk_level {
        debug!(
            student_id = %snapshot.student_id,
            reported = %snapshot.risk_level,
            implied = %implied,
            "risk level disagrees with score; using score"
        );
    }

    let mut critical_factors = Vec::new();
    let mut recommended_actions = Vec::new();

    if let Some(breakdown) = &snapshot.factor_breakdown {
        for (finding, action) in factor_findings(breakdown) {
            critical_factors.push(finding);
            recommended_actions.push(action.to_string());
        }
    }

    if let Some(alerts) = &snapshot.active_alerts {
        let unattended = alerts.iter().filter(|alert| !alert.acknowledged).count();
        if unattended > 0 {
            critical_factors.push(format!("{unattended} alerta(s) sin atender"));
        }
    }

    match band {
        ScoreBand::Critical => recommended_actions.insert(0, ACTION_IMMEDIATE.to_string()),
        ScoreBand::High => recommended_actions.insert(0, ACTION_48_HOURS.to_string()),
        ScoreBand::Moderate => recommended_actions.insert(0, ACTION_WEEKLY_PLAN.to_string()),
        ScoreBand::Regular => recommended_actions.push(ACTION_FORTNIGHTLY.to_string()),
        ScoreBand::Low => {}
    }

    let urgency = band.urgency();
    let intervention_priority = intervention_priority(score, critical_factors.len(), urgency);

    TrajectoryPrediction {
        student_id: snapshot.student_id.clone(),
        student_name: snapshot.student_name.clone(),
        current_risk_score: score,
        current_risk_level: snapshot.risk_level,
        estimated_days_to_critical: days_to_critical(score, band),
        trajectory: band.trajectory(),
        urgency,
        critical_factors,
        recommended_actions,
        intervention_priority,
    }
}

/// Estimates every snapshot, keeps those within `horizon_days` of critical
/// and orders them by priority, then by fewest days left.
pub fn rank_within_horizon(
    snapshots: &[RiskSnapshot],
    horizon_days: u32,
) -> Vec<TrajectoryPrediction> {
    let mut ranked: Vec<TrajectoryPrediction> = snapshots
        .iter()
        .map(estimate)
        .filter(|prediction| {
            prediction
                .estimated_days_to_critical
                .is_some_and(|days| days <= horizon_days)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.intervention_priority
            .cmp(&a.intervention_priority)
            .then_with(|| a.estimated_days_to_critical.cmp(&b.estimated_days_to_critical))
    });

    debug!(
        considered = snapshots.len(),
        ranked = ranked.len(),
        horizon_days,
        "ranked students for intervention"
    );
    ranked
}

pub fn rank_for_intervention(snapshots: &[RiskSnapshot]) -> Vec<TrajectoryPrediction> {
    rank_within_horizon(snapshots, RANKING_HORIZON_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActiveAlert, AlertSeverity};

    fn snapshot(id: &str, score: f64) -> RiskSnapshot {
        RiskSnapshot::new(id, format!("Estudiante {id}"), score, RiskLevel::from_score(score))
            .unwrap()
    }

    fn with_factors(score: f64, factors: [f64; 4]) -> RiskSnapshot {
        let [academic, emotional, attendance, engagement] = factors;
        let breakdown = FactorBreakdown::new(academic, emotional, attendance, engagement).unwrap();
        snapshot("s1", score).with_factors(breakdown).unwrap()
    }

    #[test]
    fn critical_student_with_academic_factor() {
        let prediction = estimate(&with_factors(85.0, [60.0, 20.0, 10.0, 10.0]));

        assert_eq!(prediction.trajectory, Trajectory::Critical);
        assert_eq!(prediction.urgency, Urgency::Immediate);
        assert_eq!(prediction.estimated_days_to_critical, Some(0));
        assert_eq!(prediction.critical_factors, vec!["Riesgo académico alto (60%)"]);
        assert_eq!(
            prediction.recommended_actions,
            vec!["Intervención inmediata requerida", "Reforzamiento académico urgente"]
        );
        assert_eq!(prediction.intervention_priority, 8);
    }

    #[test]
    fn low_risk_student_without_details() {
        let prediction = estimate(&snapshot("s2", 20.0));

        assert_eq!(prediction.trajectory, Trajectory::Stable);
        assert_eq!(prediction.urgency, Urgency::Low);
        assert_eq!(prediction.estimated_days_to_critical, None);
        assert!(prediction.critical_factors.is_empty());
        assert!(prediction.recommended_actions.is_empty());
        assert_eq!(prediction.intervention_priority, 1);
    }

    #[test]
    fn day_estimates_follow_band_rates() {
        let days = |score| estimate(&snapshot("s", score)).estimated_days_to_critical;

        assert_eq!(days(80.0), Some(4));
        assert_eq!(days(70.0), Some(39));
        assert_eq!(days(66.0), Some(53));
        assert_eq!(days(65.0), Some(75));
        assert_eq!(days(51.0), Some(140));
        assert_eq!(days(50.0), Some(217));
        assert_eq!(days(31.0), Some(350));
        assert_eq!(days(30.0), None);
        assert_eq!(days(81.0), Some(0));
        assert_eq!(days(100.0), Some(0));
    }

    #[test]
    fn fractional_scores_use_lower_bounds() {
        let prediction = estimate(&snapshot("s", 80.5));
        assert_eq!(prediction.urgency, Urgency::High);
        assert_eq!(prediction.estimated_days_to_critical, Some(2));

        let prediction = estimate(&snapshot("s", 80.95));
        assert_eq!(prediction.estimated_days_to_critical, Some(1));

        let prediction = estimate(&snapshot("s", 30.9));
        assert_eq!(prediction.estimated_days_to_critical, None);
    }

    #[test]
    fn band_actions_lead_or_trail() {
        let high = estimate(&with_factors(70.0, [10.0, 75.0, 10.0, 10.0]));
        assert_eq!(
            high.recommended_actions,
            vec!["Plan de intervención en 48 horas", "Sesión con orientación psicológica"]
        );
        assert_eq!(high.trajectory, Trajectory::Declining);

        let moderate = estimate(&snapshot("s", 55.0));
        assert_eq!(moderate.urgency, Urgency::Medium);
        assert_eq!(moderate.recommended_actions, vec!["Monitoreo semanal y plan preventivo"]);

        let regular = estimate(&with_factors(40.0, [10.0, 10.0, 10.0, 90.0]));
        assert_eq!(
            regular.recommended_actions,
            vec!["Actividades de motivación y engagement", "Seguimiento quincenal"]
        );
    }

    #[test]
    fn factors_at_threshold_are_not_critical() {
        let prediction = estimate(&with_factors(40.0, [50.0, 50.0, 50.4, 50.6]));
        assert_eq!(
            prediction.critical_factors,
            vec!["Asistencia deficiente (50%)", "Bajo compromiso (51%)"]
        );
    }

    #[test]
    fn unattended_alerts_count_as_a_factor() {
        let alerts = vec![
            ActiveAlert {
                severity: AlertSeverity::High,
                acknowledged: false,
            },
            ActiveAlert {
                severity: AlertSeverity::Low,
                acknowledged: true,
            },
            ActiveAlert {
                severity: AlertSeverity::Critical,
                acknowledged: false,
            },
        ];
        let prediction = estimate(&snapshot("s", 70.0).with_alerts(alerts));

        assert_eq!(prediction.critical_factors, vec!["2 alerta(s) sin atender"]);
        assert_eq!(prediction.recommended_actions, vec!["Plan de intervención en 48 horas"]);
        assert_eq!(prediction.intervention_priority, 4 + 1 + 1);
    }

    #[test]
    fn acknowledged_alerts_are_ignored() {
        let alerts = vec![ActiveAlert {
            severity: AlertSeverity::Medium,
            acknowledged: true,
        }];
        let prediction = estimate(&snapshot("s", 70.0).with_alerts(alerts));
        assert!(prediction.critical_factors.is_empty());
    }

    #[test]
    fn priority_is_capped() {
        let alerts = vec![ActiveAlert {
            severity: AlertSeverity::High,
            acknowledged: false,
        }];
        let snapshot = with_factors(95.0, [90.0, 90.0, 90.0, 90.0]).with_alerts(alerts);
        let prediction = estimate(&snapshot);

        assert_eq!(prediction.critical_factors.len(), 5);
        assert_eq!(prediction.intervention_priority, MAX_PRIORITY);
        assert_eq!(intervention_priority(100.0, 99, Urgency::Immediate), 10);
    }

    #[test]
    fn estimates_are_repeatable() {
        let snapshot = with_factors(72.0, [55.0, 65.0, 10.0, 70.0]);
        assert_eq!(estimate(&snapshot), estimate(&snapshot));
    }

    #[test]
    fn higher_band_ranks_first_with_equal_factors() {
        let ranked = rank_within_horizon(&[snapshot("b", 55.0), snapshot("a", 70.0)], 365);
        let ids: Vec<&str> = ranked.iter().map(|p| p.student_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn ranking_drops_students_beyond_horizon() {
        let snapshots = [
            snapshot("low", 20.0),
            snapshot("regular", 45.0),
            snapshot("moderate", 60.0),
            snapshot("high", 70.0),
            snapshot("critical", 90.0),
        ];
        let ranked = rank_for_intervention(&snapshots);
        let ids: Vec<&str> = ranked.iter().map(|p| p.student_id.as_str()).collect();
        assert_eq!(ids, vec!["critical", "high"]);
    }

    #[test]
    fn horizon_is_inclusive() {
        let snapshots = [snapshot("h", 70.0)];
        assert_eq!(rank_within_horizon(&snapshots, 39).len(), 1);
        assert!(rank_within_horizon(&snapshots, 38).is_empty());
    }

    #[test]
    fn ties_break_on_fewer_days() {
        let ranked = rank_for_intervention(&[snapshot("far", 67.0), snapshot("near", 79.0)]);
        assert_eq!(ranked[0].student_id, "near");
        assert_eq!(ranked[0].intervention_priority, ranked[1].intervention_priority);
        assert!(ranked[0].estimated_days_to_critical < ranked[1].estimated_days_to_critical);
    }
}
