use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{
    LevelSummary, RiskLevel, RiskSnapshot, Trajectory, TrajectoryPrediction, Urgency,
};
use crate::risk;
use crate::survival::{self, SURVIVAL_WEEKS};

pub fn format_days_to_risk(days: Option<u32>) -> String {
    let Some(days) = days else {
        return "Bajo riesgo".to_string();
    };

    match days {
        0 => "CRÍTICO - Intervención inmediata".to_string(),
        1..=7 => format!("{days} día{} - URGENTE", if days > 1 { "s" } else { "" }),
        8..=14 => format!("{days} días - Alta prioridad"),
        15..=30 => {
            let weeks = (days as f64 / 7.0).round() as u32;
            format!("{weeks} semana{} aprox.", if weeks > 1 { "s" } else { "" })
        }
        _ => {
            let months = (days as f64 / 30.0).round() as u32;
            format!("{months} mes{} aprox.", if months > 1 { "es" } else { "" })
        }
    }
}

pub fn urgency_color(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Immediate => "red",
        Urgency::High => "orange",
        Urgency::Medium => "yellow",
        Urgency::Low => "green",
    }
}

pub fn trajectory_icon(trajectory: Trajectory) -> &'static str {
    match trajectory {
        Trajectory::Improving => "↗",
        Trajectory::Stable => "→",
        Trajectory::Declining => "↘",
        Trajectory::Critical => "⚠",
    }
}

pub fn trajectory_label(trajectory: Trajectory) -> &'static str {
    match trajectory {
        Trajectory::Improving => "En mejora",
        Trajectory::Stable => "Estable",
        Trajectory::Declining => "En declive",
        Trajectory::Critical => "CRÍTICO",
    }
}

/// Counts students per tier, classified by score. Every tier is listed,
/// lowest risk first.
pub fn summarize_by_level(snapshots: &[RiskSnapshot]) -> Vec<LevelSummary> {
    let mut totals = [(0usize, 0.0f64); 6];

    for snapshot in snapshots {
        let entry = &mut totals[RiskLevel::from_score(snapshot.score()) as usize];
        entry.0 += 1;
        entry.1 += snapshot.score();
    }

    RiskLevel::ALL
        .into_iter()
        .zip(totals)
        .map(|(level, (count, total_score))| LevelSummary {
            level,
            count,
            avg_score: if count == 0 {
                0.0
            } else {
                total_score / count as f64
            },
        })
        .collect()
}

pub fn describe_prediction(prediction: &TrajectoryPrediction) -> String {
    format!(
        "{} {} ({}) {} | {} | prioridad {}/10 | {}",
        trajectory_icon(prediction.trajectory),
        prediction.student_name,
        prediction.student_id,
        trajectory_label(prediction.trajectory),
        format_days_to_risk(prediction.estimated_days_to_critical),
        prediction.intervention_priority,
        urgency_color(prediction.urgency),
    )
}

pub fn build_report(
    scope: Option<&str>,
    generated_on: NaiveDate,
    snapshots: &[RiskSnapshot],
    max_display: usize,
) -> String {
    let ranked = risk::rank_for_intervention(snapshots);
    let summaries = summarize_by_level(snapshots);

    let mut output = String::new();
    let scope_label = scope.unwrap_or("todos los estudiantes");

    let _ = writeln!(output, "# Alertas de Supervivencia");
    let _ = writeln!(
        output,
        "Generado para {} el {} ({} estudiantes)",
        scope_label,
        generated_on,
        snapshots.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Distribución de Riesgo");

    for summary in summaries.iter() {
        let _ = writeln!(
            output,
            "- {}: {} estudiantes (score promedio {:.1})",
            summary.level.display_name(),
            summary.count,
            summary.avg_score
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Estudiantes cerca de riesgo crítico");

    if ranked.is_empty() {
        let _ = writeln!(output, "No hay estudiantes en riesgo inminente");
    } else {
        for prediction in ranked.iter().take(max_display) {
            let _ = writeln!(
                output,
                "- {} **{}** ({}): {} | urgencia {} ({}) | prioridad {}/10",
                trajectory_icon(prediction.trajectory),
                prediction.student_name,
                trajectory_label(prediction.trajectory),
                format_days_to_risk(prediction.estimated_days_to_critical),
                prediction.urgency.as_str(),
                urgency_color(prediction.urgency),
                prediction.intervention_priority
            );
            if !prediction.critical_factors.is_empty() {
                let _ = writeln!(
                    output,
                    "  - Factores: {}",
                    prediction.critical_factors.join(", ")
                );
            }
            if let Some(action) = prediction.recommended_actions.first() {
                let _ = writeln!(output, "  - Acción: {action}");
            }
        }
        if ranked.len() > max_display {
            let _ = writeln!(
                output,
                "- ... y {} estudiantes más",
                ranked.len() - max_display
            );
        }
    }

    let curves = survival::survival_curves(snapshots, SURVIVAL_WEEKS);
    if !curves.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Curva de Supervivencia");
        let weeks: Vec<String> = (0..=SURVIVAL_WEEKS).map(|week| format!("S{week}")).collect();
        let _ = writeln!(output, "| Estudiante | Score | {} |", weeks.join(" | "));
        let _ = writeln!(output, "|---|---|{}", "---|".repeat(weeks.len()));
        for curve in curves.iter() {
            let values: Vec<String> = curve
                .probabilities
                .iter()
                .map(|probability| format!("{probability:.2}"))
                .collect();
            let _ = writeln!(
                output,
                "| {} | {:.1} | {} |",
                curve.label,
                curve.risk_score,
                values.join(" | ")
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FactorBreakdown;

    fn snapshot(id: &str, score: f64) -> RiskSnapshot {
        RiskSnapshot::new(id, format!("Estudiante {id}"), score, RiskLevel::from_score(score))
            .unwrap()
    }

    #[test]
    fn days_format_by_range() {
        assert_eq!(format_days_to_risk(None), "Bajo riesgo");
        assert_eq!(format_days_to_risk(Some(0)), "CRÍTICO - Intervención inmediata");
        assert_eq!(format_days_to_risk(Some(1)), "1 día - URGENTE");
        assert_eq!(format_days_to_risk(Some(7)), "7 días - URGENTE");
        assert_eq!(format_days_to_risk(Some(8)), "8 días - Alta prioridad");
        assert_eq!(format_days_to_risk(Some(14)), "14 días - Alta prioridad");
        assert_eq!(format_days_to_risk(Some(15)), "2 semanas aprox.");
        assert_eq!(format_days_to_risk(Some(30)), "4 semanas aprox.");
        assert_eq!(format_days_to_risk(Some(31)), "1 mes aprox.");
        assert_eq!(format_days_to_risk(Some(45)), "2 meses aprox.");
        assert_eq!(format_days_to_risk(Some(90)), "3 meses aprox.");
    }

    #[test]
    fn lookups_cover_every_variant() {
        assert_eq!(urgency_color(Urgency::Immediate), "red");
        assert_eq!(urgency_color(Urgency::High), "orange");
        assert_eq!(urgency_color(Urgency::Medium), "yellow");
        assert_eq!(urgency_color(Urgency::Low), "green");

        assert_eq!(trajectory_icon(Trajectory::Improving), "↗");
        assert_eq!(trajectory_icon(Trajectory::Stable), "→");
        assert_eq!(trajectory_icon(Trajectory::Declining), "↘");
        assert_eq!(trajectory_icon(Trajectory::Critical), "⚠");
    }

    #[test]
    fn distribution_lists_all_tiers() {
        let snapshots = vec![snapshot("a", 10.0), snapshot("b", 12.0), snapshot("c", 90.0)];
        let summaries = summarize_by_level(&snapshots);

        assert_eq!(summaries.len(), 6);
        assert_eq!(summaries[0].level, RiskLevel::Excellent);
        assert_eq!(summaries[0].count, 2);
        assert!((summaries[0].avg_score - 11.0).abs() < 0.001);
        assert_eq!(summaries[3].count, 0);
        assert_eq!(summaries[3].avg_score, 0.0);
        assert_eq!(summaries[5].count, 1);
    }

    #[test]
    fn report_lists_ranked_students() {
        let critical = snapshot("c1", 88.0)
            .with_factors(FactorBreakdown::new(70.0, 10.0, 10.0, 10.0).unwrap())
            .unwrap();
        let snapshots = vec![critical, snapshot("h1", 70.0), snapshot("l1", 10.0)];
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let report = build_report(Some("Sección A"), date, &snapshots, 1);

        assert!(report.contains("Generado para Sección A el 2026-03-02 (3 estudiantes)"));
        assert!(report.contains("- Riesgo Crítico: 1 estudiantes"));
        assert!(report
            .contains("⚠ **Estudiante c1** (CRÍTICO): CRÍTICO - Intervención inmediata"));
        assert!(report.contains("  - Factores: Riesgo académico alto (70%)"));
        assert!(report.contains("  - Acción: Intervención inmediata requerida"));
        assert!(!report.contains("**Estudiante h1**"));
        assert!(report.contains("- ... y 1 estudiantes más"));

        assert!(report.contains("## Curva de Supervivencia"));
        assert!(report.contains("| Estudiante c1 | 88.0 | 100.00 |"));
        assert!(report.contains("| Promedio Salón | 56.0 | 100.00 |"));
    }

    #[test]
    fn report_handles_quiet_cohort() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let report = build_report(None, date, &[snapshot("l1", 25.0)], 5);
        assert!(report.contains("todos los estudiantes"));
        assert!(report.contains("No hay estudiantes en riesgo inminente"));
    }

    #[test]
    fn description_includes_days_and_priority() {
        let prediction = risk::estimate(&snapshot("h1", 80.0));
        assert_eq!(
            describe_prediction(&prediction),
            "↘ Estudiante h1 (h1) En declive | 4 días - URGENTE | prioridad 5/10 | orange"
        );
    }
}
