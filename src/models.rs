use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// Six ordered tiers, low to high risk, with the backend's wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "excelente")]
    Excellent,
    #[serde(rename = "bueno")]
    Good,
    #[serde(rename = "regular")]
    Regular,
    #[serde(rename = "riesgo_moderado")]
    ModerateRisk,
    #[serde(rename = "riesgo_alto")]
    HighRisk,
    #[serde(rename = "riesgo_critico")]
    CriticalRisk,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 6] = [
        RiskLevel::Excellent,
        RiskLevel::Good,
        RiskLevel::Regular,
        RiskLevel::ModerateRisk,
        RiskLevel::HighRisk,
        RiskLevel::CriticalRisk,
    ];

    /// Tier implied by a score. Bands use lower-bound comparisons so that
    /// fractional scores land in the same band the estimator uses.
    pub fn from_score(score: f64) -> Self {
        if score >= 81.0 {
            RiskLevel::CriticalRisk
        } else if score >= 66.0 {
            RiskLevel::HighRisk
        } else if score >= 51.0 {
            RiskLevel::ModerateRisk
        } else if score >= 31.0 {
            RiskLevel::Regular
        } else if score >= 16.0 {
            RiskLevel::Good
        } else {
            RiskLevel::Excellent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Excellent => "excelente",
            RiskLevel::Good => "bueno",
            RiskLevel::Regular => "regular",
            RiskLevel::ModerateRisk => "riesgo_moderado",
            RiskLevel::HighRisk => "riesgo_alto",
            RiskLevel::CriticalRisk => "riesgo_critico",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RiskLevel::Excellent => "Excelente",
            RiskLevel::Good => "Bueno",
            RiskLevel::Regular => "Regular",
            RiskLevel::ModerateRisk => "Riesgo Moderado",
            RiskLevel::HighRisk => "Riesgo Alto",
            RiskLevel::CriticalRisk => "Riesgo Crítico",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = SnapshotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        RiskLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == value.trim())
            .ok_or_else(|| SnapshotError::UnknownRiskLevel(value.to_string()))
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dropout-risk score known to lie in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct RiskScore(f64);

impl RiskScore {
    pub fn new(value: f64) -> Result<Self, SnapshotError> {
        if (0.0..=100.0).contains(&value) {
            Ok(RiskScore(value))
        } else {
            Err(SnapshotError::ScoreOutOfRange(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for RiskScore {
    type Error = SnapshotError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        RiskScore::new(value)
    }
}

impl From<RiskScore> for f64 {
    fn from(score: RiskScore) -> f64 {
        score.0
    }
}

/// Per-dimension sub-scores, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FactorBreakdownRecord")]
pub struct FactorBreakdown {
    pub academic: f64,
    pub emotional: f64,
    pub attendance: f64,
    pub engagement: f64,
}

impl FactorBreakdown {
    pub fn new(
        academic: f64,
        emotional: f64,
        attendance: f64,
        engagement: f64,
    ) -> Result<Self, SnapshotError> {
        let breakdown = FactorBreakdown {
            academic,
            emotional,
            attendance,
            engagement,
        };
        breakdown.validate()?;
        Ok(breakdown)
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        for (factor, value) in self.named() {
            if !(0.0..=100.0).contains(&value) {
                return Err(SnapshotError::FactorOutOfRange { factor, value });
            }
        }
        Ok(())
    }

    pub fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("academic", self.academic),
            ("emotional", self.emotional),
            ("attendance", self.attendance),
            ("engagement", self.engagement),
        ]
    }
}

#[derive(Deserialize)]
struct FactorBreakdownRecord {
    academic: f64,
    emotional: f64,
    attendance: f64,
    engagement: f64,
}

impl TryFrom<FactorBreakdownRecord> for FactorBreakdown {
    type Error = SnapshotError;

    fn try_from(record: FactorBreakdownRecord) -> Result<Self, Self::Error> {
        FactorBreakdown::new(
            record.academic,
            record.emotional,
            record.attendance,
            record.engagement,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl FromStr for AlertSeverity {
    type Err = SnapshotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "low" => Ok(AlertSeverity::Low),
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(SnapshotError::UnknownSeverity(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveAlert {
    pub severity: AlertSeverity,
    pub acknowledged: bool,
}

/// One student's risk state as delivered by the data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RiskSnapshotRecord")]
pub struct RiskSnapshot {
    pub student_id: String,
    pub student_name: String,
    pub risk_score: RiskScore,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor_breakdown: Option<FactorBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_alerts: Option<Vec<ActiveAlert>>,
}

#[derive(Deserialize)]
struct RiskSnapshotRecord {
    student_id: String,
    student_name: String,
    risk_score: RiskScore,
    risk_level: RiskLevel,
    #[serde(default)]
    factor_breakdown: Option<FactorBreakdown>,
    #[serde(default)]
    active_alerts: Option<Vec<ActiveAlert>>,
}

impl TryFrom<RiskSnapshotRecord> for RiskSnapshot {
    type Error = SnapshotError;

    fn try_from(record: RiskSnapshotRecord) -> Result<Self, Self::Error> {
        let snapshot = RiskSnapshot {
            student_id: record.student_id,
            student_name: record.student_name,
            risk_score: record.risk_score,
            risk_level: record.risk_level,
            factor_breakdown: record.factor_breakdown,
            active_alerts: record.active_alerts,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl RiskSnapshot {
    pub fn new(
        student_id: impl Into<String>,
        student_name: impl Into<String>,
        risk_score: f64,
        risk_level: RiskLevel,
    ) -> Result<Self, SnapshotError> {
        let snapshot = RiskSnapshot {
            student_id: student_id.into(),
            student_name: student_name.into(),
            risk_score: RiskScore::new(risk_score)?,
            risk_level,
            factor_breakdown: None,
            active_alerts: None,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn with_factors(mut self, breakdown: FactorBreakdown) -> Result<Self, SnapshotError> {
        breakdown.validate()?;
        self.factor_breakdown = Some(breakdown);
        Ok(self)
    }

    pub fn with_alerts(mut self, alerts: Vec<ActiveAlert>) -> Self {
        self.active_alerts = Some(alerts);
        self
    }

    /// Checks the invariants serde cannot express on its own.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.student_id.trim().is_empty() {
            return Err(SnapshotError::EmptyStudentId);
        }
        if self.student_name.trim().is_empty() {
            return Err(SnapshotError::EmptyStudentName {
                student_id: self.student_id.clone(),
            });
        }
        if let Some(breakdown) = &self.factor_breakdown {
            breakdown.validate()?;
        }
        Ok(())
    }

    pub fn score(&self) -> f64 {
        self.risk_score.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trajectory {
    Improving,
    Stable,
    Declining,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Immediate,
    High,
    Medium,
    Low,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Immediate => "immediate",
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPrediction {
    pub student_id: String,
    pub student_name: String,
    pub current_risk_score: f64,
    pub current_risk_level: RiskLevel,
    /// `None` when the student is too far from the critical band to estimate.
    pub estimated_days_to_critical: Option<u32>,
    pub trajectory: Trajectory,
    pub urgency: Urgency,
    pub critical_factors: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub intervention_priority: u8,
}

/// Weekly probability (0..=100) of a student staying below critical risk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurvivalCurve {
    pub label: String,
    pub risk_score: f64,
    /// Index is the week, starting at 0.
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelSummary {
    pub level: RiskLevel,
    pub count: usize,
    pub avg_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_score_bands() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Excellent);
        assert_eq!(RiskLevel::from_score(15.9), RiskLevel::Excellent);
        assert_eq!(RiskLevel::from_score(16.0), RiskLevel::Good);
        assert_eq!(RiskLevel::from_score(30.5), RiskLevel::Good);
        assert_eq!(RiskLevel::from_score(31.0), RiskLevel::Regular);
        assert_eq!(RiskLevel::from_score(51.0), RiskLevel::ModerateRisk);
        assert_eq!(RiskLevel::from_score(80.5), RiskLevel::HighRisk);
        assert_eq!(RiskLevel::from_score(81.0), RiskLevel::CriticalRisk);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::CriticalRisk);
    }

    #[test]
    fn level_names_match_backend() {
        let level: RiskLevel = serde_json::from_str("\"riesgo_moderado\"").unwrap();
        assert_eq!(level, RiskLevel::ModerateRisk);
        assert_eq!("riesgo_critico".parse::<RiskLevel>(), Ok(RiskLevel::CriticalRisk));
        assert!("high".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn scores_outside_range_are_rejected() {
        assert!(RiskScore::new(100.0).is_ok());
        assert_eq!(RiskScore::new(-0.5), Err(SnapshotError::ScoreOutOfRange(-0.5)));
        assert!(RiskScore::new(100.01).is_err());
        assert!(RiskScore::new(f64::NAN).is_err());
    }

    #[test]
    fn snapshot_json_rejects_bad_score() {
        let json = r#"{"student_id":"s1","student_name":"Ana","risk_score":140,
            "risk_level":"riesgo_critico"}"#;
        assert!(serde_json::from_str::<RiskSnapshot>(json).is_err());
    }

    #[test]
    fn snapshot_json_is_validated() {
        let empty_ids =
            r#"{"student_id":"","student_name":"","risk_score":50,"risk_level":"regular"}"#;
        assert!(serde_json::from_str::<RiskSnapshot>(empty_ids).is_err());

        let bad_factors = r#"{"student_id":"s1","student_name":"Ana","risk_score":50,
            "risk_level":"regular",
            "factor_breakdown":{"academic":500,"emotional":-40,"attendance":0,"engagement":0}}"#;
        let err = serde_json::from_str::<RiskSnapshot>(bad_factors).unwrap_err();
        assert!(err.to_string().contains("academic sub-score 500"));

        let breakdown = r#"{"academic":10,"emotional":20,"attendance":101,"engagement":0}"#;
        assert!(serde_json::from_str::<FactorBreakdown>(breakdown).is_err());
    }

    #[test]
    fn snapshot_json_defaults_optional_fields() {
        let json = r#"{"student_id":"s1","student_name":"Ana","risk_score":42.5,
            "risk_level":"regular"}"#;
        let snapshot: RiskSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.score(), 42.5);
        assert!(snapshot.factor_breakdown.is_none());
        assert!(snapshot.active_alerts.is_none());
    }

    #[test]
    fn snapshot_requires_identity() {
        assert_eq!(
            RiskSnapshot::new(" ", "Ana", 10.0, RiskLevel::Excellent),
            Err(SnapshotError::EmptyStudentId)
        );
        assert!(matches!(
            RiskSnapshot::new("s1", "", 10.0, RiskLevel::Excellent),
            Err(SnapshotError::EmptyStudentName { .. })
        ));
    }

    #[test]
    fn factor_breakdown_checks_each_factor() {
        let err = FactorBreakdown::new(10.0, 20.0, 101.0, 0.0).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::FactorOutOfRange {
                factor: "attendance",
                value: 101.0
            }
        );
    }
}
