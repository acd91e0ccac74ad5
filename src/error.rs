/// Reasons a risk snapshot is rejected at the data-provider boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SnapshotError {
    #[error("student id must not be empty")]
    EmptyStudentId,

    #[error("student {student_id} has an empty name")]
    EmptyStudentName { student_id: String },

    #[error("risk score {0} is outside 0..=100")]
    ScoreOutOfRange(f64),

    #[error("{factor} sub-score {value} is outside 0..=100")]
    FactorOutOfRange { factor: &'static str, value: f64 },

    #[error("unknown risk level: {0}")]
    UnknownRiskLevel(String),

    #[error("unknown alert severity: {0}")]
    UnknownSeverity(String),
}
