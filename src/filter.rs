use tracing::debug;

use crate::models::{RiskLevel, RiskSnapshot};

/// Narrows a cohort by risk tier and by a name or id search.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    /// Compared with the tier implied by the score, not the reported level.
    pub level: Option<RiskLevel>,
    /// Case-insensitive substring of the student's name or id.
    pub search: Option<String>,
}

impl SnapshotFilter {
    pub fn matches(&self, snapshot: &RiskSnapshot) -> bool {
        let level_ok = self
            .level
            .map_or(true, |level| RiskLevel::from_score(snapshot.score()) == level);

        let search_ok = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                snapshot.student_name.to_lowercase().contains(&term)
                    || snapshot.student_id.to_lowercase().contains(&term)
            }
            _ => true,
        };

        level_ok && search_ok
    }

    /// Matching snapshots, highest score first.
    pub fn apply(&self, snapshots: Vec<RiskSnapshot>) -> Vec<RiskSnapshot> {
        let total = snapshots.len();
        let mut kept: Vec<RiskSnapshot> = snapshots
            .into_iter()
            .filter(|snapshot| self.matches(snapshot))
            .collect();
        kept.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!(total, kept = kept.len(), filter = ?self, "filtered snapshots");
        kept
    }
}
