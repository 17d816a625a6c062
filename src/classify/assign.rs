//! Deterministic developer assignment used whenever the model cannot pick.

use super::Suggestion;
use crate::models::DeveloperCandidate;

pub const UNASSIGNED: &str = "Unassigned";

/// Lowest workload wins; on ties the earliest candidate is kept.
pub fn least_loaded(candidates: &[DeveloperCandidate]) -> Option<&DeveloperCandidate> {
    candidates.iter().fold(None, |best, dev| match best {
        Some(current) if current.workload <= dev.workload => Some(current),
        _ => Some(dev),
    })
}

pub fn fallback_suggestion(candidates: &[DeveloperCandidate]) -> Suggestion {
    match least_loaded(candidates) {
        Some(dev) => Suggestion {
            developer_name: dev.name.clone(),
            developer_id: dev.id,
            confidence: 0.5,
            reasoning: format!(
                "Assigned to developer with lowest workload ({} bugs)",
                dev.workload
            ),
        },
        None => Suggestion {
            developer_name: UNASSIGNED.to_string(),
            developer_id: None,
            confidence: 0.0,
            reasoning: "No developers available".to_string(),
        },
    }
}
