use crate::model::*;

// ── Slot catalog ──────────────────────────────────────────────────

/// Claimable candidates for `window`, best first.
///
/// Keeps entries whose window label equals `window` exactly and whose lock
/// flag is unlocked, then orders them by display name descending. The sort is
/// stable, so equal names keep the platform's listing order. An empty result
/// means "nothing to claim"; the caller decides what that means for the run.
pub fn resolve_candidates(snapshot: &AvailabilitySnapshot, window: &str) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = snapshot
        .entries
        .iter()
        .filter(|e| e.window == window && e.lock.is_unlocked())
        .map(|e| Candidate {
            instance_id: e.instance_id.clone(),
            display_name: e.display_name.clone(),
        })
        .collect();
    candidates.sort_by(|a, b| b.display_name.cmp(&a.display_name));
    candidates
}
