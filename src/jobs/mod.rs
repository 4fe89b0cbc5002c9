use std::collections::BTreeMap;

pub mod counter_resync;
pub mod expired_assignments;
pub mod inactive_reviewers;

#[cfg(test)]
mod tests;

pub use counter_resync::CounterResyncJob;
pub use expired_assignments::ExpiredAssignmentSweep;
pub use inactive_reviewers::InactiveReviewerSweep;

/// Assignment ids grouped per reviewer, so each reviewer's batch can run in
/// its own short transaction and one failure does not abort the whole sweep.
pub(crate) fn group_by_reviewer(
    rows: impl IntoIterator<Item = (i64, i64)>,
) -> BTreeMap<i64, Vec<i64>> {
    let mut grouped: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for (reviewer_id, assignment_id) in rows {
        grouped.entry(reviewer_id).or_default().push(assignment_id);
    }
    grouped
}
