use crate::cache::ReviewerCandidate;

/// Pick the reviewer to receive the next event.
///
/// Candidates at or over the load cap are excluded; among the rest the one
/// with the strictly smallest load wins. Ties break on the lowest reviewer
/// id, so the result never depends on enumeration order.
pub fn select_reviewer(
    candidates: &[ReviewerCandidate],
    max_load: i64,
) -> Option<&ReviewerCandidate> {
    candidates
        .iter()
        .filter(|c| c.load < max_load)
        .min_by_key(|c| (c.load, c.reviewer_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(reviewer_id: i64, load: i64) -> ReviewerCandidate {
        ReviewerCandidate { reviewer_id, load }
    }

    #[test]
    fn picks_least_loaded_reviewer() {
        let candidates = vec![candidate(1, 3), candidate(2, 1), candidate(3, 5)];
        let selected = select_reviewer(&candidates, 50).unwrap();
        assert_eq!(selected.reviewer_id, 2);
    }

    #[test]
    fn ties_break_on_lowest_reviewer_id() {
        let candidates = vec![candidate(9, 2), candidate(4, 2), candidate(7, 2)];
        let selected = select_reviewer(&candidates, 50).unwrap();
        assert_eq!(selected.reviewer_id, 4);

        // Same answer regardless of enumeration order
        let mut reversed = candidates.clone();
        reversed.reverse();
        assert_eq!(select_reviewer(&reversed, 50).unwrap().reviewer_id, 4);
    }

    #[test]
    fn reviewers_at_cap_are_excluded() {
        let candidates = vec![candidate(1, 50), candidate(2, 49)];
        let selected = select_reviewer(&candidates, 50).unwrap();
        assert_eq!(selected.reviewer_id, 2);
    }

    #[test]
    fn no_candidate_when_all_at_cap() {
        let candidates = vec![candidate(1, 50), candidate(2, 51)];
        assert!(select_reviewer(&candidates, 50).is_none());
    }

    #[test]
    fn no_candidate_when_empty() {
        assert!(select_reviewer(&[], 50).is_none());
    }
}
