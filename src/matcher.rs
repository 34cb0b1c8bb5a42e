//! First-fit matcher
//!
//! Pure functions: no queue mutation happens here, the coordinator
//! removes the matched entry itself.

use crate::participant::Participant;

/// Check whether two participants accept each other
///
/// Both sides must want the other's sex, accept the other's age and not
/// block the other's identity.
pub fn is_compatible(a: &Participant, b: &Participant) -> bool {
    a.user_id != b.user_id
        && a.criteria.sex_wanted == b.attributes.sex
        && b.criteria.sex_wanted == a.attributes.sex
        && a.criteria.accepts_age(b.attributes.age)
        && b.criteria.accepts_age(a.attributes.age)
        && !a.attributes.blocks(&b.user_id)
        && !b.attributes.blocks(&a.user_id)
}

/// Find the first queued participant compatible with `candidate`
///
/// Greedy: queue order is the only tie-break.
pub fn find_match<'a, I>(candidate: &Participant, queue: I) -> Option<&'a Participant>
where
    I: IntoIterator<Item = &'a Participant>,
{
    queue.into_iter().find(|p| is_compatible(candidate, p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::{sample, Sex};
    use crate::types::UserId;

    #[test]
    fn test_mutual_match() {
        let a = sample("a", 25, Sex::Male, Sex::Female, 20, 30);
        let b = sample("b", 22, Sex::Female, Sex::Male, 20, 30);
        let queue = vec![b];

        let found = find_match(&a, &queue).expect("should match");
        assert_eq!(found.user_id, UserId::from("b"));
    }

    #[test]
    fn test_one_sided_age_range_does_not_match() {
        let a = sample("a", 25, Sex::Male, Sex::Female, 20, 30);
        let b = sample("b", 22, Sex::Female, Sex::Male, 40, 50);
        let queue = vec![b];

        assert!(find_match(&a, &queue).is_none());
    }

    #[test]
    fn test_sex_mismatch_does_not_match() {
        let a = sample("a", 25, Sex::Male, Sex::Female, 20, 30);
        let b = sample("b", 22, Sex::Male, Sex::Male, 20, 30);
        assert!(!is_compatible(&a, &b));
    }

    #[test]
    fn test_block_list_prevents_match() {
        let mut a = sample("a", 25, Sex::Male, Sex::Female, 20, 30);
        let b = sample("b", 22, Sex::Female, Sex::Male, 20, 30);
        a.attributes.block_list.insert(UserId::from("b"));

        assert!(find_match(&a, &vec![b.clone()]).is_none());

        // Blocking works from either side
        let a = sample("a", 25, Sex::Male, Sex::Female, 20, 30);
        let mut b = b;
        b.attributes.block_list.insert(UserId::from("a"));
        assert!(find_match(&a, &vec![b]).is_none());
    }

    #[test]
    fn test_never_matches_self() {
        let a = sample("a", 25, Sex::Male, Sex::Male, 20, 30);
        let also_a = sample("a", 25, Sex::Male, Sex::Male, 20, 30);
        assert!(!is_compatible(&a, &also_a));
    }

    #[test]
    fn test_first_fit_in_queue_order() {
        let a = sample("a", 25, Sex::Male, Sex::Female, 18, 40);
        let queue = vec![
            sample("too-old", 50, Sex::Female, Sex::Male, 18, 99),
            sample("first", 30, Sex::Female, Sex::Male, 18, 99),
            sample("second", 25, Sex::Female, Sex::Male, 18, 99),
        ];

        let found = find_match(&a, &queue).unwrap();
        assert_eq!(found.user_id, UserId::from("first"));
    }

    #[test]
    fn test_empty_queue() {
        let a = sample("a", 25, Sex::Male, Sex::Female, 20, 30);
        assert!(find_match(&a, &Vec::new()).is_none());
    }
}
