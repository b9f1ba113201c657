use chrono::Duration;
use lapse_core::retention::{RetentionPolicy, sweep};
use proptest::prelude::*;

use generators::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(2000))]

    #[test]
    fn sweep_is_idempotent_at_a_fixed_instant(items in arb_collection(), at in arb_offset()) {
        let now = base_time() + Duration::minutes(at);
        let policy = RetentionPolicy::default();

        // A fade is followed by a purge on the next pass, so settle twice.
        let once = sweep(items, now, &policy);
        let settled = sweep(once.items, now, &policy);
        let again = sweep(settled.items.clone(), now, &policy);

        prop_assert!(!again.changed);
        prop_assert_eq!(again.items, settled.items);
    }

    #[test]
    fn sweep_preserves_invariants(items in arb_collection(), at in arb_offset()) {
        let now = base_time() + Duration::minutes(at);
        let outcome = sweep(items, now, &RetentionPolicy::default());
        for item in &outcome.items {
            prop_assert!(item.invariant_violations().is_empty(), "{:?}", item);
        }
    }

    #[test]
    fn sweep_keeps_order_and_only_drops_reported_ids(items in arb_collection(), at in arb_offset()) {
        let now = base_time() + Duration::minutes(at);
        let before: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        let outcome = sweep(items, now, &RetentionPolicy::default());

        let expected: Vec<String> = before
            .iter()
            .filter(|id| {
                !outcome.report.purged_archived.contains(id)
                    && !outcome.report.purged_expired.contains(id)
            })
            .cloned()
            .collect();
        let after: Vec<String> = outcome.items.iter().map(|i| i.id.clone()).collect();

        prop_assert_eq!(after, expected);
        prop_assert_eq!(outcome.changed, !outcome.report.is_empty());
    }

    #[test]
    fn active_items_are_never_removed(items in arb_collection(), at in arb_offset()) {
        let now = base_time() + Duration::minutes(at);
        let active: Vec<String> = items
            .iter()
            .filter(|i| !i.is_terminal() && !i.archived)
            .map(|i| i.id.clone())
            .collect();
        let outcome = sweep(items, now, &RetentionPolicy::default());
        for id in active {
            prop_assert!(outcome.items.iter().any(|i| i.id == id));
        }
    }

    #[test]
    fn fading_never_removes_in_the_same_pass(items in arb_collection(), at in arb_offset()) {
        let now = base_time() + Duration::minutes(at);
        let outcome = sweep(items, now, &RetentionPolicy::default());
        for id in &outcome.report.faded {
            let survivor = outcome.items.iter().find(|i| &i.id == id);
            prop_assert!(survivor.is_some_and(|i| i.is_expired));
        }
    }
}
