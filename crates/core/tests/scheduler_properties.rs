use chrono::Duration;
use proptest::prelude::*;
use recall_core::model::{ItemId, MAX_EASE, MAX_LEVEL, MIN_EASE};
use recall_core::scheduler::{Scheduler, interval_days};
use recall_core::time::fixed_now;

fn answers() -> impl Strategy<Value = Vec<(u8, bool, u16)>> {
    // (item index, correct, minutes elapsed before the answer)
    prop::collection::vec((0_u8..4, any::<bool>(), 0_u16..5_000), 1..200)
}

proptest! {
    #[test]
    fn level_and_ease_stay_in_bounds(sequence in answers()) {
        let mut scheduler = Scheduler::new();
        let mut now = fixed_now();

        for (index, correct, minutes) in sequence {
            now += Duration::minutes(i64::from(minutes));
            let outcome = scheduler.record_answer(ItemId::from(u64::from(index)), correct, now);

            prop_assert!(outcome.item.level() <= MAX_LEVEL);
            prop_assert!(outcome.item.ease_factor() >= MIN_EASE);
            prop_assert!(outcome.item.ease_factor() <= MAX_EASE);
            prop_assert!(outcome.interval_days >= 1);
            prop_assert!(outcome.item.next_review_at() >= now);
            if !correct {
                prop_assert_eq!(outcome.item.level(), 0);
            }
        }

        for item in scheduler.registry().all_items() {
            prop_assert!(item.level() <= MAX_LEVEL);
            prop_assert!((MIN_EASE..=MAX_EASE).contains(&item.ease_factor()));
            if let Some(last) = item.last_reviewed_at() {
                prop_assert!(item.next_review_at() >= last);
            }
        }
    }

    #[test]
    fn due_items_match_next_review_filter(sequence in answers(), probe in 0_i64..20_000) {
        let mut scheduler = Scheduler::new();
        let mut now = fixed_now();
        for (index, correct, minutes) in sequence {
            now += Duration::minutes(i64::from(minutes));
            scheduler.record_answer(ItemId::from(u64::from(index)), correct, now);
        }

        let as_of = fixed_now() + Duration::minutes(probe);
        let due = scheduler.due_items(as_of);
        let expected: Vec<ItemId> = scheduler
            .registry()
            .all_items()
            .filter(|item| item.next_review_at() <= as_of)
            .map(|item| item.id().clone())
            .collect();

        prop_assert_eq!(due.len(), scheduler.due_count(as_of));
        prop_assert_eq!(due, expected);
    }

    #[test]
    fn interval_is_positive_for_any_input(level in 0_u8..=10, ease in -5.0_f64..10.0) {
        prop_assert!(interval_days(level, ease) >= 1);
    }
}

#[test]
fn due_boundary_is_inclusive() {
    let mut scheduler = Scheduler::new();
    let now = fixed_now();
    let outcome = scheduler.record_answer(ItemId::from("w1"), true, now);
    let due_at = outcome.item.next_review_at();

    assert!(scheduler.due_items(due_at - Duration::milliseconds(1)).is_empty());
    assert_eq!(scheduler.due_items(due_at), vec![ItemId::from("w1")]);
}
