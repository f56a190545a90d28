/// Property-based tests using proptest
/// Invariants of the aggregation pipeline and the rotation selector
use proptest::prelude::*;
use review_portal::aggregation::{aggregate, compute_statistics, filter_reviews, sort_reviews};
use review_portal::models::{CategoryFilter, ReviewRecord, ServiceType, SortKey, ViewParameters};
use review_portal::rotation::next_index;

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

fn service_strategy() -> impl Strategy<Value = ServiceType> {
    prop_oneof![
        Just(ServiceType::HouseholdShifting),
        Just(ServiceType::CarTransport),
        Just(ServiceType::BikeTransport),
        Just(ServiceType::Warehousing),
        Just(ServiceType::Other("Household".to_string())),
    ]
}

fn record_strategy(max_rating: u8) -> impl Strategy<Value = ReviewRecord> {
    (
        0..=max_rating,
        service_strategy(),
        any::<bool>(),
        proptest::option::of(0i64..20),
    )
        .prop_map(|(rating, service_type, verified, offset)| ReviewRecord {
            id: Uuid::new_v4(),
            name: "Prop".to_string(),
            pnr: "VRL0000".to_string(),
            from_location: None,
            to_location: None,
            service_type,
            rating,
            comment: "generated".to_string(),
            user_id: "anonymous".to_string(),
            // Small offset range so equal timestamps are common.
            created_at: offset.map(|o| {
                Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::minutes(o)
            }),
            verified,
            admin_reply: None,
        })
}

fn sort_strategy() -> impl Strategy<Value = SortKey> {
    prop_oneof![Just(SortKey::Newest), Just(SortKey::Highest), Just(SortKey::Lowest)]
}

fn view_strategy() -> impl Strategy<Value = ViewParameters> {
    (
        prop_oneof![
            Just(CategoryFilter::All),
            service_strategy().prop_map(CategoryFilter::Service),
        ],
        sort_strategy(),
        any::<bool>(),
    )
        .prop_map(|(category_filter, sort_key, verified_only)| ViewParameters {
            category_filter,
            sort_key,
            verified_only,
        })
}

// Property: distribution never counts more records than exist
proptest! {
    #[test]
    fn distribution_bounded_by_total(records in prop::collection::vec(record_strategy(7), 0..40)) {
        let stats = compute_statistics(&records);
        let bucketed = stats.distribution.bucketed();
        prop_assert!(bucketed <= stats.total);

        let all_valid = records.iter().all(|r| (1..=5).contains(&r.rating));
        prop_assert_eq!(bucketed == stats.total, all_valid);
    }

    #[test]
    fn average_within_star_range(records in prop::collection::vec(record_strategy(5), 0..40)) {
        let stats = compute_statistics(&records);
        let any_rated = records.iter().any(|r| r.rating >= 1);
        if any_rated {
            prop_assert!(stats.average >= 1.0 && stats.average <= 5.0);
        } else {
            prop_assert_eq!(stats.average, 0.0);
        }
    }

    #[test]
    fn stats_ignore_view(records in prop::collection::vec(record_strategy(5), 0..30), view in view_strategy()) {
        let result = aggregate(&records, &view);
        prop_assert_eq!(&result.stats, &compute_statistics(&records));
        prop_assert_eq!(result.stats.total, records.len());
    }
}

// Property: filtering
proptest! {
    #[test]
    fn filtering_is_idempotent(records in prop::collection::vec(record_strategy(5), 0..30), view in view_strategy()) {
        let once = filter_reviews(records.iter(), &view);
        let twice = filter_reviews(once.iter().copied(), &view);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn filtered_records_satisfy_view(records in prop::collection::vec(record_strategy(5), 0..30), view in view_strategy()) {
        for r in aggregate(&records, &view).display_list {
            prop_assert!(view.category_filter.matches(&r.service_type));
            prop_assert!(!view.verified_only || r.verified);
        }
    }
}

// Property: sorting is stable for every key
proptest! {
    #[test]
    fn sorting_is_stable(records in prop::collection::vec(record_strategy(5), 0..30), sort_key in sort_strategy()) {
        let position = |id: Uuid| records.iter().position(|r| r.id == id).unwrap();

        let mut list: Vec<&ReviewRecord> = records.iter().collect();
        sort_reviews(&mut list, sort_key);
        prop_assert_eq!(list.len(), records.len());

        for pair in list.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let equal_keys = match sort_key {
                SortKey::Newest => a.created_at == b.created_at,
                SortKey::Highest | SortKey::Lowest => a.rating == b.rating,
            };
            if equal_keys {
                prop_assert!(position(a.id) < position(b.id));
            }
        }
    }

    #[test]
    fn sorting_orders_by_key(records in prop::collection::vec(record_strategy(5), 0..30), sort_key in sort_strategy()) {
        let mut list: Vec<&ReviewRecord> = records.iter().collect();
        sort_reviews(&mut list, sort_key);

        for pair in list.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            match sort_key {
                SortKey::Highest => prop_assert!(a.rating >= b.rating),
                SortKey::Lowest => prop_assert!(a.rating <= b.rating),
                SortKey::Newest => match (a.created_at, b.created_at) {
                    (Some(_), None) => prop_assert!(false, "pending record sorted after a timestamped one"),
                    (Some(x), Some(y)) => prop_assert!(x >= y),
                    _ => {}
                },
            }
        }
    }
}

// Property: rotation cycles through every index
proptest! {
    #[test]
    fn next_index_cycles(size in 1usize..50, start in any::<usize>()) {
        let mut index = start;
        let mut visited = vec![false; size];
        for _ in 0..size {
            index = next_index(index, size).unwrap();
            prop_assert!(!visited[index]);
            visited[index] = true;
        }
        prop_assert_eq!(index, start % size);
        prop_assert!(visited.iter().all(|v| *v));
    }

    #[test]
    fn next_index_empty_set_has_no_index(current in any::<usize>()) {
        prop_assert_eq!(next_index(current, 0), None);
    }
}
