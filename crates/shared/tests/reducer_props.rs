//! Property tests for the change-stream reducer.

use livetable_shared::{
    decode_event, keys, merge_events, merge_events_with, ChangeEvent, Collection, InsertPolicy,
    Item, ItemPatch, ReducerConfig, RemoveMatch,
};
use proptest::prelude::*;

fn item_strategy() -> impl Strategy<Value = Item> {
    (
        prop::sample::select(vec!["p1", "p2", "p3"]),
        prop::sample::select(vec!["u1", "u2"]),
        prop::sample::select(vec!["t1", "t2"]),
        "[a-z]{1,6}",
    )
        .prop_map(|(p, u, t, name)| Item::new(p, u, t, name))
}

fn event_strategy() -> impl Strategy<Value = ChangeEvent> {
    prop_oneof![
        item_strategy().prop_map(ChangeEvent::insert),
        (item_strategy(), "[a-z]{1,6}").prop_map(|(item, name)| {
            ChangeEvent::modify(item.primary_keys(), ItemPatch::name(name))
        }),
        item_strategy().prop_map(|item| ChangeEvent::remove(item.primary_keys())),
    ]
}

fn config_strategy() -> impl Strategy<Value = ReducerConfig> {
    (
        prop::sample::select(vec![InsertPolicy::Append, InsertPolicy::Upsert]),
        prop::sample::select(vec![RemoveMatch::DeclaredKeys, RemoveMatch::ProjectAndUser]),
    )
        .prop_map(|(insert, remove)| ReducerConfig { insert, remove })
}

proptest! {
    #[test]
    fn fold_is_deterministic(
        seed in prop::collection::vec(item_strategy(), 0..8),
        events in prop::collection::vec(event_strategy(), 0..16),
        config in config_strategy(),
    ) {
        let first = merge_events_with(&seed, &events, &config);
        let second = merge_events_with(&seed, &events, &config);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn modify_twice_equals_once(
        seed in prop::collection::vec(item_strategy(), 0..8),
        target in item_strategy(),
        name in "[a-z]{1,6}",
    ) {
        let event = ChangeEvent::modify(target.primary_keys(), ItemPatch::name(name));
        let once = merge_events(&seed, std::slice::from_ref(&event));
        let twice = merge_events(&seed, &[event.clone(), event]);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn seed_is_untouched(
        seed in prop::collection::vec(item_strategy(), 0..8),
        events in prop::collection::vec(event_strategy(), 0..16),
    ) {
        let collection = Collection::from(seed.clone());
        let _ = collection.apply_all(&events, &ReducerConfig::default());
        prop_assert_eq!(collection.into_items(), seed);
    }

    #[test]
    fn upsert_keeps_primary_keys_unique(
        events in prop::collection::vec(event_strategy(), 0..24),
    ) {
        let config = ReducerConfig::default().with_insert(InsertPolicy::Upsert);
        let out = merge_events_with(&[], &events, &config);
        let mut seen = std::collections::HashSet::new();
        for item in &out {
            prop_assert!(seen.insert(item.primary_keys()), "duplicate {:?}", item);
        }
    }

    #[test]
    fn removed_keys_are_gone(
        seed in prop::collection::vec(item_strategy(), 0..8),
        target in item_strategy(),
    ) {
        let out = merge_events(&seed, &[ChangeEvent::remove(target.primary_keys())]);
        prop_assert!(out.iter().all(|item| !item.matches(&target.primary_keys())));
    }

    #[test]
    fn wire_round_trip_preserves_events(event in event_strategy()) {
        let frame = serde_json::to_vec(&event).unwrap();
        prop_assert_eq!(decode_event(&frame).unwrap(), event);
    }
}

#[test]
fn no_dedup_on_insert_is_expected() {
    let x = Item::new("p1", "u1", "t1", "X");
    let out = merge_events(&[], &[ChangeEvent::insert(x.clone()), ChangeEvent::insert(x)]);
    assert_eq!(out.len(), 2);
}

#[test]
fn remove_scoping_by_user() {
    let seed = vec![
        Item::new("p1", "u1", "t1", "mine"),
        Item::new("p1", "u2", "t1", "theirs"),
    ];
    let out = merge_events(
        &seed,
        &[ChangeEvent::remove(keys([("projectId", "p1"), ("userId", "u1")]))],
    );
    assert_eq!(out, vec![Item::new("p1", "u2", "t1", "theirs")]);
}
