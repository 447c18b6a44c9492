//! Tests for the decoder-side dictionary

use crate::Dictionary;

#[test]
fn test_append_and_lookup() {
    let mut dict = Dictionary::new();
    dict.clear(10);
    assert_eq!(dict.append("alpha".to_string()), 0);
    assert_eq!(dict.append("beta".to_string()), 1);

    assert_eq!(dict.len(), 2);
    assert_eq!(dict.at(0), Some("alpha"));
    assert_eq!(dict.at(1), Some("beta"));
    assert_eq!(dict.at(2), None);
}

#[test]
fn test_indices_stable_across_appends() {
    let mut dict = Dictionary::new();
    dict.clear(0);
    dict.begin_add(3);
    let first = dict.append("first".to_string());
    dict.begin_add(40);
    dict.append("second".to_string());

    assert_eq!(dict.at(first), Some("first"));
    assert_eq!(dict.added_at(0), Some(3));
    assert_eq!(dict.added_at(1), Some(40));
}

#[test]
fn test_clear_starts_fresh_epoch() {
    let mut dict = Dictionary::new();
    dict.clear(0);
    dict.begin_add(3);
    dict.append("stale".to_string());

    dict.clear(100);
    assert!(dict.is_empty());
    assert_eq!(dict.at(0), None);
    assert_eq!(dict.last_event_pos(), Some(100));
}

#[test]
fn test_event_position_tracking() {
    let mut dict = Dictionary::new();
    assert!(!dict.has_events());
    assert_eq!(dict.last_event_pos(), None);

    dict.clear(5);
    dict.begin_add(20);
    dict.begin_add(90);

    assert!(dict.has_events());
    assert_eq!(dict.last_event_pos(), Some(90));
    assert!(dict.is_applied_event(5));
    assert!(dict.is_applied_event(20));
    assert!(dict.is_applied_event(90));
    assert!(!dict.is_applied_event(21));
}

#[test]
fn test_retained_epoch_resolves_after_clear() {
    let mut dict = Dictionary::new();
    dict.clear(0);
    dict.begin_add(3);
    dict.append("old".to_string());

    dict.clear(100);
    dict.begin_add(103);
    dict.append("new".to_string());
    assert_eq!(dict.at(0), Some("new"));

    // A rewind to a record governed by the pre-clear epoch can still
    // resolve its entries.
    assert!(dict.is_applied_event(3));
    assert!(dict.activate_event(3));
    assert_eq!(dict.at(0), Some("old"));

    // Moving forward again reselects the newest epoch.
    assert!(dict.activate_event(103));
    assert_eq!(dict.at(0), Some("new"));
}

#[test]
fn test_activate_unknown_event_fails() {
    let mut dict = Dictionary::new();
    dict.clear(0);
    assert!(!dict.activate_event(77));
}

#[test]
fn test_reset_forgets_event_history() {
    let mut dict = Dictionary::new();
    dict.clear(5);
    dict.begin_add(20);
    dict.append("entry".to_string());

    dict.reset();
    assert!(dict.is_empty());
    assert!(!dict.has_events());
    assert_eq!(dict.last_event_pos(), None);
    assert!(!dict.is_applied_event(5));
}
