//! Event assertion helpers.

use studio_protocol::ingestion_models::StageKind;
use studio_protocol::ipc::Event;
use studio_protocol::preview_models::PreviewStatus;

/// Stage kinds announced for `slot`, in order.
pub fn stage_sequence(events: &[Event], slot: &str) -> Vec<StageKind> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::IngestionStageChanged { slot: s, stage } if s == slot => Some(*stage),
            _ => None,
        })
        .collect()
}

/// Number of IngestionFailed events.
pub fn count_failures(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::IngestionFailed { .. }))
        .count()
}

/// Preview statuses announced for `key`, in order.
pub fn preview_statuses(events: &[Event], key: &str) -> Vec<PreviewStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::PreviewUpdated { key: k, entry } if k == key => Some(entry.status()),
            _ => None,
        })
        .collect()
}

/// Assert that a string contains a substring (case-insensitive).
pub fn assert_contains_ci(haystack: &str, needle: &str) {
    let haystack_lower = haystack.to_lowercase();
    let needle_lower = needle.to_lowercase();
    assert!(
        haystack_lower.contains(&needle_lower),
        "Expected '{}' to contain '{}' (case-insensitive)",
        haystack,
        needle
    );
}
