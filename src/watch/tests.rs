use std::path::PathBuf;
use std::time::Duration;

use super::debounce::{ChangeKind, Debouncer};
use super::is_relevant;

const DEBOUNCE: Duration = Duration::from_millis(300);
const COOLDOWN: Duration = Duration::from_millis(800);

fn debouncer() -> Debouncer {
    Debouncer::new(DEBOUNCE, COOLDOWN)
}

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

fn metadata_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::Any,
    ))
}

#[test]
fn test_debouncer_empty() {
    let debouncer = debouncer();
    assert!(!debouncer.is_ready());
}

#[test]
fn test_event_routing_by_kind() {
    let mut debouncer = debouncer();

    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], create_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/b.unit"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/c.unit"], remove_kind()));

    assert_eq!(debouncer.changes.len(), 3);
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.unit")],
        ChangeKind::Created
    );
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/b.unit")],
        ChangeKind::Modified
    );
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/c.unit")],
        ChangeKind::Removed
    );
}

#[test]
fn test_temp_file_ignored() {
    let mut debouncer = debouncer();

    debouncer.add_event(&make_event(vec!["/tmp/real.unit"], modify_kind()));
    assert!(debouncer.last_event.is_some());
    let first_time = debouncer.last_event.unwrap();

    std::thread::sleep(Duration::from_millis(5));

    // Temp file events must not update last_event or add to changes
    debouncer.add_event(&make_event(vec!["/tmp/.swp"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/Post.unit~"], modify_kind()));
    assert_eq!(debouncer.last_event.unwrap(), first_time);
    assert_eq!(debouncer.changes.len(), 1);
}

#[test]
fn test_metadata_only_modify_ignored() {
    let mut debouncer = debouncer();

    // chmod/touch noise carries no content change
    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], metadata_kind()));
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_event.is_none());
}

#[test]
fn test_dedup_first_event_wins() {
    let mut debouncer = debouncer();

    // Same path: create then modify; the first one (create) wins
    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], create_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], modify_kind()));

    assert_eq!(debouncer.changes.len(), 1);
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.unit")],
        ChangeKind::Created
    );
}

#[test]
fn test_dedup_same_event() {
    let mut debouncer = debouncer();
    debouncer.add_event(&make_event(
        vec!["/tmp/a.unit", "/tmp/a.unit"],
        modify_kind(),
    ));
    assert_eq!(debouncer.changes.len(), 1);
}

#[test]
fn test_sleep_duration_no_events() {
    let debouncer = debouncer();
    assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));
}

#[test]
fn test_sleep_duration_after_event() {
    let mut debouncer = debouncer();
    debouncer.last_event = Some(std::time::Instant::now());

    let dur = debouncer.sleep_duration();
    assert!(dur >= DEBOUNCE - Duration::from_millis(10));
    assert!(dur <= DEBOUNCE + Duration::from_millis(10));
}

#[test]
fn test_sleep_duration_respects_cooldown() {
    let mut debouncer = debouncer();
    debouncer.last_event = Some(std::time::Instant::now());
    debouncer.last_cycle = Some(std::time::Instant::now());

    let dur = debouncer.sleep_duration();
    assert!(dur >= COOLDOWN - Duration::from_millis(10));
    assert!(dur <= COOLDOWN + Duration::from_millis(10));
}

#[test]
fn test_remove_then_create_restores() {
    let mut debouncer = debouncer();

    // File removed, then restored: should become Created
    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], remove_kind()));
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.unit")],
        ChangeKind::Removed
    );

    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], create_kind()));
    assert_eq!(debouncer.changes.len(), 1);
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.unit")],
        ChangeKind::Created
    );
}

#[test]
fn test_create_then_remove_discards() {
    let mut debouncer = debouncer();

    // File created, then removed: a net no-op, discarded entirely
    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], create_kind()));
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.unit")],
        ChangeKind::Created
    );

    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], remove_kind()));
    assert!(
        debouncer.changes.is_empty(),
        "created+removed should discard"
    );
}

#[test]
fn test_modify_then_remove_upgrades() {
    let mut debouncer = debouncer();

    // File modified, then removed: should upgrade to Removed
    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], remove_kind()));
    assert_eq!(debouncer.changes.len(), 1);
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.unit")],
        ChangeKind::Removed
    );
}

#[test]
fn test_take_clears_and_arms_cooldown() {
    // Zero windows: ready as soon as an event lands
    let mut debouncer = Debouncer::new(Duration::ZERO, Duration::ZERO);

    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], modify_kind()));
    let batch = debouncer.take_if_ready().expect("batch should be ready");
    assert_eq!(batch.len(), 1);

    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_cycle.is_some());
    assert!(debouncer.take_if_ready().is_none());
}

#[test]
fn test_cooldown_blocks_next_batch() {
    // Zero debounce, long cooldown: second batch must wait
    let mut debouncer = Debouncer::new(Duration::ZERO, Duration::from_secs(60));

    debouncer.add_event(&make_event(vec!["/tmp/a.unit"], modify_kind()));
    assert!(debouncer.take_if_ready().is_some());

    debouncer.add_event(&make_event(vec!["/tmp/b.unit"], modify_kind()));
    assert!(!debouncer.is_ready());
    assert!(debouncer.take_if_ready().is_none());
    // The pending change survives until the cooldown elapses
    assert_eq!(debouncer.changes.len(), 1);
}

#[test]
fn test_relevant_source_file() {
    let roots = vec![PathBuf::from("/proj/app")];
    assert!(is_relevant(&PathBuf::from("/proj/app/demo/Post.unit"), &roots));
}

#[test]
fn test_relevant_ignores_other_extensions() {
    let roots = vec![PathBuf::from("/proj/app")];
    assert!(!is_relevant(&PathBuf::from("/proj/app/notes.txt"), &roots));
    assert!(!is_relevant(&PathBuf::from("/proj/app/demo/Post.class"), &roots));
}

#[test]
fn test_relevant_directory_event() {
    // Directory create/remove events carry no extension
    let roots = vec![PathBuf::from("/proj/app")];
    assert!(is_relevant(&PathBuf::from("/proj/app/demo"), &roots));
    assert!(is_relevant(&PathBuf::from("/proj/app"), &roots));
}

#[test]
fn test_relevant_outside_roots() {
    let roots = vec![PathBuf::from("/proj/app")];
    assert!(!is_relevant(&PathBuf::from("/proj/precompiled/demo.A.class"), &roots));
    assert!(!is_relevant(&PathBuf::from("/elsewhere/X.unit"), &roots));
}
