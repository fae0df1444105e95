mod common;

use common::{open_session, row_count, seeded_session, MockItem, Ticket};
use repokit_core::{
    run_in_transaction, RepoError, Repository, SqliteTransactionManager, TimeStampedRepository,
    TrackingMode, TransactionManager, TransactionSettings,
};

#[test]
fn commit_makes_grouped_writes_durable() {
    let session = open_session();
    let repo = Repository::<MockItem>::new(&session);
    let manager = SqliteTransactionManager::new(&session, TransactionSettings::default());

    manager.begin().unwrap();
    assert!(manager.is_active());
    repo.add(Some(MockItem::new(1, "one", 1))).unwrap();
    repo.add(Some(MockItem::new(2, "two", 2))).unwrap();
    manager.commit().unwrap();

    assert!(!manager.is_active());
    assert_eq!(row_count(&session, "mock_item"), 2);
}

#[test]
fn rollback_discards_grouped_writes() {
    let session = seeded_session();
    let repo = Repository::<MockItem>::new(&session);
    let manager = SqliteTransactionManager::new(&session, TransactionSettings::default());

    manager.begin().unwrap();
    repo.add(Some(MockItem::new(6, "six", 6))).unwrap();
    repo.delete(Some(MockItem::new(1, "one", 1))).unwrap();
    assert_eq!(row_count(&session, "mock_item"), 5);
    manager.rollback().unwrap();

    assert!(!manager.is_active());
    let items = repo
        .get_all_materialized(None, TrackingMode::Untracked, None, None)
        .unwrap();
    assert_eq!(common::ids(&items), vec![1, 2, 3, 4, 5]);
}

#[test]
fn begin_does_not_nest() {
    let session = open_session();
    let repo = Repository::<MockItem>::new(&session);
    let manager = SqliteTransactionManager::new(&session, TransactionSettings::default());

    manager.begin().unwrap();
    manager.begin().unwrap();
    repo.add(Some(MockItem::new(1, "one", 1))).unwrap();
    manager.commit().unwrap();

    assert!(!manager.is_active());
    manager.commit().unwrap();
    manager.rollback().unwrap();
    assert_eq!(row_count(&session, "mock_item"), 1);
}

#[test]
fn in_memory_settings_skip_transaction_control() {
    let session = open_session();
    let repo = Repository::<MockItem>::new(&session);
    let manager = SqliteTransactionManager::new(
        &session,
        TransactionSettings {
            use_in_memory_database: true,
        },
    );

    manager.begin().unwrap();
    assert!(!manager.is_active());
    repo.add(Some(MockItem::new(1, "one", 1))).unwrap();
    manager.rollback().unwrap();

    assert_eq!(row_count(&session, "mock_item"), 1);
}

#[test]
fn run_in_transaction_commits_on_success() {
    let session = open_session();
    let repo = Repository::<MockItem>::new(&session);
    let manager = SqliteTransactionManager::new(&session, TransactionSettings::default());

    let added = run_in_transaction(&manager, || {
        repo.add(Some(MockItem::new(1, "one", 1)))?;
        repo.add(Some(MockItem::new(2, "two", 2)))?;
        Ok(2)
    })
    .unwrap();

    assert_eq!(added, 2);
    assert!(!manager.is_active());
    assert_eq!(row_count(&session, "mock_item"), 2);
}

#[test]
fn run_in_transaction_rolls_back_on_error() {
    let session = seeded_session();
    let repo = Repository::<MockItem>::new(&session);
    let manager = SqliteTransactionManager::new(&session, TransactionSettings::default());

    let err = run_in_transaction(&manager, || {
        repo.update(Some(MockItem::new(1, "changed", 1)))?;
        repo.delete(Some(MockItem::new(99, "ghost", 0)))?;
        Ok(())
    })
    .unwrap_err();

    assert!(err.is_concurrency_conflict());
    assert!(!manager.is_active());
    let first = repo
        .get(|item| item.id == 1, TrackingMode::Untracked)
        .unwrap()
        .unwrap();
    assert_eq!(first.borrow().name, "item-1");
}

#[test]
fn run_in_transaction_returns_work_error_unchanged() {
    let session = open_session();
    let manager = SqliteTransactionManager::new(&session, TransactionSettings::default());

    let err = run_in_transaction(&manager, || {
        Err::<(), _>(RepoError::InvalidData("aborted".to_string()))
    })
    .unwrap_err();

    assert!(matches!(err, RepoError::InvalidData(ref message) if message == "aborted"));
}

#[test]
fn timestamped_update_marks_modified() {
    let session = open_session();
    let repo = TimeStampedRepository::<Ticket>::new(&session);

    let ticket = repo.add(Some(Ticket::new("T-1"))).unwrap();
    assert_eq!(ticket.stamps.modified(), None);

    let updated = repo.update(Some(ticket.clone())).unwrap();
    let modified = updated.stamps.modified().expect("update should stamp");
    assert!(modified >= updated.stamps.created());

    let stored = repo
        .get(|ticket| ticket.code == "T-1", TrackingMode::Untracked)
        .unwrap()
        .unwrap();
    assert_eq!(stored.borrow().stamps.modified(), Some(modified));
    assert_eq!(stored.borrow().stamps.created(), ticket.stamps.created());
}

#[test]
fn timestamped_update_rejects_missing_argument() {
    let session = open_session();
    let repo = TimeStampedRepository::<Ticket>::new(&session);

    let err = repo.update(None).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NullArgument {
            operation: "update",
            entity: "ticket"
        }
    ));
}

fn stored_name(repo: &Repository<'_, MockItem>, id: i64) -> String {
    repo.get(|item| item.id == id, TrackingMode::Untracked)
        .unwrap()
        .map(|item| item.borrow().name.clone())
        .unwrap_or_default()
}

#[test]
fn rollback_keeps_tracked_edits_pending_for_next_save() {
    let session = seeded_session();
    let repo = Repository::<MockItem>::new(&session);
    let manager = SqliteTransactionManager::new(&session, TransactionSettings::default());

    let item = repo
        .get(|item| item.id == 2, TrackingMode::Tracked)
        .unwrap()
        .unwrap();

    manager.begin().unwrap();
    item.modify(|item| item.name = "edited".to_string());
    repo.save().unwrap();
    manager.rollback().unwrap();

    assert_eq!(stored_name(&repo, 2), "item-2");
    assert_eq!(item.borrow().name, "edited");

    repo.save().unwrap();
    assert_eq!(stored_name(&repo, 2), "edited");
}

#[test]
fn rollback_detaches_entities_first_tracked_inside_transaction() {
    let session = seeded_session();
    let repo = Repository::<MockItem>::new(&session);
    let manager = SqliteTransactionManager::new(&session, TransactionSettings::default());

    let before = repo
        .get(|item| item.id == 1, TrackingMode::Tracked)
        .unwrap()
        .unwrap();

    manager.begin().unwrap();
    repo.add(Some(MockItem::new(6, "six", 60))).unwrap();
    let inside = repo
        .get(|item| item.id == 6, TrackingMode::Tracked)
        .unwrap()
        .unwrap();
    assert_eq!(session.tracked_count(), 2);
    manager.rollback().unwrap();

    assert_eq!(session.tracked_count(), 1);
    inside.modify(|item| item.name = "never-stored".to_string());
    repo.save().unwrap();
    assert_eq!(row_count(&session, "mock_item"), 5);
    assert_eq!(before.borrow().name, "item-1");
}

#[test]
fn commit_accepts_tracked_edits_saved_inside_transaction() {
    let session = seeded_session();
    let repo = Repository::<MockItem>::new(&session);
    let manager = SqliteTransactionManager::new(&session, TransactionSettings::default());

    let item = repo
        .get(|item| item.id == 3, TrackingMode::Tracked)
        .unwrap()
        .unwrap();

    manager.begin().unwrap();
    item.modify(|item| item.value = 333);
    repo.save().unwrap();
    manager.commit().unwrap();

    // A later rollback must not revert baselines accepted by the commit.
    manager.begin().unwrap();
    manager.rollback().unwrap();
    repo.save().unwrap();

    let stored = repo
        .get(|item| item.id == 3, TrackingMode::Untracked)
        .unwrap()
        .unwrap();
    assert_eq!(stored.borrow().value, 333);
    assert_eq!(session.tracked_count(), 1);
}
