use super::*;
use crate::{
    error::Error,
    key::KeyError,
    store::{BatchError, BatchOp, MemoryStore, PartitionStore, Row, StoreError},
    test_fixtures::{AuditEntry, AuditLog, CommentItem, ProjectData, TaskItem},
};
use async_trait::async_trait;
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

///
/// HarnessStore
///
/// MemoryStore wrapper with submission recording and fault injection.
///

struct HarnessStore {
    inner: MemoryStore,
    sizes: Mutex<Vec<usize>>,
    submits: AtomicUsize,
    fail_on_submit: Option<usize>,
    fail_delete_batches: bool,
}

impl HarnessStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            sizes: Mutex::new(Vec::new()),
            submits: AtomicUsize::new(0),
            fail_on_submit: None,
            fail_delete_batches: false,
        }
    }

    fn failing_at(index: usize) -> Self {
        Self {
            fail_on_submit: Some(index),
            ..Self::new()
        }
    }

    fn failing_rollback(index: usize) -> Self {
        Self {
            fail_on_submit: Some(index),
            fail_delete_batches: true,
            ..Self::new()
        }
    }

    fn sizes(&self) -> Vec<usize> {
        self.sizes.lock().unwrap().clone()
    }

    fn row_count(&self, partition_key: &str) -> usize {
        self.inner.row_count(partition_key)
    }
}

#[async_trait]
impl PartitionStore for HarnessStore {
    async fn get_partition(&self, partition_key: &str) -> Result<Vec<Row>, StoreError> {
        self.inner.get_partition(partition_key).await
    }

    async fn submit_batch(
        &self,
        partition_key: &str,
        ops: Vec<BatchOp>,
    ) -> Result<(), StoreError> {
        let submit = self.submits.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_submit == Some(submit) {
            return Err(StoreError::Unavailable {
                message: "injected fault".to_string(),
            });
        }
        if self.fail_delete_batches
            && ops.iter().all(|op| matches!(op, BatchOp::Delete { .. }))
        {
            return Err(StoreError::Unavailable {
                message: "injected rollback fault".to_string(),
            });
        }

        self.sizes.lock().unwrap().push(ops.len());
        self.inner.submit_batch(partition_key, ops).await
    }

    async fn get_row(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<Row>, StoreError> {
        self.inner.get_row(partition_key, row_key).await
    }

    async fn put_row(&self, row: Row) -> Result<(), StoreError> {
        self.inner.put_row(row).await
    }

    async fn delete_row(&self, partition_key: &str, row_key: &str) -> Result<(), StoreError> {
        self.inner.delete_row(partition_key, row_key).await
    }
}

///
/// Fixture helpers
///

fn project_fixture() -> ProjectData {
    ProjectData {
        project_id: "p1".to_string(),
        customer_id: "acme".to_string(),
        tasks: vec![
            TaskItem::new("001", "design"),
            TaskItem::new("002", "build"),
            TaskItem::new("003", "review"),
        ],
        comments: vec![
            CommentItem::new("001", "looks good"),
            CommentItem::new("002", "ship it"),
        ],
    }
}

fn many_tasks(count: usize) -> ProjectData {
    ProjectData {
        project_id: "p1".to_string(),
        customer_id: "acme".to_string(),
        tasks: (0..count)
            .map(|i| TaskItem::new(&format!("{i:04}"), "work"))
            .collect(),
        comments: Vec::new(),
    }
}

#[test]
fn repository_is_shareable_across_tasks() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Repository<ProjectData, MemoryStore>>();
}

///
/// Save / find round trips
///

#[tokio::test]
async fn save_then_find_round_trip() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();
    let mut root = project_fixture();

    repo.save(&mut root).await.unwrap();

    // row keys were assigned from the template, exactly once
    assert_eq!(
        root.tasks[0].key.get().map(|k| k.as_str()),
        Some("acme-task-001")
    );

    let found = repo.find("p1").await.unwrap().expect("entity must exist");

    assert_eq!(found.project_id, "p1");
    // parent-level property recovered from child row keys alone
    assert_eq!(found.customer_id, "acme");
    assert_eq!(found.tasks.len(), 3);
    assert_eq!(found.comments.len(), 2);

    let task_ids: Vec<&str> = found.tasks.iter().map(|t| t.task_id.as_str()).collect();
    assert_eq!(task_ids, ["001", "002", "003"]);
    let comment_ids: Vec<&str> = found.comments.iter().map(|c| c.comment_id.as_str()).collect();
    assert_eq!(comment_ids, ["001", "002"]);
}

#[tokio::test]
async fn resave_is_idempotent() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();
    let mut root = project_fixture();

    repo.save(&mut root).await.unwrap();
    repo.save(&mut root).await.unwrap();

    assert_eq!(repo.store().row_count("p1"), 5);
    let found = repo.find("p1").await.unwrap().unwrap();
    assert_eq!(found.tasks.len(), 3);
    assert_eq!(found.comments.len(), 2);
}

#[tokio::test]
async fn removing_a_record_reconciles_on_resave() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();
    let mut root = project_fixture();
    repo.save(&mut root).await.unwrap();

    root.tasks.remove(1);
    repo.save(&mut root).await.unwrap();

    let found = repo.find("p1").await.unwrap().unwrap();
    assert_eq!(found.tasks.len(), 2);
    assert_eq!(found.comments.len(), 2);
    let task_ids: Vec<&str> = found.tasks.iter().map(|t| t.task_id.as_str()).collect();
    assert_eq!(task_ids, ["001", "003"]);
}

#[tokio::test]
async fn assigned_row_keys_are_never_regenerated() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();
    let mut root = project_fixture();
    repo.save(&mut root).await.unwrap();

    // identity stays put even when the keyed-on attribute drifts
    root.tasks[0].task_id = "999".to_string();
    repo.save(&mut root).await.unwrap();

    assert_eq!(
        root.tasks[0].key.get().map(|k| k.as_str()),
        Some("acme-task-001")
    );
    let found = repo.find("p1").await.unwrap().unwrap();
    assert!(found.tasks.iter().any(|t| t.task_id == "999"));
    assert_eq!(repo.store().row_count("p1"), 5);
}

#[tokio::test]
async fn self_keyed_collection_round_trips() {
    let repo = Repository::<AuditLog, _>::new(MemoryStore::new()).unwrap();
    let mut log = AuditLog {
        device_id: "dev1".to_string(),
        entries: vec![
            AuditEntry::new(1, "boot"),
            AuditEntry::new(2, "probe"),
            AuditEntry::new(3, "halt"),
        ],
    };

    repo.save(&mut log).await.unwrap();

    assert_eq!(
        log.entries[0].key.get().map(|k| k.as_str()),
        Some("dev1-audit-0001")
    );

    let found = repo.find("dev1").await.unwrap().unwrap();
    assert_eq!(found.entries.len(), 3);
    let notes: Vec<&str> = found.entries.iter().map(|e| e.note.as_str()).collect();
    assert_eq!(notes, ["boot", "probe", "halt"]);
}

///
/// Batch planning
///

#[tokio::test]
async fn large_save_splits_into_ordered_batches() {
    let repo = Repository::<ProjectData, _>::new(HarnessStore::new()).unwrap();
    let mut root = many_tasks(250);

    repo.save(&mut root).await.unwrap();

    assert_eq!(repo.store().sizes(), vec![100, 100, 50]);
    assert_eq!(repo.store().row_count("p1"), 250);
}

///
/// Failure and compensation
///

#[tokio::test]
async fn failed_batch_rolls_back_committed_batches() {
    let repo = Repository::<ProjectData, _>::new(HarnessStore::failing_at(1)).unwrap();
    let mut root = many_tasks(150);

    let err = repo.save(&mut root).await.unwrap_err();

    // the caller sees the real cause, not a rollback wrapper
    assert!(matches!(err, Error::Store(StoreError::Unavailable { .. })));
    assert_eq!(repo.store().row_count("p1"), 0);
    assert!(repo.find("p1").await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_key_mid_save_triggers_full_rollback() {
    let repo = Repository::<ProjectData, _>::new(HarnessStore::new()).unwrap();
    let mut root = many_tasks(150);
    // item 101 resolves to a key the store contract forbids
    root.tasks[100].task_id = "bad/101".to_string();

    let err = repo.save(&mut root).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Batch(BatchError::Key(KeyError::ForbiddenCharacter { .. }))
    ));
    assert_eq!(repo.store().row_count("p1"), 0);
    assert!(repo.find("p1").await.unwrap().is_none());
}

#[tokio::test]
async fn rollback_failure_supersedes_the_save_error() {
    let repo = Repository::<ProjectData, _>::new(HarnessStore::failing_rollback(1)).unwrap();
    let mut root = many_tasks(150);

    let err = repo.save(&mut root).await.unwrap_err();

    assert!(err.is_rollback_failure());
    match err {
        Error::Rollback(rollback) => {
            assert!(matches!(
                *rollback.original,
                Error::Store(StoreError::Unavailable { .. })
            ));
            assert_eq!(rollback.failures.len(), 1);
            assert_eq!(rollback.failures[0].row_keys.len(), 100);
        }
        other => panic!("expected rollback error, got {other:?}"),
    }
    // the committed batch is genuinely orphaned
    assert_eq!(repo.store().row_count("p1"), 100);
}

#[tokio::test]
async fn empty_partition_key_is_fatal_before_any_io() {
    let repo = Repository::<ProjectData, _>::new(HarnessStore::new()).unwrap();
    let mut root = project_fixture();
    root.project_id = String::new();

    let err = repo.save(&mut root).await.unwrap_err();

    assert!(matches!(err, Error::Key(KeyError::EmptyPartitionKey)));
    assert!(repo.store().sizes().is_empty());
}

///
/// Delete
///

#[tokio::test]
async fn deleting_a_partition_removes_every_row() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();
    let mut root = many_tasks(1000);
    repo.save(&mut root).await.unwrap();
    assert_eq!(repo.store().row_count("p1"), 1000);

    let removed = repo.delete_partition("p1").await.unwrap();

    assert_eq!(removed, 1000);
    assert_eq!(repo.store().row_count("p1"), 0);
    // a collection-scoped query degrades to empty, not an error
    let tasks: Vec<TaskItem> = repo.query("p1").await.unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn deleting_an_absent_partition_is_a_no_op() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();

    assert_eq!(repo.delete_partition("ghost").await.unwrap(), 0);
}

///
/// Lookup surfaces
///

#[tokio::test]
async fn find_returns_none_for_an_empty_partition() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();

    assert!(repo.find("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn find_or_err_raises_not_found() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();

    let err = repo.find_or_err("missing").await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn typed_query_buckets_by_collection() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();
    let mut root = project_fixture();
    repo.save(&mut root).await.unwrap();

    let tasks: Vec<TaskItem> = repo.query("p1").await.unwrap();
    let comments: Vec<CommentItem> = repo.query("p1").await.unwrap();

    assert_eq!(tasks.len(), 3);
    assert_eq!(comments.len(), 2);

    let err = repo.query::<AuditEntry>("p1").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Config(crate::schema::ConfigError::NoSuchCollection { .. })
    ));
}

#[tokio::test]
async fn prefix_query_scans_row_keys() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();
    let mut root = project_fixture();
    repo.save(&mut root).await.unwrap();

    let rows = repo.query_prefix("p1", "acme-task-").await.unwrap();

    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.row_key.starts_with("acme-task-")));
}

///
/// Attribute round-trip details
///

#[tokio::test]
async fn composite_attributes_survive_the_store() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();
    let mut root = project_fixture();
    root.tasks[0].tags = vec!["infra".to_string(), "urgent".to_string()];

    repo.save(&mut root).await.unwrap();
    let found = repo.find("p1").await.unwrap().unwrap();

    assert_eq!(found.tasks[0].tags, ["infra", "urgent"]);
}

#[tokio::test]
async fn broken_stored_attribute_degrades_per_attribute() {
    let repo = Repository::<ProjectData, _>::new(MemoryStore::new()).unwrap();
    let mut root = project_fixture();
    root.tasks[0].tags = vec!["infra".to_string()];
    repo.save(&mut root).await.unwrap();

    // corrupt the serialized composite attribute in place
    let mut row = repo
        .store()
        .get_row("p1", "acme-task-001")
        .await
        .unwrap()
        .unwrap();
    row.attrs
        .insert("tags".to_string(), crate::value::Value::Text("{broken".into()));
    repo.store().put_row(row).await.unwrap();

    let found = repo.find("p1").await.unwrap().unwrap();

    // record survives, the unrestorable attribute falls back to default
    let task = found.tasks.iter().find(|t| t.task_id == "001").unwrap();
    assert_eq!(task.title, "design");
    assert!(task.tags.is_empty());
}
