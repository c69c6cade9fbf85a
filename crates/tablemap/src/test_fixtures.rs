//! Shared fixture entities for in-module tests.

use crate::{
    key::{KeyContext, KeySlot, RowKey},
    schema::{ConfigError, RootEntity, RootSchema, RowEntity},
};
use serde::{Deserialize, Serialize};

///
/// ProjectData
///
/// A root with two template-keyed collections plus a parent-level
/// `customer_id` that only exists inside child row keys.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct ProjectData {
    pub project_id: String,
    pub customer_id: String,
    pub tasks: Vec<TaskItem>,
    pub comments: Vec<CommentItem>,
}

impl RootEntity for ProjectData {
    fn schema() -> Result<RootSchema<Self>, ConfigError> {
        RootSchema::builder("project")
            .partition_key(
                "project_id",
                |root: &Self| root.project_id.clone(),
                |root, value| root.project_id = value,
            )
            .parent_property(
                "customer_id",
                |root: &Self| root.customer_id.clone(),
                |root, value| root.customer_id = value,
            )
            .collection::<TaskItem>("tasks", |root| &mut root.tasks)
            .collection::<CommentItem>("comments", |root| &mut root.comments)
            .build()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct TaskItem {
    #[serde(skip)]
    pub key: KeySlot,
    pub task_id: String,
    pub title: String,
    pub tags: Vec<String>,
}

impl TaskItem {
    pub(crate) fn new(task_id: &str, title: &str) -> Self {
        Self {
            key: KeySlot::new(),
            task_id: task_id.to_string(),
            title: title.to_string(),
            tags: Vec::new(),
        }
    }
}

impl RowEntity for TaskItem {
    const KEY_TEMPLATE: Option<&'static str> = Some("{customer_id}-task-{task_id}");

    fn key_slot(&mut self) -> &mut KeySlot {
        &mut self.key
    }

    fn row_key(&self) -> Option<&RowKey> {
        self.key.get()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CommentItem {
    #[serde(skip)]
    pub key: KeySlot,
    pub comment_id: String,
    pub body: String,
}

impl CommentItem {
    pub(crate) fn new(comment_id: &str, body: &str) -> Self {
        Self {
            key: KeySlot::new(),
            comment_id: comment_id.to_string(),
            body: body.to_string(),
        }
    }
}

impl RowEntity for CommentItem {
    const KEY_TEMPLATE: Option<&'static str> = Some("{customer_id}-comment-{comment_id}");

    fn key_slot(&mut self) -> &mut KeySlot {
        &mut self.key
    }

    fn row_key(&self) -> Option<&RowKey> {
        self.key.get()
    }
}

///
/// AuditLog
///
/// A root whose single collection is self-keyed: the item builds its own
/// row key from the save context instead of declaring a template.
///

#[derive(Clone, Debug, Default)]
pub(crate) struct AuditLog {
    pub device_id: String,
    pub entries: Vec<AuditEntry>,
}

impl RootEntity for AuditLog {
    fn schema() -> Result<RootSchema<Self>, ConfigError> {
        RootSchema::builder("audit_log")
            .partition_key(
                "device_id",
                |root: &Self| root.device_id.clone(),
                |root, value| root.device_id = value,
            )
            .collection::<AuditEntry>("entries", |root| &mut root.entries)
            .build()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AuditEntry {
    #[serde(skip)]
    pub key: KeySlot,
    pub seq: i64,
    pub note: String,
}

impl AuditEntry {
    pub(crate) fn new(seq: i64, note: &str) -> Self {
        Self {
            key: KeySlot::new(),
            seq,
            note: note.to_string(),
        }
    }
}

impl RowEntity for AuditEntry {
    fn key_slot(&mut self) -> &mut KeySlot {
        &mut self.key
    }

    fn row_key(&self) -> Option<&RowKey> {
        self.key.get()
    }

    fn build_row_key(&self, ctx: &KeyContext<'_>) -> Option<String> {
        Some(format!("{}-audit-{:04}", ctx.partition_key, self.seq))
    }
}
