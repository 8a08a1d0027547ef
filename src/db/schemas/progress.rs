//! Lesson progress document schema
//!
//! One document per (user, course) pair, enforced by a unique compound
//! index. `completed_lessons` carries set semantics: writes go through
//! `$addToSet`, so indices are unique and only ever added.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;

/// Collection name for lesson progress
pub const PROGRESS_COLLECTION: &str = "lesson_progress";

/// Per-(user, course) lesson progress stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProgressDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning user (opaque reference into the account service)
    pub user_id: String,

    /// Target course (opaque reference into the content catalog)
    pub course_id: String,

    /// Indices of completed lessons; unique, order irrelevant, grows only
    #[serde(default)]
    pub completed_lessons: Vec<u32>,

    /// Most recently viewed lesson
    #[serde(default)]
    pub last_accessed_lesson: u32,

    /// When the user first opened a lesson in this course
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime>,

    /// When the user last viewed a lesson in this course
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime>,
}

impl ProgressDoc {
    /// Create a new progress document (used by tests; production records
    /// are created server-side by the upsert path)
    pub fn new(user_id: String, course_id: String, lesson_index: u32) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_id,
            course_id,
            completed_lessons: Vec::new(),
            last_accessed_lesson: lesson_index,
            started_at: Some(DateTime::now()),
            last_accessed_at: Some(DateTime::now()),
        }
    }
}

impl IntoIndexes for ProgressDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // At most one record per (user, course) pair
            (
                doc! { "user_id": 1, "course_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_course_unique".to_string())
                        .build(),
                ),
            ),
            // Index on user_id for whole-user listings
            (
                doc! { "user_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
