//! Lesson progress tracker
//!
//! Read and update operations over a user's per-course progress. All state
//! lives in MongoDB; this module holds no in-process cache, so concurrent
//! requests coordinate only through the store's single-document atomicity.
//!
//! Updates are one atomic upsert built from field-level operators:
//! `last_accessed_lesson` is last-write-wins, `completed_lessons` additions
//! are an additive union ($addToSet), which makes concurrent completions of
//! distinct lessons commutative. Reading the record back and writing a
//! merged copy would lose that property and is deliberately not done here.

use bson::{doc, DateTime, Document};
use tracing::debug;

use crate::db::schemas::{ProgressDoc, PROGRESS_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

/// MongoDB-backed progress store
#[derive(Clone)]
pub struct ProgressStore {
    collection: MongoCollection<ProgressDoc>,
}

impl ProgressStore {
    /// Create the store and ensure collection indexes exist
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection::<ProgressDoc>(PROGRESS_COLLECTION).await?;
        Ok(Self { collection })
    }

    /// Get the progress record for one course
    ///
    /// Ok(None) means the user has not opened this course yet. Storage
    /// failures surface as Database errors and are never folded into None.
    pub async fn get(&self, user_id: &str, course_id: &str) -> Result<Option<ProgressDoc>> {
        self.collection
            .find_one(doc! { "user_id": user_id, "course_id": course_id })
            .await
    }

    /// Get all progress records for a user
    pub async fn list(&self, user_id: &str) -> Result<Vec<ProgressDoc>> {
        self.collection.find_many(doc! { "user_id": user_id }).await
    }

    /// Record a lesson view, optionally marking the lesson completed
    ///
    /// Idempotent upsert: creates the record on first access, otherwise
    /// merges field-by-field. Completion is additive; `completed = false`
    /// never removes an entry. Returns the post-update record.
    pub async fn update(
        &self,
        user_id: &str,
        course_id: &str,
        lesson_index: u32,
        completed: bool,
    ) -> Result<ProgressDoc> {
        let update = build_update_document(lesson_index, completed);

        debug!(
            user = user_id,
            course = course_id,
            lesson = lesson_index,
            completed,
            "Updating lesson progress"
        );

        self.collection
            .find_one_and_upsert(doc! { "user_id": user_id, "course_id": course_id }, update)
            .await
    }
}

/// Build the field-level update document for a progress write
///
/// Equality fields of the upsert filter (user_id, course_id) materialize
/// into a freshly created document automatically; only the timestamps need
/// $setOnInsert here.
fn build_update_document(lesson_index: u32, completed: bool) -> Document {
    let now = DateTime::now();

    let mut update = doc! {
        "$set": {
            "last_accessed_lesson": lesson_index,
            "last_accessed_at": now,
        },
        "$setOnInsert": {
            "started_at": now,
            "metadata.created_at": now,
            "metadata.is_deleted": false,
        },
    };

    if completed {
        update.insert("$addToSet", doc! { "completed_lessons": lesson_index });
    }

    update
}

/// Completion percentage for UI consumption, not persisted
///
/// `total_lessons` comes from external course metadata. A course with no
/// lessons reports 0.
pub fn completion_percent(completed_count: usize, total_lessons: u32) -> u8 {
    if total_lessons == 0 {
        return 0;
    }
    let percent = (100.0 * completed_count as f64 / total_lessons as f64).round();
    percent.min(100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    // Store operations need a running MongoDB and are exercised in
    // deployment; the update-document builder is pure and carries the
    // merge semantics, so it is what gets tested here.

    #[test]
    fn test_update_sets_last_accessed_fields() {
        let update = build_update_document(3, false);
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_i32("last_accessed_lesson").unwrap(), 3);
        assert!(set.get_datetime("last_accessed_at").is_ok());
    }

    #[test]
    fn test_update_without_completion_never_touches_the_set() {
        let update = build_update_document(5, false);
        assert!(!update.contains_key("$addToSet"));
        // And $set must not replace the array wholesale either
        assert!(!update.get_document("$set").unwrap().contains_key("completed_lessons"));
    }

    #[test]
    fn test_completion_uses_add_to_set() {
        // $addToSet is what makes re-completion idempotent and concurrent
        // completions of distinct lessons commutative
        let update = build_update_document(7, true);
        let add = update.get_document("$addToSet").unwrap();
        assert_eq!(add.get_i32("completed_lessons").unwrap(), 7);
    }

    #[test]
    fn test_first_access_stamps_started_at_only_on_insert() {
        let update = build_update_document(0, false);
        let on_insert = update.get_document("$setOnInsert").unwrap();
        assert!(on_insert.get_datetime("started_at").is_ok());
        assert!(on_insert.get_datetime("metadata.created_at").is_ok());
    }

    #[test]
    fn test_completion_percent_rounds_and_caps() {
        assert_eq!(completion_percent(0, 10), 0);
        assert_eq!(completion_percent(1, 3), 33);
        assert_eq!(completion_percent(2, 3), 67);
        assert_eq!(completion_percent(10, 10), 100);
        // More completions than lessons (course shrank) still caps at 100
        assert_eq!(completion_percent(12, 10), 100);
    }

    #[test]
    fn test_completion_percent_empty_course() {
        assert_eq!(completion_percent(0, 0), 0);
        assert_eq!(completion_percent(5, 0), 0);
    }
}
