//! Cache tag tracing.
//!
//! Services call [`record`] before reading data that shapes a response. The
//! detail cache wraps handler execution in [`with_tracer`] and receives every
//! tag recorded inside, so the stored entry is invalidated when any of those
//! entities change.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use super::keys::EntityKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::tracer";

tokio::task_local! {
    static TAGS: Arc<Mutex<HashSet<String>>>;
}

/// Record an entity dependency. Ignored when no tracer is active.
pub fn record(entity: EntityKey) {
    record_tag(entity.tag());
}

/// Record a raw tag. Ignored when no tracer is active.
pub fn record_tag(tag: String) {
    let _ = TAGS.try_with(|tags| {
        mutex_lock(tags, SOURCE, "record_tag").insert(tag);
    });
}

/// Run `future` with a fresh tracer and return its output with the traced tags.
pub async fn with_tracer<F, R>(future: F) -> (R, HashSet<String>)
where
    F: Future<Output = R>,
{
    let tags = Arc::new(Mutex::new(HashSet::new()));
    let output = TAGS.scope(Arc::clone(&tags), future).await;
    let collected = std::mem::take(&mut *mutex_lock(&tags, SOURCE, "with_tracer"));
    (output, collected)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn record_without_tracer_is_no_op() {
        record(EntityKey::BlogIndex);
    }

    #[tokio::test]
    async fn with_tracer_captures_tags() {
        let id = Uuid::new_v4();
        let (value, tags) = with_tracer(async {
            record(EntityKey::BlogEntry(id));
            record(EntityKey::Feed);
            tokio::task::yield_now().await;
            record_tag("custom".to_string());
            7
        })
        .await;

        assert_eq!(value, 7);
        assert_eq!(tags.len(), 3);
        assert!(tags.contains(&EntityKey::BlogEntry(id).tag()));
        assert!(tags.contains("custom"));
    }

    #[tokio::test]
    async fn record_deduplicates() {
        let (_, tags) = with_tracer(async {
            record(EntityKey::BlogIndex);
            record(EntityKey::BlogIndex);
        })
        .await;
        assert_eq!(tags.len(), 1);
    }

    #[tokio::test]
    async fn nested_tracers_are_isolated() {
        let (inner_tags, outer_tags) = with_tracer(async {
            record(EntityKey::Feed);
            let (_, inner) = with_tracer(async {
                record(EntityKey::Sitemap);
            })
            .await;
            inner
        })
        .await;

        assert!(inner_tags.contains(&EntityKey::Sitemap.tag()));
        assert!(!inner_tags.contains(&EntityKey::Feed.tag()));
        assert!(outer_tags.contains(&EntityKey::Feed.tag()));
        assert!(!outer_tags.contains(&EntityKey::Sitemap.tag()));
    }
}
