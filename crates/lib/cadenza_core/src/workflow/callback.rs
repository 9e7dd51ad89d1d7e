//! Inbound calculation result.
//!
//! The calculator proves its origin with a static shared key. Checks run in
//! a fixed order: key, then result value, then the composition itself.

use super::{CompositionWorkflow, WorkflowError};
use crate::models::composition::{Belonging, Composition};

/// Record `result` for `composition_id` if `api_key` matches `expected_key`.
///
/// An empty `expected_key` rejects every caller.
pub async fn receive_result(
    workflow: &CompositionWorkflow,
    expected_key: &str,
    composition_id: i64,
    result: &str,
    api_key: &str,
) -> Result<Composition, WorkflowError> {
    if expected_key.is_empty() || !keys_match(expected_key.as_bytes(), api_key.as_bytes()) {
        return Err(WorkflowError::Unauthorized("Invalid API key".into()));
    }
    let belonging = Belonging::parse(result).ok_or_else(|| {
        WorkflowError::Validation(format!(
            "Result must be \"{}\" or \"{}\"",
            Belonging::Belongs,
            Belonging::DoesNotBelong
        ))
    })?;
    workflow
        .apply_calculation_result(composition_id, belonging)
        .await
}

/// Comparison whose running time does not depend on where the inputs differ.
fn keys_match(expected: &[u8], given: &[u8]) -> bool {
    if expected.len() != given.len() {
        return false;
    }
    expected
        .iter()
        .zip(given)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::calculator::DisabledSink;
    use crate::models::composition::CompositionStatus;
    use crate::models::interval::NewInterval;
    use crate::store::{CatalogStore, CompositionStore, MemoryStore, UserStore};

    const KEY: &str = "calc-secret";

    async fn setup() -> (CompositionWorkflow, Arc<MemoryStore>, i64) {
        let store = Arc::new(MemoryStore::new());
        let user = store.create_user("ravel", "hash", false).await.unwrap();
        let interval = store
            .create_interval(&NewInterval {
                title: "Tritone".into(),
                description: String::new(),
                tone: 3.0,
            })
            .await
            .unwrap();
        let draft = store
            .upsert_draft_item(user.id, interval.id, 1)
            .await
            .unwrap();
        let workflow = CompositionWorkflow::new(store.clone(), store.clone(), Arc::new(DisabledSink));
        (workflow, store, draft.id)
    }

    #[tokio::test]
    async fn wrong_key_is_unauthorized_regardless_of_payload() {
        let (workflow, _, id) = setup().await;
        for result in ["belongs", "garbage"] {
            assert!(matches!(
                receive_result(&workflow, KEY, id, result, "nope").await,
                Err(WorkflowError::Unauthorized(_))
            ));
        }
        assert!(matches!(
            receive_result(&workflow, "", id, "belongs", "").await,
            Err(WorkflowError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn unknown_result_is_a_validation_error() {
        let (workflow, _, id) = setup().await;
        assert!(matches!(
            receive_result(&workflow, KEY, id, "baroque", KEY).await,
            Err(WorkflowError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn unknown_composition_is_not_found() {
        let (workflow, _, _) = setup().await;
        assert!(matches!(
            receive_result(&workflow, KEY, 4242, "belongs", KEY).await,
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn repeated_callbacks_overwrite_idempotently() {
        let (workflow, store, id) = setup().await;
        for _ in 0..2 {
            let updated = receive_result(&workflow, KEY, id, "does not belong", KEY)
                .await
                .unwrap();
            assert_eq!(updated.belonging, Some(Belonging::DoesNotBelong));
        }
        let row = store.get_composition(id).await.unwrap().unwrap();
        assert_eq!(row.belonging, Some(Belonging::DoesNotBelong));
        assert_eq!(row.status, CompositionStatus::Draft);
    }

    #[test]
    fn key_comparison() {
        assert!(keys_match(b"abc", b"abc"));
        assert!(!keys_match(b"abc", b"abd"));
        assert!(!keys_match(b"abc", b"abcd"));
    }
}
