//! Call counting wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use kvtrace_core::{decode_int, KvTraceResult, OperationId};
use kvtrace_storage::KeyValueStore;

use crate::operation::Operation;

/// Increments the call counter of the wrapped operation on every call.
///
/// The counter is bumped before delegating and is never rolled back, so
/// failed calls are counted too.
pub struct Counted<Op, S: ?Sized> {
    inner: Op,
    store: Arc<S>,
}

impl<Op, S: ?Sized> Counted<Op, S> {
    pub fn new(inner: Op, store: Arc<S>) -> Self {
        Self { inner, store }
    }

    pub fn inner(&self) -> &Op {
        &self.inner
    }
}

#[async_trait]
impl<Op, S> Operation for Counted<Op, S>
where
    Op: Operation,
    S: KeyValueStore + ?Sized + 'static,
{
    type Input = Op::Input;
    type Output = Op::Output;

    fn identity(&self) -> &OperationId {
        self.inner.identity()
    }

    async fn call(&self, input: Self::Input) -> KvTraceResult<Self::Output> {
        let id = self.inner.identity();
        let count = self.store.increment(id.keys().counter()).await?;
        tracing::debug!(operation = %id, count, "Counted call");
        self.inner.call(input).await
    }
}

/// Number of recorded calls of `id`. A counter that was never written is zero.
pub async fn call_count<S>(store: &S, id: &OperationId) -> KvTraceResult<i64>
where
    S: KeyValueStore + ?Sized,
{
    match store.get(id.keys().counter()).await? {
        Some(bytes) => Ok(decode_int(bytes)?),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{FnOperation, OperationExt};
    use kvtrace_core::{ConversionError, KvTraceError};
    use kvtrace_storage::InMemoryStore;

    #[tokio::test]
    async fn test_counts_every_call() {
        let store = Arc::new(InMemoryStore::new());
        let op = FnOperation::new("Echo.call", |(s,): (String,)| async move { Ok(s) })
            .counted(Arc::clone(&store));
        let id = op.identity().clone();

        assert_eq!(call_count(&*store, &id).await.unwrap(), 0);
        for i in 0..5 {
            op.call((format!("v{}", i),)).await.unwrap();
        }
        assert_eq!(call_count(&*store, &id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_counts_failed_calls() {
        let store = Arc::new(InMemoryStore::new());
        let op = FnOperation::new("Parse.int", |(s,): (String,)| async move {
            s.parse::<i64>().map_err(|_| {
                KvTraceError::from(ConversionError::InvalidInteger { value: s.clone() })
            })
        })
        .counted(Arc::clone(&store));

        assert!(op.call(("x".to_string(),)).await.is_err());
        assert_eq!(op.call(("7".to_string(),)).await.unwrap(), 7);
        assert_eq!(call_count(&*store, op.identity()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_result_passes_through_unchanged() {
        let store = Arc::new(InMemoryStore::new());
        let op = FnOperation::new("Math.square", |(n,): (i64,)| async move { Ok(n * n) })
            .counted(Arc::clone(&store));
        assert_eq!(op.call((9,)).await.unwrap(), 81);
    }
}
