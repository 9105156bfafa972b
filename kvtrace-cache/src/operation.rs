//! Named asynchronous operations and the extension trait that instruments
//! them.
//!
//! An operation has a stable [`OperationId`] and one input value. Inputs are
//! positional argument tuples (`(value,)`) so history can render them the
//! same way for every operation.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use kvtrace_core::{KvTraceResult, OperationId};
use kvtrace_storage::KeyValueStore;

use crate::counting::Counted;
use crate::history::Recorded;

/// An operation that can be wrapped with telemetry.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Positional arguments, usually a tuple.
    type Input: Send + 'static;
    /// Successful result.
    type Output: Send + 'static;

    /// Stable identity used to name telemetry keys.
    fn identity(&self) -> &OperationId;

    /// Invoke the operation.
    async fn call(&self, input: Self::Input) -> KvTraceResult<Self::Output>;
}

/// Shared, type-erased operation.
pub type DynOperation<I, O> = Arc<dyn Operation<Input = I, Output = O>>;

/// Operation backed by an async closure.
///
/// # Example
///
/// ```ignore
/// let double = FnOperation::new("Math.double", |(n,): (i64,)| async move { Ok(n * 2) });
/// ```
pub struct FnOperation<F, I, O> {
    id: OperationId,
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<F, Fut, I, O> FnOperation<F, I, O>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = KvTraceResult<O>>,
{
    pub fn new(id: impl Into<OperationId>, f: F) -> Self {
        Self {
            id: id.into(),
            f,
            _marker: PhantomData,
        }
    }
}

impl<F, I, O> std::fmt::Debug for FnOperation<F, I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnOperation").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F, Fut, I, O> Operation for FnOperation<F, I, O>
where
    F: Fn(I) -> Fut + Send + Sync,
    Fut: Future<Output = KvTraceResult<O>> + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    fn identity(&self) -> &OperationId {
        &self.id
    }

    async fn call(&self, input: I) -> KvTraceResult<O> {
        (self.f)(input).await
    }
}

/// Attach telemetry wrappers to any operation.
///
/// Wrappers compose; `op.recorded(store.clone()).counted(store)` counts every
/// call and records its arguments and result.
pub trait OperationExt: Operation + Sized {
    /// Increment the operation's call counter before every call.
    fn counted<S>(self, store: Arc<S>) -> Counted<Self, S>
    where
        S: KeyValueStore + ?Sized,
    {
        Counted::new(self, store)
    }

    /// Append the arguments and result of every call to the history lists.
    fn recorded<S>(self, store: Arc<S>) -> Recorded<Self, S>
    where
        S: KeyValueStore + ?Sized,
    {
        Recorded::new(self, store)
    }
}

impl<T: Operation> OperationExt for T {}
