//! Call history wrapper.
//!
//! Every call appends its argument tuple to `<id>:inputs` and its result to
//! `<id>:outputs`. Failed calls record `!error: <message>` so the two lists
//! stay aligned.

use std::sync::Arc;

use async_trait::async_trait;
use kvtrace_core::{error_repr, CallArgs, CallRepr, KvTraceResult, OperationId};
use kvtrace_storage::KeyValueStore;

use crate::operation::Operation;

/// Records the arguments and result of every call of the wrapped operation.
pub struct Recorded<Op, S: ?Sized> {
    inner: Op,
    store: Arc<S>,
}

impl<Op, S: ?Sized> Recorded<Op, S> {
    pub fn new(inner: Op, store: Arc<S>) -> Self {
        Self { inner, store }
    }

    pub fn inner(&self) -> &Op {
        &self.inner
    }
}

#[async_trait]
impl<Op, S> Operation for Recorded<Op, S>
where
    Op: Operation,
    Op::Input: CallArgs,
    Op::Output: CallRepr,
    S: KeyValueStore + ?Sized + 'static,
{
    type Input = Op::Input;
    type Output = Op::Output;

    fn identity(&self) -> &OperationId {
        self.inner.identity()
    }

    async fn call(&self, input: Self::Input) -> KvTraceResult<Self::Output> {
        let id = self.inner.identity();
        let keys = id.keys();

        let args = input.args_repr();
        self.store.append(keys.inputs(), args.as_bytes()).await?;

        let result = self.inner.call(input).await;
        let output = match &result {
            Ok(value) => value.output_repr(),
            Err(e) => error_repr(e),
        };
        self.store.append(keys.outputs(), output.as_bytes()).await?;

        tracing::debug!(operation = %id, args = %args, output = %output, "Recorded call");
        result
    }
}

/// The two history lists of one operation, as recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallHistory {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl CallHistory {
    /// Whether both lists have the same length.
    pub fn is_aligned(&self) -> bool {
        self.inputs.len() == self.outputs.len()
    }

    /// Input/output pairs in call order, up to the shorter list.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs
            .iter()
            .zip(self.outputs.iter())
            .map(|(i, o)| (i.as_str(), o.as_str()))
    }
}

/// Read the full history of `id`.
pub async fn call_history<S>(store: &S, id: &OperationId) -> KvTraceResult<CallHistory>
where
    S: KeyValueStore + ?Sized,
{
    let keys = id.keys();
    let inputs = read_text_list(store, keys.inputs()).await?;
    let outputs = read_text_list(store, keys.outputs()).await?;
    Ok(CallHistory { inputs, outputs })
}

async fn read_text_list<S>(store: &S, key: &str) -> KvTraceResult<Vec<String>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(store
        .range(key, 0, -1)
        .await?
        .into_iter()
        .map(|item| String::from_utf8_lossy(&item).into_owned())
        .collect())
}
