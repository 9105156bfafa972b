//! Call trace replay.
//!
//! Rebuilds a readable trace of one operation from its recorded history:
//!
//! ```text
//! Cache.store was called 2 times:
//! Cache.store(*('foo',)) -> 0192f1c4-...
//! Cache.store(*('bar',)) -> 0192f1c4-...
//! ```

use std::fmt;
use std::io;

use kvtrace_core::{KvTraceResult, OperationId};
use kvtrace_storage::KeyValueStore;

use crate::history::call_history;

/// One reconstructed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub input: String,
    pub output: String,
}

/// Trace of every recorded call of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTrace {
    operation: OperationId,
    total_calls: usize,
    calls: Vec<RecordedCall>,
}

impl CallTrace {
    pub fn operation(&self) -> &OperationId {
        &self.operation
    }

    /// Number of recorded inputs. Can exceed `calls().len()` when a call's
    /// output was never written.
    pub fn total_calls(&self) -> usize {
        self.total_calls
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    /// Render the trace into `out`.
    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", self)
    }
}

impl fmt::Display for CallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} was called {} times:", self.operation, self.total_calls)?;
        for call in &self.calls {
            writeln!(f, "{}(*{}) -> {}", self.operation, call.input, call.output)?;
        }
        Ok(())
    }
}

/// Read the recorded history of `id` and pair inputs with outputs.
///
/// Never writes to the store.
pub async fn replay<S>(store: &S, id: &OperationId) -> KvTraceResult<CallTrace>
where
    S: KeyValueStore + ?Sized,
{
    let history = call_history(store, id).await?;
    if !history.is_aligned() {
        tracing::warn!(
            operation = %id,
            inputs = history.inputs.len(),
            outputs = history.outputs.len(),
            "History lists differ in length; replaying the shorter"
        );
    }

    let calls = history
        .pairs()
        .map(|(input, output)| RecordedCall {
            input: input.to_string(),
            output: output.to_string(),
        })
        .collect();

    Ok(CallTrace {
        operation: id.clone(),
        total_calls: history.inputs.len(),
        calls,
    })
}

/// Replay `id` to stdout.
pub async fn print_replay<S>(store: &S, id: &OperationId) -> KvTraceResult<()>
where
    S: KeyValueStore + ?Sized,
{
    let trace = replay(store, id).await?;
    print!("{}", trace);
    Ok(())
}
