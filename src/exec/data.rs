//! Consumed collaborator contracts.
//!
//! The pipeline talks to the outside world through two narrow interfaces:
//! the data manager registers sub-requests against external sources and
//! resolves code-table lookups, and the buffer manager supplies the
//! processor batch size. Both are specified here only as consumed
//! contracts; their real implementations live outside this crate.

use std::sync::{Arc, Mutex};

use crate::error::ExecResult;
use crate::plan::NodeId;
use crate::sql::Command;

use super::context::CommandContext;
use super::operator::Poll;
use super::value::Value;

/// A stream of rows produced by a registered sub-request.
///
/// `next_tuple` may return [`Poll::Blocked`] while the source is not yet
/// ready; `Ready(None)` marks exhaustion. `close_source` must be safe to
/// call at any time and releases the source exactly once.
pub trait TupleSource: Send {
    /// Pulls the next row.
    fn next_tuple(&mut self) -> ExecResult<Poll<Option<Vec<Value>>>>;

    /// Rewinds the source to its first row.
    fn reset(&mut self);

    /// Releases the source.
    fn close_source(&mut self);
}

/// The data manager contract consumed by the pipeline.
pub trait ProcessingDataManager: Send {
    /// Registers a sub-request against an external source, returning the
    /// tuple source that will deliver its rows. `binding_id` distinguishes
    /// re-registrations of the same node under a dependent join.
    fn register_request(
        &mut self,
        processor_id: u64,
        command: &Command,
        source_name: &str,
        binding_id: Option<u64>,
        node_id: NodeId,
    ) -> ExecResult<Box<dyn TupleSource>>;

    /// Looks up a value in a code table.
    ///
    /// May return [`Poll::Blocked`] while the code table loads
    /// asynchronously; the caller retries later.
    fn lookup_code_value(
        &mut self,
        context: &CommandContext,
        code_table: &str,
        return_column: &str,
        key_column: &str,
        key_value: &Value,
    ) -> ExecResult<Poll<Value>>;
}

/// A shareable data manager handle.
///
/// Exactly one thread drives one open plan, but operators within the
/// plan share the handle, so it is reference-counted with interior
/// mutability.
pub type SharedDataManager = Arc<Mutex<dyn ProcessingDataManager>>;

/// The buffer manager contract consumed by the pipeline.
///
/// The pipeline only ever asks for the configured processor batch size
/// and never assumes a specific value.
pub trait BufferManager: Send + Sync {
    /// The number of rows to place in one tuple batch.
    fn processor_batch_size(&self) -> usize;
}

/// Test support: in-memory doubles for the consumed contracts.
///
/// These are used by this crate's own tests and are exported for
/// integration tests of drivers embedding the pipeline.
pub mod testing {
    use std::collections::{HashMap, VecDeque};

    use crate::error::{ExecResult, QueryError};
    use crate::plan::NodeId;
    use crate::sql::Command;

    use super::super::context::CommandContext;
    use super::super::operator::Poll;
    use super::super::value::Value;
    use super::{BufferManager, ProcessingDataManager, TupleSource};

    /// An in-memory tuple source with an optional blocking schedule.
    #[derive(Debug, Default)]
    pub struct FakeTupleSource {
        rows: Vec<Vec<Value>>,
        position: usize,
        /// Call indices (0-based) at which `next_tuple` reports blocked.
        block_at: VecDeque<usize>,
        calls: usize,
        closed: bool,
    }

    impl FakeTupleSource {
        /// Creates a source over the given rows.
        #[must_use]
        pub fn new(rows: Vec<Vec<Value>>) -> Self {
            Self { rows, ..Self::default() }
        }

        /// Schedules blocked results at the given `next_tuple` call
        /// indices.
        #[must_use]
        pub fn with_blocks(mut self, call_indices: Vec<usize>) -> Self {
            self.block_at = call_indices.into();
            self
        }

        /// Whether the source has been closed.
        #[must_use]
        pub const fn is_closed(&self) -> bool {
            self.closed
        }
    }

    impl TupleSource for FakeTupleSource {
        fn next_tuple(&mut self) -> ExecResult<Poll<Option<Vec<Value>>>> {
            let call = self.calls;
            self.calls += 1;
            if self.block_at.front() == Some(&call) {
                self.block_at.pop_front();
                return Ok(Poll::Blocked);
            }
            if self.position >= self.rows.len() {
                return Ok(Poll::Ready(None));
            }
            let row = self.rows[self.position].clone();
            self.position += 1;
            Ok(Poll::Ready(Some(row)))
        }

        fn reset(&mut self) {
            self.position = 0;
        }

        fn close_source(&mut self) {
            self.closed = true;
        }
    }

    /// An in-memory data manager backed by named row sets and code tables.
    #[derive(Debug, Default)]
    pub struct FakeDataManager {
        sources: HashMap<String, Vec<Vec<Value>>>,
        /// Per-source `next_tuple` call indices that report blocked.
        source_blocks: HashMap<String, Vec<usize>>,
        /// (table, return column, key column) -> key -> value, keyed by
        /// the key's display form.
        code_tables: HashMap<(String, String, String), HashMap<String, Value>>,
        /// Number of lookups that report "still loading" before resolving.
        lookup_delays: u32,
        /// Commands seen by `register_request`, for assertions.
        registered: Vec<String>,
    }

    impl FakeDataManager {
        /// Creates an empty data manager.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Adds a named source with its rows.
        #[must_use]
        pub fn with_source(mut self, name: &str, rows: Vec<Vec<Value>>) -> Self {
            self.sources.insert(name.to_string(), rows);
            self
        }

        /// Schedules blocked results on a source's tuple stream.
        #[must_use]
        pub fn with_source_blocks(mut self, name: &str, call_indices: Vec<usize>) -> Self {
            self.source_blocks.insert(name.to_string(), call_indices);
            self
        }

        /// Adds a code-table entry.
        #[must_use]
        pub fn with_code_value(
            mut self,
            table: &str,
            return_column: &str,
            key_column: &str,
            key: Value,
            value: Value,
        ) -> Self {
            self.code_tables
                .entry((table.to_string(), return_column.to_string(), key_column.to_string()))
                .or_default()
                .insert(key.to_string(), value);
            self
        }

        /// Makes the first `count` lookups report blocked while "loading".
        #[must_use]
        pub const fn with_lookup_delays(mut self, count: u32) -> Self {
            self.lookup_delays = count;
            self
        }

        /// Commands registered so far, rendered as push-down SQL.
        #[must_use]
        pub fn registered_commands(&self) -> &[String] {
            &self.registered
        }
    }

    impl ProcessingDataManager for FakeDataManager {
        fn register_request(
            &mut self,
            _processor_id: u64,
            command: &Command,
            source_name: &str,
            _binding_id: Option<u64>,
            _node_id: NodeId,
        ) -> ExecResult<Box<dyn TupleSource>> {
            self.registered.push(command.to_string());
            let rows = self
                .sources
                .get(source_name)
                .cloned()
                .ok_or_else(|| QueryError::Source(format!("unknown source {source_name}")))?;
            let mut source = FakeTupleSource::new(rows);
            if let Some(blocks) = self.source_blocks.get(source_name) {
                source = source.with_blocks(blocks.clone());
            }
            Ok(Box::new(source))
        }

        fn lookup_code_value(
            &mut self,
            context: &CommandContext,
            code_table: &str,
            return_column: &str,
            key_column: &str,
            key_value: &Value,
        ) -> ExecResult<Poll<Value>> {
            if self.lookup_delays > 0 {
                self.lookup_delays -= 1;
                context.record_warning(format!("code table {code_table} still loading"));
                return Ok(Poll::Blocked);
            }
            let table = self
                .code_tables
                .get(&(
                    code_table.to_string(),
                    return_column.to_string(),
                    key_column.to_string(),
                ))
                .ok_or_else(|| QueryError::Source(format!("unknown code table {code_table}")))?;
            Ok(Poll::Ready(
                table.get(&key_value.to_string()).cloned().unwrap_or(Value::Null),
            ))
        }
    }

    /// A buffer manager with a fixed batch size.
    #[derive(Debug, Clone, Copy)]
    pub struct FakeBufferManager {
        batch_size: usize,
    }

    impl FakeBufferManager {
        /// Creates a buffer manager serving the given batch size.
        #[must_use]
        pub const fn new(batch_size: usize) -> Self {
            Self { batch_size }
        }
    }

    impl BufferManager for FakeBufferManager {
        fn processor_batch_size(&self) -> usize {
            self.batch_size
        }
    }
}
