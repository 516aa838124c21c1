//! Scalar iteration over one column of a tuple source.
//!
//! Dependent-join processing consumes distinct key values one at a time;
//! this iterator adapts a tuple source into that shape. A reset is
//! recorded lazily and only applied at the next access, so resetting a
//! blocked iterator costs nothing until it is actually read again.

use crate::error::{ExecResult, QueryError};
use crate::exec::data::TupleSource;
use crate::exec::operator::Poll;
use crate::exec::value::Value;

/// Pull-style iterator over one column of a tuple source.
pub struct ValueIterator {
    source: Box<dyn TupleSource>,
    column: usize,
    /// `Some(None)` once the source is exhausted.
    peeked: Option<Option<Value>>,
    reset_pending: bool,
}

impl ValueIterator {
    /// Creates an iterator over `column` of `source`.
    #[must_use]
    pub fn new(source: Box<dyn TupleSource>, column: usize) -> Self {
        Self { source, column, peeked: None, reset_pending: false }
    }

    /// Whether another value is available. May block.
    pub fn has_next(&mut self) -> ExecResult<Poll<bool>> {
        match self.ensure_peeked()? {
            Poll::Blocked => Ok(Poll::Blocked),
            Poll::Ready(()) => Ok(Poll::Ready(matches!(self.peeked, Some(Some(_))))),
        }
    }

    /// Produces the next value. May block; a blocked call retried later
    /// yields the same value exactly once.
    pub fn next_value(&mut self) -> ExecResult<Poll<Value>> {
        match self.ensure_peeked()? {
            Poll::Blocked => return Ok(Poll::Blocked),
            Poll::Ready(()) => {}
        }
        match self.peeked.take() {
            Some(Some(value)) => Ok(Poll::Ready(value)),
            Some(None) | None => {
                self.peeked = Some(None);
                Err(QueryError::Component("value iterator is exhausted".to_string()))
            }
        }
    }

    /// Marks the iterator for rewind. Applied lazily at the next access.
    pub fn reset(&mut self) {
        self.reset_pending = true;
    }

    /// Releases the underlying source.
    pub fn close(&mut self) {
        self.source.close_source();
        self.peeked = Some(None);
    }

    fn ensure_peeked(&mut self) -> ExecResult<Poll<()>> {
        if self.reset_pending {
            self.source.reset();
            self.peeked = None;
            self.reset_pending = false;
        }
        if self.peeked.is_some() {
            return Ok(Poll::Ready(()));
        }
        match self.source.next_tuple()? {
            Poll::Blocked => Ok(Poll::Blocked),
            Poll::Ready(None) => {
                self.peeked = Some(None);
                Ok(Poll::Ready(()))
            }
            Poll::Ready(Some(row)) => {
                let value = row.get(self.column).cloned().ok_or_else(|| {
                    QueryError::MalformedRow(format!(
                        "source row has no column {} for value iteration",
                        self.column
                    ))
                })?;
                self.peeked = Some(Some(value));
                Ok(Poll::Ready(()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::data::testing::FakeTupleSource;

    fn two_rows() -> Box<dyn TupleSource> {
        Box::new(FakeTupleSource::new(vec![
            vec![Value::Integer(1), Value::from("a")],
            vec![Value::Integer(2), Value::from("b")],
        ]))
    }

    #[test]
    fn iterates_the_selected_column() {
        let mut iter = ValueIterator::new(two_rows(), 1);

        assert_eq!(iter.has_next().unwrap(), Poll::Ready(true));
        assert_eq!(iter.next_value().unwrap(), Poll::Ready(Value::from("a")));
        assert_eq!(iter.next_value().unwrap(), Poll::Ready(Value::from("b")));
        assert_eq!(iter.has_next().unwrap(), Poll::Ready(false));
        assert!(iter.next_value().unwrap_err().is_component());
    }

    #[test]
    fn reset_is_applied_lazily() {
        let mut iter = ValueIterator::new(two_rows(), 0);
        assert_eq!(iter.next_value().unwrap(), Poll::Ready(Value::Integer(1)));

        iter.reset();
        // The pending reset replaces the already-peeked second row.
        assert_eq!(iter.next_value().unwrap(), Poll::Ready(Value::Integer(1)));
        assert_eq!(iter.next_value().unwrap(), Poll::Ready(Value::Integer(2)));
    }

    #[test]
    fn blocked_source_preserves_position() {
        let source = FakeTupleSource::new(vec![vec![Value::Integer(1)], vec![Value::Integer(2)]])
            .with_blocks(vec![1]);
        let mut iter = ValueIterator::new(Box::new(source), 0);

        assert_eq!(iter.next_value().unwrap(), Poll::Ready(Value::Integer(1)));
        assert!(iter.next_value().unwrap().is_blocked());
        assert_eq!(iter.next_value().unwrap(), Poll::Ready(Value::Integer(2)));
    }

    #[test]
    fn missing_column_is_a_malformed_row() {
        let mut iter = ValueIterator::new(two_rows(), 5);
        let err = iter.next_value().unwrap_err();
        assert!(matches!(err, QueryError::MalformedRow(_)));
        assert!(err.is_processing());
    }
}
