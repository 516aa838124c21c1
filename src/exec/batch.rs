//! Tuple batches.
//!
//! A [`TupleBatch`] is a materialized, bounded window of rows plus a
//! termination flag. Row numbering is 1-based and contiguous within one
//! logical result stream: batch *n+1* begins where batch *n* ended.

use serde::{Deserialize, Serialize};

use super::value::Value;

/// A bounded window of result rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleBatch {
    begin_row: u64,
    rows: Vec<Vec<Value>>,
    terminated: bool,
}

impl TupleBatch {
    /// Creates a non-terminated batch starting at `begin_row` (1-based).
    #[must_use]
    pub fn new(begin_row: u64, rows: Vec<Vec<Value>>) -> Self {
        Self { begin_row, rows, terminated: false }
    }

    /// Creates an empty batch positioned at `begin_row`.
    #[must_use]
    pub fn empty(begin_row: u64) -> Self {
        Self::new(begin_row, Vec::new())
    }

    /// The first row number covered by this batch.
    #[must_use]
    pub const fn begin_row(&self) -> u64 {
        self.begin_row
    }

    /// The last row number covered by this batch.
    ///
    /// `end_row - begin_row + 1 == row_count` always holds; an empty
    /// batch ends one before it begins.
    #[must_use]
    pub fn end_row(&self) -> u64 {
        self.begin_row + self.rows.len() as u64 - 1
    }

    /// Number of rows in this batch.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The rows of this batch.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Consumes the batch, returning its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    /// Whether any further batch exists after this one.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Marks this batch as the last of its stream.
    pub fn set_terminated(&mut self, terminated: bool) {
        self.terminated = terminated;
    }

    /// Builder-style termination flag.
    #[must_use]
    pub const fn terminated(mut self) -> Self {
        self.terminated = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: i64) -> Vec<Value> {
        vec![Value::Integer(v)]
    }

    #[test]
    fn row_window_invariant() {
        let batch = TupleBatch::new(11, vec![row(1), row(2), row(3)]);
        assert_eq!(batch.begin_row(), 11);
        assert_eq!(batch.end_row(), 13);
        assert_eq!(batch.end_row() - batch.begin_row() + 1, batch.row_count() as u64);
    }

    #[test]
    fn empty_batch_ends_before_it_begins() {
        let batch = TupleBatch::empty(5);
        assert_eq!(batch.row_count(), 0);
        assert_eq!(batch.end_row(), 4);
    }

    #[test]
    fn termination_flag() {
        let batch = TupleBatch::new(1, vec![row(1)]);
        assert!(!batch.is_terminated());
        let batch = batch.terminated();
        assert!(batch.is_terminated());
    }
}
