//! Property-based tests for the query engine using proptest.
//!
//! These tests check the paging and counting invariants against a real
//! in-memory SQLite table:
//!
//! - Consecutive pages partition the result set with no repeated identity,
//!   even when many rows share the same sort key
//! - The filtered count never exceeds the total, and equals it without a search
