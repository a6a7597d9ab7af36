//! # termrank core
//!
//! The index-construction and query engine behind `termrank`: row decoding,
//! the [`TermIndex`](store::TermIndex) abstraction with its associative and
//! columnar backends, memoized rank aggregation, query selection and
//! flattening into export-ready tables.
//!
//! This crate performs no filesystem I/O. The calling application reads the
//! report files, hands their rows to an [`IndexBuilder`](builder::IndexBuilder)
//! and writes the resulting [`FlatTable`](flatten::FlatTable) wherever it likes.
//!
//! ```text
//! rows ──▶ IndexBuilder ──▶ TermIndex ──▶ QueryEngine ──▶ flatten ──▶ FlatTable
//!            (row)          (store)      (query, rank)   (flatten)
//! ```

pub mod builder;
pub mod flatten;
pub mod models;
pub mod query;
pub mod rank;
pub mod row;
pub mod store;
