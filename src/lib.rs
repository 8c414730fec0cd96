//! Daf: an axis-indexed store of typed data
//!
//! A daf data set holds scalars, axes (ordered sets of unique entry names),
//! vectors indexed by one axis and matrices indexed by two. Stores can be
//! stacked into chains, concatenated along axes, and queried with a small
//! text language.

pub mod chain;
pub mod concat;
pub mod copy;
pub mod daf;
pub mod data;
pub mod error;
pub mod expression;
pub mod format;
pub mod groups;
pub mod memory;
pub mod query;
pub mod read_only;
pub mod reusable;

pub use chain::{chain_reader, chain_writer, ReaderChain, WriterChain};
pub use concat::{concatenate, ConcatOptions, EmptyKey, MergeAction, MergeKey};
pub use copy::{copy_all, copy_axis, copy_matrix, copy_scalar, copy_vector};
pub use daf::{DafReader, DafWriter};
pub use data::{DType, DenseMatrix, MajorAxis, Matrix, Scalar, SparseMatrix, SparseVector, Values, Vector};
pub use error::{DafError, ErrorCategory, Property, QueryError, QueryErrorKind, Result};
pub use format::{AxisEntries, DafReadHandle, DafWriteHandle, FormatReader, FormatWriter};
pub use groups::{aggregate_group_vector, chained_vector, collect_group_members, compact_groups, reconstruct_axis};
pub use memory::MemoryDaf;
pub use query::{parse_query, query, query_matrix, query_scalar, query_vector, NamedMatrix, NamedVector, Query, QueryValue};
pub use read_only::{read_only, ReadOnlyDaf};
pub use reusable::{ReusableStorage, Reused};
