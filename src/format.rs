//! The minimal interface a storage backend implements.
//!
//! These are the "format" primitives: they assume their arguments were
//! already validated by the safe layer in [`crate::daf`] (the axis exists,
//! the vector has the axis length, the property doesn't exist yet unless
//! overwriting, ...). A backend never re-checks the contract; it just stores
//! and returns data. Gets return `None` when the property is absent, which
//! the safe layer turns into the proper "missing" error.
//!
//! All methods take `&self`: backends guard their tables internally (e.g.
//! with a lock), so handles can be shared as `Arc<dyn FormatReader>` /
//! `Arc<dyn FormatWriter>`. The safe layer's check-then-act sequences are not
//! atomic, so concurrent mutation of the same store remains the caller's
//! responsibility.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::data::{Matrix, Scalar, Vector};
use crate::error::Result;

/// The ordered, unique entries of an axis.
pub type AxisEntries = Arc<IndexSet<String>>;

/// A shared handle to a readable store.
pub type DafReadHandle = Arc<dyn FormatReader>;

/// A shared handle to a writable store.
pub type DafWriteHandle = Arc<dyn FormatWriter>;

/// Read primitives of a store.
pub trait FormatReader: Send + Sync {
    /// A human-readable name, used in error messages.
    fn name(&self) -> &str;

    /// Whether this handle refuses all mutation (read-only views and reader
    /// chains).
    fn is_read_only(&self) -> bool {
        false
    }

    fn format_has_scalar(&self, name: &str) -> bool;
    fn format_get_scalar(&self, name: &str) -> Option<Scalar>;
    fn format_scalar_names(&self) -> BTreeSet<String>;

    fn format_has_axis(&self, axis: &str) -> bool;
    fn format_get_axis(&self, axis: &str) -> Option<AxisEntries>;
    fn format_axis_names(&self) -> BTreeSet<String>;

    fn format_axis_length(&self, axis: &str) -> Option<usize> {
        self.format_get_axis(axis).map(|entries| entries.len())
    }

    fn format_has_vector(&self, axis: &str, name: &str) -> bool;
    fn format_get_vector(&self, axis: &str, name: &str) -> Option<Arc<Vector>>;
    fn format_vector_names(&self, axis: &str) -> BTreeSet<String>;

    fn format_has_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> bool;
    fn format_get_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Option<Arc<Matrix>>;
    fn format_matrix_names(&self, rows_axis: &str, columns_axis: &str) -> BTreeSet<String>;
}

/// Write primitives of a store.
///
/// Writes return a `Result` so that composite stores (chains) can refuse a
/// write that the safe layer can't see is invalid, such as deleting a
/// property that an earlier chain member shadows.
pub trait FormatWriter: FormatReader {
    /// This store viewed as a reader.
    fn as_reader(&self) -> &dyn FormatReader;

    /// This shared handle viewed as a reader handle.
    fn into_reader(self: Arc<Self>) -> DafReadHandle;

    fn format_set_scalar(&self, name: &str, value: Scalar) -> Result<()>;
    fn format_delete_scalar(&self, name: &str) -> Result<()>;

    fn format_add_axis(&self, axis: &str, entries: AxisEntries) -> Result<()>;
    /// Delete an axis together with all its vectors and matrices.
    fn format_delete_axis(&self, axis: &str) -> Result<()>;

    fn format_set_vector(&self, axis: &str, name: &str, vector: Arc<Vector>) -> Result<()>;
    fn format_delete_vector(&self, axis: &str, name: &str) -> Result<()>;

    fn format_set_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str, matrix: Arc<Matrix>) -> Result<()>;
    fn format_delete_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Result<()>;

    /// Fail if deleting the matrix would be refused, without deleting it.
    fn format_check_delete_matrix(&self, _rows_axis: &str, _columns_axis: &str, _name: &str) -> Result<()> {
        Ok(())
    }
}
