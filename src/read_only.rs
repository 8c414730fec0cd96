//! Read-only views.
//!
//! [`ReadOnlyDaf`] only implements [`FormatReader`], so mutating through it
//! doesn't type-check at all. Wrapping something that is already read-only
//! returns the very same handle.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::data::{Matrix, Scalar, Vector};
use crate::format::{AxisEntries, DafReadHandle, FormatReader};

/// A read-only view of another store; reads pass straight through.
pub struct ReadOnlyDaf {
    name: String,
    inner: DafReadHandle,
}

impl ReadOnlyDaf {
    /// The wrapped store.
    pub fn inner(&self) -> &DafReadHandle {
        &self.inner
    }
}

/// A read-only view of the store, keeping its name.
pub fn read_only(daf: DafReadHandle) -> DafReadHandle {
    if daf.is_read_only() {
        return daf;
    }
    let name = daf.name().to_string();
    Arc::new(ReadOnlyDaf { name, inner: daf })
}

/// A read-only view of the store under a different name. This always
/// wraps, since the name changes.
pub fn read_only_named(daf: DafReadHandle, name: impl Into<String>) -> DafReadHandle {
    Arc::new(ReadOnlyDaf {
        name: name.into(),
        inner: daf,
    })
}

impl FormatReader for ReadOnlyDaf {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn format_has_scalar(&self, name: &str) -> bool {
        self.inner.format_has_scalar(name)
    }

    fn format_get_scalar(&self, name: &str) -> Option<Scalar> {
        self.inner.format_get_scalar(name)
    }

    fn format_scalar_names(&self) -> BTreeSet<String> {
        self.inner.format_scalar_names()
    }

    fn format_has_axis(&self, axis: &str) -> bool {
        self.inner.format_has_axis(axis)
    }

    fn format_get_axis(&self, axis: &str) -> Option<AxisEntries> {
        self.inner.format_get_axis(axis)
    }

    fn format_axis_names(&self) -> BTreeSet<String> {
        self.inner.format_axis_names()
    }

    fn format_axis_length(&self, axis: &str) -> Option<usize> {
        self.inner.format_axis_length(axis)
    }

    fn format_has_vector(&self, axis: &str, name: &str) -> bool {
        self.inner.format_has_vector(axis, name)
    }

    fn format_get_vector(&self, axis: &str, name: &str) -> Option<Arc<Vector>> {
        self.inner.format_get_vector(axis, name)
    }

    fn format_vector_names(&self, axis: &str) -> BTreeSet<String> {
        self.inner.format_vector_names(axis)
    }

    fn format_has_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> bool {
        self.inner.format_has_matrix(rows_axis, columns_axis, name)
    }

    fn format_get_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Option<Arc<Matrix>> {
        self.inner.format_get_matrix(rows_axis, columns_axis, name)
    }

    fn format_matrix_names(&self, rows_axis: &str, columns_axis: &str) -> BTreeSet<String> {
        self.inner.format_matrix_names(rows_axis, columns_axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daf::{DafReader, DafWriter};
    use crate::format::FormatWriter;
    use crate::memory::MemoryDaf;

    #[test]
    fn test_renamed_view_always_wraps() {
        let daf = MemoryDaf::shared("base!");
        daf.set_scalar("version", 1u32, false).unwrap();
        let view = read_only(daf.clone().into_reader());
        let renamed = read_only_named(view.clone(), "renamed!");
        assert!(!Arc::ptr_eq(&view, &renamed));
        assert_eq!(renamed.name(), "renamed!");
        assert!(renamed.is_read_only());
        assert_eq!(renamed.get_scalar("version").unwrap(), Scalar::U32(1));

        daf.set_scalar("version", 2u32, true).unwrap();
        assert_eq!(renamed.get_scalar("version").unwrap(), Scalar::U32(2));
    }
}
