//! The safe layer over the format primitives.
//!
//! [`DafReader`] and [`DafWriter`] are blanket extension traits: every
//! [`FormatReader`] (including `dyn FormatReader`) gets the checked API for
//! free. Each operation validates its preconditions (existence, shapes, entry
//! names, layout) and only then delegates to the primitives, so a failed
//! operation never leaves a partial change behind.
//!
//! # Reserved names
//!
//! Every axis has an implicit vector called `name` holding its entries. It
//! can be read like any other vector but can't be set or deleted.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::debug;

use crate::data::{Element, MajorAxis, Matrix, Scalar, Values, Vector};
use crate::error::{DafError, Result};
use crate::format::{AxisEntries, FormatReader, FormatWriter};

/// The reserved per-axis vector holding the axis entries.
pub const NAME_VECTOR: &str = "name";

// ============================================================================
// CHECKS
// ============================================================================

pub(crate) fn require_axis<D: FormatReader + ?Sized>(daf: &D, axis: &str) -> Result<AxisEntries> {
    daf.format_get_axis(axis).ok_or_else(|| DafError::MissingAxis {
        axis: axis.to_string(),
        daf: daf.name().to_string(),
    })
}

fn check_vector<D: FormatReader + ?Sized>(
    daf: &D,
    axis: &str,
    name: &str,
    vector: &Vector,
    what: &'static str,
) -> Result<()> {
    let entries = require_axis(daf, axis)?;
    if vector.len() != entries.len() {
        return Err(DafError::VectorLengthMismatch {
            what,
            axis: axis.to_string(),
            name: name.to_string(),
            length: vector.len(),
            expected: entries.len(),
            daf: daf.name().to_string(),
        });
    }
    for labels in vector.all_labels() {
        if !same_entries(labels, &entries) {
            return Err(DafError::NameMismatch {
                what,
                axis: axis.to_string(),
                daf: daf.name().to_string(),
            });
        }
    }
    Ok(())
}

fn check_matrix<D: FormatReader + ?Sized>(
    daf: &D,
    rows_axis: &str,
    columns_axis: &str,
    name: &str,
    matrix: &Matrix,
) -> Result<()> {
    let rows = require_axis(daf, rows_axis)?;
    let columns = require_axis(daf, columns_axis)?;
    if matrix.nrows() != rows.len() || matrix.ncols() != columns.len() {
        return Err(DafError::MatrixDimensionMismatch {
            rows_axis: rows_axis.to_string(),
            columns_axis: columns_axis.to_string(),
            name: name.to_string(),
            rows: matrix.nrows(),
            columns: matrix.ncols(),
            expected_rows: rows.len(),
            expected_columns: columns.len(),
            daf: daf.name().to_string(),
        });
    }
    for (row_names, column_names) in matrix.all_labels() {
        if !same_entries(row_names, &rows) {
            return Err(DafError::NameMismatch {
                what: "matrix rows",
                axis: rows_axis.to_string(),
                daf: daf.name().to_string(),
            });
        }
        if !same_entries(column_names, &columns) {
            return Err(DafError::NameMismatch {
                what: "matrix columns",
                axis: columns_axis.to_string(),
                daf: daf.name().to_string(),
            });
        }
    }
    Ok(())
}

fn same_entries(labels: &[String], entries: &IndexSet<String>) -> bool {
    labels.len() == entries.len() && labels.iter().zip(entries).all(|(label, entry)| label == entry)
}

fn reserved(axis: &str, daf: &str) -> DafError {
    DafError::ReservedProperty {
        axis: axis.to_string(),
        daf: daf.to_string(),
    }
}

fn entries_vector(entries: &AxisEntries) -> Arc<Vector> {
    Arc::new(Vector::Dense(Values::String(entries.iter().cloned().collect())))
}

// ============================================================================
// READER
// ============================================================================

/// Checked read access to any store.
pub trait DafReader: FormatReader {
    fn has_scalar(&self, name: &str) -> bool {
        self.format_has_scalar(name)
    }

    fn get_scalar(&self, name: &str) -> Result<Scalar> {
        self.format_get_scalar(name).ok_or_else(|| DafError::MissingScalar {
            name: name.to_string(),
            daf: self.name().to_string(),
        })
    }

    /// The scalar value, or the default if it doesn't exist.
    fn get_scalar_or(&self, name: &str, default: impl Into<Scalar>) -> Scalar {
        self.format_get_scalar(name).unwrap_or_else(|| default.into())
    }

    /// The scalar value as a specific Rust type.
    fn get_scalar_as<T: Element>(&self, name: &str) -> Result<T> {
        let value = self.get_scalar(name)?;
        T::from_scalar(&value).ok_or_else(|| DafError::TypeMismatch {
            what: format!("scalar: {name}"),
            expected: T::DTYPE.to_string(),
            actual: value.dtype().to_string(),
            daf: self.name().to_string(),
        })
    }

    fn scalar_names(&self) -> BTreeSet<String> {
        self.format_scalar_names()
    }

    fn has_axis(&self, axis: &str) -> bool {
        self.format_has_axis(axis)
    }

    fn get_axis(&self, axis: &str) -> Result<AxisEntries> {
        require_axis(self, axis)
    }

    /// The axis entries as an owned list.
    fn axis_entries(&self, axis: &str) -> Result<Vec<String>> {
        Ok(require_axis(self, axis)?.iter().cloned().collect())
    }

    fn axis_length(&self, axis: &str) -> Result<usize> {
        self.format_axis_length(axis).ok_or_else(|| DafError::MissingAxis {
            axis: axis.to_string(),
            daf: self.name().to_string(),
        })
    }

    fn axis_names(&self) -> BTreeSet<String> {
        self.format_axis_names()
    }

    /// The position of an entry in an axis.
    fn axis_index(&self, axis: &str, entry: &str) -> Result<usize> {
        let entries = require_axis(self, axis)?;
        entries.get_index_of(entry).ok_or_else(|| DafError::MissingEntry {
            axis: axis.to_string(),
            entry: entry.to_string(),
            daf: self.name().to_string(),
        })
    }

    fn axis_indices<S: AsRef<str>>(&self, axis: &str, entries: &[S]) -> Result<Vec<usize>> {
        let known = require_axis(self, axis)?;
        entries
            .iter()
            .map(|entry| {
                known.get_index_of(entry.as_ref()).ok_or_else(|| DafError::MissingEntry {
                    axis: axis.to_string(),
                    entry: entry.as_ref().to_string(),
                    daf: self.name().to_string(),
                })
            })
            .collect()
    }

    fn has_vector(&self, axis: &str, name: &str) -> Result<bool> {
        require_axis(self, axis)?;
        Ok(name == NAME_VECTOR || self.format_has_vector(axis, name))
    }

    fn get_vector(&self, axis: &str, name: &str) -> Result<Arc<Vector>> {
        let entries = require_axis(self, axis)?;
        if name == NAME_VECTOR {
            return Ok(entries_vector(&entries));
        }
        self.format_get_vector(axis, name).ok_or_else(|| DafError::MissingVector {
            axis: axis.to_string(),
            name: name.to_string(),
            daf: self.name().to_string(),
        })
    }

    /// The vector, or the default if it doesn't exist. The default must fit
    /// the axis, but is only checked when it is actually used.
    fn get_vector_or(&self, axis: &str, name: &str, default: impl Into<Vector>) -> Result<Arc<Vector>> {
        if self.has_vector(axis, name)? {
            return self.get_vector(axis, name);
        }
        let default = default.into();
        check_vector(self, axis, name, &default, "default vector")?;
        Ok(Arc::new(default.into_storage()))
    }

    /// Vector names of an axis, not including the reserved `name`.
    fn vector_names(&self, axis: &str) -> Result<BTreeSet<String>> {
        require_axis(self, axis)?;
        Ok(self.format_vector_names(axis))
    }

    /// Whether the matrix exists in either layout.
    fn has_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Result<bool> {
        require_axis(self, rows_axis)?;
        require_axis(self, columns_axis)?;
        Ok(self.format_has_matrix(rows_axis, columns_axis, name)
            || self.format_has_matrix(columns_axis, rows_axis, name))
    }

    /// The matrix with the rows along `rows_axis`. If it is only stored for
    /// the flipped axes, this returns its (row-major) transpose.
    fn get_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Result<Arc<Matrix>> {
        require_axis(self, rows_axis)?;
        require_axis(self, columns_axis)?;
        if let Some(matrix) = self.format_get_matrix(rows_axis, columns_axis, name) {
            return Ok(matrix);
        }
        if let Some(flipped) = self.format_get_matrix(columns_axis, rows_axis, name) {
            debug!(daf = self.name(), rows_axis, columns_axis, name, "transposed flipped matrix");
            return Ok(Arc::new(flipped.as_ref().clone().transposed()));
        }
        Err(DafError::MissingMatrix {
            rows_axis: rows_axis.to_string(),
            columns_axis: columns_axis.to_string(),
            name: name.to_string(),
            daf: self.name().to_string(),
        })
    }

    fn get_matrix_or(
        &self,
        rows_axis: &str,
        columns_axis: &str,
        name: &str,
        default: impl Into<Matrix>,
    ) -> Result<Arc<Matrix>> {
        if self.has_matrix(rows_axis, columns_axis, name)? {
            return self.get_matrix(rows_axis, columns_axis, name);
        }
        let default = default.into();
        check_matrix(self, rows_axis, columns_axis, name, &default)?;
        Ok(Arc::new(default.without_labels()))
    }

    /// Matrix names of an axes pair, in either layout.
    fn matrix_names(&self, rows_axis: &str, columns_axis: &str) -> Result<BTreeSet<String>> {
        require_axis(self, rows_axis)?;
        require_axis(self, columns_axis)?;
        let mut names = self.format_matrix_names(rows_axis, columns_axis);
        names.extend(self.format_matrix_names(columns_axis, rows_axis));
        Ok(names)
    }

    /// A human-readable listing of everything in the store.
    fn description(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "name: {}", self.name());
        if self.is_read_only() {
            let _ = writeln!(text, "read-only: true");
        }

        let scalars = self.format_scalar_names();
        if !scalars.is_empty() {
            text.push_str("scalars:\n");
            for name in &scalars {
                if let Some(value) = self.format_get_scalar(name) {
                    let _ = writeln!(text, "  {name}: {value} ({})", value.dtype());
                }
            }
        }

        let axes = self.format_axis_names();
        if !axes.is_empty() {
            text.push_str("axes:\n");
            for axis in &axes {
                let length = self.format_axis_length(axis).unwrap_or(0);
                let _ = writeln!(text, "  {axis}: {length} entries");
            }
        }

        let mut vectors = String::new();
        for axis in &axes {
            let names = self.format_vector_names(axis);
            if names.is_empty() {
                continue;
            }
            let _ = writeln!(vectors, "  {axis}:");
            for name in &names {
                if let Some(vector) = self.format_get_vector(axis, name) {
                    let kind = if vector.is_sparse() { "sparse" } else { "dense" };
                    let _ = writeln!(vectors, "    {name}: {} x {} ({kind})", vector.len(), vector.dtype());
                }
            }
        }
        if !vectors.is_empty() {
            text.push_str("vectors:\n");
            text.push_str(&vectors);
        }

        let mut matrices = String::new();
        for rows_axis in &axes {
            for columns_axis in &axes {
                let names = self.format_matrix_names(rows_axis, columns_axis);
                if names.is_empty() {
                    continue;
                }
                let _ = writeln!(matrices, "  {rows_axis},{columns_axis}:");
                for name in &names {
                    if let Some(matrix) = self.format_get_matrix(rows_axis, columns_axis, name) {
                        let kind = if matrix.is_sparse() { "sparse" } else { "dense" };
                        let _ = writeln!(
                            matrices,
                            "    {name}: {} x {} x {} in {} ({kind})",
                            matrix.nrows(),
                            matrix.ncols(),
                            matrix.dtype(),
                            matrix.major()
                        );
                    }
                }
            }
        }
        if !matrices.is_empty() {
            text.push_str("matrices:\n");
            text.push_str(&matrices);
        }
        text
    }
}

impl<T: FormatReader + ?Sized> DafReader for T {}

// ============================================================================
// WRITER
// ============================================================================

/// Checked write access to any writable store.
pub trait DafWriter: FormatWriter {
    fn set_scalar(&self, name: &str, value: impl Into<Scalar>, overwrite: bool) -> Result<()> {
        if !overwrite && self.format_has_scalar(name) {
            return Err(DafError::ExistingScalar {
                name: name.to_string(),
                daf: self.name().to_string(),
            });
        }
        self.format_set_scalar(name, value.into())?;
        debug!(daf = self.name(), name, "set scalar");
        Ok(())
    }

    fn delete_scalar(&self, name: &str, must_exist: bool) -> Result<()> {
        if !self.format_has_scalar(name) {
            if must_exist {
                return Err(DafError::MissingScalar {
                    name: name.to_string(),
                    daf: self.name().to_string(),
                });
            }
            return Ok(());
        }
        self.format_delete_scalar(name)?;
        debug!(daf = self.name(), name, "delete scalar");
        Ok(())
    }

    /// Add a new axis with unique entries.
    fn add_axis<I, S>(&self, axis: &str, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.format_has_axis(axis) {
            return Err(DafError::ExistingAxis {
                axis: axis.to_string(),
                daf: self.name().to_string(),
            });
        }
        let mut unique = IndexSet::new();
        for entry in entries {
            let entry = entry.into();
            if unique.contains(&entry) {
                return Err(DafError::NonUniqueEntries {
                    axis: axis.to_string(),
                    entry,
                    daf: self.name().to_string(),
                });
            }
            unique.insert(entry);
        }
        let length = unique.len();
        self.format_add_axis(axis, Arc::new(unique))?;
        debug!(daf = self.name(), axis, length, "add axis");
        Ok(())
    }

    /// Delete an axis along with every vector and matrix that uses it.
    fn delete_axis(&self, axis: &str, must_exist: bool) -> Result<()> {
        if !self.format_has_axis(axis) {
            if must_exist {
                return Err(DafError::MissingAxis {
                    axis: axis.to_string(),
                    daf: self.name().to_string(),
                });
            }
            return Ok(());
        }
        self.format_delete_axis(axis)?;
        debug!(daf = self.name(), axis, "delete axis");
        Ok(())
    }

    fn set_vector(&self, axis: &str, name: &str, vector: impl Into<Vector>, overwrite: bool) -> Result<()> {
        if name == NAME_VECTOR {
            return Err(reserved(axis, self.name()));
        }
        require_axis(self, axis)?;
        if !overwrite && self.format_has_vector(axis, name) {
            return Err(DafError::ExistingVector {
                axis: axis.to_string(),
                name: name.to_string(),
                daf: self.name().to_string(),
            });
        }
        let vector = vector.into();
        check_vector(self, axis, name, &vector, "vector")?;
        let sparse = vector.is_sparse();
        self.format_set_vector(axis, name, Arc::new(vector.into_storage()))?;
        debug!(daf = self.name(), axis, name, sparse, "set vector");
        Ok(())
    }

    fn delete_vector(&self, axis: &str, name: &str, must_exist: bool) -> Result<()> {
        if name == NAME_VECTOR {
            return Err(reserved(axis, self.name()));
        }
        require_axis(self, axis)?;
        if !self.format_has_vector(axis, name) {
            if must_exist {
                return Err(DafError::MissingVector {
                    axis: axis.to_string(),
                    name: name.to_string(),
                    daf: self.name().to_string(),
                });
            }
            return Ok(());
        }
        self.format_delete_vector(axis, name)?;
        debug!(daf = self.name(), axis, name, "delete vector");
        Ok(())
    }

    /// Set a matrix, which must be given in column-major layout.
    fn set_matrix(
        &self,
        rows_axis: &str,
        columns_axis: &str,
        name: &str,
        matrix: impl Into<Matrix>,
        overwrite: bool,
    ) -> Result<()> {
        require_axis(self, rows_axis)?;
        require_axis(self, columns_axis)?;
        let flipped = rows_axis != columns_axis && self.format_has_matrix(columns_axis, rows_axis, name);
        if !overwrite && (flipped || self.format_has_matrix(rows_axis, columns_axis, name)) {
            return Err(DafError::ExistingMatrix {
                rows_axis: rows_axis.to_string(),
                columns_axis: columns_axis.to_string(),
                name: name.to_string(),
                daf: self.name().to_string(),
            });
        }
        let matrix = matrix.into();
        check_matrix(self, rows_axis, columns_axis, name, &matrix)?;
        let storage = matrix
            .into_storage_or_fail(MajorAxis::Columns)
            .map_err(|actual| DafError::InvalidLayout {
                what: format!("matrix: {name}"),
                detail: actual.to_string(),
                daf: self.name().to_string(),
            })?;
        let sparse = storage.is_sparse();
        // A relayout copy must keep matching the matrix it was derived from.
        let relayout = flipped.then(|| storage.clone().transposed().relayout());
        self.format_set_matrix(rows_axis, columns_axis, name, Arc::new(storage))?;
        if let Some(relayout) = relayout {
            self.format_set_matrix(columns_axis, rows_axis, name, Arc::new(relayout))?;
        }
        debug!(daf = self.name(), rows_axis, columns_axis, name, sparse, flipped, "set matrix");
        Ok(())
    }

    /// Store the column-major copy of a matrix's transpose under the flipped
    /// axes, so it can be traversed efficiently either way.
    fn relayout_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str, overwrite: bool) -> Result<()> {
        require_axis(self, rows_axis)?;
        require_axis(self, columns_axis)?;
        if rows_axis == columns_axis {
            return Err(DafError::InvalidLayout {
                what: format!("matrix: {name}"),
                detail: format!("relayout of a matrix of the single axis: {rows_axis}"),
                daf: self.name().to_string(),
            });
        }
        let Some(matrix) = self.format_get_matrix(rows_axis, columns_axis, name) else {
            return Err(DafError::MissingMatrix {
                rows_axis: rows_axis.to_string(),
                columns_axis: columns_axis.to_string(),
                name: name.to_string(),
                daf: self.name().to_string(),
            });
        };
        if !overwrite && self.format_has_matrix(columns_axis, rows_axis, name) {
            return Err(DafError::ExistingMatrix {
                rows_axis: columns_axis.to_string(),
                columns_axis: rows_axis.to_string(),
                name: name.to_string(),
                daf: self.name().to_string(),
            });
        }
        let flipped = matrix.as_ref().clone().transposed().relayout();
        self.format_set_matrix(columns_axis, rows_axis, name, Arc::new(flipped))?;
        debug!(daf = self.name(), rows_axis, columns_axis, name, "relayout matrix");
        Ok(())
    }

    /// Delete a matrix, in both layouts if it was relayout.
    fn delete_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str, must_exist: bool) -> Result<()> {
        require_axis(self, rows_axis)?;
        require_axis(self, columns_axis)?;
        let exact = self.format_has_matrix(rows_axis, columns_axis, name);
        let flipped = rows_axis != columns_axis && self.format_has_matrix(columns_axis, rows_axis, name);
        if !exact && !flipped {
            if must_exist {
                return Err(DafError::MissingMatrix {
                    rows_axis: rows_axis.to_string(),
                    columns_axis: columns_axis.to_string(),
                    name: name.to_string(),
                    daf: self.name().to_string(),
                });
            }
            return Ok(());
        }
        if exact {
            self.format_check_delete_matrix(rows_axis, columns_axis, name)?;
        }
        if flipped {
            self.format_check_delete_matrix(columns_axis, rows_axis, name)?;
        }
        if exact {
            self.format_delete_matrix(rows_axis, columns_axis, name)?;
        }
        if flipped {
            self.format_delete_matrix(columns_axis, rows_axis, name)?;
        }
        debug!(daf = self.name(), rows_axis, columns_axis, name, "delete matrix");
        Ok(())
    }
}

impl<T: FormatWriter + ?Sized> DafWriter for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDaf;

    #[test]
    fn test_same_entries_checks_order() {
        let entries: IndexSet<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
        assert!(same_entries(&["A".to_string(), "B".to_string()], &entries));
        assert!(!same_entries(&["B".to_string(), "A".to_string()], &entries));
        assert!(!same_entries(&["A".to_string()], &entries));
    }

    #[test]
    fn test_description_lists_everything() {
        let daf = MemoryDaf::new("example!");
        daf.set_scalar("version", 1i64, false).unwrap();
        daf.add_axis("cell", ["A", "B"]).unwrap();
        daf.set_vector("cell", "age", vec![1u8, 2], false).unwrap();
        let description = daf.description();
        assert!(description.starts_with("name: example!\n"));
        assert!(description.contains("  version: 1 (Int64)\n"));
        assert!(description.contains("  cell: 2 entries\n"));
        assert!(description.contains("    age: 2 x UInt8 (dense)\n"));
    }
}
