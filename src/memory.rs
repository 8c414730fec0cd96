//! In-memory store.
//!
//! All tables live behind one `parking_lot::RwLock`: reads take the shared
//! lock, writes the exclusive one. Stored vectors and matrices are `Arc`s, so
//! reads hand out the stored data without copying it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::data::{Matrix, Scalar, Vector};
use crate::error::Result;
use crate::format::{AxisEntries, DafReadHandle, FormatReader, FormatWriter};

type MatrixKey = (String, String);

#[derive(Default)]
struct Tables {
    scalars: BTreeMap<String, Scalar>,
    axes: BTreeMap<String, AxisEntries>,
    vectors: BTreeMap<String, BTreeMap<String, Arc<Vector>>>,
    matrices: BTreeMap<MatrixKey, BTreeMap<String, Arc<Matrix>>>,
}

/// A store holding everything in memory.
pub struct MemoryDaf {
    name: String,
    tables: RwLock<Tables>,
}

impl MemoryDaf {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(Tables::default()),
        }
    }

    /// A new empty store, already shared.
    pub fn shared(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }
}

impl std::fmt::Debug for MemoryDaf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("MemoryDaf")
            .field("name", &self.name)
            .field("scalars", &tables.scalars.len())
            .field("axes", &tables.axes.len())
            .finish()
    }
}

fn matrix_key(rows_axis: &str, columns_axis: &str) -> MatrixKey {
    (rows_axis.to_string(), columns_axis.to_string())
}

impl FormatReader for MemoryDaf {
    fn name(&self) -> &str {
        &self.name
    }

    fn format_has_scalar(&self, name: &str) -> bool {
        self.tables.read().scalars.contains_key(name)
    }

    fn format_get_scalar(&self, name: &str) -> Option<Scalar> {
        self.tables.read().scalars.get(name).cloned()
    }

    fn format_scalar_names(&self) -> BTreeSet<String> {
        self.tables.read().scalars.keys().cloned().collect()
    }

    fn format_has_axis(&self, axis: &str) -> bool {
        self.tables.read().axes.contains_key(axis)
    }

    fn format_get_axis(&self, axis: &str) -> Option<AxisEntries> {
        self.tables.read().axes.get(axis).cloned()
    }

    fn format_axis_names(&self) -> BTreeSet<String> {
        self.tables.read().axes.keys().cloned().collect()
    }

    fn format_axis_length(&self, axis: &str) -> Option<usize> {
        self.tables.read().axes.get(axis).map(|entries| entries.len())
    }

    fn format_has_vector(&self, axis: &str, name: &str) -> bool {
        self.tables
            .read()
            .vectors
            .get(axis)
            .is_some_and(|vectors| vectors.contains_key(name))
    }

    fn format_get_vector(&self, axis: &str, name: &str) -> Option<Arc<Vector>> {
        self.tables.read().vectors.get(axis)?.get(name).cloned()
    }

    fn format_vector_names(&self, axis: &str) -> BTreeSet<String> {
        self.tables
            .read()
            .vectors
            .get(axis)
            .map(|vectors| vectors.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn format_has_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> bool {
        self.tables
            .read()
            .matrices
            .get(&matrix_key(rows_axis, columns_axis))
            .is_some_and(|matrices| matrices.contains_key(name))
    }

    fn format_get_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Option<Arc<Matrix>> {
        self.tables
            .read()
            .matrices
            .get(&matrix_key(rows_axis, columns_axis))?
            .get(name)
            .cloned()
    }

    fn format_matrix_names(&self, rows_axis: &str, columns_axis: &str) -> BTreeSet<String> {
        self.tables
            .read()
            .matrices
            .get(&matrix_key(rows_axis, columns_axis))
            .map(|matrices| matrices.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl FormatWriter for MemoryDaf {
    fn as_reader(&self) -> &dyn FormatReader {
        self
    }

    fn into_reader(self: Arc<Self>) -> DafReadHandle {
        self
    }

    fn format_set_scalar(&self, name: &str, value: Scalar) -> Result<()> {
        self.tables.write().scalars.insert(name.to_string(), value);
        Ok(())
    }

    fn format_delete_scalar(&self, name: &str) -> Result<()> {
        self.tables.write().scalars.remove(name);
        Ok(())
    }

    fn format_add_axis(&self, axis: &str, entries: AxisEntries) -> Result<()> {
        self.tables.write().axes.insert(axis.to_string(), entries);
        Ok(())
    }

    fn format_delete_axis(&self, axis: &str) -> Result<()> {
        let mut tables = self.tables.write();
        tables.axes.remove(axis);
        tables.vectors.remove(axis);
        tables
            .matrices
            .retain(|(rows_axis, columns_axis), _| rows_axis != axis && columns_axis != axis);
        Ok(())
    }

    fn format_set_vector(&self, axis: &str, name: &str, vector: Arc<Vector>) -> Result<()> {
        self.tables
            .write()
            .vectors
            .entry(axis.to_string())
            .or_default()
            .insert(name.to_string(), vector);
        Ok(())
    }

    fn format_delete_vector(&self, axis: &str, name: &str) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(vectors) = tables.vectors.get_mut(axis) {
            vectors.remove(name);
            if vectors.is_empty() {
                tables.vectors.remove(axis);
            }
        }
        Ok(())
    }

    fn format_set_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str, matrix: Arc<Matrix>) -> Result<()> {
        self.tables
            .write()
            .matrices
            .entry(matrix_key(rows_axis, columns_axis))
            .or_default()
            .insert(name.to_string(), matrix);
        Ok(())
    }

    fn format_delete_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Result<()> {
        let key = matrix_key(rows_axis, columns_axis);
        let mut tables = self.tables.write();
        if let Some(matrices) = tables.matrices.get_mut(&key) {
            matrices.remove(name);
            if matrices.is_empty() {
                tables.matrices.remove(&key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daf::{DafReader, DafWriter};

    #[test]
    fn test_delete_axis_drops_its_properties() {
        let daf = MemoryDaf::new("memory!");
        daf.add_axis("cell", ["A", "B"]).unwrap();
        daf.add_axis("gene", ["X"]).unwrap();
        daf.set_vector("cell", "age", vec![1i32, 2], false).unwrap();
        daf.set_vector("gene", "noisy", vec![true], false).unwrap();
        daf.set_matrix(
            "cell",
            "gene",
            "UMIs",
            Matrix::dense_columns(2, 1, vec![1u8, 2]).unwrap(),
            false,
        )
        .unwrap();

        daf.delete_axis("cell", true).unwrap();
        assert!(!daf.has_axis("cell"));
        assert!(daf.format_vector_names("cell").is_empty());
        assert!(daf.matrix_names("gene", "gene").unwrap().is_empty());
        assert!(daf.format_matrix_names("cell", "gene").is_empty());
        assert!(daf.has_vector("gene", "noisy").unwrap());
    }

    #[test]
    fn test_reads_share_storage() {
        let daf = MemoryDaf::new("memory!");
        daf.add_axis("cell", ["A"]).unwrap();
        daf.set_vector("cell", "age", vec![7i64], false).unwrap();
        let first = daf.get_vector("cell", "age").unwrap();
        let second = daf.get_vector("cell", "age").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
