//! Chains: several stores seen as one.
//!
//! Reads resolve from the last member that has the property, so later members
//! shadow earlier ones. Names are the union over all members. A writer chain
//! routes every write to its single writer member, which is last:
//!
//! ```text
//!   get ──► writer ──► reader[n-1] ──► ... ──► reader[0]   (first hit wins)
//!   set ──► writer
//!   delete ──► writer, unless some reader also has it (ShadowedDeletion)
//! ```
//!
//! A chain of a single store *is* that store: [`chain_reader`] and
//! [`chain_writer`] hand back the same `Arc` instead of wrapping it.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::data::{Matrix, Scalar, Vector};
use crate::error::{DafError, Property, Result};
use crate::format::{AxisEntries, DafReadHandle, DafWriteHandle, FormatReader, FormatWriter};

/// Chain read-only stores. Fails on an empty list or on members that
/// disagree about the entries of an axis.
pub fn chain_reader(name: impl Into<String>, members: Vec<DafReadHandle>) -> Result<DafReadHandle> {
    let name = name.into();
    if members.is_empty() {
        return Err(DafError::EmptyChain { name });
    }
    let members = match <[DafReadHandle; 1]>::try_from(members) {
        Ok([only]) => return Ok(only),
        Err(members) => members,
    };
    check_consistent_axes(&name, &members)?;
    debug!(chain = %name, members = members.len(), "chain readers");
    Ok(Arc::new(ReaderChain {
        name,
        members: Members(members),
    }))
}

/// Chain stores, writing into the last one. With no readers this is just the
/// writer itself.
pub fn chain_writer(
    name: impl Into<String>,
    readers: Vec<DafReadHandle>,
    writer: DafWriteHandle,
) -> Result<DafWriteHandle> {
    if readers.is_empty() {
        return Ok(writer);
    }
    let name = name.into();
    let readers_count = readers.len();
    let mut members = readers;
    members.push(writer.clone().into_reader());
    check_consistent_axes(&name, &members)?;
    debug!(chain = %name, readers = readers_count, writer = writer.name(), "chain writer");
    Ok(Arc::new(WriterChain {
        name,
        members: Members(members),
        writer,
    }))
}

fn check_consistent_axes(name: &str, members: &[DafReadHandle]) -> Result<()> {
    for (position, later) in members.iter().enumerate() {
        for axis in later.format_axis_names() {
            let Some(later_entries) = later.format_get_axis(&axis) else {
                continue;
            };
            let earlier = members[..position].iter().find_map(|earlier| {
                earlier
                    .format_get_axis(&axis)
                    .map(|entries| (earlier.name(), entries))
            });
            if let Some((earlier_name, earlier_entries)) = earlier {
                if !same_order(&earlier_entries, &later_entries) {
                    return Err(DafError::InconsistentAxisEntries {
                        axis,
                        first: earlier_name.to_string(),
                        second: later.name().to_string(),
                        daf: name.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn same_order(first: &AxisEntries, second: &AxisEntries) -> bool {
    Arc::ptr_eq(first, second) || first.iter().eq(second.iter())
}

// ============================================================================
// READ RESOLUTION
// ============================================================================

/// Chain members, first to last.
struct Members(Vec<DafReadHandle>);

impl Members {
    fn any(&self, has: impl Fn(&dyn FormatReader) -> bool) -> bool {
        self.0.iter().any(|member| has(member.as_ref()))
    }

    fn last<T>(&self, get: impl Fn(&dyn FormatReader) -> Option<T>) -> Option<T> {
        self.0.iter().rev().find_map(|member| get(member.as_ref()))
    }

    fn union(&self, names: impl Fn(&dyn FormatReader) -> BTreeSet<String>) -> BTreeSet<String> {
        self.0.iter().flat_map(|member| names(member.as_ref())).collect()
    }
}

macro_rules! forward_reads {
    () => {
        fn format_has_scalar(&self, name: &str) -> bool {
            self.members.any(|member| member.format_has_scalar(name))
        }

        fn format_get_scalar(&self, name: &str) -> Option<Scalar> {
            self.members.last(|member| member.format_get_scalar(name))
        }

        fn format_scalar_names(&self) -> BTreeSet<String> {
            self.members.union(|member| member.format_scalar_names())
        }

        fn format_has_axis(&self, axis: &str) -> bool {
            self.members.any(|member| member.format_has_axis(axis))
        }

        fn format_get_axis(&self, axis: &str) -> Option<AxisEntries> {
            self.members.last(|member| member.format_get_axis(axis))
        }

        fn format_axis_names(&self) -> BTreeSet<String> {
            self.members.union(|member| member.format_axis_names())
        }

        fn format_has_vector(&self, axis: &str, name: &str) -> bool {
            self.members.any(|member| member.format_has_vector(axis, name))
        }

        fn format_get_vector(&self, axis: &str, name: &str) -> Option<Arc<Vector>> {
            self.members.last(|member| member.format_get_vector(axis, name))
        }

        fn format_vector_names(&self, axis: &str) -> BTreeSet<String> {
            self.members.union(|member| member.format_vector_names(axis))
        }

        fn format_has_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> bool {
            self.members
                .any(|member| member.format_has_matrix(rows_axis, columns_axis, name))
        }

        fn format_get_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Option<Arc<Matrix>> {
            self.members
                .last(|member| member.format_get_matrix(rows_axis, columns_axis, name))
        }

        fn format_matrix_names(&self, rows_axis: &str, columns_axis: &str) -> BTreeSet<String> {
            self.members
                .union(|member| member.format_matrix_names(rows_axis, columns_axis))
        }
    };
}

// ============================================================================
// READER CHAIN
// ============================================================================

/// A read-only chain of stores.
pub struct ReaderChain {
    name: String,
    members: Members,
}

impl ReaderChain {
    pub fn members(&self) -> &[DafReadHandle] {
        &self.members.0
    }
}

impl FormatReader for ReaderChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        true
    }

    forward_reads!();
}

// ============================================================================
// WRITER CHAIN
// ============================================================================

/// A chain whose last member receives all writes.
pub struct WriterChain {
    name: String,
    /// The readers followed by the writer (as a reader).
    members: Members,
    writer: DafWriteHandle,
}

impl WriterChain {
    pub fn writer(&self) -> &DafWriteHandle {
        &self.writer
    }

    fn readers(&self) -> &[DafReadHandle] {
        let members = &self.members.0;
        &members[..members.len() - 1]
    }

    /// The last reader shadowing a property that is about to be deleted.
    fn shadowing(&self, has: impl Fn(&dyn FormatReader) -> bool) -> Option<&DafReadHandle> {
        self.readers().iter().rev().find(|reader| has(reader.as_ref()))
    }

    fn refuse_deletion(&self, property: Property, reader: &DafReadHandle) -> DafError {
        DafError::ShadowedDeletion {
            property,
            writer: self.writer.name().to_string(),
            reader: reader.name().to_string(),
        }
    }

    /// Make sure the writer has an axis that so far only exists in readers.
    fn ensure_axis(&self, axis: &str) -> Result<()> {
        if self.writer.format_has_axis(axis) {
            return Ok(());
        }
        if let Some(entries) = self.members.last(|member| member.format_get_axis(axis)) {
            debug!(chain = %self.name, writer = self.writer.name(), axis, "copy axis into writer");
            self.writer.format_add_axis(axis, entries)?;
        }
        Ok(())
    }
}

impl FormatReader for WriterChain {
    fn name(&self) -> &str {
        &self.name
    }

    forward_reads!();
}

impl FormatWriter for WriterChain {
    fn as_reader(&self) -> &dyn FormatReader {
        self
    }

    fn into_reader(self: Arc<Self>) -> DafReadHandle {
        self
    }

    fn format_set_scalar(&self, name: &str, value: Scalar) -> Result<()> {
        self.writer.format_set_scalar(name, value)
    }

    fn format_delete_scalar(&self, name: &str) -> Result<()> {
        if let Some(reader) = self.shadowing(|reader| reader.format_has_scalar(name)) {
            return Err(self.refuse_deletion(
                Property::Scalar {
                    name: name.to_string(),
                },
                reader,
            ));
        }
        self.writer.format_delete_scalar(name)
    }

    fn format_add_axis(&self, axis: &str, entries: AxisEntries) -> Result<()> {
        self.writer.format_add_axis(axis, entries)
    }

    fn format_delete_axis(&self, axis: &str) -> Result<()> {
        if let Some(reader) = self.shadowing(|reader| reader.format_has_axis(axis)) {
            return Err(self.refuse_deletion(
                Property::Axis {
                    axis: axis.to_string(),
                },
                reader,
            ));
        }
        self.writer.format_delete_axis(axis)
    }

    fn format_set_vector(&self, axis: &str, name: &str, vector: Arc<Vector>) -> Result<()> {
        self.ensure_axis(axis)?;
        self.writer.format_set_vector(axis, name, vector)
    }

    fn format_delete_vector(&self, axis: &str, name: &str) -> Result<()> {
        if let Some(reader) = self.shadowing(|reader| reader.format_has_vector(axis, name)) {
            return Err(self.refuse_deletion(
                Property::Vector {
                    axis: axis.to_string(),
                    name: name.to_string(),
                },
                reader,
            ));
        }
        self.writer.format_delete_vector(axis, name)
    }

    fn format_set_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str, matrix: Arc<Matrix>) -> Result<()> {
        self.ensure_axis(rows_axis)?;
        self.ensure_axis(columns_axis)?;
        self.writer.format_set_matrix(rows_axis, columns_axis, name, matrix)
    }

    fn format_delete_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Result<()> {
        self.format_check_delete_matrix(rows_axis, columns_axis, name)?;
        self.writer.format_delete_matrix(rows_axis, columns_axis, name)
    }

    fn format_check_delete_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Result<()> {
        if let Some(reader) =
            self.shadowing(|reader| reader.format_has_matrix(rows_axis, columns_axis, name))
        {
            return Err(self.refuse_deletion(
                Property::Matrix {
                    rows_axis: rows_axis.to_string(),
                    columns_axis: columns_axis.to_string(),
                    name: name.to_string(),
                },
                reader,
            ));
        }
        self.writer.format_check_delete_matrix(rows_axis, columns_axis, name)
    }
}
