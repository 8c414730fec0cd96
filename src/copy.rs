//! Copying properties between stores.

use tracing::debug;

use crate::chain::same_order;
use crate::daf::{DafReader, DafWriter};
use crate::data::MajorAxis;
use crate::error::{DafError, Result};
use crate::format::{FormatReader, FormatWriter};

/// The axis must exist in the destination with the same entries as in the source.
fn require_same_axis<W, R>(destination: &W, source: &R, axis: &str) -> Result<()>
where
    W: FormatWriter + ?Sized,
    R: FormatReader + ?Sized,
{
    let from = source.get_axis(axis)?;
    let into = destination.get_axis(axis)?;
    if same_order(&from, &into) {
        Ok(())
    } else {
        Err(DafError::InconsistentAxisEntries {
            axis: axis.to_string(),
            first: source.name().to_string(),
            second: destination.name().to_string(),
            daf: destination.name().to_string(),
        })
    }
}

pub fn copy_scalar<W, R>(destination: &W, source: &R, name: &str, rename: Option<&str>, overwrite: bool) -> Result<()>
where
    W: FormatWriter + ?Sized,
    R: FormatReader + ?Sized,
{
    let value = source.get_scalar(name)?;
    destination.set_scalar(rename.unwrap_or(name), value, overwrite)
}

pub fn copy_axis<W, R>(destination: &W, source: &R, axis: &str, rename: Option<&str>) -> Result<()>
where
    W: FormatWriter + ?Sized,
    R: FormatReader + ?Sized,
{
    let entries = source.get_axis(axis)?;
    destination.add_axis(rename.unwrap_or(axis), entries.iter().cloned())
}

/// Copy a vector, possibly under another name. The axis must already exist
/// in the destination with the same entries.
pub fn copy_vector<W, R>(
    destination: &W,
    source: &R,
    axis: &str,
    name: &str,
    rename: Option<&str>,
    overwrite: bool,
) -> Result<()>
where
    W: FormatWriter + ?Sized,
    R: FormatReader + ?Sized,
{
    require_same_axis(destination, source, axis)?;
    let vector = source.get_vector(axis, name)?;
    destination.set_vector(axis, rename.unwrap_or(name), vector.as_ref().clone(), overwrite)
}

/// Copy a matrix, possibly under another name. A matrix only available in
/// the flipped layout is relayout on the way (an inefficient action).
pub fn copy_matrix<W, R>(
    destination: &W,
    source: &R,
    rows_axis: &str,
    columns_axis: &str,
    name: &str,
    rename: Option<&str>,
    overwrite: bool,
) -> Result<()>
where
    W: FormatWriter + ?Sized,
    R: FormatReader + ?Sized,
{
    require_same_axis(destination, source, rows_axis)?;
    require_same_axis(destination, source, columns_axis)?;
    let matrix = source
        .get_matrix(rows_axis, columns_axis, name)?
        .as_ref()
        .clone()
        .into_storage_or_copy(MajorAxis::Columns, &format!("copy of the matrix: {name}"))?;
    destination.set_matrix(rows_axis, columns_axis, rename.unwrap_or(name), matrix, overwrite)
}

/// Copy everything from the source into the destination. Axes that already
/// exist must have the same entries. Fails before copying anything if some
/// property exists in both and `overwrite` is not set.
pub fn copy_all<W, R>(destination: &W, source: &R, overwrite: bool) -> Result<()>
where
    W: FormatWriter + ?Sized,
    R: FormatReader + ?Sized,
{
    let axes = source.format_axis_names();
    let mut new_axes = Vec::new();
    for axis in &axes {
        if destination.format_has_axis(axis) {
            require_same_axis(destination, source, axis)?;
        } else {
            new_axes.push(axis.as_str());
        }
    }

    if !overwrite {
        for name in source.format_scalar_names() {
            if destination.format_has_scalar(&name) {
                return Err(DafError::ExistingScalar {
                    name,
                    daf: destination.name().to_string(),
                });
            }
        }
        for axis in &axes {
            for name in source.format_vector_names(axis) {
                if destination.format_has_vector(axis, &name) {
                    return Err(DafError::ExistingVector {
                        axis: axis.clone(),
                        name,
                        daf: destination.name().to_string(),
                    });
                }
            }
            for columns_axis in &axes {
                for name in source.format_matrix_names(axis, columns_axis) {
                    if destination.format_has_matrix(axis, columns_axis, &name) {
                        return Err(DafError::ExistingMatrix {
                            rows_axis: axis.clone(),
                            columns_axis: columns_axis.clone(),
                            name,
                            daf: destination.name().to_string(),
                        });
                    }
                }
            }
        }
    }

    for axis in new_axes {
        copy_axis(destination, source, axis, None)?;
    }
    for name in source.format_scalar_names() {
        copy_scalar(destination, source, &name, None, overwrite)?;
    }
    for axis in &axes {
        for name in source.format_vector_names(axis) {
            copy_vector(destination, source, axis, &name, None, overwrite)?;
        }
        for columns_axis in &axes {
            for name in source.format_matrix_names(axis, columns_axis) {
                if let Some(matrix) = source.format_get_matrix(axis, columns_axis, &name) {
                    destination.set_matrix(axis, columns_axis, &name, matrix.as_ref().clone(), overwrite)?;
                }
            }
        }
    }
    debug!(source = source.name(), destination = destination.name(), "copied everything");
    Ok(())
}
