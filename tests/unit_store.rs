//! Unit tests for the in-memory store and the checked store API

use std::sync::Arc;

use daf::{
    DType, DafError, DafReadHandle, DafReader, DafWriter, ErrorCategory, MajorAxis, Matrix, MemoryDaf, Scalar, Values,
    Vector,
};

fn cells() -> MemoryDaf {
    let daf = MemoryDaf::new("memory!");
    daf.add_axis("cell", ["A", "B"]).unwrap();
    daf.set_vector("cell", "age", vec![1i32, 2], false).unwrap();
    daf
}

#[test]
fn test_scalars() {
    let daf = MemoryDaf::new("memory!");
    assert!(!daf.has_scalar("version"));
    daf.set_scalar("version", 1.5f64, false).unwrap();
    assert_eq!(daf.get_scalar("version").unwrap(), Scalar::F64(1.5));
    assert_eq!(daf.get_scalar_as::<f64>("version").unwrap(), 1.5);

    let error = daf.set_scalar("version", 2.0f64, false).unwrap_err();
    assert_eq!(error.to_string(), "existing scalar: version\nin the daf data: memory!");
    daf.set_scalar("version", 2.0f64, true).unwrap();
    assert_eq!(daf.get_scalar("version").unwrap(), Scalar::F64(2.0));

    daf.delete_scalar("version", true).unwrap();
    let error = daf.get_scalar("version").unwrap_err();
    assert_eq!(error.to_string(), "missing scalar: version\nin the daf data: memory!");
    daf.delete_scalar("version", false).unwrap();
    assert_eq!(daf.get_scalar_or("version", "none"), Scalar::from("none"));
}

#[test]
fn test_axes() {
    let daf = cells();
    assert_eq!(daf.axis_entries("cell").unwrap(), vec!["A", "B"]);
    assert_eq!(daf.axis_length("cell").unwrap(), 2);
    assert_eq!(daf.axis_index("cell", "B").unwrap(), 1);
    assert_eq!(daf.axis_indices("cell", &["B", "A"]).unwrap(), vec![1, 0]);

    let error = daf.axis_index("cell", "C").unwrap_err();
    assert_eq!(error.to_string(), "missing entry: C\nof the axis: cell\nin the daf data: memory!");

    let error = daf.add_axis("gene", ["X", "Y", "X"]).unwrap_err();
    assert!(matches!(error, DafError::NonUniqueEntries { ref entry, .. } if entry == "X"));
    assert!(!daf.has_axis("gene"));

    let error = daf.add_axis("cell", ["C"]).unwrap_err();
    assert_eq!(error.category(), ErrorCategory::Structural);
}

#[test]
fn test_existing_vector_wins_over_default() {
    let daf = cells();
    let vector = daf.get_vector_or("cell", "age", vec![9i32, 9, 9]).unwrap();
    assert_eq!(vector.to_dense(), Values::from(vec![1i32, 2]));
    let vector = daf.get_vector_or("cell", "age", vec![9i32, 9]).unwrap();
    assert_eq!(vector.to_dense(), Values::from(vec![1i32, 2]));
}

#[test]
fn test_default_vector_is_checked_when_used() {
    let daf = cells();
    let vector = daf.get_vector_or("cell", "score", vec![0.5f32, 0.25]).unwrap();
    assert_eq!(vector.dtype(), DType::F32);
    let error = daf.get_vector_or("cell", "score", vec![0.5f32]).unwrap_err();
    assert_eq!(error.category(), ErrorCategory::Shape);
}

#[test]
fn test_vector_length_mismatch_leaves_state_unchanged() {
    let daf = cells();
    let error = daf.set_vector("cell", "score", vec![1u8, 2, 3], false).unwrap_err();
    assert_eq!(
        error.to_string(),
        "the vector: score\nof length: 3\nis different from the length: 2\nof the axis: cell\nin the daf data: memory!"
    );
    assert_eq!(daf.vector_names("cell").unwrap().len(), 1);
}

#[test]
fn test_name_vector_is_reserved() {
    let daf = cells();
    assert!(daf.has_vector("cell", "name").unwrap());
    assert_eq!(daf.get_vector("cell", "name").unwrap().as_strings().unwrap(), ["A", "B"]);
    let error = daf.set_vector("cell", "name", vec!["x", "y"], false).unwrap_err();
    assert!(matches!(error, DafError::ReservedProperty { .. }));
    assert!(daf.delete_vector("cell", "name", true).is_err());
}

#[test]
fn test_labeled_vector_must_match_entries() {
    let daf = cells();
    let labeled = Vector::labeled(vec!["B".into(), "A".into()], vec![3i32, 4]);
    let error = daf.set_vector("cell", "score", labeled, false).unwrap_err();
    assert_eq!(error.category(), ErrorCategory::Name);

    let labeled = Vector::labeled(vec!["A".into(), "B".into()], vec![3i32, 4]);
    daf.set_vector("cell", "score", labeled, false).unwrap();
    assert!(daf.get_vector("cell", "score").unwrap().labels().is_none());
}

#[test]
fn test_matrices_and_relayout() {
    let daf = cells();
    daf.add_axis("gene", ["X", "Y", "Z"]).unwrap();
    let umis = Matrix::dense_columns(2, 3, vec![1u16, 2, 3, 4, 5, 6]).unwrap();
    daf.set_matrix("cell", "gene", "UMIs", umis, false).unwrap();

    let matrix = daf.get_matrix("cell", "gene", "UMIs").unwrap();
    assert_eq!(matrix.major(), MajorAxis::Columns);
    assert_eq!(matrix.get(1, 2), Scalar::U16(6));

    let flipped = daf.get_matrix("gene", "cell", "UMIs").unwrap();
    assert_eq!(flipped.major(), MajorAxis::Rows);
    assert_eq!(flipped.get(2, 1), Scalar::U16(6));

    daf.relayout_matrix("cell", "gene", "UMIs", false).unwrap();
    let relayout = daf.get_matrix("gene", "cell", "UMIs").unwrap();
    assert_eq!(relayout.major(), MajorAxis::Columns);
    assert_eq!(relayout.get(2, 1), Scalar::U16(6));

    daf.delete_matrix("gene", "cell", "UMIs", true).unwrap();
    assert!(!daf.has_matrix("cell", "gene", "UMIs").unwrap());
}

#[test]
fn test_overwrite_updates_relayout_copy() {
    let daf = cells();
    daf.add_axis("gene", ["X", "Y", "Z"]).unwrap();
    let umis = Matrix::dense_columns(2, 3, vec![1u16, 2, 3, 4, 5, 6]).unwrap();
    daf.set_matrix("cell", "gene", "UMIs", umis, false).unwrap();
    daf.relayout_matrix("cell", "gene", "UMIs", false).unwrap();

    let umis = Matrix::dense_columns(2, 3, vec![10u16, 20, 30, 40, 50, 60]).unwrap();
    daf.set_matrix("cell", "gene", "UMIs", umis, true).unwrap();

    let matrix = daf.get_matrix("cell", "gene", "UMIs").unwrap();
    assert_eq!(matrix.get(1, 1), Scalar::U16(40));
    let relayout = daf.get_matrix("gene", "cell", "UMIs").unwrap();
    assert_eq!(relayout.major(), MajorAxis::Columns);
    assert_eq!(relayout.get(1, 1), Scalar::U16(40));
    assert_eq!(relayout.get(2, 0), Scalar::U16(50));
}

#[test]
fn test_flipped_layout_counts_as_existing() {
    let daf = cells();
    daf.add_axis("gene", ["X", "Y", "Z"]).unwrap();
    let umis = Matrix::dense_columns(3, 2, vec![1u16, 2, 3, 4, 5, 6]).unwrap();
    daf.set_matrix("gene", "cell", "UMIs", umis, false).unwrap();

    let umis = Matrix::dense_columns(2, 3, vec![9u16; 6]).unwrap();
    let error = daf.set_matrix("cell", "gene", "UMIs", umis, false).unwrap_err();
    assert!(matches!(error, DafError::ExistingMatrix { .. }));
    assert_eq!(daf.get_matrix("cell", "gene", "UMIs").unwrap().get(0, 0), Scalar::U16(1));
}

#[test]
fn test_row_major_matrix_is_rejected() {
    let daf = cells();
    daf.add_axis("gene", ["X"]).unwrap();
    let rows = Matrix::dense_columns(1, 2, vec![1i8, 2]).unwrap().transposed();
    let error = daf.set_matrix("cell", "gene", "UMIs", rows, false).unwrap_err();
    assert_eq!(error.category(), ErrorCategory::Layout);
}

#[test]
fn test_matrix_dimension_mismatch() {
    let daf = cells();
    daf.add_axis("gene", ["X"]).unwrap();
    let wrong = Matrix::dense_columns(1, 1, vec![1i8]).unwrap();
    let error = daf.set_matrix("cell", "gene", "UMIs", wrong, false).unwrap_err();
    assert!(matches!(error, DafError::MatrixDimensionMismatch { rows: 1, expected_rows: 2, .. }));
}

#[test]
fn test_shared_handles() {
    let store = Arc::new(cells());
    let reader: DafReadHandle = store.clone();
    assert_eq!(reader.axis_length("cell").unwrap(), 2);
    assert!(reader.description().contains("cell: 2 entries"));
}
