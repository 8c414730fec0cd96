//! Unit tests for copying properties between stores

use daf::{
    copy_all, copy_axis, copy_matrix, copy_scalar, copy_vector, DafError, DafReader, DafWriter, FormatReader, Matrix,
    MemoryDaf, Scalar, Values,
};

fn source() -> MemoryDaf {
    let daf = MemoryDaf::new("source!");
    daf.set_scalar("version", 3u8, false).unwrap();
    daf.add_axis("cell", ["A", "B"]).unwrap();
    daf.add_axis("gene", ["X", "Y", "Z"]).unwrap();
    daf.set_vector("cell", "age", vec![1i32, 2], false).unwrap();
    let umis = Matrix::dense_columns(2, 3, vec![1u16, 2, 3, 4, 5, 6]).unwrap();
    daf.set_matrix("cell", "gene", "UMIs", umis, false).unwrap();
    daf
}

#[test]
fn test_copy_scalar_with_rename() {
    let destination = MemoryDaf::new("destination!");
    copy_scalar(&destination, &source(), "version", Some("source_version"), false).unwrap();
    assert_eq!(destination.get_scalar("source_version").unwrap(), Scalar::U8(3));
    assert!(!destination.has_scalar("version"));

    let error = copy_scalar(&destination, &source(), "version", Some("source_version"), false).unwrap_err();
    assert!(matches!(error, DafError::ExistingScalar { .. }));
}

#[test]
fn test_copy_vector_needs_same_axis() {
    let destination = MemoryDaf::new("destination!");
    let error = copy_vector(&destination, &source(), "cell", "age", None, false).unwrap_err();
    assert!(matches!(error, DafError::MissingAxis { .. }));

    destination.add_axis("cell", ["B", "A"]).unwrap();
    let error = copy_vector(&destination, &source(), "cell", "age", None, false).unwrap_err();
    assert!(matches!(error, DafError::InconsistentAxisEntries { .. }));

    let destination = MemoryDaf::new("destination!");
    copy_axis(&destination, &source(), "cell", None).unwrap();
    copy_vector(&destination, &source(), "cell", "age", Some("years"), false).unwrap();
    assert_eq!(destination.get_vector("cell", "years").unwrap().to_dense(), Values::from(vec![1i32, 2]));
}

#[test]
fn test_copy_flipped_matrix() {
    let destination = MemoryDaf::new("destination!");
    copy_axis(&destination, &source(), "cell", None).unwrap();
    copy_axis(&destination, &source(), "gene", None).unwrap();
    copy_matrix(&destination, &source(), "gene", "cell", "UMIs", None, false).unwrap();
    assert!(destination.format_has_matrix("gene", "cell", "UMIs"));
    assert!(!destination.format_has_matrix("cell", "gene", "UMIs"));
    assert_eq!(destination.get_matrix("gene", "cell", "UMIs").unwrap().get(2, 1), Scalar::U16(6));
}

#[test]
fn test_copy_all() {
    let destination = MemoryDaf::new("destination!");
    copy_all(&destination, &source(), false).unwrap();
    assert_eq!(destination.get_scalar("version").unwrap(), Scalar::U8(3));
    assert_eq!(destination.axis_entries("gene").unwrap(), vec!["X", "Y", "Z"]);
    assert_eq!(destination.get_matrix("cell", "gene", "UMIs").unwrap().get(1, 2), Scalar::U16(6));
}

#[test]
fn test_copy_all_checks_before_copying() {
    let destination = MemoryDaf::new("destination!");
    destination.add_axis("cell", ["A", "B"]).unwrap();
    destination.set_vector("cell", "age", vec![7i32, 8], false).unwrap();

    let error = copy_all(&destination, &source(), false).unwrap_err();
    assert!(matches!(error, DafError::ExistingVector { .. }));
    assert!(!destination.has_scalar("version"));
    assert!(!destination.has_axis("gene"));

    copy_all(&destination, &source(), true).unwrap();
    assert_eq!(destination.get_vector("cell", "age").unwrap().to_dense(), Values::from(vec![1i32, 2]));
}
