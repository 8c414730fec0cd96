//! Unit tests for concatenating stores

use std::sync::Arc;

use daf::{
    concatenate, ConcatOptions, DafError, DafReadHandle, DafReader, DafWriter, EmptyKey, ErrorCategory, FormatReader,
    Matrix, MergeAction, MergeKey, MemoryDaf, Scalar, SparseVector, Values,
};

fn source(name: &str, cells: &[&str], ages: Vec<i32>) -> Arc<MemoryDaf> {
    let daf = MemoryDaf::shared(name);
    daf.add_axis("cell", cells.iter().copied()).unwrap();
    daf.add_axis("gene", ["X", "Y"]).unwrap();
    daf.set_vector("cell", "age", ages, false).unwrap();
    daf
}

fn pair() -> Vec<DafReadHandle> {
    vec![source("first", &["A", "B"], vec![1, 2]) as DafReadHandle, source("second", &["C"], vec![3])]
}

fn sources(members: &[&Arc<MemoryDaf>]) -> Vec<DafReadHandle> {
    members.iter().map(|member| Arc::clone(member) as DafReadHandle).collect()
}

// ============================================================================
// Axes and vectors
// ============================================================================

#[test]
fn test_concatenated_axis() {
    let destination = MemoryDaf::new("all");
    concatenate(&destination, &["cell"], &pair(), &ConcatOptions::new()).unwrap();

    assert_eq!(destination.axis_entries("cell").unwrap(), vec!["A", "B", "C"]);
    assert_eq!(destination.axis_entries("gene").unwrap(), vec!["X", "Y"]);
    assert_eq!(destination.axis_entries("dataset").unwrap(), vec!["first", "second"]);
    assert_eq!(destination.get_vector("cell", "age").unwrap().to_dense(), Values::from(vec![1i32, 2, 3]));
    assert_eq!(
        destination.get_vector("cell", "dataset").unwrap().as_strings().unwrap(),
        ["first", "first", "second"]
    );
}

#[test]
fn test_vector_length_is_total_of_sources() {
    let destination = MemoryDaf::new("all");
    let members = pair();
    concatenate(&destination, &["cell"], &members, &ConcatOptions::new()).unwrap();
    let total: usize = members.iter().map(|member| member.axis_length("cell").unwrap()).sum();
    for name in destination.vector_names("cell").unwrap() {
        assert_eq!(destination.get_vector("cell", &name).unwrap().len(), total, "{name}");
    }
}

#[test]
fn test_without_dataset_axis_or_property() {
    let destination = MemoryDaf::new("all");
    let options = ConcatOptions::new().no_dataset_axis();
    concatenate(&destination, &["cell"], &pair(), &options).unwrap();
    assert!(!destination.has_axis("dataset"));
    assert!(!destination.has_vector("cell", "dataset").unwrap());

    let destination = MemoryDaf::new("all");
    let options = ConcatOptions::new().dataset_property(false);
    concatenate(&destination, &["cell"], &pair(), &options).unwrap();
    assert!(destination.has_axis("dataset"));
    assert!(!destination.has_vector("cell", "dataset").unwrap());
}

#[test]
fn test_missing_vector_needs_empty_value() {
    let first = source("first", &["A", "B"], vec![1, 2]);
    first.set_vector("cell", "score", vec![0.5f64, 0.25], false).unwrap();
    let second = source("second", &["C"], vec![3]);
    let members = sources(&[&first, &second]);

    let destination = MemoryDaf::new("all");
    let error = concatenate(&destination, &["cell"], &members, &ConcatOptions::new()).unwrap_err();
    assert_eq!(
        error.to_string(),
        "no empty value for the vector: score\nof the axis: cell\nwhich is missing from the daf data: second"
    );
    assert_eq!(error.category(), ErrorCategory::Concatenation);
    assert!(destination.axis_names().is_empty());

    let options = ConcatOptions::new().empty_value(EmptyKey::vector("cell", "score"), -1.0f64);
    concatenate(&destination, &["cell"], &members, &options).unwrap();
    assert_eq!(
        destination.get_vector("cell", "score").unwrap().to_dense(),
        Values::from(vec![0.5f64, 0.25, -1.0])
    );
}

#[test]
fn test_sparse_parts_with_zero_fill_stay_sparse() {
    let first = source("first", &["A", "B"], vec![1, 2]);
    let sparse = SparseVector::new(2, vec![1], Values::from(vec![7u32])).unwrap();
    first.set_vector("cell", "hits", sparse, false).unwrap();
    let second = source("second", &["C", "D"], vec![3, 4]);
    let members = sources(&[&first, &second]);

    let destination = MemoryDaf::new("all");
    let options = ConcatOptions::new().empty_value(EmptyKey::vector("cell", "hits"), 0u32);
    concatenate(&destination, &["cell"], &members, &options).unwrap();
    let hits = destination.get_vector("cell", "hits").unwrap();
    assert!(hits.is_sparse());
    assert_eq!(hits.to_dense(), Values::from(vec![0u32, 7, 0, 0]));

    let destination = MemoryDaf::new("all");
    let options = ConcatOptions::new().empty_value(EmptyKey::vector("cell", "hits"), 1u32);
    concatenate(&destination, &["cell"], &members, &options).unwrap();
    let hits = destination.get_vector("cell", "hits").unwrap();
    assert!(!hits.is_sparse());
    assert_eq!(hits.to_dense(), Values::from(vec![0u32, 7, 1, 1]));
}

#[test]
fn test_prefixed_entries_and_values() {
    let first = source("first", &["A", "B"], vec![1, 2]);
    first.set_vector("cell", "parent", vec!["B", ""], false).unwrap();
    let second = source("second", &["A"], vec![3]);
    second.set_vector("cell", "parent", vec!["A"], false).unwrap();
    let members = sources(&[&first, &second]);

    let destination = MemoryDaf::new("all");
    let error = concatenate(&destination, &["cell"], &members, &ConcatOptions::new()).unwrap_err();
    assert!(matches!(error, DafError::NonUniqueEntries { ref entry, .. } if entry == "A"));

    let options = ConcatOptions::new()
        .names(["one", "two"])
        .prefix("cell")
        .prefixed("cell", "parent");
    concatenate(&destination, &["cell"], &members, &options).unwrap();
    assert_eq!(destination.axis_entries("cell").unwrap(), vec!["one.A", "one.B", "two.A"]);
    assert_eq!(destination.axis_entries("dataset").unwrap(), vec!["one", "two"]);
    assert_eq!(
        destination.get_vector("cell", "parent").unwrap().as_strings().unwrap(),
        ["one.B", "", "two.A"]
    );
}

#[test]
fn test_other_axes_must_agree() {
    let first = source("first", &["A"], vec![1]);
    let second = MemoryDaf::shared("second");
    second.add_axis("cell", ["B"]).unwrap();
    second.add_axis("gene", ["Y", "X"]).unwrap();
    let members = sources(&[&first, &second]);

    let destination = MemoryDaf::new("all");
    let error = concatenate(&destination, &["cell"], &members, &ConcatOptions::new()).unwrap_err();
    assert_eq!(
        error.to_string(),
        "different entries for the axis: gene\nbetween the daf data: first\nand the daf data: second\nin the daf data: all"
    );
}

#[test]
fn test_dataset_axis_cannot_be_concatenated() {
    let destination = MemoryDaf::new("all");
    let options = ConcatOptions::new().dataset_axis("cell");
    let error = concatenate(&destination, &["cell"], &pair(), &options).unwrap_err();
    assert!(matches!(error, DafError::InvalidConcatenation { .. }));
}

#[test]
fn test_existing_destination_axis() {
    let destination = MemoryDaf::new("all");
    destination.add_axis("cell", ["Z"]).unwrap();
    let error = concatenate(&destination, &["cell"], &pair(), &ConcatOptions::new()).unwrap_err();
    assert!(matches!(error, DafError::ExistingAxis { ref axis, .. } if axis == "cell"));
    assert!(!destination.has_axis("gene"));
    assert!(!destination.has_axis("dataset"));
}

#[test]
fn test_same_entries_of_other_axis_are_reused() {
    let destination = MemoryDaf::new("all");
    destination.add_axis("gene", ["X", "Y"]).unwrap();
    concatenate(&destination, &["cell"], &pair(), &ConcatOptions::new()).unwrap();
    assert_eq!(destination.axis_length("cell").unwrap(), 3);
}

// ============================================================================
// Matrices
// ============================================================================

#[test]
fn test_matrix_along_concatenated_rows() {
    let first = source("first", &["A", "B"], vec![1, 2]);
    let umis = Matrix::dense_columns(2, 2, vec![1u16, 2, 3, 4]).unwrap();
    first.set_matrix("cell", "gene", "UMIs", umis, false).unwrap();
    let second = source("second", &["C"], vec![3]);
    let umis = Matrix::dense_columns(1, 2, vec![5u16, 6]).unwrap();
    second.set_matrix("cell", "gene", "UMIs", umis, false).unwrap();
    let members = sources(&[&first, &second]);

    let destination = MemoryDaf::new("all");
    concatenate(&destination, &["cell"], &members, &ConcatOptions::new()).unwrap();
    assert!(destination.format_has_matrix("gene", "cell", "UMIs"));
    assert!(destination.format_has_matrix("cell", "gene", "UMIs"));
    let joined = destination.get_matrix("cell", "gene", "UMIs").unwrap();
    assert_eq!(joined.get(1, 0), Scalar::U16(2));
    assert_eq!(joined.get(2, 0), Scalar::U16(5));
    assert_eq!(joined.get(2, 1), Scalar::U16(6));
}

#[test]
fn test_missing_matrix_is_filled() {
    let first = source("first", &["A"], vec![1]);
    let umis = Matrix::dense_columns(2, 1, vec![1i64, 2]).unwrap();
    first.set_matrix("gene", "cell", "UMIs", umis, false).unwrap();
    let second = source("second", &["B", "C"], vec![2, 3]);
    let members = sources(&[&first, &second]);

    let destination = MemoryDaf::new("all");
    let error = concatenate(&destination, &["cell"], &members, &ConcatOptions::new()).unwrap_err();
    assert!(matches!(error, DafError::MissingEmptyValue { .. }));

    let options = ConcatOptions::new().empty_value(EmptyKey::matrix("cell", "gene", "UMIs"), 9i64);
    concatenate(&destination, &["cell"], &members, &options).unwrap();
    let joined = destination.get_matrix("gene", "cell", "UMIs").unwrap();
    assert_eq!(joined.get(1, 0), Scalar::I64(2));
    assert_eq!(joined.get(0, 2), Scalar::I64(9));
    assert!(!destination.format_has_matrix("cell", "gene", "UMIs"));
}

#[test]
fn test_matrix_of_two_concatenated_axes() {
    let first = source("first", &["A", "B"], vec![1, 2]);
    let distances = Matrix::dense_columns(2, 2, vec![0.0f32, 1.0, 1.0, 0.0]).unwrap();
    first.set_matrix("cell", "cell", "distance", distances, false).unwrap();
    let second = source("second", &["C"], vec![3]);
    let members = sources(&[&first, &second]);

    let destination = MemoryDaf::new("all");
    let error = concatenate(&destination, &["cell"], &members, &ConcatOptions::new()).unwrap_err();
    assert!(matches!(error, DafError::NonSquareConcatenation { ref daf, .. } if daf == "all"));
    assert!(destination.axis_names().is_empty());
}

// ============================================================================
// Merging
// ============================================================================

fn versioned() -> (Arc<MemoryDaf>, Arc<MemoryDaf>) {
    let first = source("first", &["A"], vec![1]);
    first.set_scalar("version", 1.0f64, false).unwrap();
    first.set_vector("gene", "length", vec![10u32, 20], false).unwrap();
    let second = source("second", &["B"], vec![2]);
    second.set_scalar("version", 2.0f64, false).unwrap();
    second.set_vector("gene", "length", vec![11u32, 21], false).unwrap();
    (first, second)
}

#[test]
fn test_unmerged_properties_are_skipped() {
    let (first, second) = versioned();
    let destination = MemoryDaf::new("all");
    concatenate(&destination, &["cell"], &sources(&[&first, &second]), &ConcatOptions::new()).unwrap();
    assert!(!destination.has_scalar("version"));
    assert!(!destination.has_vector("gene", "length").unwrap());
}

#[test]
fn test_merge_last_value() {
    let (first, second) = versioned();
    let destination = MemoryDaf::new("all");
    let options = ConcatOptions::new()
        .merge(MergeKey::AllScalars, MergeAction::LastValue)
        .merge(MergeKey::AllVectors, MergeAction::LastValue);
    concatenate(&destination, &["cell"], &sources(&[&first, &second]), &options).unwrap();
    assert_eq!(destination.get_scalar("version").unwrap(), Scalar::F64(2.0));
    assert_eq!(
        destination.get_vector("gene", "length").unwrap().to_dense(),
        Values::from(vec![11u32, 21])
    );
}

#[test]
fn test_merge_collect_axis() {
    let (first, second) = versioned();
    let destination = MemoryDaf::new("all");
    let options = ConcatOptions::new()
        .merge(MergeKey::AllScalars, MergeAction::LastValue)
        .merge(MergeKey::Scalar("version".to_string()), MergeAction::CollectAxis)
        .merge(
            MergeKey::Vector {
                axis: "gene".to_string(),
                name: "length".to_string(),
            },
            MergeAction::CollectAxis,
        );
    concatenate(&destination, &["cell"], &sources(&[&first, &second]), &options).unwrap();

    assert!(!destination.has_scalar("version"));
    assert_eq!(
        destination.get_vector("dataset", "version").unwrap().to_dense(),
        Values::from(vec![1.0f64, 2.0])
    );
    let lengths = destination.get_matrix("gene", "dataset", "length").unwrap();
    assert_eq!(lengths.get(0, 0), Scalar::U32(10));
    assert_eq!(lengths.get(1, 1), Scalar::U32(21));
}

#[test]
fn test_collect_missing_scalar() {
    let (first, _) = versioned();
    let second = source("second", &["B"], vec![2]);
    let members = sources(&[&first, &second]);
    let collect = ConcatOptions::new().merge(MergeKey::AllScalars, MergeAction::CollectAxis);

    let destination = MemoryDaf::new("all");
    let error = concatenate(&destination, &["cell"], &members, &collect).unwrap_err();
    assert!(matches!(error, DafError::MissingEmptyValue { ref daf, .. } if daf == "second"));

    let options = collect.empty_value(EmptyKey::vector("dataset", "version"), 0.0f64);
    concatenate(&destination, &["cell"], &members, &options).unwrap();
    assert_eq!(
        destination.get_vector("dataset", "version").unwrap().to_dense(),
        Values::from(vec![1.0f64, 0.0])
    );
}

#[test]
fn test_collect_needs_dataset_axis() {
    let (first, second) = versioned();
    let destination = MemoryDaf::new("all");
    let options = ConcatOptions::new()
        .no_dataset_axis()
        .merge(MergeKey::AllScalars, MergeAction::CollectAxis);
    let error = concatenate(&destination, &["cell"], &sources(&[&first, &second]), &options).unwrap_err();
    assert_eq!(error.to_string(), "can't collect the scalar: version\nwithout a dataset axis\nin the daf data: all");
}

#[test]
fn test_collect_matrix_needs_third_dimension() {
    let (first, second) = versioned();
    let weights = Matrix::dense_columns(2, 2, vec![1u8, 0, 0, 1]).unwrap();
    first.set_matrix("gene", "gene", "weight", weights, false).unwrap();
    let destination = MemoryDaf::new("all");
    let options = ConcatOptions::new().merge(MergeKey::AllMatrices, MergeAction::CollectAxis);
    let error = concatenate(&destination, &["cell"], &sources(&[&first, &second]), &options).unwrap_err();
    assert!(matches!(
        error,
        DafError::UnsupportedThirdDimension { ref dataset_axis, ref daf, .. } if dataset_axis == "dataset" && daf == "all"
    ));
}

#[test]
fn test_existing_property_needs_overwrite() {
    let (first, second) = versioned();
    let members = sources(&[&first, &second]);
    let options = ConcatOptions::new().merge(MergeKey::AllScalars, MergeAction::LastValue);

    let destination = MemoryDaf::new("all");
    destination.set_scalar("version", 0.0f64, false).unwrap();
    let error = concatenate(&destination, &["cell"], &members, &options).unwrap_err();
    assert!(matches!(error, DafError::ExistingScalar { .. }));
    assert!(destination.axis_names().is_empty());

    concatenate(&destination, &["cell"], &members, &options.overwrite(true)).unwrap();
    assert_eq!(destination.get_scalar("version").unwrap(), Scalar::F64(2.0));
}
