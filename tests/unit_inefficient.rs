//! Unit tests for the inefficient action policy
//!
//! The policy is process-wide, so everything touching it lives in this one
//! test binary, in a single test.

use daf::data::{inefficient_action_policy, set_inefficient_action_policy, InefficientActionPolicy};
use daf::{query_vector, DafError, DafWriter, Matrix, MemoryDaf, Scalar};

fn cells() -> MemoryDaf {
    let daf = MemoryDaf::new("cells!");
    daf.add_axis("cell", ["A", "B", "C"]).unwrap();
    daf.add_axis("gene", ["X", "Y"]).unwrap();
    let umis = Matrix::dense_columns(3, 2, vec![1u16, 2, 3, 4, 5, 6]).unwrap();
    daf.set_matrix("cell", "gene", "UMIs", umis, false).unwrap();
    daf
}

#[test]
fn test_policy_controls_layout_mismatches() {
    assert_eq!(inefficient_action_policy(), InefficientActionPolicy::Warn);
    let daf = cells();

    let row = query_vector(&daf, "cell = B, gene @ UMIs").unwrap();
    assert_eq!(row.get("Y"), Some(Scalar::U16(5)));

    let previous = set_inefficient_action_policy(InefficientActionPolicy::Error);
    assert_eq!(previous, InefficientActionPolicy::Warn);

    let error = query_vector(&daf, "cell = B, gene @ UMIs").unwrap_err();
    assert!(matches!(error, DafError::InefficientAction { .. }));

    // Columns of the stored layout, and rows of the flipped view, are fine.
    let column = query_vector(&daf, "cell, gene = Y @ UMIs").unwrap();
    assert_eq!(column.get("C"), Some(Scalar::U16(6)));
    let flipped = query_vector(&daf, "gene = Y, cell @ UMIs").unwrap();
    assert_eq!(flipped.get("A"), Some(Scalar::U16(4)));

    set_inefficient_action_policy(InefficientActionPolicy::Ignore);
    assert!(query_vector(&daf, "cell = B, gene @ UMIs").is_ok());

    set_inefficient_action_policy(previous);
}
