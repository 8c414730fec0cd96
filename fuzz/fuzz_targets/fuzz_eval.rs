//! Fuzz query evaluation
//!
//! Evaluates arbitrary query texts against a small store with a scalar,
//! vectors of every shape of interest and a matrix.

#![no_main]

use daf::{DafWriter, Matrix, MemoryDaf};
use libfuzzer_sys::fuzz_target;

fn store() -> MemoryDaf {
    let daf = MemoryDaf::new("fuzz");
    let _ = daf.set_scalar("version", 1.0f64, false);
    let _ = daf.add_axis("cell", ["A", "B", "C"]);
    let _ = daf.add_axis("gene", ["X", "Y"]);
    let _ = daf.set_vector("cell", "age", vec![1i32, -2, 3], false);
    let _ = daf.set_vector("cell", "type", vec!["T", "", "B"], false);
    if let Ok(umis) = Matrix::dense_columns(3, 2, vec![0u16, 2, 0, 4, 5, 0]) {
        let _ = daf.set_matrix("cell", "gene", "UMIs", umis, false);
    }
    daf
}

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = daf::query(&store(), input);
    }
});
