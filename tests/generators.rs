//! Proptest generators for daf data
//!
//! Provides `Strategy` implementations for names, axis entries, vectors and
//! small stores used across the property tests.

#![allow(dead_code)]

use daf::{DafWriter, MemoryDaf};
use proptest::collection::{hash_set, vec};
use proptest::prelude::*;

// ============================================================================
// Names
// ============================================================================

/// A plain identifier, never one of the reserved names.
pub fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,7}".prop_filter("reserved", |name| name != "name")
}

/// Unique axis entries, in a random order.
pub fn arb_entries(max: usize) -> impl Strategy<Value = Vec<String>> {
    hash_set("[A-Z][A-Z0-9]{0,5}", 1..=max).prop_map(|entries| entries.into_iter().collect())
}

/// Arbitrary text, biased towards characters that need escaping.
pub fn arb_expression_text() -> impl Strategy<Value = String> {
    vec(
        prop_oneof![
            3 => "[a-zA-Z0-9]",
            1 => Just("_".to_string()),
            1 => Just("\\".to_string()),
            1 => Just(" ".to_string()),
            1 => Just(":".to_string()),
            1 => Just("%".to_string()),
            1 => Just("é".to_string()),
        ],
        0..24,
    )
    .prop_map(|pieces| pieces.concat())
}

// ============================================================================
// Stores
// ============================================================================

/// An axis with its entries and an `i32` vector per entry.
#[derive(Debug, Clone)]
pub struct AxisData {
    pub axis: String,
    pub entries: Vec<String>,
    pub values: Vec<i32>,
}

pub fn arb_axis_data(max: usize) -> impl Strategy<Value = AxisData> {
    (arb_name(), arb_entries(max)).prop_flat_map(|(axis, entries)| {
        let length = entries.len();
        vec(-100i32..100, length..=length).prop_map(move |values| AxisData {
            axis: axis.clone(),
            entries: entries.clone(),
            values,
        })
    })
}

/// A store holding the axis and its values as the vector `value`.
pub fn store_with(name: &str, data: &AxisData) -> MemoryDaf {
    let daf = MemoryDaf::new(name);
    daf.add_axis(&data.axis, data.entries.iter().cloned())
        .expect("generated entries are unique");
    daf.set_vector(&data.axis, "value", data.values.clone(), false)
        .expect("generated values fit the axis");
    daf
}
