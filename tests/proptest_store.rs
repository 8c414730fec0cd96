//! Property tests for stores, chains, concatenation and groups

mod generators;

use std::sync::Arc;

use daf::{
    chain_reader, compact_groups, concatenate, ConcatOptions, DafReadHandle, DafReader, DafWriter, MemoryDaf, Scalar,
    Values,
};
use generators::AxisData;
use proptest::collection::vec;
use proptest::prelude::*;

proptest! {
    /// An added axis has exactly the given entries, in order
    #[test]
    fn axis_keeps_entries(data in generators::arb_axis_data(12)) {
        let daf = generators::store_with("memory!", &data);
        prop_assert_eq!(daf.axis_entries(&data.axis).unwrap(), data.entries.clone());
        for (index, entry) in data.entries.iter().enumerate() {
            prop_assert_eq!(daf.axis_index(&data.axis, entry).unwrap(), index);
        }
        prop_assert_eq!(
            daf.get_vector(&data.axis, "value").unwrap().to_dense(),
            Values::from(data.values.clone())
        );
    }

    /// A vector of the wrong length is rejected and changes nothing
    #[test]
    fn wrong_length_changes_nothing(data in generators::arb_axis_data(12), extra in 1usize..4) {
        let daf = generators::store_with("memory!", &data);
        let wrong = vec![0i32; data.entries.len() + extra];
        prop_assert!(daf.set_vector(&data.axis, "value", wrong, true).is_err());
        prop_assert_eq!(
            daf.get_vector(&data.axis, "value").unwrap().to_dense(),
            Values::from(data.values.clone())
        );
    }

    /// The last member of a chain that has a scalar provides it
    #[test]
    fn chain_last_member_wins(versions in vec(proptest::option::of(-1000i64..1000), 1..6)) {
        let members: Vec<DafReadHandle> = versions
            .iter()
            .enumerate()
            .map(|(index, version)| {
                let daf = MemoryDaf::shared(&format!("member{index}"));
                if let Some(version) = version {
                    daf.set_scalar("version", *version, false).unwrap();
                }
                daf as DafReadHandle
            })
            .collect();
        let chain = chain_reader("chain", members).unwrap();
        match versions.iter().rev().flatten().next() {
            Some(last) => prop_assert_eq!(chain.get_scalar("version").unwrap(), Scalar::I64(*last)),
            None => prop_assert!(!chain.has_scalar("version")),
        }
    }

    /// Concatenated vectors are the source vectors end to end
    #[test]
    fn concatenation_joins_sources(
        first in generators::arb_axis_data(8),
        second in generators::arb_axis_data(8),
    ) {
        prop_assume!(first.axis != "dataset");
        let second = AxisData { axis: first.axis.clone(), ..second };
        let members = vec![
            Arc::new(generators::store_with("one", &first)) as DafReadHandle,
            Arc::new(generators::store_with("two", &second)),
        ];
        let destination = MemoryDaf::new("all");
        let options = ConcatOptions::new().prefix(first.axis.as_str());
        concatenate(&destination, &[first.axis.as_str()], &members, &options).unwrap();

        let length = first.entries.len() + second.entries.len();
        prop_assert_eq!(destination.axis_length(&first.axis).unwrap(), length);
        let mut values = first.values.clone();
        values.extend(&second.values);
        prop_assert_eq!(
            destination.get_vector(&first.axis, "value").unwrap().to_dense(),
            Values::from(values)
        );
        let datasets = destination.get_vector(&first.axis, "dataset").unwrap();
        prop_assert_eq!(datasets.len(), length);
    }

    /// Compacted groups are numbered by first appearance, keeping zeros
    #[test]
    fn compact_groups_renumbers(groups in vec(0u32..6, 0..30)) {
        let mut compacted = groups.clone();
        let count = compact_groups(&mut compacted);

        let mut distinct: Vec<u32> = groups.iter().copied().filter(|group| *group != 0).collect();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(count, distinct.len());

        let mut next = 1;
        for (original, group) in groups.iter().zip(&compacted) {
            prop_assert_eq!(*original == 0, *group == 0);
            if *group == next {
                next += 1;
            } else {
                prop_assert!(*group < next);
            }
        }
    }
}
