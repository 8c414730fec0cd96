//! Grouping entries of an axis and aggregating over the groups.
//!
//! A group vector is a `u32` per entry where `0` means "no group". A grouping
//! property is a string vector whose (non-empty) values name the group of
//! each entry; these are the entries of another, possibly implicit, axis.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexSet;
use tracing::debug;

use crate::daf::{DafReader, DafWriter};
use crate::data::{DType, Scalar, Values, Vector};
use crate::error::{DafError, Result};
use crate::format::{FormatReader, FormatWriter};
use crate::query::NamedVector;

/// Renumber group indices to `1..=K` in order of first appearance, keeping
/// `0` as "no group". Returns `K`.
pub fn compact_groups(groups: &mut [u32]) -> usize {
    let mut renumbered: HashMap<u32, u32> = HashMap::new();
    for group in groups.iter_mut() {
        if *group == 0 {
            continue;
        }
        let next = renumbered.len() as u32 + 1;
        *group = *renumbered.entry(*group).or_insert(next);
    }
    renumbered.len()
}

/// The member positions of each group of a compacted group vector; element
/// `i` of the result lists the members of group `i + 1`.
pub fn collect_group_members(groups: &[u32]) -> Vec<Vec<usize>> {
    let count = groups.iter().copied().max().unwrap_or(0) as usize;
    let mut members = vec![Vec::new(); count];
    for (position, group) in groups.iter().enumerate() {
        if *group > 0 {
            members[*group as usize - 1].push(position);
        }
    }
    members
}

fn string_vector<'v, D: FormatReader + ?Sized>(
    daf: &D,
    axis: &str,
    name: &str,
    vector: &'v Vector,
) -> Result<&'v [String]> {
    vector.as_strings().ok_or_else(|| DafError::NonStringVector {
        axis: axis.to_string(),
        name: name.to_string(),
        dtype: vector.dtype().to_string(),
        daf: daf.name().to_string(),
    })
}

fn scalars_to_values(scalars: &[Scalar]) -> Values {
    let dtype = scalars
        .iter()
        .map(Scalar::dtype)
        .reduce(DType::promote)
        .unwrap_or(DType::String);
    let mut values = Values::empty(dtype);
    for scalar in scalars {
        let converted = scalar.convert(dtype).unwrap_or_else(|| Scalar::zero(dtype));
        values.extend(&Values::filled(&converted, 1));
    }
    values
}

/// Follow a chain of string vectors: the first names an entry of the axis
/// named like it, whose vector named like the second names an entry of the
/// second axis, and so on. Returns the values of the last vector for each
/// entry of `axis`.
///
/// An empty value along the way resolves to `default` when there is one.
pub fn chained_vector<D: FormatReader + ?Sized>(
    daf: &D,
    axis: &str,
    names: &[&str],
    default: Option<Scalar>,
) -> Result<Values> {
    let entries = daf.get_axis(axis)?;
    let Some((last, hops)) = names.split_last() else {
        return Ok(Values::String(entries.iter().cloned().collect()));
    };

    let mut current_axis = axis.to_string();
    let mut current_entries = entries.clone();
    let mut positions: Vec<Option<usize>> = (0..entries.len()).map(Some).collect();
    for name in hops {
        let vector = daf.get_vector(&current_axis, name)?;
        let strings = string_vector(daf, &current_axis, name, &vector)?;
        let next_entries = daf.get_axis(name)?;
        for position in positions.iter_mut() {
            let Some(index) = *position else {
                continue;
            };
            let value = &strings[index];
            if value.is_empty() {
                if default.is_none() {
                    return Err(DafError::EmptyGroupValue {
                        axis: current_axis,
                        name: name.to_string(),
                        entry: current_entries[index].clone(),
                        daf: daf.name().to_string(),
                    });
                }
                *position = None;
                continue;
            }
            *position = Some(next_entries.get_index_of(value.as_str()).ok_or_else(|| DafError::UnmappedValue {
                axis: current_axis.clone(),
                name: name.to_string(),
                value: value.clone(),
                next_axis: name.to_string(),
                daf: daf.name().to_string(),
            })?);
        }
        current_axis = name.to_string();
        current_entries = next_entries;
    }

    let values = daf.get_vector(&current_axis, last)?.to_dense();
    if let Some(indices) = positions.iter().copied().collect::<Option<Vec<usize>>>() {
        return Ok(values.gather(&indices));
    }
    let fallback = default.unwrap_or_else(|| Scalar::zero(values.dtype()));
    let scalars: Vec<Scalar> = positions
        .iter()
        .map(|position| position.map_or_else(|| fallback.clone(), |index| values.get(index)))
        .collect();
    Ok(scalars_to_values(&scalars))
}

/// Reduce a vector of an axis per group, where the groups are the distinct
/// values of the string vector `group` of the same axis. Entries with an
/// empty group value belong to the `default` group, or are an error.
pub fn aggregate_group_vector<D, F>(
    daf: &D,
    axis: &str,
    group: &str,
    vector: &str,
    reduce: F,
    default: Option<&str>,
) -> Result<NamedVector>
where
    D: FormatReader + ?Sized,
    F: Fn(&Values) -> Scalar,
{
    let entries = daf.get_axis(axis)?;
    let groups = daf.get_vector(axis, group)?;
    let labels = string_vector(daf, axis, group, &groups)?;
    let values = daf.get_vector(axis, vector)?.to_dense();

    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, label) in labels.iter().enumerate() {
        let label = match (label.is_empty(), default) {
            (false, _) => label.as_str(),
            (true, Some(default)) => default,
            (true, None) => {
                return Err(DafError::EmptyGroupValue {
                    axis: axis.to_string(),
                    name: group.to_string(),
                    entry: entries[index].clone(),
                    daf: daf.name().to_string(),
                })
            }
        };
        members.entry(label).or_default().push(index);
    }

    let reduced: Vec<Scalar> = members.values().map(|indices| reduce(&values.gather(indices))).collect();
    debug!(axis, group, vector, groups = members.len(), "aggregated group vector");
    Ok(NamedVector {
        axis: group.to_string(),
        entries: members.keys().map(|label| label.to_string()).collect(),
        vector: Vector::Dense(scalars_to_values(&reduced)),
    })
}

/// Create the implicit axis named by the grouping vector `implicit_axis` of
/// `existing_axis`, and move every other vector of `existing_axis` that is
/// constant within each group onto it.
///
/// The entries of the new axis are the sorted distinct non-empty grouping
/// values; a value equal to `empty` counts as no group. Entries without a
/// group are ignored when checking and lifting. A vector that varies within
/// a group is an error unless it is listed in `skipped`, in which case it
/// stays where it is. Returns the names of the moved vectors.
pub fn reconstruct_axis<W: FormatWriter + ?Sized>(
    daf: &W,
    existing_axis: &str,
    implicit_axis: &str,
    skipped: &[&str],
    empty: Option<&str>,
) -> Result<Vec<String>> {
    if daf.format_has_axis(implicit_axis) {
        return Err(DafError::ExistingAxis {
            axis: implicit_axis.to_string(),
            daf: daf.name().to_string(),
        });
    }
    let grouping = daf.get_vector(existing_axis, implicit_axis)?;
    let labels: Vec<String> = string_vector(daf, existing_axis, implicit_axis, &grouping)?
        .iter()
        .map(|label| if Some(label.as_str()) == empty { String::new() } else { label.clone() })
        .collect();

    let mut group_entries: Vec<&str> = labels.iter().filter(|label| !label.is_empty()).map(String::as_str).collect();
    group_entries.sort_unstable();
    group_entries.dedup();
    let group_index: IndexSet<&str> = group_entries.iter().copied().collect();
    let mut members = vec![Vec::new(); group_index.len()];
    for (position, label) in labels.iter().enumerate() {
        if let Some(group) = group_index.get_index_of(label.as_str()) {
            members[group].push(position);
        }
    }

    let mut lifted: Vec<(String, Values)> = Vec::new();
    for name in daf.vector_names(existing_axis)? {
        if name == implicit_axis {
            continue;
        }
        let values = daf.get_vector(existing_axis, &name)?.to_dense();
        let inconsistent = members.iter().enumerate().find(|(_, positions)| {
            let first = values.get(positions[0]);
            positions[1..].iter().any(|position| values.get(*position) != first)
        });
        match inconsistent {
            Some(_) if skipped.contains(&name.as_str()) => {
                debug!(axis = existing_axis, name = %name, "skip inconsistent vector");
            }
            Some((group, _)) => {
                return Err(DafError::InconsistentGroupValue {
                    axis: existing_axis.to_string(),
                    name,
                    group: group_entries[group].to_string(),
                    implicit_axis: implicit_axis.to_string(),
                    daf: daf.name().to_string(),
                })
            }
            None => {
                let firsts: Vec<usize> = members.iter().map(|positions| positions[0]).collect();
                lifted.push((name, values.gather(&firsts)));
            }
        }
    }

    daf.add_axis(implicit_axis, group_entries.iter().copied())?;
    if empty.is_some() {
        daf.set_vector(existing_axis, implicit_axis, Values::String(labels.clone()), true)?;
    }
    let mut names = Vec::with_capacity(lifted.len());
    for (name, values) in lifted {
        daf.set_vector(implicit_axis, &name, values, false)?;
        daf.delete_vector(existing_axis, &name, true)?;
        names.push(name);
    }
    debug!(
        existing_axis,
        implicit_axis,
        entries = group_entries.len(),
        lifted = names.len(),
        "reconstructed axis"
    );
    Ok(names)
}
