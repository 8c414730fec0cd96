//! Concatenating several stores along one or more axes.
//!
//! The entries of each concatenated axis are the entries of the sources, in
//! source order (optionally prefixed by the dataset name). Vectors of a
//! concatenated axis and matrices with exactly one concatenated axis are
//! joined end to end; sources missing one are filled with the declared empty
//! value. Other axes must agree across the sources and are copied as-is.
//! Everything else (scalars, vectors and matrices of the other axes) is
//! handled by the merge rules: keep the last value, collect one value per
//! dataset along the dataset axis, or (without a rule) skip it.
//!
//! The whole result is computed and validated before the destination is
//! touched, so a failed concatenation leaves the destination unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::chain::same_order;
use crate::daf::DafWriter;
use crate::data::{DType, DenseMatrix, MajorAxis, Matrix, Scalar, SparseMatrix, SparseVector, Values, Vector};
use crate::error::{DafError, Property, Result};
use crate::format::{AxisEntries, DafReadHandle, FormatWriter};

/// The default name of the dataset axis.
pub const DATASET_AXIS: &str = "dataset";

const PREFIX_SEPARATOR: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeAction {
    /// Keep the value of the last source that has the property.
    LastValue,
    /// Keep one value per source, along the dataset axis.
    CollectAxis,
}

/// Which properties a merge rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MergeKey {
    AllScalars,
    AllVectors,
    AllMatrices,
    Scalar(String),
    Vector {
        axis: String,
        name: String,
    },
    Matrix {
        rows_axis: String,
        columns_axis: String,
        name: String,
    },
}

/// The property a fill value is declared for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EmptyKey {
    Vector {
        axis: String,
        name: String,
    },
    Matrix {
        rows_axis: String,
        columns_axis: String,
        name: String,
    },
}

impl EmptyKey {
    pub fn vector(axis: impl Into<String>, name: impl Into<String>) -> Self {
        EmptyKey::Vector {
            axis: axis.into(),
            name: name.into(),
        }
    }

    pub fn matrix(rows_axis: impl Into<String>, columns_axis: impl Into<String>, name: impl Into<String>) -> Self {
        EmptyKey::Matrix {
            rows_axis: rows_axis.into(),
            columns_axis: columns_axis.into(),
            name: name.into(),
        }
    }
}

/// How to concatenate.
#[derive(Debug, Clone)]
pub struct ConcatOptions {
    dataset_axis: Option<String>,
    dataset_property: bool,
    names: Option<Vec<String>>,
    prefix: BTreeSet<String>,
    prefixed: BTreeSet<(String, String)>,
    empty: BTreeMap<EmptyKey, Scalar>,
    merge: Vec<(MergeKey, MergeAction)>,
    overwrite: bool,
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            dataset_axis: Some(DATASET_AXIS.to_string()),
            dataset_property: true,
            names: None,
            prefix: BTreeSet::new(),
            prefixed: BTreeSet::new(),
            empty: BTreeMap::new(),
            merge: Vec::new(),
            overwrite: false,
        }
    }
}

impl ConcatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the dataset axis (created with one entry per source).
    pub fn dataset_axis(mut self, axis: impl Into<String>) -> Self {
        self.dataset_axis = Some(axis.into());
        self
    }

    pub fn no_dataset_axis(mut self) -> Self {
        self.dataset_axis = None;
        self
    }

    /// Whether to add a vector (named like the dataset axis) to each
    /// concatenated axis, holding the dataset of each entry.
    pub fn dataset_property(mut self, enabled: bool) -> Self {
        self.dataset_property = enabled;
        self
    }

    /// Dataset names to use instead of the source names.
    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Prefix the entries of a concatenated axis with their dataset name.
    pub fn prefix(mut self, axis: impl Into<String>) -> Self {
        self.prefix.insert(axis.into());
        self
    }

    /// Prefix the (non-empty) values of a vector of a concatenated axis with
    /// their dataset name, for vectors that refer to prefixed entries.
    pub fn prefixed(mut self, axis: impl Into<String>, name: impl Into<String>) -> Self {
        self.prefixed.insert((axis.into(), name.into()));
        self
    }

    /// The value filling the part of a property missing from some source.
    pub fn empty_value(mut self, key: EmptyKey, value: impl Into<Scalar>) -> Self {
        self.empty.insert(key, value.into());
        self
    }

    /// Add a merge rule. Later rules take precedence over earlier ones.
    pub fn merge(mut self, key: MergeKey, action: MergeAction) -> Self {
        self.merge.push((key, action));
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    fn merge_action(&self, key: &MergeKey, wildcard: &MergeKey) -> Option<MergeAction> {
        self.merge
            .iter()
            .rev()
            .find(|(rule, _)| rule == key || rule == wildcard)
            .map(|(_, action)| *action)
    }

    fn empty_vector(&self, axis: &str, name: &str) -> Option<&Scalar> {
        self.empty.get(&EmptyKey::vector(axis, name))
    }

    fn empty_matrix(&self, rows_axis: &str, columns_axis: &str, name: &str) -> Option<&Scalar> {
        self.empty
            .get(&EmptyKey::matrix(rows_axis, columns_axis, name))
            .or_else(|| self.empty.get(&EmptyKey::matrix(columns_axis, rows_axis, name)))
    }
}

/// Concatenate the sources into the destination along the given axes.
pub fn concatenate<W: FormatWriter + ?Sized>(
    destination: &W,
    axes: &[&str],
    sources: &[DafReadHandle],
    options: &ConcatOptions,
) -> Result<()> {
    let plan = Planner::new(destination.name(), axes, sources, options)?.plan()?;
    debug!(
        daf = destination.name(),
        sources = sources.len(),
        axes = plan.axes.len(),
        scalars = plan.scalars.len(),
        vectors = plan.vectors.len(),
        matrices = plan.matrices.len(),
        "planned concatenation"
    );
    let skipped = check_destination(destination, &plan, options.overwrite)?;
    apply(destination, plan, &skipped, options.overwrite)?;
    debug!(daf = destination.name(), "concatenated");
    Ok(())
}

// ============================================================================
// PLANNING
// ============================================================================

struct PlannedAxis {
    axis: String,
    entries: Vec<String>,
    /// Concatenated and dataset axes must not exist in the destination.
    created: bool,
}

struct PlannedMatrix {
    rows_axis: String,
    columns_axis: String,
    name: String,
    matrix: Matrix,
    relayout: bool,
}

#[derive(Default)]
struct Plan {
    axes: Vec<PlannedAxis>,
    scalars: Vec<(String, Scalar)>,
    vectors: Vec<(String, String, Vector)>,
    matrices: Vec<PlannedMatrix>,
}

impl Plan {
    fn axis_length(&self, axis: &str) -> usize {
        self.axes
            .iter()
            .find(|planned| planned.axis == axis)
            .map_or(0, |planned| planned.entries.len())
    }
}

struct Planner<'a> {
    daf: &'a str,
    axes: &'a [&'a str],
    sources: &'a [DafReadHandle],
    options: &'a ConcatOptions,
    datasets: Vec<String>,
}

fn promote_all(dtypes: impl IntoIterator<Item = DType>) -> Option<DType> {
    dtypes.into_iter().reduce(DType::promote)
}

impl<'a> Planner<'a> {
    fn new(
        daf: &'a str,
        axes: &'a [&'a str],
        sources: &'a [DafReadHandle],
        options: &'a ConcatOptions,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(DafError::InvalidConcatenation {
                detail: "no sources".to_string(),
                daf: daf.to_string(),
            });
        }
        let datasets = match &options.names {
            Some(names) if names.len() != sources.len() => {
                return Err(DafError::InvalidConcatenation {
                    detail: format!("{} dataset names for {} sources", names.len(), sources.len()),
                    daf: daf.to_string(),
                });
            }
            Some(names) => names.clone(),
            None => sources.iter().map(|source| source.name().to_string()).collect(),
        };
        Ok(Self {
            daf,
            axes,
            sources,
            options,
            datasets,
        })
    }

    fn is_concatenated(&self, axis: &str) -> bool {
        self.axes.contains(&axis)
    }

    fn missing_empty(&self, property: Property, source: &DafReadHandle) -> DafError {
        DafError::MissingEmptyValue {
            property,
            daf: source.name().to_string(),
        }
    }

    fn type_mismatch(&self, what: String, expected: DType, actual: DType, source: &DafReadHandle) -> DafError {
        DafError::TypeMismatch {
            what,
            expected: expected.to_string(),
            actual: actual.to_string(),
            daf: source.name().to_string(),
        }
    }

    fn cannot_collect(&self, property: Property) -> DafError {
        DafError::CannotCollectWithoutDatasetAxis {
            property,
            daf: self.daf.to_string(),
        }
    }

    fn broken(&self, detail: impl Into<String>) -> DafError {
        DafError::InvalidConcatenation {
            detail: detail.into(),
            daf: self.daf.to_string(),
        }
    }

    fn plan(&self) -> Result<Plan> {
        let mut plan = Plan::default();
        self.plan_axes(&mut plan)?;
        self.plan_scalars(&mut plan)?;
        self.plan_vectors(&mut plan)?;
        self.plan_matrices(&mut plan)?;
        Ok(plan)
    }

    fn unique(&self, axis: &str, entries: &[String]) -> Result<()> {
        let mut seen = BTreeSet::new();
        for entry in entries {
            if !seen.insert(entry.as_str()) {
                return Err(DafError::NonUniqueEntries {
                    axis: axis.to_string(),
                    entry: entry.clone(),
                    daf: self.daf.to_string(),
                });
            }
        }
        Ok(())
    }

    fn source_axes(&self) -> BTreeSet<String> {
        self.sources
            .iter()
            .flat_map(|source| source.format_axis_names())
            .collect()
    }

    fn plan_axes(&self, plan: &mut Plan) -> Result<()> {
        for axis in self.axes {
            let prefix = self.options.prefix.contains(*axis);
            let mut entries = Vec::new();
            for (source, dataset) in self.sources.iter().zip(&self.datasets) {
                let known = source.format_get_axis(axis).ok_or_else(|| DafError::MissingAxis {
                    axis: axis.to_string(),
                    daf: source.name().to_string(),
                })?;
                entries.extend(known.iter().map(|entry| {
                    if prefix {
                        format!("{dataset}{PREFIX_SEPARATOR}{entry}")
                    } else {
                        entry.clone()
                    }
                }));
            }
            self.unique(axis, &entries)?;
            plan.axes.push(PlannedAxis {
                axis: axis.to_string(),
                entries,
                created: true,
            });
        }

        for axis in self.source_axes() {
            if self.is_concatenated(&axis) {
                continue;
            }
            if self.options.dataset_axis.as_deref() == Some(axis.as_str()) {
                return Err(self.broken(format!("the dataset axis: {axis}\nalready exists in the sources")));
            }
            let mut first: Option<(&DafReadHandle, AxisEntries)> = None;
            for source in self.sources {
                let Some(entries) = source.format_get_axis(&axis) else {
                    continue;
                };
                match &first {
                    None => first = Some((source, entries)),
                    Some((first_source, first_entries)) => {
                        if !same_order(first_entries, &entries) {
                            return Err(DafError::InconsistentAxisEntries {
                                axis,
                                first: first_source.name().to_string(),
                                second: source.name().to_string(),
                                daf: self.daf.to_string(),
                            });
                        }
                    }
                }
            }
            if let Some((_, entries)) = first {
                plan.axes.push(PlannedAxis {
                    axis,
                    entries: entries.iter().cloned().collect(),
                    created: false,
                });
            }
        }

        if let Some(dataset_axis) = &self.options.dataset_axis {
            if self.is_concatenated(dataset_axis) {
                return Err(self.broken(format!("the dataset axis: {dataset_axis}\nis also concatenated")));
            }
            self.unique(dataset_axis, &self.datasets)?;
            plan.axes.push(PlannedAxis {
                axis: dataset_axis.clone(),
                entries: self.datasets.clone(),
                created: true,
            });
        }
        Ok(())
    }

    fn plan_scalars(&self, plan: &mut Plan) -> Result<()> {
        let names: BTreeSet<String> = self
            .sources
            .iter()
            .flat_map(|source| source.format_scalar_names())
            .collect();
        for name in names {
            let property = Property::Scalar { name: name.clone() };
            match self
                .options
                .merge_action(&MergeKey::Scalar(name.clone()), &MergeKey::AllScalars)
            {
                None => debug!(name = %name, "skip scalar without a merge rule"),
                Some(MergeAction::LastValue) => {
                    if let Some(value) = self.sources.iter().rev().find_map(|source| source.format_get_scalar(&name)) {
                        plan.scalars.push((name, value));
                    }
                }
                Some(MergeAction::CollectAxis) => {
                    let Some(dataset_axis) = &self.options.dataset_axis else {
                        return Err(self.cannot_collect(property));
                    };
                    let mut values = Vec::with_capacity(self.sources.len());
                    for source in self.sources {
                        match source.format_get_scalar(&name) {
                            Some(value) => values.push(value),
                            None => match self.options.empty_vector(dataset_axis, &name) {
                                Some(empty) => values.push(empty.clone()),
                                None => return Err(self.missing_empty(property, source)),
                            },
                        }
                    }
                    let vector = self.scalars_vector(&name, &values)?;
                    plan.vectors.push((dataset_axis.clone(), name, vector));
                }
            }
        }
        Ok(())
    }

    fn scalars_vector(&self, name: &str, scalars: &[Scalar]) -> Result<Vector> {
        let Some(dtype) = promote_all(scalars.iter().map(Scalar::dtype)) else {
            return Err(self.broken(format!("no values for the scalar: {name}")));
        };
        let mut values = Values::empty(dtype);
        for (scalar, source) in scalars.iter().zip(self.sources) {
            let converted = scalar
                .convert(dtype)
                .ok_or_else(|| self.type_mismatch(format!("scalar: {name}"), dtype, scalar.dtype(), source))?;
            values.extend(&Values::filled(&converted, 1));
        }
        Ok(Vector::Dense(values))
    }

    fn plan_vectors(&self, plan: &mut Plan) -> Result<()> {
        let dataset_vector = self
            .options
            .dataset_axis
            .as_ref()
            .filter(|_| self.options.dataset_property);

        if let Some(dataset_axis) = dataset_vector {
            for axis in self.axes {
                let mut datasets = Vec::new();
                for (source, dataset) in self.sources.iter().zip(&self.datasets) {
                    let length = source.format_axis_length(axis).unwrap_or(0);
                    datasets.extend(std::iter::repeat(dataset.clone()).take(length));
                }
                plan.vectors
                    .push((axis.to_string(), dataset_axis.clone(), Vector::Dense(Values::String(datasets))));
            }
        }

        for axis in self.source_axes() {
            let names: BTreeSet<String> = self
                .sources
                .iter()
                .flat_map(|source| source.format_vector_names(&axis))
                .collect();
            for name in names {
                if self.is_concatenated(&axis) {
                    if dataset_vector == Some(&name) {
                        debug!(axis = %axis, name = %name, "dataset property replaces vector");
                        continue;
                    }
                    let vector = self.concat_vector(&axis, &name)?;
                    plan.vectors.push((axis.clone(), name, vector));
                    continue;
                }
                let key = MergeKey::Vector {
                    axis: axis.clone(),
                    name: name.clone(),
                };
                match self.options.merge_action(&key, &MergeKey::AllVectors) {
                    None => debug!(axis = %axis, name = %name, "skip vector without a merge rule"),
                    Some(MergeAction::LastValue) => {
                        if let Some(vector) = self
                            .sources
                            .iter()
                            .rev()
                            .find_map(|source| source.format_get_vector(&axis, &name))
                        {
                            plan.vectors.push((axis.clone(), name, vector.as_ref().clone()));
                        }
                    }
                    Some(MergeAction::CollectAxis) => {
                        let Some(dataset_axis) = &self.options.dataset_axis else {
                            return Err(self.cannot_collect(Property::Vector { axis, name }));
                        };
                        let matrix = self.collect_vector(&axis, &name, dataset_axis, plan.axis_length(&axis))?;
                        plan.matrices.push(PlannedMatrix {
                            rows_axis: axis.clone(),
                            columns_axis: dataset_axis.clone(),
                            name,
                            matrix,
                            relayout: false,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn concat_vector(&self, axis: &str, name: &str) -> Result<Vector> {
        let property = || Property::Vector {
            axis: axis.to_string(),
            name: name.to_string(),
        };
        let parts: Vec<Option<Arc<Vector>>> = self
            .sources
            .iter()
            .map(|source| source.format_get_vector(axis, name))
            .collect();
        let empty = self.options.empty_vector(axis, name);
        let prefixed = self.options.prefixed.contains(&(axis.to_string(), name.to_string()));

        let mut dtypes: Vec<DType> = parts.iter().flatten().map(|vector| vector.dtype()).collect();
        for (part, source) in parts.iter().zip(self.sources) {
            if part.is_none() {
                match empty {
                    Some(empty) => dtypes.push(empty.dtype()),
                    None => return Err(self.missing_empty(property(), source)),
                }
            }
        }
        let dtype = if prefixed {
            DType::String
        } else {
            promote_all(dtypes).unwrap_or(DType::String)
        };
        let fill = empty.map_or_else(|| Scalar::zero(dtype), Clone::clone);
        let sparse = !prefixed
            && dtype.is_numeric()
            && parts.iter().flatten().all(|vector| vector.is_sparse())
            && (parts.iter().all(Option::is_some) || fill.is_empty_value());

        if sparse {
            let mut sparse_parts = Vec::with_capacity(parts.len());
            for (part, source) in parts.iter().zip(self.sources) {
                let length = source.format_axis_length(axis).unwrap_or(0);
                let sparse_part = match part.as_deref() {
                    Some(Vector::Sparse(sparse)) => sparse.convert(dtype),
                    Some(other) => SparseVector::from_dense(&other.to_dense()).and_then(|part| part.convert(dtype)),
                    None => SparseVector::new(length, Vec::new(), Values::empty(dtype)).ok(),
                };
                sparse_parts.push(sparse_part.ok_or_else(|| {
                    self.type_mismatch(format!("vector: {name}"), dtype, part.as_ref().map_or(dtype, |p| p.dtype()), source)
                })?);
            }
            let joined = SparseVector::concat(&sparse_parts)
                .ok_or_else(|| self.broken(format!("can't join the sparse vector: {name}")))?;
            return Ok(Vector::Sparse(joined));
        }

        let mut dense_parts = Vec::with_capacity(parts.len());
        for ((part, source), dataset) in parts.iter().zip(self.sources).zip(&self.datasets) {
            let length = source.format_axis_length(axis).unwrap_or(0);
            let values = match part {
                Some(vector) => vector.to_dense().convert(dtype).ok_or_else(|| {
                    self.type_mismatch(format!("vector: {name}"), dtype, vector.dtype(), source)
                })?,
                None => {
                    let filled = fill
                        .convert(dtype)
                        .ok_or_else(|| self.type_mismatch(format!("vector: {name}"), dtype, fill.dtype(), source))?;
                    Values::filled(&filled, length)
                }
            };
            let values = match (prefixed, values) {
                (true, Values::String(strings)) => Values::String(
                    strings
                        .into_iter()
                        .map(|value| {
                            if value.is_empty() {
                                value
                            } else {
                                format!("{dataset}{PREFIX_SEPARATOR}{value}")
                            }
                        })
                        .collect(),
                ),
                (_, values) => values,
            };
            dense_parts.push(values);
        }
        Values::concat(&dense_parts)
            .map(Vector::Dense)
            .ok_or_else(|| self.broken(format!("can't join the vector: {name}")))
    }

    fn collect_vector(&self, axis: &str, name: &str, dataset_axis: &str, nrows: usize) -> Result<Matrix> {
        let mut columns = Vec::with_capacity(self.sources.len());
        for source in self.sources {
            match source.format_get_vector(axis, name) {
                Some(vector) => columns.push(vector.to_dense()),
                None => match self.options.empty_matrix(axis, dataset_axis, name) {
                    Some(empty) => columns.push(Values::filled(empty, nrows)),
                    None => {
                        return Err(self.missing_empty(
                            Property::Vector {
                                axis: axis.to_string(),
                                name: name.to_string(),
                            },
                            source,
                        ))
                    }
                },
            }
        }
        let dtype = promote_all(columns.iter().map(Values::dtype)).unwrap_or(DType::String);
        let mut converted = Vec::with_capacity(columns.len());
        for (column, source) in columns.iter().zip(self.sources) {
            converted.push(
                column
                    .convert(dtype)
                    .ok_or_else(|| self.type_mismatch(format!("vector: {name}"), dtype, column.dtype(), source))?,
            );
        }
        DenseMatrix::from_columns(nrows, dtype, &converted)
            .map(Matrix::Dense)
            .map_err(|detail| self.broken(detail))
    }

    fn plan_matrices(&self, plan: &mut Plan) -> Result<()> {
        let axes = self.source_axes();
        let mut stored: BTreeSet<(String, String, String)> = BTreeSet::new();
        for rows_axis in &axes {
            for columns_axis in &axes {
                for source in self.sources {
                    for name in source.format_matrix_names(rows_axis, columns_axis) {
                        stored.insert((rows_axis.clone(), columns_axis.clone(), name));
                    }
                }
            }
        }

        let mut joined: BTreeMap<(String, String, String), bool> = BTreeMap::new();
        for (rows_axis, columns_axis, name) in stored {
            match (self.is_concatenated(&rows_axis), self.is_concatenated(&columns_axis)) {
                (true, true) => {
                    return Err(DafError::NonSquareConcatenation {
                        rows_axis,
                        columns_axis,
                        name,
                        daf: self.daf.to_string(),
                    })
                }
                (false, true) => {
                    joined.entry((rows_axis, columns_axis, name)).or_insert(false);
                }
                (true, false) => {
                    *joined.entry((columns_axis, rows_axis, name)).or_insert(true) = true;
                }
                (false, false) => self.merge_matrix(plan, rows_axis, columns_axis, name)?,
            }
        }

        for ((other_axis, concat_axis, name), relayout) in joined {
            let matrix = self.concat_matrix(&other_axis, &concat_axis, &name, plan.axis_length(&other_axis))?;
            plan.matrices.push(PlannedMatrix {
                rows_axis: other_axis,
                columns_axis: concat_axis,
                name,
                matrix,
                relayout,
            });
        }
        Ok(())
    }

    fn merge_matrix(&self, plan: &mut Plan, rows_axis: String, columns_axis: String, name: String) -> Result<()> {
        let key = MergeKey::Matrix {
            rows_axis: rows_axis.clone(),
            columns_axis: columns_axis.clone(),
            name: name.clone(),
        };
        let property = || Property::Matrix {
            rows_axis: rows_axis.clone(),
            columns_axis: columns_axis.clone(),
            name: name.clone(),
        };
        match self.options.merge_action(&key, &MergeKey::AllMatrices) {
            None => {
                debug!(rows_axis = %rows_axis, columns_axis = %columns_axis, name = %name, "skip matrix without a merge rule");
            }
            Some(MergeAction::LastValue) => {
                if let Some(matrix) = self
                    .sources
                    .iter()
                    .rev()
                    .find_map(|source| source.format_get_matrix(&rows_axis, &columns_axis, &name))
                {
                    plan.matrices.push(PlannedMatrix {
                        matrix: matrix.as_ref().clone(),
                        rows_axis,
                        columns_axis,
                        name,
                        relayout: false,
                    });
                }
            }
            Some(MergeAction::CollectAxis) => {
                let Some(dataset_axis) = &self.options.dataset_axis else {
                    return Err(self.cannot_collect(property()));
                };
                return Err(DafError::UnsupportedThirdDimension {
                    property: property(),
                    dataset_axis: dataset_axis.clone(),
                    daf: self.daf.to_string(),
                });
            }
        }
        Ok(())
    }

    /// A source matrix with the rows along `rows_axis`, in column-major
    /// layout, whichever way it is stored.
    fn columns_layout(source: &DafReadHandle, rows_axis: &str, columns_axis: &str, name: &str) -> Option<Matrix> {
        if let Some(matrix) = source.format_get_matrix(rows_axis, columns_axis, name) {
            return Some(matrix.as_ref().clone());
        }
        source
            .format_get_matrix(columns_axis, rows_axis, name)
            .map(|flipped| flipped.relayout().transposed())
    }

    fn concat_matrix(&self, other_axis: &str, concat_axis: &str, name: &str, nrows: usize) -> Result<Matrix> {
        let parts: Vec<Option<Matrix>> = self
            .sources
            .iter()
            .map(|source| Self::columns_layout(source, other_axis, concat_axis, name))
            .collect();
        let empty = self.options.empty_matrix(other_axis, concat_axis, name);

        let mut dtypes: Vec<DType> = parts.iter().flatten().map(Matrix::dtype).collect();
        for (part, source) in parts.iter().zip(self.sources) {
            if part.is_none() {
                match empty {
                    Some(empty) => dtypes.push(empty.dtype()),
                    None => {
                        return Err(self.missing_empty(
                            Property::Matrix {
                                rows_axis: other_axis.to_string(),
                                columns_axis: concat_axis.to_string(),
                                name: name.to_string(),
                            },
                            source,
                        ))
                    }
                }
            }
        }
        let dtype = promote_all(dtypes).unwrap_or(DType::String);
        let fill = empty.map_or_else(|| Scalar::zero(dtype), Clone::clone);
        let sparse = dtype.is_numeric()
            && parts.iter().flatten().all(Matrix::is_sparse)
            && (parts.iter().all(Option::is_some) || fill.is_empty_value());
        let mismatch = |actual: DType, source: &DafReadHandle| {
            self.type_mismatch(format!("matrix: {name}"), dtype, actual, source)
        };

        if sparse {
            let mut sparse_parts = Vec::with_capacity(parts.len());
            for (part, source) in parts.into_iter().zip(self.sources) {
                let ncols = source.format_axis_length(concat_axis).unwrap_or(0);
                let sparse_part = match part.map(Matrix::without_labels) {
                    Some(Matrix::Sparse(matrix)) => matrix.convert(dtype).ok_or_else(|| mismatch(matrix.dtype(), source))?,
                    Some(other) => return Err(mismatch(other.dtype(), source)),
                    None => SparseMatrix::new(
                        nrows,
                        ncols,
                        MajorAxis::Columns,
                        vec![0; ncols + 1],
                        Vec::new(),
                        Values::empty(dtype),
                    )
                    .map_err(|detail| self.broken(detail))?,
                };
                sparse_parts.push(sparse_part);
            }
            return SparseMatrix::concat_columns(&sparse_parts)
                .map(Matrix::Sparse)
                .ok_or_else(|| self.broken(format!("can't join the sparse matrix: {name}")));
        }

        let mut dense_parts = Vec::with_capacity(parts.len());
        for (part, source) in parts.into_iter().zip(self.sources) {
            let ncols = source.format_axis_length(concat_axis).unwrap_or(0);
            let dense_part = match part {
                Some(matrix) => matrix
                    .to_dense()
                    .convert(dtype)
                    .ok_or_else(|| mismatch(matrix.dtype(), source))?,
                None => {
                    let filled = fill.convert(dtype).ok_or_else(|| mismatch(fill.dtype(), source))?;
                    DenseMatrix::new(nrows, ncols, MajorAxis::Columns, Values::filled(&filled, nrows * ncols))
                        .map_err(|detail| self.broken(detail))?
                }
            };
            dense_parts.push(dense_part);
        }
        DenseMatrix::concat_columns(&dense_parts)
            .map(Matrix::Dense)
            .ok_or_else(|| self.broken(format!("can't join the matrix: {name}")))
    }
}

// ============================================================================
// APPLYING
// ============================================================================

/// Fail if anything in the plan conflicts with the destination. Returns the
/// axes the destination already has with the same entries.
fn check_destination<W: FormatWriter + ?Sized>(destination: &W, plan: &Plan, overwrite: bool) -> Result<BTreeSet<String>> {
    let daf = || destination.name().to_string();
    let mut skipped = BTreeSet::new();
    for planned in &plan.axes {
        let Some(existing) = destination.format_get_axis(&planned.axis) else {
            continue;
        };
        if planned.created || !existing.iter().eq(planned.entries.iter()) {
            return Err(DafError::ExistingAxis {
                axis: planned.axis.clone(),
                daf: daf(),
            });
        }
        skipped.insert(planned.axis.clone());
    }
    if overwrite {
        return Ok(skipped);
    }
    for (name, _) in &plan.scalars {
        if destination.format_has_scalar(name) {
            return Err(DafError::ExistingScalar {
                name: name.clone(),
                daf: daf(),
            });
        }
    }
    for (axis, name, _) in &plan.vectors {
        if destination.format_has_vector(axis, name) {
            return Err(DafError::ExistingVector {
                axis: axis.clone(),
                name: name.clone(),
                daf: daf(),
            });
        }
    }
    for planned in &plan.matrices {
        let flipped = planned.relayout
            && destination.format_has_matrix(&planned.columns_axis, &planned.rows_axis, &planned.name);
        if flipped || destination.format_has_matrix(&planned.rows_axis, &planned.columns_axis, &planned.name) {
            return Err(DafError::ExistingMatrix {
                rows_axis: planned.rows_axis.clone(),
                columns_axis: planned.columns_axis.clone(),
                name: planned.name.clone(),
                daf: daf(),
            });
        }
    }
    Ok(skipped)
}

fn apply<W: FormatWriter + ?Sized>(destination: &W, plan: Plan, skipped: &BTreeSet<String>, overwrite: bool) -> Result<()> {
    for planned in plan.axes {
        if !skipped.contains(&planned.axis) {
            destination.add_axis(&planned.axis, planned.entries)?;
        }
    }
    for (name, value) in plan.scalars {
        destination.set_scalar(&name, value, overwrite)?;
    }
    for (axis, name, vector) in plan.vectors {
        destination.set_vector(&axis, &name, vector, overwrite)?;
    }
    for planned in plan.matrices {
        destination.set_matrix(
            &planned.rows_axis,
            &planned.columns_axis,
            &planned.name,
            planned.matrix,
            overwrite,
        )?;
        if planned.relayout {
            destination.relayout_matrix(&planned.rows_axis, &planned.columns_axis, &planned.name, overwrite)?;
        }
    }
    Ok(())
}
