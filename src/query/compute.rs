//! Numeric kernels of the built-in query operations.
//!
//! Everything is computed in `f64`; the caller converts the results to the
//! requested (or automatically promoted) element type.

use crate::data::DType;

/// A shape-preserving operation.
pub trait EltwiseOperation: Send + Sync {
    /// The result type when the query says `dtype = auto`.
    fn auto_dtype(&self, input: DType) -> DType;

    /// Whether the result of an element depends on the rest of its vector
    /// (or matrix column).
    fn per_column(&self) -> bool {
        false
    }

    /// Whether zero stays zero, so sparse inputs stay sparse.
    fn preserves_zero(&self) -> bool {
        true
    }

    fn applies_to_scalar(&self) -> bool {
        true
    }

    /// Transform the values in place. For per-column operations this is one
    /// whole vector or matrix column.
    fn apply(&self, values: &mut [f64]);
}

/// An operation collapsing a vector (or each matrix column) to one value.
pub trait ReductionOperation: Send + Sync {
    fn auto_dtype(&self, input: DType) -> DType;

    /// The reduced value, or `None` if the input is empty and the reduction
    /// has no value for that.
    fn reduce(&self, values: &[f64]) -> Option<f64>;
}

// ============================================================================
// ELTWISE
// ============================================================================

pub struct Abs;

impl EltwiseOperation for Abs {
    fn auto_dtype(&self, input: DType) -> DType {
        input.unsigned_for()
    }

    fn apply(&self, values: &mut [f64]) {
        values.iter_mut().for_each(|value| *value = value.abs());
    }
}

pub struct Round;

impl EltwiseOperation for Round {
    fn auto_dtype(&self, input: DType) -> DType {
        input
    }

    fn apply(&self, values: &mut [f64]) {
        values.iter_mut().for_each(|value| *value = value.round());
    }
}

pub struct Clamp {
    pub min: f64,
    pub max: f64,
}

impl EltwiseOperation for Clamp {
    fn auto_dtype(&self, input: DType) -> DType {
        input
    }

    fn preserves_zero(&self) -> bool {
        self.min <= 0.0 && 0.0 <= self.max
    }

    fn apply(&self, values: &mut [f64]) {
        values
            .iter_mut()
            .for_each(|value| *value = value.clamp(self.min, self.max));
    }
}

/// Only changes the type, which the caller does.
pub struct Convert;

impl EltwiseOperation for Convert {
    fn auto_dtype(&self, input: DType) -> DType {
        input
    }

    fn apply(&self, _values: &mut [f64]) {}
}

/// Each value divided by the sum of its vector or column (`0 / 0` is `0`).
pub struct Fraction;

impl EltwiseOperation for Fraction {
    fn auto_dtype(&self, input: DType) -> DType {
        input.float_for()
    }

    fn per_column(&self) -> bool {
        true
    }

    fn applies_to_scalar(&self) -> bool {
        false
    }

    fn apply(&self, values: &mut [f64]) {
        let total: f64 = values.iter().sum();
        for value in values.iter_mut() {
            *value = if total == 0.0 { 0.0 } else { *value / total };
        }
    }
}

/// `log(eps + x) / log(base)`.
pub struct Log {
    pub base: f64,
    pub eps: f64,
}

impl EltwiseOperation for Log {
    fn auto_dtype(&self, input: DType) -> DType {
        input.float_for()
    }

    fn preserves_zero(&self) -> bool {
        false
    }

    fn apply(&self, values: &mut [f64]) {
        let scale = self.base.ln();
        values
            .iter_mut()
            .for_each(|value| *value = (self.eps + *value).ln() / scale);
    }
}

/// Zero out insignificant values: if any magnitude in the vector (or
/// column) reaches `high`, keep the values whose magnitude reaches `low`,
/// otherwise zero everything.
pub struct Significant {
    pub high: f64,
    pub low: f64,
}

impl EltwiseOperation for Significant {
    fn auto_dtype(&self, input: DType) -> DType {
        input
    }

    fn per_column(&self) -> bool {
        true
    }

    fn apply(&self, values: &mut [f64]) {
        let significant = values.iter().any(|value| value.abs() >= self.high);
        for value in values.iter_mut() {
            if !significant || value.abs() < self.low {
                *value = 0.0;
            }
        }
    }
}

// ============================================================================
// REDUCTIONS
// ============================================================================

pub struct Count;

impl ReductionOperation for Count {
    fn auto_dtype(&self, _input: DType) -> DType {
        DType::U32
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        Some(values.len() as f64)
    }
}

pub struct Sum;

impl ReductionOperation for Sum {
    fn auto_dtype(&self, input: DType) -> DType {
        if input.is_float() {
            input
        } else if input.is_signed() {
            DType::I64
        } else {
            DType::U64
        }
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        Some(values.iter().sum())
    }
}

pub struct Max;

impl ReductionOperation for Max {
    fn auto_dtype(&self, input: DType) -> DType {
        input
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        values.iter().copied().reduce(f64::max)
    }
}

pub struct Min;

impl ReductionOperation for Min {
    fn auto_dtype(&self, input: DType) -> DType {
        input
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        values.iter().copied().reduce(f64::min)
    }
}

pub struct Mean;

impl ReductionOperation for Mean {
    fn auto_dtype(&self, input: DType) -> DType {
        input.float_for()
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        mean(values)
    }
}

pub struct Median;

impl ReductionOperation for Median {
    fn auto_dtype(&self, input: DType) -> DType {
        input.float_for()
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        quantile(values, 0.5)
    }
}

pub struct Quantile {
    pub p: f64,
}

impl ReductionOperation for Quantile {
    fn auto_dtype(&self, input: DType) -> DType {
        input.float_for()
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        quantile(values, self.p)
    }
}

/// Uncorrected (population) variance.
pub struct Var;

impl ReductionOperation for Var {
    fn auto_dtype(&self, input: DType) -> DType {
        input.float_for()
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        variance(values)
    }
}

/// Variance divided by `mean + eps` (zero if that is zero).
pub struct VarN {
    pub eps: f64,
}

impl ReductionOperation for VarN {
    fn auto_dtype(&self, input: DType) -> DType {
        input.float_for()
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        normalized(variance(values)?, mean(values)?, self.eps)
    }
}

pub struct Std;

impl ReductionOperation for Std {
    fn auto_dtype(&self, input: DType) -> DType {
        input.float_for()
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        variance(values).map(f64::sqrt)
    }
}

/// Standard deviation divided by `mean + eps` (zero if that is zero).
pub struct StdN {
    pub eps: f64,
}

impl ReductionOperation for StdN {
    fn auto_dtype(&self, input: DType) -> DType {
        input.float_for()
    }

    fn reduce(&self, values: &[f64]) -> Option<f64> {
        normalized(variance(values)?.sqrt(), mean(values)?, self.eps)
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn variance(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let squares: f64 = values.iter().map(|value| (value - mean) * (value - mean)).sum();
    Some(squares / values.len() as f64)
}

fn normalized(value: f64, mean: f64, eps: f64) -> Option<f64> {
    let denominator = mean + eps;
    Some(if denominator == 0.0 { 0.0 } else { value / denominator })
}

/// Linear interpolation between the closest ranks.
fn quantile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let position = p * (sorted.len() - 1) as f64;
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    let fraction = position - below as f64;
    Some(sorted[below] + (sorted[above] - sorted[below]) * fraction)
}
