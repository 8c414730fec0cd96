//! The registry of eltwise and reduction operations.
//!
//! An [`OperationSpec`] declares the parameters of an operation (in the
//! order they are rendered), how each parameter value is parsed and
//! validated, and how to build the kernel from the parsed parameters. The
//! parser only accepts operations found in the registry it is given;
//! [`OperationRegistry::standard`] holds the built-in ones.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::data::DType;
use crate::error::{DafError, Result};

use super::compute::{
    Abs, Clamp, Convert, Count, EltwiseOperation, Fraction, Log, Max, Mean, Median, Min, Quantile, ReductionOperation,
    Round, Significant, Std, StdN, Sum, Var, VarN,
};

// ============================================================================
// PARAMETERS
// ============================================================================

/// A parsed parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    /// `dtype = auto`.
    Auto,
    DType(DType),
    Number(f64),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Auto => f.write_str("auto"),
            ParameterValue::DType(dtype) => f.write_str(dtype.name()),
            ParameterValue::Number(number) => f.write_str(&format_parameter_number(*number)),
        }
    }
}

/// Render a number so that it parses back to the same value.
pub fn format_parameter_number(number: f64) -> String {
    if number == f64::INFINITY {
        "Inf".to_string()
    } else if number == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if number == std::f64::consts::E {
        "e".to_string()
    } else {
        format!("{number:?}")
    }
}

fn parse_number(text: &str) -> Option<f64> {
    match text {
        "Inf" | "+Inf" | "inf" => Some(f64::INFINITY),
        "-Inf" | "-inf" => Some(f64::NEG_INFINITY),
        "e" => Some(std::f64::consts::E),
        _ => text.parse::<f64>().ok().filter(|number| !number.is_nan()),
    }
}

/// Parses the text of a parameter value; the error describes what a valid
/// value is.
pub type ParseParameter = fn(&str) -> std::result::Result<ParameterValue, &'static str>;

pub fn dtype_or_auto(text: &str) -> std::result::Result<ParameterValue, &'static str> {
    if text == "auto" {
        return Ok(ParameterValue::Auto);
    }
    match DType::parse(text) {
        Some(dtype) if dtype.is_numeric() => Ok(ParameterValue::DType(dtype)),
        _ => Err("must be auto or a numeric type"),
    }
}

pub fn numeric_dtype(text: &str) -> std::result::Result<ParameterValue, &'static str> {
    match DType::parse(text) {
        Some(dtype) if dtype.is_numeric() => Ok(ParameterValue::DType(dtype)),
        _ => Err("must be a numeric type"),
    }
}

pub fn any_number(text: &str) -> std::result::Result<ParameterValue, &'static str> {
    parse_number(text).map(ParameterValue::Number).ok_or("must be a number")
}

pub fn positive_number(text: &str) -> std::result::Result<ParameterValue, &'static str> {
    match parse_number(text) {
        Some(number) if number > 0.0 => Ok(ParameterValue::Number(number)),
        _ => Err("must be a positive number"),
    }
}

pub fn log_base(text: &str) -> std::result::Result<ParameterValue, &'static str> {
    match parse_number(text) {
        Some(number) if number > 0.0 && number != 1.0 => Ok(ParameterValue::Number(number)),
        _ => Err("must be a positive number other than 1"),
    }
}

pub fn non_negative_number(text: &str) -> std::result::Result<ParameterValue, &'static str> {
    match parse_number(text) {
        Some(number) if number >= 0.0 => Ok(ParameterValue::Number(number)),
        _ => Err("must be a non-negative number"),
    }
}

pub fn probability(text: &str) -> std::result::Result<ParameterValue, &'static str> {
    match parse_number(text) {
        Some(number) if (0.0..=1.0).contains(&number) => Ok(ParameterValue::Number(number)),
        _ => Err("must be a number between 0 and 1"),
    }
}

/// The value a parameter takes when the query doesn't give it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterDefault {
    Value(ParameterValue),
    Required,
    /// The value of another (earlier declared) parameter.
    SameAs(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub default: ParameterDefault,
    pub parse: ParseParameter,
}

impl ParameterSpec {
    pub const fn new(name: &'static str, default: ParameterDefault, parse: ParseParameter) -> Self {
        Self { name, default, parse }
    }

    /// The `dtype = auto` parameter every built-in operation has.
    pub const fn dtype() -> Self {
        Self::new("dtype", ParameterDefault::Value(ParameterValue::Auto), dtype_or_auto)
    }

    pub const fn number(name: &'static str, default: f64, parse: ParseParameter) -> Self {
        Self::new(name, ParameterDefault::Value(ParameterValue::Number(default)), parse)
    }

    pub const fn required(name: &'static str, parse: ParseParameter) -> Self {
        Self::new(name, ParameterDefault::Required, parse)
    }
}

/// The complete parameters of an operation, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    values: Vec<(&'static str, ParameterValue)>,
}

impl Parameters {
    pub fn new(values: Vec<(&'static str, ParameterValue)>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.values
            .iter()
            .find(|(parameter, _)| *parameter == name)
            .map(|(_, value)| *value)
    }

    /// A numeric parameter (`NaN` if it isn't one).
    pub fn number(&self, name: &str) -> f64 {
        match self.get(name) {
            Some(ParameterValue::Number(number)) => number,
            _ => f64::NAN,
        }
    }

    /// The explicit result type, if not `auto`.
    pub fn dtype(&self) -> Option<DType> {
        match self.get("dtype") {
            Some(ParameterValue::DType(dtype)) => Some(dtype),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ParameterValue)> + '_ {
        self.values.iter().copied()
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Eltwise,
    Reduction,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Eltwise => f.write_str("eltwise"),
            OperationKind::Reduction => f.write_str("reduction"),
        }
    }
}

/// Builds the kernel of an operation from its parameters.
#[derive(Clone, Copy)]
pub enum Compute {
    Eltwise(fn(&Parameters) -> Box<dyn EltwiseOperation>),
    Reduction(fn(&Parameters) -> Box<dyn ReductionOperation>),
}

impl fmt::Debug for Compute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compute::Eltwise(_) => f.write_str("Eltwise"),
            Compute::Reduction(_) => f.write_str("Reduction"),
        }
    }
}

/// Cross-parameter validation; the error names the offending parameter.
pub type CheckParameters = fn(&Parameters) -> std::result::Result<(), (&'static str, String)>;

#[derive(Debug, Clone)]
pub struct OperationSpec {
    pub name: &'static str,
    pub parameters: Vec<ParameterSpec>,
    pub check: Option<CheckParameters>,
    pub compute: Compute,
}

impl OperationSpec {
    pub fn eltwise(
        name: &'static str,
        parameters: Vec<ParameterSpec>,
        build: fn(&Parameters) -> Box<dyn EltwiseOperation>,
    ) -> Self {
        Self {
            name,
            parameters,
            check: None,
            compute: Compute::Eltwise(build),
        }
    }

    pub fn reduction(
        name: &'static str,
        parameters: Vec<ParameterSpec>,
        build: fn(&Parameters) -> Box<dyn ReductionOperation>,
    ) -> Self {
        Self {
            name,
            parameters,
            check: None,
            compute: Compute::Reduction(build),
        }
    }

    pub fn with_check(mut self, check: CheckParameters) -> Self {
        self.check = Some(check);
        self
    }

    pub fn kind(&self) -> OperationKind {
        match self.compute {
            Compute::Eltwise(_) => OperationKind::Eltwise,
            Compute::Reduction(_) => OperationKind::Reduction,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }
}

/// The explicit table of known operations.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    eltwise: BTreeMap<&'static str, Arc<OperationSpec>>,
    reductions: BTreeMap<&'static str, Arc<OperationSpec>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&mut self, kind: OperationKind) -> &mut BTreeMap<&'static str, Arc<OperationSpec>> {
        match kind {
            OperationKind::Eltwise => &mut self.eltwise,
            OperationKind::Reduction => &mut self.reductions,
        }
    }

    /// Register an operation; a second registration of the same name (and
    /// kind) is an error.
    pub fn register(&mut self, spec: OperationSpec) -> Result<()> {
        let kind = spec.kind();
        let table = self.table(kind);
        if table.contains_key(spec.name) {
            return Err(DafError::ConflictingOperation {
                kind: match kind {
                    OperationKind::Eltwise => "eltwise",
                    OperationKind::Reduction => "reduction",
                },
                name: spec.name.to_string(),
            });
        }
        table.insert(spec.name, Arc::new(spec));
        Ok(())
    }

    pub fn get(&self, kind: OperationKind, name: &str) -> Option<&Arc<OperationSpec>> {
        match kind {
            OperationKind::Eltwise => self.eltwise.get(name),
            OperationKind::Reduction => self.reductions.get(name),
        }
    }

    pub fn names(&self, kind: OperationKind) -> Vec<&'static str> {
        match kind {
            OperationKind::Eltwise => self.eltwise.keys().copied().collect(),
            OperationKind::Reduction => self.reductions.keys().copied().collect(),
        }
    }

    /// The built-in operations, built once.
    pub fn standard() -> &'static OperationRegistry {
        static STANDARD: OnceLock<OperationRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| {
            let mut registry = OperationRegistry::new();
            for spec in builtin_operations() {
                let kind = spec.kind();
                registry.table(kind).insert(spec.name, Arc::new(spec));
            }
            registry
        })
    }
}

fn builtin_operations() -> Vec<OperationSpec> {
    use ParameterSpec as P;
    vec![
        OperationSpec::eltwise("Abs", vec![P::dtype()], |_| Box::new(Abs)),
        OperationSpec::eltwise("Round", vec![P::dtype()], |_| Box::new(Round)),
        OperationSpec::eltwise(
            "Clamp",
            vec![
                P::dtype(),
                P::number("min", f64::NEG_INFINITY, any_number),
                P::number("max", f64::INFINITY, any_number),
            ],
            |parameters| {
                Box::new(Clamp {
                    min: parameters.number("min"),
                    max: parameters.number("max"),
                })
            },
        )
        .with_check(|parameters| {
            let min = parameters.number("min");
            if parameters.number("max") < min {
                return Err(("max", format!("must be at least the min: {}", format_parameter_number(min))));
            }
            Ok(())
        }),
        OperationSpec::eltwise("Convert", vec![P::required("dtype", numeric_dtype)], |_| Box::new(Convert)),
        OperationSpec::eltwise("Fraction", vec![P::dtype()], |_| Box::new(Fraction)),
        OperationSpec::eltwise(
            "Log",
            vec![
                P::dtype(),
                P::number("base", std::f64::consts::E, log_base),
                P::number("eps", 0.0, non_negative_number),
            ],
            |parameters| {
                Box::new(Log {
                    base: parameters.number("base"),
                    eps: parameters.number("eps"),
                })
            },
        ),
        OperationSpec::eltwise(
            "Significant",
            vec![
                P::dtype(),
                P::required("high", non_negative_number),
                P::new("low", ParameterDefault::SameAs("high"), non_negative_number),
            ],
            |parameters| {
                Box::new(Significant {
                    high: parameters.number("high"),
                    low: parameters.number("low"),
                })
            },
        )
        .with_check(|parameters| {
            let high = parameters.number("high");
            if parameters.number("low") > high {
                return Err(("low", format!("must be at most the high: {}", format_parameter_number(high))));
            }
            Ok(())
        }),
        OperationSpec::reduction("Count", vec![P::dtype()], |_| Box::new(Count)),
        OperationSpec::reduction("Sum", vec![P::dtype()], |_| Box::new(Sum)),
        OperationSpec::reduction("Max", vec![P::dtype()], |_| Box::new(Max)),
        OperationSpec::reduction("Min", vec![P::dtype()], |_| Box::new(Min)),
        OperationSpec::reduction("Mean", vec![P::dtype()], |_| Box::new(Mean)),
        OperationSpec::reduction("Median", vec![P::dtype()], |_| Box::new(Median)),
        OperationSpec::reduction(
            "Quantile",
            vec![P::dtype(), P::required("p", probability)],
            |parameters| Box::new(Quantile { p: parameters.number("p") }),
        ),
        OperationSpec::reduction("Var", vec![P::dtype()], |_| Box::new(Var)),
        OperationSpec::reduction(
            "VarN",
            vec![P::dtype(), P::number("eps", 0.0, non_negative_number)],
            |parameters| Box::new(VarN { eps: parameters.number("eps") }),
        ),
        OperationSpec::reduction("Std", vec![P::dtype()], |_| Box::new(Std)),
        OperationSpec::reduction(
            "StdN",
            vec![P::dtype(), P::number("eps", 0.0, non_negative_number)],
            |parameters| Box::new(StdN { eps: parameters.number("eps") }),
        ),
    ]
}
