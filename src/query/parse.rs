//! Turning a query text into a [`Query`].
//!
//! The text is parsed with the generic expression parser using the query
//! syntax, then the expression tree is walked in labeled frames so that any
//! error points at the offending part together with the enclosing ones.

use regex::Regex;

use crate::error::{QueryError, QueryErrorKind, Result};
use crate::expression::{parse_expression, split_list, Context, Expression, Span, Token};

use super::ast::{AxisSelector, Comparison, Lookup, Mask, Query, Selection, Stage};
use super::operations::{OperationKind, OperationRegistry, OperationSpec, ParameterDefault, ParameterValue, Parameters};
use super::syntax::{query_syntax, QueryOperator};

type Parse<T> = std::result::Result<T, QueryError>;
type QueryExpression = Expression<QueryOperator>;

/// Parse a query using the built-in operations.
pub fn parse_query(text: &str) -> Result<Query> {
    parse_query_with(text, OperationRegistry::standard())
}

/// Parse a query using the operations of a specific registry.
pub fn parse_query_with(text: &str, registry: &OperationRegistry) -> Result<Query> {
    let parsed = parse_expression(text, query_syntax())?;
    let mut context = Context::new(&parsed.encoded);
    let expression = &parsed.expression;
    let query = context.in_frame(expression.span(), "query", |context| {
        parse_root(context, expression, registry)
    })?;
    Ok(query)
}

/// A regex matching whole values only.
pub(crate) fn full_match_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

fn operator_of(token: &Token<QueryOperator>) -> Option<QueryOperator> {
    token.operator.map(|operator| operator.id)
}

fn token_span(token: &Token<QueryOperator>) -> Span {
    (token.offset, token.end())
}

fn operand<'e>(
    context: &Context<'_>,
    expression: &'e QueryExpression,
    expected: &str,
) -> Parse<&'e Token<QueryOperator>> {
    expression
        .as_operand()
        .ok_or_else(|| context.fail_at(QueryErrorKind::InvalidQuery, format!("expected: {expected}"), expression))
}

/// The operand a list was split from; any operator left in it is out of place.
fn list_head<'e>(context: &Context<'_>, expression: &'e QueryExpression) -> Parse<&'e Token<QueryOperator>> {
    match expression {
        Expression::Operation { operator, .. } | Expression::Prefix { operator, .. } => {
            Err(unexpected(context, operator))
        }
        Expression::Operand(token) => Ok(token),
    }
}

fn unexpected(context: &Context<'_>, operator: &Token<QueryOperator>) -> QueryError {
    context.fail(
        QueryErrorKind::UnexpectedOperator,
        format!("unexpected operator: {}", operator.decoded()),
        token_span(operator),
    )
}

fn parse_root(context: &mut Context<'_>, expression: &QueryExpression, registry: &OperationRegistry) -> Parse<Query> {
    let (base, pairs) = split_list(expression, &[QueryOperator::Eltwise, QueryOperator::Reduction]);
    let lookup = parse_lookup(context, base)?;
    let mut stages = Vec::with_capacity(pairs.len());
    for (operator, element) in pairs {
        let (kind, label) = match operator_of(operator) {
            Some(QueryOperator::Reduction) => (OperationKind::Reduction, "reduction operation"),
            _ => (OperationKind::Eltwise, "eltwise operation"),
        };
        let span = (operator.offset, element.span().1);
        let stage = context.in_frame(span, label, |context| parse_stage(context, kind, element, registry))?;
        stages.push(stage);
    }
    Ok(Query { lookup, stages })
}

// ============================================================================
// LOOKUPS
// ============================================================================

fn parse_lookup(context: &mut Context<'_>, expression: &QueryExpression) -> Parse<Lookup> {
    if let Some(token) = expression.as_operand() {
        return Ok(Lookup::Scalar(token.value()));
    }
    if !expression.is_operation(&[QueryOperator::Lookup]) {
        return Err(context.fail_at(
            QueryErrorKind::InvalidQuery,
            "expected: scalar name or axes @ property",
            expression,
        ));
    }
    context.parse_operation_in_context(
        expression,
        &[QueryOperator::Lookup],
        "axes lookup",
        |context, axes, _, property| {
            let Some(property) = property else {
                return Err(context.fail_at(QueryErrorKind::InvalidQuery, "expected: axes @ property", expression));
            };
            let property = operand(context, property, "property name")?.value();
            let axes = parse_axes(context, axes)?;
            Ok(Lookup::Axes { axes, property })
        },
    )
}

fn parse_axes(context: &mut Context<'_>, expression: &QueryExpression) -> Parse<Vec<AxisSelector>> {
    let (first, pairs) = split_list(expression, &[QueryOperator::Axes]);
    if pairs.len() > 1 {
        return Err(context.fail_at(
            QueryErrorKind::InvalidQuery,
            "too many axes (expected: rows, columns)",
            expression,
        ));
    }
    let first = context.in_frame(first.span(), "axis", |context| parse_axis(context, first))?;
    let (_, rest) = context.parse_list_in_context(expression, &[QueryOperator::Axes], "axis", |context, _, element| {
        parse_axis(context, element)
    })?;
    let mut axes = vec![first];
    axes.extend(rest);
    Ok(axes)
}

fn parse_axis(context: &mut Context<'_>, expression: &QueryExpression) -> Parse<AxisSelector> {
    match expression {
        Expression::Operand(token) => Ok(AxisSelector {
            axis: token.value(),
            selection: Selection::All,
        }),
        Expression::Operation { left, operator, right } => {
            let axis = operand(context, left, "axis name")?.value();
            let selection = match operator_of(operator) {
                Some(QueryOperator::Filter) => {
                    let mask = context.in_frame(right.span(), "mask", |context| parse_mask(context, right))?;
                    Selection::Mask(mask)
                }
                Some(QueryOperator::Equal) => Selection::Pin(operand(context, right, "axis entry")?.value()),
                _ => return Err(unexpected(context, operator)),
            };
            Ok(AxisSelector { axis, selection })
        }
        Expression::Prefix { operator, .. } => Err(unexpected(context, operator)),
    }
}

fn parse_mask(context: &mut Context<'_>, expression: &QueryExpression) -> Parse<Mask> {
    match expression {
        Expression::Operand(token) => Ok(Mask::Vector(token.value())),
        Expression::Prefix { operator, operand } => match operator_of(operator) {
            Some(QueryOperator::Not) => Ok(Mask::Not(Box::new(parse_mask(context, operand)?))),
            _ => Err(unexpected(context, operator)),
        },
        Expression::Operation { left, operator, right } => match operator_of(operator) {
            Some(QueryOperator::Or) => Ok(Mask::Or(
                Box::new(parse_mask(context, left)?),
                Box::new(parse_mask(context, right)?),
            )),
            Some(QueryOperator::And) => Ok(Mask::And(
                Box::new(parse_mask(context, left)?),
                Box::new(parse_mask(context, right)?),
            )),
            Some(QueryOperator::Not) => {
                let vector = operand(context, left, "vector name")?.value();
                let pattern = operand(context, right, "regular expression")?.value();
                if let Err(error) = full_match_regex(&pattern) {
                    return Err(context.fail_at(
                        QueryErrorKind::InvalidQuery,
                        format!("invalid regular expression: {pattern}\n{error}"),
                        right,
                    ));
                }
                Ok(Mask::Match { vector, pattern })
            }
            Some(id) => match Comparison::from_operator(id) {
                Some(comparison) => Ok(Mask::Compare {
                    vector: operand(context, left, "vector name")?.value(),
                    comparison,
                    value: operand(context, right, "value")?.value(),
                }),
                None => Err(unexpected(context, operator)),
            },
            None => Err(unexpected(context, operator)),
        },
    }
}

// ============================================================================
// STAGES
// ============================================================================

fn parse_stage(
    context: &mut Context<'_>,
    kind: OperationKind,
    element: &QueryExpression,
    registry: &OperationRegistry,
) -> Parse<Stage> {
    let (name_expression, _) = split_list(element, &[QueryOperator::Parameter]);
    let name = list_head(context, name_expression)?.value();
    let Some(spec) = registry.get(kind, &name) else {
        return Err(context.fail_at(
            QueryErrorKind::UnknownOperationType,
            format!("unknown {kind} operation: {name}"),
            name_expression,
        ));
    };

    let mut given: Vec<(&'static str, ParameterValue, Span)> = Vec::new();
    context.parse_list_in_context(
        element,
        &[QueryOperator::Parameter],
        "parameter assignment",
        |context, _, assignment| {
            let parsed = parse_assignment(context, spec, assignment, &given)?;
            given.push(parsed);
            Ok(())
        },
    )?;

    let parameters = resolve_parameters(context, spec, &given, name_expression)?;
    if let Some(check) = spec.check {
        if let Err((name, requirement)) = check(&parameters) {
            let span = given
                .iter()
                .find(|(given_name, _, _)| *given_name == name)
                .map_or(name_expression.span(), |(_, _, span)| *span);
            let value = parameters.get(name).map(|value| value.to_string()).unwrap_or_default();
            return Err(context.fail(
                QueryErrorKind::InvalidParameterValue,
                invalid_value_message(&value, name, spec, &requirement),
                span,
            ));
        }
    }
    Ok(Stage {
        spec: spec.clone(),
        parameters,
    })
}

fn invalid_value_message(value: &str, name: &str, spec: &OperationSpec, requirement: &str) -> String {
    format!(
        "invalid value: {value}\nfor the parameter: {name}\nof the operation: {}\nwhich {requirement}",
        spec.name
    )
}

fn parse_assignment(
    context: &mut Context<'_>,
    spec: &OperationSpec,
    assignment: &QueryExpression,
    given: &[(&'static str, ParameterValue, Span)],
) -> Parse<(&'static str, ParameterValue, Span)> {
    let Expression::Operation { left, operator, right } = assignment else {
        return Err(context.fail_at(QueryErrorKind::InvalidQuery, "expected: parameter = value", assignment));
    };
    if operator_of(operator) != Some(QueryOperator::Equal) {
        return Err(unexpected(context, operator));
    }
    let name_token = operand(context, left, "parameter name")?;
    let value_token = operand(context, right, "parameter value")?;
    let name = name_token.value();

    let Some(parameter) = spec.parameter(&name) else {
        return Err(context.fail(
            QueryErrorKind::UnknownParameter,
            format!("unknown parameter: {name}\nfor the operation: {}", spec.name),
            token_span(name_token),
        ));
    };
    if given.iter().any(|(given_name, _, _)| *given_name == parameter.name) {
        return Err(context.fail(
            QueryErrorKind::RepeatedParameter,
            format!("repeated parameter: {name}\nfor the operation: {}", spec.name),
            token_span(name_token),
        ));
    }
    let text = value_token.value();
    let value = (parameter.parse)(&text).map_err(|requirement| {
        context.fail(
            QueryErrorKind::InvalidParameterValue,
            invalid_value_message(&text, parameter.name, spec, requirement),
            token_span(value_token),
        )
    })?;
    Ok((parameter.name, value, assignment.span()))
}

fn resolve_parameters(
    context: &Context<'_>,
    spec: &OperationSpec,
    given: &[(&'static str, ParameterValue, Span)],
    name_expression: &QueryExpression,
) -> Parse<Parameters> {
    let mut values: Vec<(&'static str, ParameterValue)> = Vec::with_capacity(spec.parameters.len());
    for parameter in &spec.parameters {
        let explicit = given
            .iter()
            .find(|(name, _, _)| *name == parameter.name)
            .map(|(_, value, _)| *value);
        let value = match (explicit, parameter.default) {
            (Some(value), _) => Some(value),
            (None, ParameterDefault::Value(value)) => Some(value),
            (None, ParameterDefault::SameAs(other)) => values
                .iter()
                .find(|(name, _)| *name == other)
                .map(|(_, value)| *value),
            (None, ParameterDefault::Required) => None,
        };
        let Some(value) = value else {
            return Err(context.fail_at(
                QueryErrorKind::MissingParameter,
                format!("missing parameter: {}\nfor the operation: {}", parameter.name, spec.name),
                name_expression,
            ));
        };
        values.push((parameter.name, value));
    }
    Ok(Parameters::new(values))
}
