//! Walking a parsed expression with diagnostics.
//!
//! A [`Context`] remembers which labeled parts of the expression are being
//! parsed. When something fails, the error shows the failing span and every
//! enclosing part, innermost first:
//!
//! ```text
//! unknown parameter: bar
//! for the operation: Abs
//! in: cell @ age % Abs; bar = 1
//! at: ··················▲▲▲····
//!     ··················▲▲▲▲▲▲▲  (parameter assignment)
//!     ···········▲▲▲▲▲▲▲▲▲▲▲▲▲▲  (eltwise operation)
//!     ▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲  (query)
//! ```

use crate::error::{QueryError, QueryErrorKind};

use super::parser::Expression;
use super::tokens::{decode_expression, decoded_column, Token};

/// An encoded byte range.
pub type Span = (usize, usize);

#[derive(Debug, Clone)]
struct Frame {
    span: Span,
    label: String,
}

/// The parsing context: the encoded text and the labeled frames entered so
/// far.
#[derive(Debug, Clone)]
pub struct Context<'a> {
    encoded: &'a str,
    frames: Vec<Frame>,
}

impl<'a> Context<'a> {
    pub fn new(encoded: &'a str) -> Self {
        Self {
            encoded,
            frames: Vec::new(),
        }
    }

    pub fn encoded(&self) -> &'a str {
        self.encoded
    }

    /// Run `parse` inside a labeled frame covering the span.
    pub fn in_frame<T>(
        &mut self,
        span: Span,
        label: &str,
        parse: impl FnOnce(&mut Self) -> Result<T, QueryError>,
    ) -> Result<T, QueryError> {
        self.frames.push(Frame {
            span,
            label: label.to_string(),
        });
        let result = parse(self);
        self.frames.pop();
        result
    }

    /// Split an operation with one of the operators and parse its parts in a
    /// labeled frame. Anything else is passed whole, without an operator.
    pub fn parse_operation_in_context<Op, T>(
        &mut self,
        expression: &Expression<Op>,
        operators: &[Op],
        label: &str,
        parse: impl FnOnce(&mut Self, &Expression<Op>, Option<&Token<Op>>, Option<&Expression<Op>>) -> Result<T, QueryError>,
    ) -> Result<T, QueryError>
    where
        Op: Copy + PartialEq,
    {
        self.in_frame(expression.span(), label, |context| match expression {
            Expression::Operation { left, operator, right } if expression.is_operation(operators) => {
                parse(context, left.as_ref(), Some(operator), Some(right.as_ref()))
            }
            other => parse(context, other, None, None),
        })
    }

    /// Peel a left-leaning chain `base op e1 op e2 ...` (for the given
    /// operators) into the base and the parsed elements, in order. Each
    /// element is parsed in a labeled frame covering just that element.
    pub fn parse_list_in_context<'e, Op, E>(
        &mut self,
        expression: &'e Expression<Op>,
        operators: &[Op],
        label: &str,
        mut parse_element: impl FnMut(&mut Self, &'e Token<Op>, &'e Expression<Op>) -> Result<E, QueryError>,
    ) -> Result<(&'e Expression<Op>, Vec<E>), QueryError>
    where
        Op: Copy + PartialEq,
    {
        let (base, pairs) = split_list(expression, operators);
        let mut elements = Vec::with_capacity(pairs.len());
        for (operator, element) in pairs {
            elements.push(self.in_frame(element.span(), label, |context| parse_element(context, operator, element))?);
        }
        Ok((base, elements))
    }

    /// An error at a span, rendered with all the enclosing frames.
    pub fn fail(&self, kind: QueryErrorKind, message: impl AsRef<str>, span: Span) -> QueryError {
        QueryError::new(kind, self.diagram(message.as_ref(), span))
    }

    /// An error about a whole expression.
    pub fn fail_at<Op: Copy + PartialEq>(
        &self,
        kind: QueryErrorKind,
        message: impl AsRef<str>,
        expression: &Expression<Op>,
    ) -> QueryError {
        self.fail(kind, message, expression.span())
    }

    fn diagram(&self, message: &str, span: Span) -> String {
        let width = decode_expression(self.encoded).chars().count();
        let mut rows: Vec<(Span, Option<&str>)> = Vec::new();
        if self.frames.last().map(|frame| frame.span) != Some(span) {
            rows.push((span, None));
        }
        rows.extend(
            self.frames
                .iter()
                .rev()
                .map(|frame| (frame.span, Some(frame.label.as_str()))),
        );

        let mut text = format!("{message}\nin: {}", decode_expression(self.encoded));
        for (index, (span, label)) in rows.into_iter().enumerate() {
            text.push('\n');
            text.push_str(if index == 0 { "at: " } else { "    " });
            let start = decoded_column(self.encoded, span.0);
            let end = decoded_column(self.encoded, span.1);
            text.extend((0..width).map(|column| if (start..end).contains(&column) { '▲' } else { '·' }));
            if let Some(label) = label {
                text.push_str(&format!("  ({label})"));
            }
        }
        text
    }
}

/// Peel a left-leaning chain of the operators into its base and the
/// (operator, element) pairs, in order. The base may still hold other
/// operators; the caller decides whether they belong there.
pub fn split_list<'e, Op: Copy + PartialEq>(
    expression: &'e Expression<Op>,
    operators: &[Op],
) -> (&'e Expression<Op>, Vec<(&'e Token<Op>, &'e Expression<Op>)>) {
    let mut pairs = Vec::new();
    let mut base = expression;
    while let Expression::Operation { left, operator, right } = base {
        if !base.is_operation(operators) {
            break;
        }
        pairs.push((operator, right.as_ref()));
        base = left.as_ref();
    }
    pairs.reverse();
    (base, pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse_expression;
    use crate::expression::tokens::{Operator, Syntax};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        And,
        Or,
    }

    fn syntax() -> Syntax<Op> {
        Syntax::new(r"\s+", r"\w+", vec![Operator::left(Op::Or, "|", 1), Operator::left(Op::And, "&", 2)]).unwrap()
    }

    #[test]
    fn test_split_list_keeps_order() {
        let parsed = parse_expression("a & b & c | d", &syntax()).unwrap();
        let (base, pairs) = split_list(&parsed.expression, &[Op::Or]);
        assert_eq!(base.to_string(), "((a & b) & c)");
        assert_eq!(pairs.len(), 1);

        let (base, pairs) = split_list(base, &[Op::And]);
        assert_eq!(base.to_string(), "a");
        let elements: Vec<String> = pairs.iter().map(|(_, element)| element.to_string()).collect();
        assert_eq!(elements, vec!["b", "c"]);
    }

    #[test]
    fn test_failure_shows_frames() {
        let parsed = parse_expression("a & b | c", &syntax()).unwrap();
        let mut context = Context::new(&parsed.encoded);
        let error = context
            .parse_operation_in_context(&parsed.expression, &[Op::Or], "union", |context, left, _, _| {
                context.in_frame(left.span(), "intersection", |context| {
                    Err::<(), _>(context.fail(QueryErrorKind::InvalidQuery, "no good", (4, 5)))
                })
            })
            .unwrap_err();
        assert_eq!(
            error.message,
            "no good\nin: a & b | c\nat: ····▲····\n    ▲▲▲▲▲····  (intersection)\n    ▲▲▲▲▲▲▲▲▲  (union)"
        );
    }
}
