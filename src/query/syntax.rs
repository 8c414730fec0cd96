//! The operators of the query language.

use std::fmt;
use std::sync::OnceLock;

use crate::expression::{is_escapable, Operator, Syntax};

/// Query operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOperator {
    /// `%`: an eltwise operation stage.
    Eltwise,
    /// `%>`: a reduction operation stage.
    Reduction,
    /// `@`: look up a property of the axes.
    Lookup,
    /// `;`: separates operation parameters.
    Parameter,
    /// `,`: separates the rows and columns axes.
    Axes,
    /// `:`: filters an axis by a mask.
    Filter,
    /// `|`: mask union.
    Or,
    /// `&`: mask intersection.
    And,
    /// `~`: mask negation (prefix) or regex match (binary).
    Not,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl QueryOperator {
    pub fn token(self) -> &'static str {
        match self {
            QueryOperator::Eltwise => "%",
            QueryOperator::Reduction => "%>",
            QueryOperator::Lookup => "@",
            QueryOperator::Parameter => ";",
            QueryOperator::Axes => ",",
            QueryOperator::Filter => ":",
            QueryOperator::Or => "|",
            QueryOperator::And => "&",
            QueryOperator::Not => "~",
            QueryOperator::Equal => "=",
            QueryOperator::NotEqual => "!=",
            QueryOperator::Less => "<",
            QueryOperator::LessEqual => "<=",
            QueryOperator::Greater => ">",
            QueryOperator::GreaterEqual => ">=",
        }
    }

    pub const COMPARISONS: [QueryOperator; 6] = [
        QueryOperator::Equal,
        QueryOperator::NotEqual,
        QueryOperator::Less,
        QueryOperator::LessEqual,
        QueryOperator::Greater,
        QueryOperator::GreaterEqual,
    ];
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Characters that can't appear unescaped in a query name or value.
pub const RESERVED_CHARACTERS: &str = "%@;,:|&~=!<>\\";

// Only ASCII whitespace separates tokens, matching what `\` can escape.
const OPERAND_PATTERN: &str = r"[^ \t\n\x0C\r%@,;:&|~=!<>]+";
const SPACE_PATTERN: &str = r"[ \t\n\x0C\r]+";

fn operators() -> Vec<Operator<QueryOperator>> {
    use QueryOperator::*;
    let mut operators = vec![
        Operator::left(Eltwise, Eltwise.token(), 1),
        Operator::left(Reduction, Reduction.token(), 1),
        Operator::left(Lookup, Lookup.token(), 2),
        Operator::left(Parameter, Parameter.token(), 3),
        Operator::left(Axes, Axes.token(), 4),
        Operator::left(Filter, Filter.token(), 5),
        Operator::left(Or, Or.token(), 6),
        Operator::left(And, And.token(), 7),
        // Right-associative so a prefix `~` takes a whole `vector ~ regex` operand.
        Operator::right(Not, Not.token(), 8).prefix(),
    ];
    operators.extend(
        QueryOperator::COMPARISONS
            .iter()
            .map(|comparison| Operator::left(*comparison, comparison.token(), 9)),
    );
    operators
}

/// The query syntax, built once.
pub fn query_syntax() -> &'static Syntax<QueryOperator> {
    static SYNTAX: OnceLock<Syntax<QueryOperator>> = OnceLock::new();
    SYNTAX.get_or_init(|| match Syntax::new(SPACE_PATTERN, OPERAND_PATTERN, operators()) {
        Ok(syntax) => syntax,
        Err(error) => unreachable!("invalid built-in query patterns: {error}"),
    })
}

/// Escape a name or value so it reads back as a single operand.
pub fn escape_query_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        if is_escapable(character) && (character.is_ascii_whitespace() || RESERVED_CHARACTERS.contains(character)) {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parse_expression;

    #[test]
    fn test_longest_operator_wins() {
        let parsed = parse_expression("cell @ age %> Sum", query_syntax()).unwrap();
        assert_eq!(parsed.expression.to_string(), "((cell @ age) %> Sum)");
    }

    #[test]
    fn test_escaped_value_is_one_operand() {
        let escaped = escape_query_value("a b:c");
        assert_eq!(escaped, "a\\ b\\:c");
        let parsed = parse_expression(&escaped, query_syntax()).unwrap();
        assert_eq!(parsed.expression.as_operand().unwrap().value(), "a b:c");
    }

    #[test]
    fn test_whitespace_names_read_back() {
        for value in ["a\tb", "line\nbreak", "wide\u{3000}space", "non\u{A0}breaking"] {
            let escaped = escape_query_value(value);
            let parsed = parse_expression(&escaped, query_syntax()).unwrap();
            assert_eq!(parsed.expression.as_operand().unwrap().value(), value, "{escaped:?}");
        }
    }
}
